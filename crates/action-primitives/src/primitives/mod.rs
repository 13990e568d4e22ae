//! One module per interaction primitive.

pub mod click;
pub mod keys;
pub mod scroll;
pub mod select;
pub mod type_text;

pub use click::click;
pub use keys::{focus, press, submit};
pub use scroll::scroll;
pub use select::{check, select};
pub use type_text::type_text;
