//! Demo fixture pages for runs without a user-supplied page description.

use std::path::Path;

use anyhow::Context;
use page_port::sim::{NodeDescription, PageDescription};

/// A small storefront checkout page exercising the common element kinds.
pub fn demo_page() -> PageDescription {
    PageDescription::new("https://demo.pagepilot.test/checkout")
        .title("PagePilot demo checkout")
        .node(
            NodeDescription::new("form")
                .id("checkout")
                .child(
                    NodeDescription::new("input")
                        .id("email")
                        .attr("name", "email")
                        .attr("placeholder", "Email"),
                )
                .child(
                    NodeDescription::new("select")
                        .id("shipping")
                        .attr("name", "shipping")
                        .option("std", "Standard")
                        .option("exp", "Express"),
                )
                .child(
                    NodeDescription::new("input")
                        .id("terms")
                        .attr("name", "terms")
                        .attr("type", "checkbox"),
                )
                .child(
                    NodeDescription::new("button")
                        .id("pay")
                        .attr("type", "submit")
                        .text("Pay now"),
                ),
        )
        .node(
            NodeDescription::new("a")
                .attr("href", "https://docs.pagepilot.test/help")
                .text("Help"),
        )
}

/// Load a serde page description from a JSON file.
pub fn load_page(path: &Path) -> anyhow::Result<PageDescription> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading page description {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("parsing page description {}", path.display()))
}
