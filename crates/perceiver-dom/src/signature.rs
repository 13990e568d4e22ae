//! Durable structural fingerprints for interactive elements.
//!
//! A signature survives registry invalidation: handles die with their epoch,
//! the canonical key of an unchanged element does not.

use page_port::NodeInfo;
use serde::{Deserialize, Serialize};

/// Maximum characters kept per normalized field.
pub const FIELD_MAX: usize = 80;

/// Structural fingerprint of one element.
///
/// Fields are stored normalized (lower-cased, whitespace-collapsed,
/// truncated) so two signatures compare equal exactly when their canonical
/// keys match.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementSignature {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub testid: Option<String>,
}

/// Lower-case, collapse whitespace, truncate to [`FIELD_MAX`] characters.
pub fn normalize(value: &str) -> String {
    let collapsed = value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    collapsed.chars().take(FIELD_MAX).collect()
}

fn field(value: Option<&str>) -> Option<String> {
    value.map(normalize).filter(|s| !s.is_empty())
}

impl ElementSignature {
    /// Fingerprint a node from its current snapshot.
    pub fn from_info(info: &NodeInfo) -> Self {
        let text = if info.text.is_empty() {
            info.value.as_deref().unwrap_or("")
        } else {
            info.text.as_str()
        };
        Self {
            tag: field(Some(info.tag.as_str())),
            role: field(info.role()),
            id: field(info.dom_id()),
            text: field(Some(text)),
            label: field(info.label()),
            href: field(info.href()),
            placeholder: field(info.placeholder()),
            testid: field(info.test_id()),
        }
    }

    /// Re-normalize every field; planner-supplied signatures arrive raw.
    pub fn normalized(&self) -> Self {
        Self {
            tag: self.tag.as_deref().and_then(|v| field(Some(v))),
            role: self.role.as_deref().and_then(|v| field(Some(v))),
            id: self.id.as_deref().and_then(|v| field(Some(v))),
            text: self.text.as_deref().and_then(|v| field(Some(v))),
            label: self.label.as_deref().and_then(|v| field(Some(v))),
            href: self.href.as_deref().and_then(|v| field(Some(v))),
            placeholder: self.placeholder.as_deref().and_then(|v| field(Some(v))),
            testid: self.testid.as_deref().and_then(|v| field(Some(v))),
        }
    }

    /// Ordered concatenation of all fields; the identity key.
    pub fn canonical_key(&self) -> String {
        let s = self.normalized();
        [
            s.tag.as_deref().unwrap_or(""),
            s.role.as_deref().unwrap_or(""),
            s.id.as_deref().unwrap_or(""),
            s.text.as_deref().unwrap_or(""),
            s.label.as_deref().unwrap_or(""),
            s.href.as_deref().unwrap_or(""),
            s.placeholder.as_deref().unwrap_or(""),
            s.testid.as_deref().unwrap_or(""),
        ]
        .join("|")
    }

    pub fn is_empty(&self) -> bool {
        self.tag.is_none()
            && self.role.is_none()
            && self.id.is_none()
            && self.text.is_none()
            && self.label.is_none()
            && self.href.is_none()
            && self.placeholder.is_none()
            && self.testid.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_and_truncates() {
        assert_eq!(normalize("  Hello\n  World "), "hello world");
        let long = "x".repeat(200);
        assert_eq!(normalize(&long).len(), FIELD_MAX);
    }

    #[test]
    fn canonical_key_ignores_case_and_spacing() {
        let a = ElementSignature {
            tag: Some("BUTTON".into()),
            text: Some("  Submit   Order ".into()),
            ..Default::default()
        };
        let b = ElementSignature {
            tag: Some("button".into()),
            text: Some("submit order".into()),
            ..Default::default()
        };
        assert_eq!(a.canonical_key(), b.canonical_key());
    }

    #[test]
    fn different_text_means_different_key() {
        let a = ElementSignature {
            tag: Some("a".into()),
            text: Some("Login".into()),
            ..Default::default()
        };
        let b = ElementSignature {
            tag: Some("a".into()),
            text: Some("Logout".into()),
            ..Default::default()
        };
        assert_ne!(a.canonical_key(), b.canonical_key());
    }
}
