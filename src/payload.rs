//! Fixed catalog of adversarial input values shared by every scenario.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Length of the oversized text payload
pub const OVERSIZED_LEN: usize = 5000;

/// Semantic tag of a payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadTag {
    /// SQL-injection shaped string
    SqlInjection = 0,
    /// Script-injection shaped string
    ScriptInjection = 1,
    /// Long run of a repeated character
    OversizedText = 2,
    /// Number outside any sensible range
    OutOfRangeNumber = 3,
    /// Multi-byte / emoji text
    NonAsciiText = 4,
}

impl PayloadTag {
    /// All tags, in catalog order
    pub fn all() -> [PayloadTag; 5] {
        [
            PayloadTag::SqlInjection,
            PayloadTag::ScriptInjection,
            PayloadTag::OversizedText,
            PayloadTag::OutOfRangeNumber,
            PayloadTag::NonAsciiText,
        ]
    }

    /// Whether the payload tries to smuggle code into the target
    pub fn is_injection(&self) -> bool {
        matches!(self, PayloadTag::SqlInjection | PayloadTag::ScriptInjection)
    }

    pub fn name(&self) -> &'static str {
        match self {
            PayloadTag::SqlInjection => "sql_injection",
            PayloadTag::ScriptInjection => "script_injection",
            PayloadTag::OversizedText => "oversized_text",
            PayloadTag::OutOfRangeNumber => "out_of_range_number",
            PayloadTag::NonAsciiText => "non_ascii_text",
        }
    }
}

impl fmt::Display for PayloadTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An immutable adversarial value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Payload {
    pub tag: PayloadTag,
    value: String,
}

impl Payload {
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Number of characters (not bytes) in the value
    pub fn char_len(&self) -> usize {
        self.value.chars().count()
    }

    /// Short printable form; long values are abbreviated
    pub fn preview(&self) -> String {
        if self.char_len() <= 40 {
            return self.value.clone();
        }
        let head: String = self.value.chars().take(16).collect();
        format!("{}... ({} chars)", head, self.char_len())
    }
}

/// Read-only mapping from tag to payload, built once per run
#[derive(Debug, Clone, Serialize)]
pub struct PayloadCatalog {
    /// Slot `i` holds the payload whose tag discriminant is `i`
    payloads: [Payload; 5],
}

impl PayloadCatalog {
    /// The standard catalog
    pub fn standard() -> Self {
        let payloads = PayloadTag::all().map(|tag| Payload {
            tag,
            value: standard_value(tag),
        });
        Self { payloads }
    }

    pub fn get(&self, tag: PayloadTag) -> &Payload {
        &self.payloads[tag as usize]
    }

    /// Shorthand for `get(tag).value()`
    pub fn value(&self, tag: PayloadTag) -> &str {
        self.get(tag).value()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Payload> {
        self.payloads.iter()
    }

    pub fn len(&self) -> usize {
        self.payloads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payloads.is_empty()
    }
}

impl Default for PayloadCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

fn standard_value(tag: PayloadTag) -> String {
    match tag {
        PayloadTag::SqlInjection => "' OR 1=1 --".to_string(),
        PayloadTag::ScriptInjection => "<script>alert(\"XSS\")</script>".to_string(),
        PayloadTag::OversizedText => "A".repeat(OVERSIZED_LEN),
        PayloadTag::OutOfRangeNumber => "-99".to_string(),
        PayloadTag::NonAsciiText => "🤡💀🔥".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_catalog_covers_every_tag() {
        let catalog = PayloadCatalog::standard();
        assert_eq!(catalog.len(), 5);
        for tag in PayloadTag::all() {
            assert_eq!(catalog.get(tag).tag, tag);
        }
    }

    #[test]
    fn test_catalog_slots_follow_tag_order() {
        let catalog = PayloadCatalog::standard();
        let tags: Vec<_> = catalog.iter().map(|p| p.tag).collect();
        assert_eq!(tags, PayloadTag::all().to_vec());
        for (slot, tag) in PayloadTag::all().into_iter().enumerate() {
            assert_eq!(tag as usize, slot);
            assert_eq!(catalog.value(tag), standard_value(tag));
        }
        assert_ne!(
            catalog.value(PayloadTag::NonAsciiText),
            catalog.value(PayloadTag::SqlInjection)
        );
    }

    #[test]
    fn test_standard_values() {
        let catalog = PayloadCatalog::standard();
        assert_eq!(catalog.value(PayloadTag::SqlInjection), "' OR 1=1 --");
        assert_eq!(
            catalog.value(PayloadTag::ScriptInjection),
            "<script>alert(\"XSS\")</script>"
        );
        assert_eq!(catalog.value(PayloadTag::OutOfRangeNumber), "-99");
        assert!(catalog.value(PayloadTag::OutOfRangeNumber).parse::<i64>().unwrap() < 0);
    }

    #[test]
    fn test_oversized_payload_length() {
        let catalog = PayloadCatalog::standard();
        let huge = catalog.get(PayloadTag::OversizedText);
        assert!(huge.char_len() >= OVERSIZED_LEN);
        assert!(huge.value().chars().all(|c| c == 'A'));
    }

    #[test]
    fn test_non_ascii_payload_is_multibyte() {
        let catalog = PayloadCatalog::standard();
        let emoji = catalog.get(PayloadTag::NonAsciiText);
        assert!(!emoji.value().is_ascii());
        assert!(emoji.value().len() > emoji.char_len());
    }

    #[test]
    fn test_injection_tags() {
        assert!(PayloadTag::SqlInjection.is_injection());
        assert!(PayloadTag::ScriptInjection.is_injection());
        assert!(!PayloadTag::OversizedText.is_injection());
    }

    #[test]
    fn test_preview_abbreviates_long_values() {
        let catalog = PayloadCatalog::standard();
        let preview = catalog.get(PayloadTag::OversizedText).preview();
        assert!(preview.ends_with("(5000 chars)"));
        assert_eq!(catalog.get(PayloadTag::SqlInjection).preview(), "' OR 1=1 --");
    }
}
