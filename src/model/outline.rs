//! Outline nodes and the externally visible extraction result.

use serde::{Deserialize, Serialize};

/// A finalized heading entry.
///
/// Serialized with keys in the order `level`, `text`, `page`; the level is
/// written as `"H1"`, `"H2"`, … and read back from either that form or a
/// bare integer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutlineNode {
    /// Nesting level (1 = top level)
    #[serde(with = "heading_level")]
    pub level: u8,
    /// Heading text
    pub text: String,
    /// Page number (0-indexed)
    pub page: u32,
}

impl OutlineNode {
    /// Create a new outline node.
    pub fn new(level: u8, text: impl Into<String>, page: u32) -> Self {
        Self {
            level,
            text: text.into(),
            page,
        }
    }
}

/// Title plus flattened heading tree for one source document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// Document title; empty when none was detected
    pub title: String,
    /// Headings in document order
    pub outline: Vec<OutlineNode>,
}

impl ExtractionResult {
    /// Create a result.
    pub fn new(title: impl Into<String>, outline: Vec<OutlineNode>) -> Self {
        Self {
            title: title.into(),
            outline,
        }
    }

    /// Check whether the result has neither title nor headings.
    pub fn is_empty(&self) -> bool {
        self.title.is_empty() && self.outline.is_empty()
    }

    /// Deepest level present in the outline (0 when empty).
    pub fn max_depth(&self) -> u8 {
        self.outline.iter().map(|n| n.level).max().unwrap_or(0)
    }

    /// Check the flattened-tree invariant: every node is at most one level
    /// deeper than the node before it, and the first node is level 1.
    pub fn is_well_nested(&self) -> bool {
        let mut previous = 0u8;
        for node in &self.outline {
            if node.level == 0 || node.level > previous + 1 {
                return false;
            }
            previous = node.level;
        }
        true
    }

    /// Serialize as pretty-printed JSON (UTF-8, non-ASCII kept literal).
    pub fn to_json_pretty(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

mod heading_level {
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S: Serializer>(level: &u8, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("H{}", level))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
        deserializer.deserialize_any(LevelVisitor)
    }

    struct LevelVisitor;

    impl Visitor<'_> for LevelVisitor {
        type Value = u8;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a heading level such as \"H2\" or 2")
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<u8, E> {
            u8::try_from(v)
                .ok()
                .filter(|l| *l >= 1)
                .ok_or_else(|| E::custom(format!("invalid heading level {}", v)))
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<u8, E> {
            if v < 0 {
                return Err(E::custom(format!("invalid heading level {}", v)));
            }
            self.visit_u64(v as u64)
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<u8, E> {
            let digits = v.strip_prefix('H').or_else(|| v.strip_prefix('h')).unwrap_or(v);
            let level: u64 = digits
                .parse()
                .map_err(|_| E::custom(format!("invalid heading level {:?}", v)))?;
            self.visit_u64(level)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_json_shape() {
        let node = OutlineNode::new(2, "Überblick", 3);
        let json = serde_json::to_string(&node).unwrap();
        assert_eq!(json, r#"{"level":"H2","text":"Überblick","page":3}"#);
    }

    #[test]
    fn test_level_accepts_integer() {
        let node: OutlineNode =
            serde_json::from_str(r#"{"level":3,"text":"x","page":0}"#).unwrap();
        assert_eq!(node.level, 3);
        let bad = serde_json::from_str::<OutlineNode>(r#"{"level":"H0","text":"x","page":0}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn test_empty_result_json() {
        let result = ExtractionResult::default();
        assert_eq!(
            serde_json::to_string(&result).unwrap(),
            r#"{"title":"","outline":[]}"#
        );
        assert!(result.is_empty());
    }

    #[test]
    fn test_well_nested() {
        let ok = ExtractionResult::new(
            "",
            vec![
                OutlineNode::new(1, "a", 0),
                OutlineNode::new(2, "b", 0),
                OutlineNode::new(3, "c", 1),
                OutlineNode::new(1, "d", 2),
            ],
        );
        assert!(ok.is_well_nested());
        assert_eq!(ok.max_depth(), 3);

        let orphan = ExtractionResult::new(
            "",
            vec![OutlineNode::new(1, "a", 0), OutlineNode::new(3, "c", 0)],
        );
        assert!(!orphan.is_well_nested());
    }
}
