//! Positions inside a tree, used to point diagnostics at the offending node.
//!
//! Paths render as `$` for the root, `.key` for identifier-like keys,
//! `["odd key"]` for anything else, and `[3]` for array indices.

use std::fmt;

/// One step from a container to one of its children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// An object key
    Key(String),
    /// An array index
    Index(usize),
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Key(key) if is_identifier(key) => write!(f, ".{}", key),
            Segment::Key(key) => {
                let quoted = serde_json::to_string(key).map_err(|_| fmt::Error)?;
                write!(f, "[{}]", quoted)
            }
            Segment::Index(index) => write!(f, "[{}]", index),
        }
    }
}

fn is_identifier(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' || first == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// A path from the root of a tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Path {
    segments: Vec<Segment>,
}

impl Path {
    /// The root path, rendered as `$`.
    pub fn root() -> Self {
        Self::default()
    }

    /// Descend into an object key.
    pub fn push_key(&mut self, key: &str) {
        self.segments.push(Segment::Key(key.to_string()));
    }

    /// Descend into an array index.
    pub fn push_index(&mut self, index: usize) {
        self.segments.push(Segment::Index(index));
    }

    /// Descend by an arbitrary segment.
    pub fn push(&mut self, segment: Segment) {
        self.segments.push(segment);
    }

    /// Return to the parent.
    pub fn pop(&mut self) -> Option<Segment> {
        self.segments.pop()
    }

    /// The segments from the root, outermost first.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Rewrite a path rendered relative to a node (starting with `$`) so it
    /// starts at this path instead.
    pub(crate) fn rebase(&self, relative: &str) -> String {
        match relative.strip_prefix('$') {
            Some(rest) => format!("{}{}", self, rest),
            None => relative.to_string(),
        }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("$")?;
        for segment in &self.segments {
            write!(f, "{}", segment)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let mut path = Path::root();
        assert_eq!(path.to_string(), "$");

        path.push_key("items");
        path.push_index(3);
        path.push_key("needs quoting");
        assert_eq!(path.to_string(), "$.items[3][\"needs quoting\"]");

        assert_eq!(path.pop(), Some(Segment::Key("needs quoting".to_string())));
        assert_eq!(path.to_string(), "$.items[3]");
    }

    #[test]
    fn test_rebase() {
        let mut base = Path::root();
        base.push_key("doc");
        assert_eq!(base.rebase("$[2].title"), "$.doc[2].title");
        assert_eq!(base.rebase("$"), "$.doc");
    }

    #[test]
    fn test_numeric_keys_are_quoted() {
        let mut path = Path::root();
        path.push_key("0");
        assert_eq!(path.to_string(), "$[\"0\"]");
    }
}
