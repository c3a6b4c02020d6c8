//! Deep merge of configuration values
//!
//! This module holds the Deep-Merge Utility used for every layering step in
//! the provider: overlay documents onto a base document, and each class in an
//! inheritance chain onto its resolved ancestors.
//!
//! ## Submodules
//!
//! - `yaml` - the merge itself, over `serde_yaml::Value`, with the deletion
//!   sentinel handled as an explicit [`yaml::Merged::Omit`] outcome
//! - `keyed` - re-keying of sequences-of-maps into mappings so list entries
//!   can be overridden or deleted individually
//!
//! ## Paths
//!
//! Field paths such as `blade_interconnect.subnetwork` or `ip_addrs[2]` are
//! parsed into [`PathSegment`]s for lookups into resolved values.

pub mod keyed;
pub mod yaml;

pub use yaml::{lookup, lookup_in, merge, merge_mappings, merge_values, Merged};

/// Represents a segment in a path expression for navigating nested values
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PathSegment {
    /// A named key for accessing mapping members
    Key(String),
    /// A numeric index for accessing sequence elements
    Index(usize),
}

/// Parse a dotted path into segments
///
/// Supports dot notation (`project.zone`) and bracketed indices
/// (`ip_addrs[0]`). A backslash escapes the next character so keys that
/// contain dots can still be addressed (`labels.app\.kubernetes\.io`).
///
/// # Examples
///
/// ```
/// use blade_provider::merge::{parse_path, PathSegment};
///
/// let segments = parse_path("blade_interconnect.ip_addrs[1]");
/// assert_eq!(segments.len(), 3);
/// assert_eq!(segments[2], PathSegment::Index(1));
/// ```
pub fn parse_path(path: &str) -> Vec<PathSegment> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = path.trim().chars();

    let flush = |current: &mut String, segments: &mut Vec<PathSegment>| {
        if !current.is_empty() {
            segments.push(PathSegment::Key(std::mem::take(current)));
        }
    };

    while let Some(ch) = chars.next() {
        match ch {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            }
            '.' => flush(&mut current, &mut segments),
            '[' => {
                flush(&mut current, &mut segments);
                let inner: String = chars.by_ref().take_while(|c| *c != ']').collect();
                let inner = inner.trim();
                match inner.parse::<usize>() {
                    Ok(index) => segments.push(PathSegment::Index(index)),
                    Err(_) if !inner.is_empty() => {
                        segments.push(PathSegment::Key(
                            inner.trim_matches(|c| c == '"' || c == '\'').to_string(),
                        ));
                    }
                    Err(_) => {}
                }
            }
            _ => current.push(ch),
        }
    }
    flush(&mut current, &mut segments);

    segments
}
