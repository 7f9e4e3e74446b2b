//! Address pattern compilation and matching
//!
//! OSC address patterns are globs applied per `/` separated segment:
//!
//! - `?` matches any single character
//! - `*` matches any run of characters, including none
//! - `[abc]`, `[a-z]` match one character of a set; `[!abc]` negates it
//! - `{foo,bar}` matches any of the listed alternatives
//!
//! A pattern matches an address when both have the same number of segments and
//! every segment matches.

use dashmap::DashMap;
use regex::bytes::{Regex, RegexBuilder};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::Result;

/// A compiled address pattern
#[derive(Clone)]
pub struct SmartAddress {
    source: Vec<u8>,
    segments: Vec<Regex>,
}

impl SmartAddress {
    /// Compile a pattern without caching
    pub fn compile(pattern: &[u8]) -> Result<Self> {
        let segments = pattern
            .split(|&b| b == b'/')
            .map(compile_segment)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            source: pattern.to_vec(),
            segments,
        })
    }

    /// The pattern this was compiled from
    pub fn source(&self) -> &[u8] {
        &self.source
    }

    /// Check a concrete address against this pattern
    pub fn matches(&self, address: &[u8]) -> bool {
        let mut parts = address.split(|&b| b == b'/');
        for segment in &self.segments {
            match parts.next() {
                Some(part) if segment.is_match(part) => {}
                _ => return false,
            }
        }
        parts.next().is_none()
    }
}

impl PartialEq for SmartAddress {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for SmartAddress {}

impl Hash for SmartAddress {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.source.hash(state);
    }
}

impl fmt::Debug for SmartAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmartAddress")
            .field("source", &String::from_utf8_lossy(&self.source))
            .field("segments", &self.segments.len())
            .finish()
    }
}

/// Translate one glob segment to an anchored regex source
pub fn segment_to_regex(segment: &[u8]) -> String {
    let mut out = String::with_capacity(segment.len() * 2 + 2);
    out.push('^');

    let mut in_class = false;
    let mut class_start = false;
    let mut group_depth = 0usize;

    for &b in segment {
        if in_class {
            match b {
                b'!' | b'^' if class_start => out.push('^'),
                b']' => {
                    out.push(']');
                    in_class = false;
                }
                b'-' => out.push('-'),
                _ => push_literal(&mut out, b),
            }
            class_start = false;
            continue;
        }

        match b {
            b'?' => out.push('.'),
            b'*' => out.push_str(".*"),
            b'[' => {
                out.push('[');
                in_class = true;
                class_start = true;
            }
            b'{' => {
                out.push_str("(?:");
                group_depth += 1;
            }
            b',' if group_depth > 0 => out.push('|'),
            b'}' if group_depth > 0 => {
                out.push(')');
                group_depth -= 1;
            }
            _ => push_literal(&mut out, b),
        }
    }

    out.push('$');
    out
}

fn push_literal(out: &mut String, b: u8) {
    if b.is_ascii_alphanumeric() || b == b'_' {
        out.push(char::from(b));
    } else {
        out.push_str(&format!("\\x{:02x}", b));
    }
}

fn compile_segment(segment: &[u8]) -> Result<Regex> {
    let source = segment_to_regex(segment);
    let regex = RegexBuilder::new(&source)
        .unicode(false)
        .dot_matches_new_line(true)
        .build()?;
    Ok(regex)
}

/// Shared two-level cache of compiled patterns
///
/// Whole patterns and individual segments are cached separately so patterns
/// sharing segments compile each segment once. Entries are never evicted.
#[derive(Default)]
pub struct PatternCache {
    addresses: DashMap<Vec<u8>, Arc<SmartAddress>>,
    segments: DashMap<Vec<u8>, Regex>,
}

impl PatternCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile `pattern`, reusing cached work
    pub fn compile(&self, pattern: &[u8]) -> Result<Arc<SmartAddress>> {
        if let Some(hit) = self.addresses.get(pattern) {
            return Ok(Arc::clone(hit.value()));
        }

        let segments = pattern
            .split(|&b| b == b'/')
            .map(|part| self.segment(part))
            .collect::<Result<Vec<_>>>()?;
        let compiled = Arc::new(SmartAddress {
            source: pattern.to_vec(),
            segments,
        });

        let entry = self
            .addresses
            .entry(pattern.to_vec())
            .or_insert(compiled);
        Ok(Arc::clone(entry.value()))
    }

    fn segment(&self, part: &[u8]) -> Result<Regex> {
        if let Some(hit) = self.segments.get(part) {
            return Ok(hit.value().clone());
        }
        let regex = compile_segment(part)?;
        self.segments.insert(part.to_vec(), regex.clone());
        Ok(regex)
    }

    /// Number of cached whole patterns
    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    /// Number of cached segments
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }
}
