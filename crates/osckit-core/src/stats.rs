//! Traffic accounting
//!
//! A [`Stats`] record describes a volume of OSC traffic: how many messages,
//! how many bytes, how many arguments and how many of each type tag. Encoders
//! return one per call so callers can aggregate without re-parsing.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Add, AddAssign};

use crate::OscValue;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub calls: u64,
    pub bytes: u64,
    pub params: u64,
    /// Count per type tag character
    pub types: BTreeMap<char, u64>,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stats for a single message of `bytes` length carrying `tags`
    pub fn for_message(bytes: usize, tags: &[u8]) -> Self {
        let mut stats = Self {
            calls: 1,
            bytes: bytes as u64,
            params: tags.len() as u64,
            types: BTreeMap::new(),
        };
        stats.count_tags(tags);
        stats
    }

    pub fn count_tags(&mut self, tags: &[u8]) {
        for &t in tags {
            *self.types.entry(char::from(t)).or_insert(0) += 1;
        }
    }

    /// Flatten to OSC arguments: calls, bytes, params, the tag characters as a
    /// string, then one count per tag in the same order
    pub fn to_values(&self) -> Vec<OscValue> {
        let clamp = |v: u64| OscValue::Int(i32::try_from(v).unwrap_or(i32::MAX));
        let tags: String = self.types.keys().collect();

        let mut values = vec![
            clamp(self.calls),
            clamp(self.bytes),
            clamp(self.params),
            OscValue::String(tags.into_bytes()),
        ];
        values.extend(self.types.values().map(|&n| clamp(n)));
        values
    }
}

impl AddAssign<&Stats> for Stats {
    fn add_assign(&mut self, other: &Stats) {
        self.calls += other.calls;
        self.bytes += other.bytes;
        self.params += other.params;
        for (&t, &n) in &other.types {
            *self.types.entry(t).or_insert(0) += n;
        }
    }
}

impl AddAssign for Stats {
    fn add_assign(&mut self, other: Stats) {
        *self += &other;
    }
}

impl Add for Stats {
    type Output = Stats;

    fn add(mut self, other: Stats) -> Stats {
        self += &other;
        self
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Stats:")?;
        writeln!(f, "    calls: {}", self.calls)?;
        writeln!(f, "    bytes: {}", self.bytes)?;
        writeln!(f, "    params: {}", self.params)?;
        write!(f, "    types:")?;
        for (t, n) in &self.types {
            write!(f, "\n        {}: {}", t, n)?;
        }
        Ok(())
    }
}
