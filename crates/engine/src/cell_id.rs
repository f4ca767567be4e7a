//! Cell identity.
//!
//! A `CellUid` names one *version* of a cell. Editing a cell never changes
//! the cell in place: it mints a successor with a new uid, and the grid slot
//! is repointed at it. The `coord_uid` shared by every version ties them
//! back together.

use serde::{Deserialize, Serialize};

/// Unique identifier for one cell version.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CellUid(String);

impl CellUid {
    #[inline]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CellUid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CellUid {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

impl From<String> for CellUid {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

/// Source of fresh unique strings.
///
/// The host application normally supplies this; sheets only require that
/// two calls never return the same string.
pub trait UidSource: std::fmt::Debug {
    fn next_uid(&mut self) -> String;
}

/// Random v4 UUIDs in simple (dash-less) form.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomUids;

impl UidSource for RandomUids {
    fn next_uid(&mut self) -> String {
        uuid::Uuid::new_v4().simple().to_string()
    }
}

/// Deterministic counter: `"{prefix}1"`, `"{prefix}2"`, ...
#[derive(Debug, Clone)]
pub struct SequentialUids {
    prefix: String,
    next: u64,
}

impl SequentialUids {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into(), next: 1 }
    }
}

impl Default for SequentialUids {
    fn default() -> Self {
        Self::new("")
    }
}

impl UidSource for SequentialUids {
    fn next_uid(&mut self) -> String {
        let uid = format!("{}{}", self.prefix, self.next);
        self.next += 1;
        uid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_uid_equality() {
        let a = CellUid::new("cell_1");
        let b = CellUid::from("cell_1");
        let c = CellUid::from(String::from("cell_2"));

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_cell_uid_hash() {
        use std::collections::HashSet;

        let mut set = HashSet::new();
        set.insert(CellUid::new("a"));
        set.insert(CellUid::new("a")); // duplicate
        set.insert(CellUid::new("b"));

        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_cell_uid_serializes_as_plain_string() {
        let json = serde_json::to_string(&CellUid::new("cell_7")).unwrap();
        assert_eq!(json, "\"cell_7\"");
    }

    #[test]
    fn test_sequential_uids() {
        let mut uids = SequentialUids::new("t");
        assert_eq!(uids.next_uid(), "t1");
        assert_eq!(uids.next_uid(), "t2");
    }

    #[test]
    fn test_random_uids_are_distinct() {
        let mut uids = RandomUids;
        let a = uids.next_uid();
        let b = uids.next_uid();
        assert_ne!(a, b);
        assert_eq!(a.len(), 32);
    }
}
