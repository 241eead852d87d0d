//! Table names
//!
//! Sites store each doctype in a physical table named `tab<Doctype>`.
//! Filters, dumps and restores all speak in physical table names, compared
//! case-insensitively.

use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Prefix of every doctype table.
pub const TABLE_PREFIX: &str = "tab";

/// A physical table name with case-insensitive identity.
#[derive(Debug, Clone)]
pub struct TableName {
    name: String,
    key: String,
}

impl TableName {
    /// Wraps a physical table name as-is.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let trimmed = name.trim();
        if trimmed.is_empty() || trimmed.contains('\0') {
            return Err(Error::invalid_table_name(name));
        }
        Ok(Self {
            key: trimmed.to_lowercase(),
            name: trimmed.to_string(),
        })
    }

    /// Maps a doctype name (`ToDo`) to its table (`tabToDo`).
    ///
    /// Names already carrying the `tab` prefix are kept unchanged.
    pub fn from_doctype(doctype: &str) -> Result<Self> {
        let doctype = doctype.trim();
        if doctype.starts_with(TABLE_PREFIX) {
            Self::new(doctype)
        } else if doctype.is_empty() {
            Err(Error::invalid_table_name(doctype))
        } else {
            Self::new(format!("{}{}", TABLE_PREFIX, doctype))
        }
    }

    /// Parses a comma separated doctype list, skipping blank entries.
    pub fn parse_list(csv: &str) -> Result<Vec<Self>> {
        csv.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(Self::from_doctype)
            .collect()
    }

    /// Physical table name with its original spelling.
    pub fn as_str(&self) -> &str {
        &self.name
    }
}

impl PartialEq for TableName {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for TableName {}

impl Hash for TableName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl PartialOrd for TableName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TableName {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl Serialize for TableName {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.name)
    }
}

impl<'de> Deserialize<'de> for TableName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        TableName::new(raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_from_doctype_adds_prefix() {
        let table = TableName::from_doctype("ToDo").unwrap();
        assert_eq!(table.as_str(), "tabToDo");

        let spaced = TableName::from_doctype("Activity Log").unwrap();
        assert_eq!(spaced.as_str(), "tabActivity Log");
    }

    #[test]
    fn test_from_doctype_keeps_existing_prefix() {
        let table = TableName::from_doctype("tabNote").unwrap();
        assert_eq!(table.as_str(), "tabNote");
    }

    #[test]
    fn test_case_insensitive_identity() {
        let a = TableName::new("tabToDo").unwrap();
        let b = TableName::new("TABTODO").unwrap();
        assert_eq!(a, b);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
        assert_eq!(b.to_string(), "TABTODO");
    }

    #[test]
    fn test_parse_list() {
        let tables = TableName::parse_list(" ToDo, Note ,, ").unwrap();
        let names: Vec<&str> = tables.iter().map(|t| t.as_str()).collect();
        assert_eq!(names, vec!["tabToDo", "tabNote"]);

        assert!(TableName::parse_list("").unwrap().is_empty());
    }

    #[test]
    fn test_rejects_empty_names() {
        assert!(TableName::new("   ").is_err());
        assert!(TableName::from_doctype("").is_err());
    }

    #[test]
    fn test_serde_uses_plain_string() {
        let table = TableName::new("__Auth").unwrap();
        let json = serde_json::to_string(&table).unwrap();
        assert_eq!(json, "\"__Auth\"");
        let back: TableName = serde_json::from_str(&json).unwrap();
        assert_eq!(back, table);
    }
}
