//! Region and table types
//!
//! A region is a contiguous key range of one table and the unit of
//! assignment. The printable name carries table, start key and region id;
//! the encoded name is a fixed-length digest of all four identity fields.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of a table
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableName(String);

impl TableName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TableName({})", self.0)
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TableName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Identity of a region
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegionInfo {
    /// Table this region belongs to
    pub table: TableName,
    /// Inclusive start key (empty = start of table)
    pub start_key: Bytes,
    /// Exclusive end key (empty = end of table)
    pub end_key: Bytes,
    /// Creation id, disambiguates regions re-created over the same range
    pub region_id: u64,
}

impl RegionInfo {
    /// Create a new region
    pub fn new(
        table: impl Into<TableName>,
        start_key: impl Into<Bytes>,
        end_key: impl Into<Bytes>,
        region_id: u64,
    ) -> Self {
        Self {
            table: table.into(),
            start_key: start_key.into(),
            end_key: end_key.into(),
            region_id,
        }
    }

    /// Printable region name: `table,start_key,region_id`
    pub fn region_name(&self) -> String {
        format!(
            "{},{},{}",
            self.table,
            String::from_utf8_lossy(&self.start_key),
            self.region_id
        )
    }

    /// Stable fixed-length digest of every identity field
    ///
    /// Covers the raw keys, including the end key the printable name omits,
    /// so two regions that compare unequal never share an encoded name.
    pub fn encoded_name(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for field in [
            self.table.as_str().as_bytes(),
            self.start_key.as_ref(),
            self.end_key.as_ref(),
        ] {
            hasher.update(&(field.len() as u64).to_be_bytes());
            hasher.update(field);
        }
        hasher.update(&self.region_id.to_be_bytes());
        hex::encode(&hasher.finalize().as_bytes()[..crate::ENCODED_NAME_LEN / 2])
    }
}

impl fmt::Debug for RegionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RegionInfo({})", self.region_name())
    }
}

impl fmt::Display for RegionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.", self.region_name(), self.encoded_name())
    }
}

/// Load reported for a region
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionLoad {
    /// Total size of the region's store files in MB
    pub store_file_size_mb: u64,
    pub read_requests: u64,
    pub write_requests: u64,
}

impl RegionLoad {
    pub fn with_store_file_size(store_file_size_mb: u64) -> Self {
        Self {
            store_file_size_mb,
            ..Default::default()
        }
    }
}
