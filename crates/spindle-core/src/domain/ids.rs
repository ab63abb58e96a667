//! Job identifiers.
//!
//! A `JobId` is an opaque string. New ids are ULIDs (sortable by creation
//! time, generated without coordination), but records written by older
//! versions carry ids in other shapes and must keep loading unchanged.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Identifier of a queued job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The ULID behind ids generated by this crate; `None` for legacy ids.
    pub fn as_ulid(&self) -> Option<Ulid> {
        Ulid::from_string(&self.0).ok()
    }
}

impl From<Ulid> for JobId {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for JobId {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ulid_ids_round_trip() {
        let ulid = Ulid::new();
        let id = JobId::from(ulid);
        assert_eq!(id.to_string(), ulid.to_string());
        assert_eq!(id.as_ulid(), Some(ulid));
        assert_eq!(id.to_string().parse::<JobId>().unwrap(), id);
    }

    #[test]
    fn serializes_as_bare_string() {
        let id = JobId::from_ulid(Ulid::new());
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
        let back: JobId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn legacy_ids_are_kept_verbatim() {
        let id: JobId = serde_json::from_str("\"job_1700000000000_ab12cd\"").unwrap();
        assert_eq!(id.as_str(), "job_1700000000000_ab12cd");
        assert_eq!(id.as_ulid(), None);
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"job_1700000000000_ab12cd\"");
    }

    #[test]
    fn ulid_ids_sort_by_creation_time() {
        let a = JobId::from_ulid(Ulid::new());
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = JobId::from_ulid(Ulid::new());
        assert!(a < b);
    }
}
