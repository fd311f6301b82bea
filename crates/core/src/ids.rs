//! Identifier validation
//!
//! Filenames, checksums and replica ids are written verbatim into the admin
//! snapshot, where a single space separates fields and a comma separates
//! segments. Any identifier containing either would corrupt its line, so
//! they are rejected at the boundary.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Reject empty tokens and tokens containing whitespace or `,`.
pub fn check_token(what: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::invalid_argument(format!("{} must not be empty", what)));
    }
    if value.chars().any(|c| c.is_whitespace() || c == ',') {
        return Err(Error::invalid_argument(format!(
            "{} '{}' must not contain whitespace or ','",
            what, value
        )));
    }
    Ok(())
}

/// Identifier of one bit-archive replica.
///
/// Supplied by the replica registry; this crate only requires it to be a
/// valid token.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ReplicaId(String);

impl ReplicaId {
    /// Create a replica id, validating it as a token
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        check_token("replica id", &id)?;
        Ok(ReplicaId(id))
    }

    /// Borrow the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReplicaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for ReplicaId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ReplicaId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        ReplicaId::new(value)
    }
}

impl TryFrom<&str> for ReplicaId {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        ReplicaId::new(value)
    }
}

impl From<ReplicaId> for String {
    fn from(id: ReplicaId) -> Self {
        id.0
    }
}
