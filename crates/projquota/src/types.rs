//! # Domain types for project-quota provisioning
//!
//! Every value that crosses a trust boundary (HTTP input, registry file,
//! command line of the quota tool) is parsed into one of these types first.
//! Construction is the only validation point: a [`CustomerName`] or
//! [`QuotaSize`] that exists is always safe to interpolate into a registry line
//! or an `xfs_quota` command string.
//!
//! ## Types
//!
//! - [`ProjectId`] - numeric project identifier understood by the filesystem
//! - [`CustomerName`] - validated customer handle, also the directory name
//! - [`QuotaSize`] - validated block limit such as `50M` or `100G`
//! - [`ProjectEntry`] / [`ProjectIdEntry`] - one line of each registry
//! - [`Customer`] - the joined `(customer, project id, path)` relation

use crate::{Error, Result};
use core::{fmt, num::NonZeroU32, str::FromStr};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Longest accepted customer name, in bytes.
pub const MAX_CUSTOMER_NAME_LEN: usize = 64;

/// Numeric project identifier used by the filesystem to group a directory
/// tree under one quota.
///
/// XFS stores project ids as 32-bit values and reserves `0` for "no project",
/// so the id is always positive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ProjectId(NonZeroU32);

impl ProjectId {
    /// The first id handed out on an empty registry.
    pub const FIRST: Self = Self(NonZeroU32::MIN);

    /// Returns `None` for `0`.
    pub const fn new(raw: u32) -> Option<Self> {
        match NonZeroU32::new(raw) {
            Some(id) => Some(Self(id)),
            None => None,
        }
    }

    pub const fn get(self) -> u32 {
        self.0.get()
    }

    /// The id immediately after this one, or `None` once the 32-bit space is
    /// exhausted.
    pub fn next(self) -> Option<Self> {
        self.0.checked_add(1).map(Self)
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ProjectId {
    type Err = core::num::ParseIntError;

    fn from_str(s: &str) -> core::result::Result<Self, Self::Err> {
        s.parse::<NonZeroU32>().map(Self)
    }
}

/// A validated customer name.
///
/// Accepted names are non-empty, at most [`MAX_CUSTOMER_NAME_LEN`] bytes, and
/// consist only of ASCII letters, digits, `.`, `_` and `-`. A leading `-` or
/// `.` is rejected so that a name can never be read as an option by the quota
/// tool or resolve to `.`/`..` when joined onto the mount point.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct CustomerName(String);

impl CustomerName {
    /// Validates `raw` and wraps it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] describing the first rule violated.
    pub fn parse(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(Error::invalid_input("Missing customer name"));
        }
        if raw.len() > MAX_CUSTOMER_NAME_LEN {
            return Err(Error::invalid_input(format!(
                "Customer name exceeds {MAX_CUSTOMER_NAME_LEN} bytes"
            )));
        }
        if raw.starts_with(['-', '.']) {
            return Err(Error::invalid_input(format!(
                "Customer name {raw:?} must not start with '-' or '.'"
            )));
        }
        if let Some(bad) = raw
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
        {
            return Err(Error::invalid_input(format!(
                "Customer name {raw:?} contains forbidden character {bad:?}"
            )));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CustomerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CustomerName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// A block hard limit accepted by `xfs_quota limit -p bhard=<size>`.
///
/// Matches `^\d+[KMGT]?$`. The original string is preserved byte-for-byte and
/// handed to the quota tool unmodified.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct QuotaSize(String);

impl QuotaSize {
    /// Validates `raw` and wraps it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if `raw` is not a run of digits with an
    /// optional `K`, `M`, `G` or `T` suffix.
    pub fn parse(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        let digits = raw.strip_suffix(['K', 'M', 'G', 'T']).unwrap_or(&raw);
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::invalid_input(format!(
                "Invalid size {raw:?} (expected e.g. \"50M\" or \"100G\")"
            )));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for QuotaSize {
    /// The limit applied to every freshly onboarded customer.
    fn default() -> Self {
        Self(String::from("50M"))
    }
}

impl fmt::Display for QuotaSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for QuotaSize {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// One line of the project registry: `"<project_id>:<path>\n"`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProjectEntry {
    pub project_id: ProjectId,
    pub path: PathBuf,
}

/// One line of the id registry: `"<customer>:<project_id>\n"`.
///
/// The customer half is kept as a raw string: lines written by operators are
/// read back as-is and only names created through [`CustomerName`] are ever
/// appended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProjectIdEntry {
    pub customer: String,
    pub project_id: ProjectId,
}

/// A fully registered customer, joined across both registries.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub customer_name: CustomerName,
    pub project_id: ProjectId,
    pub path: PathBuf,
}

impl Customer {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn accepts_plain_customer_names() {
        for name in ["acme", "acme-corp", "acme_corp.eu", "A1", "x"] {
            assert_eq!(CustomerName::parse(name).unwrap().as_str(), name);
        }
    }

    #[test]
    fn rejects_unsafe_customer_names() {
        let too_long = "a".repeat(MAX_CUSTOMER_NAME_LEN + 1);
        for name in [
            "",
            "a/b",
            "..",
            ".hidden",
            "-rf",
            "acme:1",
            "acme\n",
            "acme corp",
            "acme;rm",
            "acme$HOME",
            "\"quoted\"",
            too_long.as_str(),
        ] {
            let err = CustomerName::parse(name).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidInput, "{name:?}");
        }
    }

    #[test]
    fn accepts_sizes_with_optional_unit() {
        for size in ["0", "50", "50M", "100G", "1T", "512K"] {
            assert_eq!(QuotaSize::parse(size).unwrap().as_str(), size);
        }
    }

    #[test]
    fn rejects_malformed_sizes() {
        for size in ["", "abc", "M", "50m", "50MB", "-5M", "5.5G", " 50M", "50 M", "50P"] {
            let err = QuotaSize::parse(size).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidInput, "{size:?}");
        }
    }

    #[test]
    fn default_quota_is_fifty_megabytes() {
        assert_eq!(QuotaSize::default().as_str(), "50M");
    }

    #[test]
    fn project_id_is_positive() {
        assert_eq!(ProjectId::new(0), None);
        assert_eq!("0".parse::<ProjectId>().ok(), None);
        assert_eq!("17".parse::<ProjectId>().unwrap().get(), 17);
        assert_eq!(ProjectId::FIRST.get(), 1);
        assert_eq!(ProjectId::new(u32::MAX).unwrap().next(), None);
    }

    #[test]
    fn customer_serializes_with_camel_case_keys() {
        let customer = Customer {
            customer_name: CustomerName::parse("acme").unwrap(),
            project_id: ProjectId::new(7).unwrap(),
            path: PathBuf::from("/mnt/xfs/acme"),
        };
        let value = serde_json::to_value(&customer).unwrap();
        assert_eq!(value["customerName"], "acme");
        assert_eq!(value["projectId"], 7);
        assert_eq!(value["path"], "/mnt/xfs/acme");
    }
}
