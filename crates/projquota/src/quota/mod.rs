//! Quota Controller: the boundary to the filesystem quota subsystem.
//!
//! [`QuotaTool`] is the capability set the provisioning service depends on.
//! [`XfsQuota`] implements it by shelling out to `xfs_quota`. Every failure,
//! whether a nonzero exit, a spawn error or a timeout, surfaces as a
//! [`QuotaToolError`] with the captured diagnostics. Nothing is retried.

mod error;
mod interface;
mod xfs;

pub use error::*;
pub use interface::*;
pub use xfs::*;
