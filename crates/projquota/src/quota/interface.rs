use super::QuotaToolError;
use crate::{CustomerName, QuotaSize};

/// Capability set of the filesystem quota subsystem.
///
/// The provisioning service only ever talks to quota enforcement through this
/// trait. [`XfsQuota`] is the production implementation; tests substitute a
/// recording double.
///
/// Implementations must resolve the customer to its project themselves (as
/// `xfs_quota` does through `/etc/projid`); callers pass the name only.
///
/// [`XfsQuota`]: crate::XfsQuota
pub trait QuotaTool: Send + Sync {
    /// Initializes the project tree for `customer`.
    fn create_project(
        &self,
        customer: &CustomerName,
    ) -> impl Future<Output = Result<(), QuotaToolError>> + Send;

    /// Sets the block hard limit for `customer`.
    fn set_limit(
        &self,
        customer: &CustomerName,
        size: &QuotaSize,
    ) -> impl Future<Output = Result<(), QuotaToolError>> + Send;

    /// Returns the subsystem's usage report as raw bytes, unmodified.
    fn report(&self) -> impl Future<Output = Result<Vec<u8>, QuotaToolError>> + Send;
}
