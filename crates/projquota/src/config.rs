use crate::QuotaSize;
use core::time::Duration;
use std::path::PathBuf;

/// Conventional location of the project registry (`project_id:path`).
pub const DEFAULT_PROJECTS_FILE: &str = "/etc/projects";

/// Conventional location of the id registry (`customer:project_id`).
pub const DEFAULT_PROJID_FILE: &str = "/etc/projid";

/// Name of the quota tool, resolved through `PATH` unless absolute.
pub const DEFAULT_QUOTA_TOOL: &str = "xfs_quota";

/// Upper bound on a single quota tool invocation.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

/// What the registry reader does with a line it cannot parse.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CorruptLinePolicy {
    /// Fail the operation with [`Error::RegistryCorrupt`].
    ///
    /// [`Error::RegistryCorrupt`]: crate::Error::RegistryCorrupt
    #[default]
    Reject,
    /// Log the line at `warn` and continue as if it were absent.
    Skip,
}

/// Locations of the two registries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegistryPaths {
    pub projects: PathBuf,
    pub projid: PathBuf,
}

impl Default for RegistryPaths {
    fn default() -> Self {
        Self {
            projects: PathBuf::from(DEFAULT_PROJECTS_FILE),
            projid: PathBuf::from(DEFAULT_PROJID_FILE),
        }
    }
}

/// Everything the provisioning core needs to know about its environment.
///
/// Built once at startup and passed by value into the constructors; nothing
/// in the core reads configuration from the process environment.
#[derive(Clone, Debug)]
pub struct ProvisionConfig {
    /// Absolute path of the XFS mount holding customer directories.
    pub mount_point: PathBuf,
    /// Limit applied by `onboard` to every new customer.
    pub default_size: QuotaSize,
    pub registry: RegistryPaths,
    pub quota_tool: PathBuf,
    pub command_timeout: Duration,
    pub corrupt_lines: CorruptLinePolicy,
}

impl ProvisionConfig {
    /// Configuration with conventional defaults for everything but the mount.
    pub fn new(mount_point: impl Into<PathBuf>) -> Self {
        Self {
            mount_point: mount_point.into(),
            default_size: QuotaSize::default(),
            registry: RegistryPaths::default(),
            quota_tool: PathBuf::from(DEFAULT_QUOTA_TOOL),
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            corrupt_lines: CorruptLinePolicy::default(),
        }
    }
}
