use anyhow::{Context, bail};
use clap::Parser;
use core::time::Duration;
use projquota::{
    CorruptLinePolicy, DEFAULT_PROJECTS_FILE, DEFAULT_PROJID_FILE, DEFAULT_QUOTA_TOOL,
    ProvisionConfig, QuotaSize, RegistryPaths,
};
use std::{
    net::{IpAddr, SocketAddr},
    path::PathBuf,
};

/// Runtime configuration for the `projquota-server` binary.
///
/// All values are parsed from CLI arguments or environment variables (a
/// `.env` file in the working directory is loaded first).
#[derive(Parser, Debug, Clone)]
#[command(
    name = "projquota-server",
    version,
    about = "An HTTP service that onboards customers onto XFS project quotas"
)]
pub struct CliArgs {
    /// Address to bind the HTTP listener to.
    ///
    /// Environment variable: `LISTEN_IP`
    #[arg(long, env = "LISTEN_IP", default_value = "0.0.0.0")]
    pub listen_ip: IpAddr,

    /// Port to bind the HTTP listener to.
    ///
    /// Environment variable: `PORT`
    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// XFS mount point under which customer directories are created.
    ///
    /// Must be absolute and mounted with project quotas enabled
    /// (`prjquota`).
    ///
    /// Environment variable: `MOUNT_POINT`
    #[arg(long, env = "MOUNT_POINT")]
    pub mount_point: PathBuf,

    /// Shared secret every request must carry as `?secret=<key>`.
    ///
    /// Environment variable: `SECRET_KEY`
    #[arg(long, env = "SECRET_KEY", hide_env_values = true)]
    pub secret_key: String,

    /// Hard block limit applied to newly onboarded customers.
    ///
    /// Environment variable: `DEFAULT_QUOTA`
    #[arg(long, env = "DEFAULT_QUOTA", default_value = "50M")]
    pub default_quota: String,

    /// Project registry (`project_id:path`).
    ///
    /// Environment variable: `PROJECTS_FILE`
    #[arg(long, env = "PROJECTS_FILE", default_value = DEFAULT_PROJECTS_FILE)]
    pub projects_file: PathBuf,

    /// Id registry (`customer:project_id`).
    ///
    /// Environment variable: `PROJID_FILE`
    #[arg(long, env = "PROJID_FILE", default_value = DEFAULT_PROJID_FILE)]
    pub projid_file: PathBuf,

    /// The `xfs_quota` executable, resolved through `PATH` unless absolute.
    ///
    /// Environment variable: `XFS_QUOTA_BIN`
    #[arg(long, env = "XFS_QUOTA_BIN", default_value = DEFAULT_QUOTA_TOOL)]
    pub xfs_quota_bin: PathBuf,

    /// Seconds a single `xfs_quota` invocation may run before it is killed.
    ///
    /// Environment variable: `QUOTA_TIMEOUT_SECS`
    #[arg(long, env = "QUOTA_TIMEOUT_SECS", default_value_t = 10)]
    pub quota_timeout_secs: u64,

    /// Ignore unparseable registry lines at runtime instead of failing.
    ///
    /// Startup verification always rejects them.
    ///
    /// Environment variable: `SKIP_CORRUPT_LINES`
    #[arg(long, env = "SKIP_CORRUPT_LINES", default_value_t = false)]
    pub skip_corrupt_lines: bool,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    pub secret_key: String,
    pub provision: ProvisionConfig,
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if !args.mount_point.is_absolute() {
            bail!(
                "MOUNT_POINT must be an absolute path (got {})",
                args.mount_point.display()
            );
        }

        if args.secret_key.is_empty() {
            bail!("SECRET_KEY must not be empty");
        }

        if args.quota_timeout_secs == 0 {
            bail!("QUOTA_TIMEOUT_SECS must be greater than 0");
        }

        let default_size = QuotaSize::parse(args.default_quota).context("invalid DEFAULT_QUOTA")?;

        let corrupt_lines = if args.skip_corrupt_lines {
            CorruptLinePolicy::Skip
        } else {
            CorruptLinePolicy::Reject
        };

        Ok(Self {
            listen_addr: SocketAddr::new(args.listen_ip, args.port),
            secret_key: args.secret_key,
            provision: ProvisionConfig {
                mount_point: args.mount_point,
                default_size,
                registry: RegistryPaths {
                    projects: args.projects_file,
                    projid: args.projid_file,
                },
                quota_tool: args.xfs_quota_bin,
                command_timeout: Duration::from_secs(args.quota_timeout_secs),
                corrupt_lines,
            },
        })
    }
}
