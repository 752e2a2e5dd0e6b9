use super::{QuotaTool, QuotaToolError};
use crate::{CustomerName, ProvisionConfig, QuotaSize};
use core::time::Duration;
use std::{
    path::{Path, PathBuf},
    process::Stdio,
};
use tokio::{process::Command, time::timeout};

/// [`QuotaTool`] backed by the `xfs_quota` command-line tool in expert mode.
///
/// Every operation is one invocation of
/// `xfs_quota -x -c "<expert command>" <mount point>`. Arguments are passed as
/// separate argv entries, never through a shell, and customer names and sizes
/// arrive pre-validated, so nothing needs escaping.
///
/// Each invocation is bounded by a timeout. A timed-out child is killed.
#[derive(Clone, Debug)]
pub struct XfsQuota {
    program: PathBuf,
    mount_point: PathBuf,
    timeout: Duration,
}

impl XfsQuota {
    pub fn new(
        program: impl Into<PathBuf>,
        mount_point: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Self {
        Self {
            program: program.into(),
            mount_point: mount_point.into(),
            timeout,
        }
    }

    pub fn from_config(config: &ProvisionConfig) -> Self {
        Self::new(
            config.quota_tool.clone(),
            config.mount_point.clone(),
            config.command_timeout,
        )
    }

    pub fn mount_point(&self) -> &Path {
        &self.mount_point
    }

    fn render(&self, expert: &str) -> String {
        format!(
            "{} -x -c \"{}\" {}",
            self.program.display(),
            expert,
            self.mount_point.display()
        )
    }

    /// Runs one expert command and returns its stdout untouched.
    async fn run(&self, expert: &str) -> Result<Vec<u8>, QuotaToolError> {
        let command = self.render(expert);
        tracing::debug!(%command, "running quota tool");

        let mut child = Command::new(&self.program);
        child
            .arg("-x")
            .arg("-c")
            .arg(expert)
            .arg(&self.mount_point)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = match timeout(self.timeout, child.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(source)) => {
                tracing::warn!(%command, error = %source, "quota tool could not be run");
                return Err(QuotaToolError::Spawn { command, source });
            }
            Err(_) => {
                tracing::warn!(%command, timeout = ?self.timeout, "quota tool timed out");
                return Err(QuotaToolError::Timeout {
                    command,
                    after: self.timeout,
                });
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            tracing::warn!(%command, status = %output.status, %stderr, "quota tool failed");
            return Err(QuotaToolError::Failed {
                command,
                status: output.status,
                stderr,
            });
        }

        Ok(output.stdout)
    }
}

fn project_command(customer: &CustomerName) -> String {
    format!("project -s {customer}")
}

fn limit_command(customer: &CustomerName, size: &QuotaSize) -> String {
    format!("limit -p bhard={size} {customer}")
}

const REPORT_COMMAND: &str = "report -p";

impl QuotaTool for XfsQuota {
    async fn create_project(&self, customer: &CustomerName) -> Result<(), QuotaToolError> {
        self.run(&project_command(customer)).await.map(drop)
    }

    async fn set_limit(
        &self,
        customer: &CustomerName,
        size: &QuotaSize,
    ) -> Result<(), QuotaToolError> {
        self.run(&limit_command(customer, size)).await.map(drop)
    }

    async fn report(&self) -> Result<Vec<u8>, QuotaToolError> {
        self.run(REPORT_COMMAND).await
    }
}
