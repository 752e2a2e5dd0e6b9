use super::{
    ConsistencyReport,
    ledger::{format_id_line, format_project_line, parse_ids, parse_projects},
};
use crate::{
    CorruptLinePolicy, Customer, CustomerName, Error, ProjectEntry, ProjectId, ProjectIdEntry,
    RegistryPaths, Result,
};
use std::{io, path::Path};
use tokio::{
    fs::{self, OpenOptions},
    io::AsyncWriteExt,
    sync::{Mutex, MutexGuard},
};

/// State that lives only as long as the process and is guarded by the same
/// lock as the registry files.
#[derive(Debug, Default)]
struct LedgerState {
    /// Highest id committed by this process.
    high_water: Option<ProjectId>,
}

/// Sole owner of the project registry and the id registry.
///
/// All reads that must observe both files together, and every append, run
/// under a single process-wide async mutex. Appends are only reachable
/// through a [`RegistryTxn`], so holding the lock is enforced by the type
/// system rather than by convention.
///
/// The lock is a [`tokio::sync::Mutex`]: the critical section spans awaited
/// file I/O and directory creation, and must stay exclusive across those
/// suspension points on any scheduler.
#[derive(Debug)]
pub struct RegistryStore {
    paths: RegistryPaths,
    policy: CorruptLinePolicy,
    state: Mutex<LedgerState>,
}

impl RegistryStore {
    pub fn new(paths: RegistryPaths, policy: CorruptLinePolicy) -> Self {
        Self {
            paths,
            policy,
            state: Mutex::new(LedgerState::default()),
        }
    }

    pub fn paths(&self) -> &RegistryPaths {
        &self.paths
    }

    /// Creates each registry file if it does not exist yet.
    ///
    /// Existing files are opened in append mode and left untouched, so
    /// calling this against populated registries is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InitializationFailed`] if either file cannot be
    /// created or opened. Callers must treat this as fatal.
    pub async fn ensure_initialized(&self) -> Result<()> {
        let _guard = self.state.lock().await;
        for path in [&self.paths.projects, &self.paths.projid] {
            OpenOptions::new()
                .append(true)
                .create(true)
                .open(path)
                .await
                .map_err(|source| Error::InitializationFailed {
                    path: path.clone(),
                    source,
                })?;
        }
        tracing::info!(
            projects = %self.paths.projects.display(),
            projid = %self.paths.projid.display(),
            "Quota registry files verified/initialized"
        );
        Ok(())
    }

    /// Acquires the registry lock.
    ///
    /// The returned transaction is the only way to append to either registry.
    /// The lock is released when it is dropped.
    pub async fn lock(&self) -> RegistryTxn<'_> {
        RegistryTxn {
            store: self,
            state: self.state.lock().await,
        }
    }

    /// Reads and parses the project registry.
    pub async fn read_projects(&self) -> Result<Vec<ProjectEntry>> {
        self.lock().await.projects().await
    }

    /// Reads and parses the id registry.
    pub async fn read_ids(&self) -> Result<Vec<ProjectIdEntry>> {
        self.lock().await.ids().await
    }

    /// Resolves `customer` across both registries.
    ///
    /// Returns `Ok(None)` when the customer is absent from the id registry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RegistryInconsistent`] if the customer is listed more
    /// than once, or if its id does not resolve to exactly one project entry.
    pub async fn lookup(&self, customer: &CustomerName) -> Result<Option<Customer>> {
        let txn = self.lock().await;
        let ids = txn.ids().await?;
        let mut matches = ids.iter().filter(|e| e.customer == customer.as_str());
        let Some(id_entry) = matches.next() else {
            return Ok(None);
        };
        if matches.next().is_some() {
            return Err(Error::RegistryInconsistent {
                customer: customer.to_string(),
                detail: format!(
                    "listed more than once in {}",
                    self.paths.projid.display()
                ),
            });
        }

        let projects = txn.projects().await?;
        let mut paths = projects
            .iter()
            .filter(|e| e.project_id == id_entry.project_id);
        match (paths.next(), paths.next()) {
            (Some(project), None) => Ok(Some(Customer {
                customer_name: customer.clone(),
                project_id: project.project_id,
                path: project.path.clone(),
            })),
            (None, _) => Err(Error::RegistryInconsistent {
                customer: customer.to_string(),
                detail: format!(
                    "project id {} is missing from {}",
                    id_entry.project_id,
                    self.paths.projects.display()
                ),
            }),
            (Some(_), Some(_)) => Err(Error::RegistryInconsistent {
                customer: customer.to_string(),
                detail: format!(
                    "project id {} is listed more than once in {}",
                    id_entry.project_id,
                    self.paths.projects.display()
                ),
            }),
        }
    }

    /// Cross-checks both registries.
    ///
    /// Parsing is always strict here regardless of the configured
    /// [`CorruptLinePolicy`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::RegistryCorrupt`] on the first unparseable line, or
    /// [`Error::RegistryIo`] if a file cannot be read.
    pub async fn verify(&self) -> Result<ConsistencyReport> {
        let _guard = self.state.lock().await;
        let projects = parse_projects(
            &self.paths.projects,
            &read(&self.paths.projects).await?,
            CorruptLinePolicy::Reject,
        )?;
        let ids = parse_ids(
            &self.paths.projid,
            &read(&self.paths.projid).await?,
            CorruptLinePolicy::Reject,
        )?;
        Ok(ConsistencyReport::build(&projects, &ids))
    }
}

/// Exclusive access to both registries.
///
/// Holds the [`RegistryStore`] lock for its whole lifetime.
#[derive(Debug)]
pub struct RegistryTxn<'a> {
    store: &'a RegistryStore,
    state: MutexGuard<'a, LedgerState>,
}

impl RegistryTxn<'_> {
    pub fn paths(&self) -> &RegistryPaths {
        &self.store.paths
    }

    pub async fn projects(&self) -> Result<Vec<ProjectEntry>> {
        let path = &self.store.paths.projects;
        parse_projects(path, &read(path).await?, self.store.policy)
    }

    pub async fn ids(&self) -> Result<Vec<ProjectIdEntry>> {
        let path = &self.store.paths.projid;
        parse_ids(path, &read(path).await?, self.store.policy)
    }

    /// Appends one line to the project registry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RegistryIo`] if the file is missing or the write
    /// fails.
    pub async fn append(&mut self, entry: &ProjectEntry) -> Result<()> {
        let path = &self.store.paths.projects;
        append_line(path, &format_project_line(entry))
            .await
            .map_err(|source| Error::RegistryIo {
                path: path.clone(),
                source,
            })
    }

    /// Appends one line to the id registry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RegistryIo`] if the file is missing or the write
    /// fails.
    pub async fn append_id_entry(&mut self, entry: &ProjectIdEntry) -> Result<()> {
        let path = &self.store.paths.projid;
        append_line(path, &format_id_line(entry))
            .await
            .map_err(|source| Error::RegistryIo {
                path: path.clone(),
                source,
            })
    }

    pub(crate) fn high_water(&self) -> Option<ProjectId> {
        self.state.high_water
    }

    pub(crate) fn advance_high_water(&mut self, id: ProjectId) {
        self.state.high_water = self.state.high_water.max(Some(id));
    }
}

async fn read(path: &Path) -> Result<Vec<u8>> {
    fs::read(path)
        .await
        .map_err(|source| Error::RegistryIo {
            path: path.to_path_buf(),
            source,
        })
}

// Never creates the file; a registry that vanished after startup is an error.
async fn append_line(path: &Path, line: &str) -> io::Result<()> {
    let mut file = OpenOptions::new().append(true).open(path).await?;
    file.write_all(line.as_bytes()).await?;
    file.flush().await?;
    file.sync_data().await
}
