use crate::{
    Customer, CustomerName, Error, ProjectEntry, ProjectId, ProjectIdEntry, RegistryStore,
    RegistryTxn, Result, registry::next_candidate_id,
};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

/// Hands out project ids that are unique across concurrent callers.
///
/// Reading the current maximum and appending the new entry happen inside the
/// same critical section: [`IdAllocator::allocate`] takes the registry lock
/// and the returned [`Allocation`] keeps it until it is committed or dropped.
/// Work performed between the two (directory creation) therefore cannot
/// interleave with another allocation.
///
/// Ids are also never reused within the process lifetime: the allocator
/// remembers the highest id it committed, so an entry removed from the
/// registry by an operator does not bring its id back into circulation.
#[derive(Clone, Debug)]
pub struct IdAllocator {
    store: Arc<RegistryStore>,
}

impl IdAllocator {
    pub const fn new(store: Arc<RegistryStore>) -> Self {
        Self { store }
    }

    /// Locks the registries and reserves the next project id.
    ///
    /// # Errors
    ///
    /// Returns an error if the project registry cannot be read or parsed, or
    /// if the id space is exhausted. The lock is released before returning.
    pub async fn allocate(&self) -> Result<Allocation<'_>> {
        let txn = self.store.lock().await;
        let projects = txn.projects().await?;
        let ids = txn.ids().await?;
        let candidate = next_candidate_id(&projects)?;
        let project_id = match txn.high_water() {
            Some(issued) if issued >= candidate => issued.next().ok_or(Error::IdSpaceExhausted)?,
            _ => candidate,
        };
        tracing::debug!(%project_id, "reserved project id");
        Ok(Allocation {
            txn,
            project_id,
            projects,
            ids,
        })
    }
}

/// A reserved project id together with the registry lock.
///
/// Dropping an `Allocation` without calling [`Allocation::commit`] releases
/// the lock and leaves both registries untouched.
#[derive(Debug)]
#[must_use = "an allocation holds the registry lock until committed or dropped"]
pub struct Allocation<'a> {
    txn: RegistryTxn<'a>,
    project_id: ProjectId,
    projects: Vec<ProjectEntry>,
    ids: Vec<ProjectIdEntry>,
}

impl Allocation<'_> {
    pub const fn project_id(&self) -> ProjectId {
        self.project_id
    }

    /// The id already registered for `customer` in the id registry, or for
    /// `path` in the project registry, if any.
    pub fn registered(&self, customer: &CustomerName, path: &Path) -> Option<ProjectId> {
        self.ids
            .iter()
            .find(|e| e.customer == customer.as_str())
            .map(|e| e.project_id)
            .or_else(|| {
                self.projects
                    .iter()
                    .find(|e| e.path == path)
                    .map(|e| e.project_id)
            })
    }

    /// Writes the reserved id to the project registry, then to the id
    /// registry, and releases the lock.
    ///
    /// # Errors
    ///
    /// - [`Error::RegistryIo`] if the first append fails. Nothing was written.
    /// - [`Error::PartialRegistration`] if the second append fails after the
    ///   first succeeded. The registries now disagree and are left as-is for
    ///   an operator to repair.
    pub async fn commit(mut self, customer: &CustomerName, path: PathBuf) -> Result<Customer> {
        let project_id = self.project_id;
        let project = ProjectEntry { project_id, path };
        self.txn.append(&project).await?;
        // The id is spent from here on, whatever happens to the second file.
        self.txn.advance_high_water(project_id);

        let projid = ProjectIdEntry {
            customer: customer.to_string(),
            project_id,
        };
        if let Err(err) = self.txn.append_id_entry(&projid).await {
            let source = match err {
                Error::RegistryIo { source, .. } => source,
                other => std::io::Error::other(other),
            };
            let paths = self.txn.paths();
            let err = Error::PartialRegistration {
                customer: customer.to_string(),
                project_id,
                project_registry: paths.projects.clone(),
                id_registry: paths.projid.clone(),
                source,
            };
            tracing::error!(
                customer = %customer,
                %project_id,
                error = %err,
                "registries diverged; operator remediation required"
            );
            return Err(err);
        }

        tracing::info!(customer = %customer, %project_id, path = %project.path.display(), "registered project");
        Ok(Customer {
            customer_name: customer.clone(),
            project_id,
            path: project.path,
        })
    }
}
