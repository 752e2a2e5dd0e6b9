//! Provisioning Service: customer onboarding and quota adjustment.
//!
//! [`ProvisioningService`] sequences id allocation, directory creation,
//! registry commit and quota enforcement, and owns the failure policy:
//!
//! | step                | on failure                | state left behind          |
//! |---------------------|---------------------------|----------------------------|
//! | validate name       | `InvalidInput`            | nothing                    |
//! | allocate id         | registry error            | nothing                    |
//! | create directory    | `DirectoryCreateFailed`   | possibly an empty dir      |
//! | append `projects`   | `RegistryIo`              | directory only             |
//! | append `projid`     | `PartialRegistration`     | registries disagree        |
//! | create project      | `QuotaApplyFailed`        | registered, no quota       |
//! | set default limit   | `QuotaApplyFailed`        | registered, no limit       |
//!
//! Steps up to the registry commit run under the registry lock. Quota tool
//! calls run after it is released.


use crate::{
    ConsistencyReport, Customer, CustomerName, Error, IdAllocator, ProvisionConfig, QuotaSize,
    QuotaTool, RegistryStore, Result, XfsQuota,
};
use std::sync::Arc;

/// Orchestrates the registry, the id allocator and the quota tool.
#[derive(Debug)]
pub struct ProvisioningService<Q> {
    config: ProvisionConfig,
    store: Arc<RegistryStore>,
    allocator: IdAllocator,
    quota: Q,
}

impl ProvisioningService<XfsQuota> {
    /// Builds a service that drives the real `xfs_quota` tool.
    pub fn from_config(config: ProvisionConfig) -> Self {
        let quota = XfsQuota::from_config(&config);
        Self::new(config, quota)
    }
}

impl<Q: QuotaTool> ProvisioningService<Q> {
    pub fn new(config: ProvisionConfig, quota: Q) -> Self {
        let store = Arc::new(RegistryStore::new(
            config.registry.clone(),
            config.corrupt_lines,
        ));
        Self {
            allocator: IdAllocator::new(Arc::clone(&store)),
            store,
            config,
            quota,
        }
    }

    pub fn config(&self) -> &ProvisionConfig {
        &self.config
    }

    pub fn registry(&self) -> &RegistryStore {
        &self.store
    }

    /// Creates missing registry files and cross-checks their contents.
    ///
    /// Divergences are logged at `error` and returned, not treated as fatal:
    /// they predate this process and need an operator, while the service can
    /// still onboard new customers safely.
    ///
    /// # Errors
    ///
    /// [`Error::InitializationFailed`] if a file cannot be created, or
    /// [`Error::RegistryCorrupt`] if a line cannot be parsed. Both are fatal.
    pub async fn initialize(&self) -> Result<ConsistencyReport> {
        self.store.ensure_initialized().await?;
        let report = self.store.verify().await?;
        if !report.is_consistent() {
            tracing::error!(?report, "project registries are inconsistent");
        }
        Ok(report)
    }

    /// Registers a new customer and applies the default quota.
    ///
    /// # Errors
    ///
    /// See the module documentation for the failure of each step. A
    /// [`Error::QuotaApplyFailed`] carries the assigned project id; the
    /// customer is registered and only the quota needs to be retried through
    /// [`Self::update_quota`].
    #[tracing::instrument(skip(self))]
    pub async fn onboard(&self, customer: &str) -> Result<Customer> {
        let customer = CustomerName::parse(customer)?;
        let path = self.config.mount_point.join(customer.as_str());

        let customer_record = {
            let allocation = self.allocator.allocate().await?;
            if let Some(project_id) = allocation.registered(&customer, &path) {
                return Err(Error::AlreadyRegistered {
                    customer: customer.to_string(),
                    project_id,
                });
            }

            tokio::fs::create_dir_all(&path)
                .await
                .map_err(|source| Error::DirectoryCreateFailed {
                    path: path.clone(),
                    source,
                })?;

            allocation.commit(&customer, path).await?
        };

        let project_id = customer_record.project_id;
        let quota_applied = async {
            self.quota.create_project(&customer).await?;
            self.quota
                .set_limit(&customer, &self.config.default_size)
                .await
        };
        if let Err(source) = quota_applied.await {
            return Err(Error::QuotaApplyFailed {
                customer: customer.to_string(),
                project_id,
                source,
            });
        }

        tracing::info!(
            %project_id,
            size = %self.config.default_size,
            "customer onboarded"
        );
        Ok(customer_record)
    }

    /// Sets the hard limit of an existing customer.
    ///
    /// The registry is not consulted; the quota tool resolves the customer
    /// itself.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidInput`] before any tool invocation if either argument
    /// is malformed, otherwise [`Error::QuotaTool`].
    #[tracing::instrument(skip(self))]
    pub async fn update_quota(
        &self,
        customer: &str,
        size: &str,
    ) -> Result<(CustomerName, QuotaSize)> {
        let customer = CustomerName::parse(customer)?;
        let size = QuotaSize::parse(size)?;
        self.quota.set_limit(&customer, &size).await?;
        tracing::info!("quota updated");
        Ok((customer, size))
    }

    /// Returns the quota tool's report unmodified, byte for byte.
    pub async fn report(&self) -> Result<Vec<u8>> {
        Ok(self.quota.report().await?)
    }

    /// Looks a registered customer up across both registries.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] if the customer is not registered, or
    /// [`Error::RegistryInconsistent`] if the registries disagree about it.
    pub async fn customer(&self, customer: &str) -> Result<Customer> {
        let name = CustomerName::parse(customer)?;
        self.store
            .lookup(&name)
            .await?
            .ok_or_else(|| Error::NotFound {
                customer: name.to_string(),
            })
    }
}
