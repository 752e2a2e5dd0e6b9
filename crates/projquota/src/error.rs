//! Error types for the provisioning core.
//!
//! This module defines the central [`Error`] enum, which captures every
//! reportable failure of registry maintenance, id allocation, directory
//! creation and quota tool invocation. Each variant maps to a stable
//! [`ErrorKind`] so that outer layers (HTTP, logs, metrics) can classify a
//! failure without matching on message text.
//!
//! ## Error Cases
//! - `InvalidInput`: a customer name or quota size failed validation.
//! - `NotFound`: a lookup found no registered customer.
//! - `AlreadyRegistered`: onboarding a customer whose path is already in the
//!   project registry.
//! - `RegistryCorrupt`: a registry line could not be parsed.
//! - `RegistryInconsistent`: the two registries disagree about a customer.
//! - `IdSpaceExhausted`: the project registry already holds the largest id.
//! - `RegistryIo`: a registry file could not be read or appended to.
//! - `InitializationFailed`: a registry file could not be created at startup.
//! - `DirectoryCreateFailed`: the customer directory could not be created.
//! - `PartialRegistration`: the project registry was appended but the id
//!   registry was not. Requires operator remediation.
//! - `QuotaApplyFailed`: registration succeeded but quota enforcement failed.
//! - `QuotaTool`: the quota tool failed, could not be spawned or timed out.

use crate::{ProjectId, quota::QuotaToolError};
use std::{io, path::PathBuf};

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the provisioning core.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Caller supplied a malformed customer name or quota size.
    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    /// No customer with this name is registered.
    #[error("Customer {customer:?} is not registered")]
    NotFound { customer: String },

    /// The customer's directory is already present in the project registry.
    #[error("Customer {customer:?} is already registered with project id {project_id}")]
    AlreadyRegistered {
        customer: String,
        project_id: ProjectId,
    },

    /// A registry line is not of the expected `left:right` shape.
    #[error("Corrupt registry {}: line {line}: {content:?}", .path.display())]
    RegistryCorrupt {
        path: PathBuf,
        line: usize,
        content: String,
    },

    /// The two registries disagree about a customer.
    #[error("Registries disagree about {customer:?}: {detail}")]
    RegistryInconsistent { customer: String, detail: String },

    /// No project id is left above the current maximum.
    #[error("Project id space exhausted")]
    IdSpaceExhausted,

    /// Reading or appending a registry file failed.
    #[error("Registry I/O on {}: {source}", .path.display())]
    RegistryIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A registry file could not be created. The process must not serve.
    #[error("Failed to initialize registry {}: {source}", .path.display())]
    InitializationFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The customer directory could not be created. Nothing was registered.
    #[error("Failed to create directory {}: {source}", .path.display())]
    DirectoryCreateFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The project registry holds `project_id` but the id registry does not.
    #[error(
        "PARTIAL REGISTRATION: project {project_id} for {customer:?} was appended to {} \
         but appending to {} failed: {source}; registries now disagree and need manual repair",
        .project_registry.display(),
        .id_registry.display()
    )]
    PartialRegistration {
        customer: String,
        project_id: ProjectId,
        project_registry: PathBuf,
        id_registry: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The customer is registered under `project_id` but its quota was not
    /// applied. Retrying the quota update alone is sufficient.
    #[error("Customer {customer:?} registered as project {project_id} but quota was not applied: {source}")]
    QuotaApplyFailed {
        customer: String,
        project_id: ProjectId,
        #[source]
        source: QuotaToolError,
    },

    /// The quota tool failed.
    #[error(transparent)]
    QuotaTool(#[from] QuotaToolError),
}

/// Stable classification of an [`Error`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidInput,
    NotFound,
    AlreadyRegistered,
    RegistryCorrupt,
    RegistryInconsistent,
    IdSpaceExhausted,
    RegistryIo,
    InitializationFailed,
    DirectoryCreateFailed,
    PartialRegistration,
    QuotaApplyFailed,
    QuotaToolError,
    QuotaToolTimeout,
}

impl ErrorKind {
    /// Machine-readable name, stable across releases.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidInput => "invalid_input",
            Self::NotFound => "not_found",
            Self::AlreadyRegistered => "already_registered",
            Self::RegistryCorrupt => "registry_corrupt",
            Self::RegistryInconsistent => "registry_inconsistent",
            Self::IdSpaceExhausted => "id_space_exhausted",
            Self::RegistryIo => "registry_io",
            Self::InitializationFailed => "initialization_failed",
            Self::DirectoryCreateFailed => "directory_create_failed",
            Self::PartialRegistration => "partial_registration",
            Self::QuotaApplyFailed => "quota_apply_failed",
            Self::QuotaToolError => "quota_tool_error",
            Self::QuotaToolTimeout => "quota_tool_timeout",
        }
    }
}

impl core::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    pub(crate) fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput { .. } => ErrorKind::InvalidInput,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::AlreadyRegistered { .. } => ErrorKind::AlreadyRegistered,
            Self::RegistryCorrupt { .. } => ErrorKind::RegistryCorrupt,
            Self::RegistryInconsistent { .. } => ErrorKind::RegistryInconsistent,
            Self::IdSpaceExhausted => ErrorKind::IdSpaceExhausted,
            Self::RegistryIo { .. } => ErrorKind::RegistryIo,
            Self::InitializationFailed { .. } => ErrorKind::InitializationFailed,
            Self::DirectoryCreateFailed { .. } => ErrorKind::DirectoryCreateFailed,
            Self::PartialRegistration { .. } => ErrorKind::PartialRegistration,
            Self::QuotaApplyFailed { .. } => ErrorKind::QuotaApplyFailed,
            Self::QuotaTool(QuotaToolError::Timeout { .. }) => ErrorKind::QuotaToolTimeout,
            Self::QuotaTool(_) => ErrorKind::QuotaToolError,
        }
    }

    /// The project id already assigned to the customer, when the failure
    /// happened after registration.
    pub fn project_id(&self) -> Option<ProjectId> {
        match self {
            Self::AlreadyRegistered { project_id, .. }
            | Self::PartialRegistration { project_id, .. }
            | Self::QuotaApplyFailed { project_id, .. } => Some(*project_id),
            _ => None,
        }
    }
}
