use super::telemetry::increment_errors;
use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use projquota::{ErrorKind, ProjectId};
use serde::Serialize;

/// Everything a handler or the auth layer can answer with instead of a 200.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Secret key is required")]
    MissingSecret,

    #[error("Invalid secret key")]
    InvalidSecret,

    /// The body was not valid JSON of the expected shape.
    #[error("Invalid request body: {0}")]
    InvalidBody(String),

    #[error("Missing {0}")]
    MissingField(&'static str),

    #[error(transparent)]
    Provision(#[from] projquota::Error),

    /// The spawned onboarding task panicked or was cancelled.
    #[error("Onboarding task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    project_id: Option<ProjectId>,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingSecret => StatusCode::UNAUTHORIZED,
            Self::InvalidSecret => StatusCode::FORBIDDEN,
            Self::InvalidBody(_) | Self::MissingField(_) => StatusCode::BAD_REQUEST,
            Self::Provision(err) => match err.kind() {
                ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::AlreadyRegistered => StatusCode::CONFLICT,
                ErrorKind::QuotaApplyFailed | ErrorKind::QuotaToolError => StatusCode::BAD_GATEWAY,
                ErrorKind::QuotaToolTimeout => StatusCode::GATEWAY_TIMEOUT,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable classification used in bodies and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingSecret => "missing_secret",
            Self::InvalidSecret => "invalid_secret",
            Self::InvalidBody(_) | Self::MissingField(_) => ErrorKind::InvalidInput.as_str(),
            Self::Provision(err) => err.kind().as_str(),
            Self::Task(_) => "internal",
        }
    }

    fn body(&self) -> ErrorBody {
        match self {
            // Auth failures answer with the message alone.
            Self::MissingSecret | Self::InvalidSecret => ErrorBody {
                error: self.to_string(),
                kind: None,
                project_id: None,
            },
            Self::Provision(err) => ErrorBody {
                error: err.to_string(),
                kind: Some(self.kind()),
                project_id: err.project_id(),
            },
            _ => ErrorBody {
                error: self.to_string(),
                kind: Some(self.kind()),
                project_id: None,
            },
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::InvalidBody(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let kind = self.kind();
        increment_errors(kind);

        if status.is_server_error() {
            tracing::error!(%kind, error = %self, "request failed");
        } else {
            tracing::debug!(%kind, error = %self, "request rejected");
        }

        (status, Json(self.body())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use projquota::{CustomerName, QuotaToolError};
    use std::time::Duration;

    fn provision(err: projquota::Error) -> ApiError {
        ApiError::Provision(err)
    }

    #[test]
    fn status_codes_follow_error_kind() {
        assert_eq!(ApiError::MissingSecret.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::InvalidSecret.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            ApiError::MissingField("customer name").status_code(),
            StatusCode::BAD_REQUEST
        );

        let invalid = CustomerName::parse("a/b").unwrap_err();
        assert_eq!(provision(invalid).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            provision(projquota::Error::NotFound {
                customer: "acme".into()
            })
            .status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            provision(projquota::Error::AlreadyRegistered {
                customer: "acme".into(),
                project_id: ProjectId::FIRST,
            })
            .status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            provision(projquota::Error::IdSpaceExhausted).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );

        let timeout = QuotaToolError::Timeout {
            command: "xfs_quota -x -c \"report -p\" /mnt/xfs".into(),
            after: Duration::from_secs(10),
        };
        assert_eq!(
            provision(timeout.into()).status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );

        let spawn = QuotaToolError::Spawn {
            command: "xfs_quota".into(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        let apply = projquota::Error::QuotaApplyFailed {
            customer: "acme".into(),
            project_id: ProjectId::FIRST,
            source: spawn,
        };
        assert_eq!(provision(apply).status_code(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn bodies_carry_kind_and_project_id() {
        let body = serde_json::to_value(ApiError::InvalidSecret.body()).unwrap();
        assert_eq!(body, serde_json::json!({ "error": "Invalid secret key" }));

        let spawn = QuotaToolError::Spawn {
            command: "xfs_quota".into(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        let err = provision(projquota::Error::QuotaApplyFailed {
            customer: "acme".into(),
            project_id: ProjectId::new(12).unwrap(),
            source: spawn,
        });
        let body = serde_json::to_value(err.body()).unwrap();
        assert_eq!(body["kind"], "quota_apply_failed");
        assert_eq!(body["projectId"], 12);
        assert!(body["error"].as_str().unwrap().contains("acme"));
    }
}
