use super::{
    auth::require_secret,
    error::ApiError,
    telemetry::{
        increment_onboardings, increment_quota_updates, increment_reports,
        record_onboarding_duration,
    },
};
use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::header,
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use projquota::{Customer, CustomerName, ProvisioningService, QuotaSize, QuotaTool};
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Instant};
use tower_http::trace::TraceLayer;
use tracing::Instrument;

type Service<Q> = Arc<ProvisioningService<Q>>;

#[derive(Debug, Deserialize)]
struct OnboardRequest {
    customer: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QuotaRequest {
    size: Option<String>,
}

#[derive(Debug, Serialize)]
struct QuotaUpdated {
    customer: CustomerName,
    size: QuotaSize,
}

/// Builds the HTTP surface. Every request, matched or not, must carry the
/// shared secret.
pub fn router<Q: QuotaTool + 'static>(service: Service<Q>, secret: Arc<str>) -> Router {
    Router::new()
        .route("/customers", post(onboard::<Q>))
        .route("/customers/{customer}", get(customer::<Q>))
        .route("/customers/{customer}/quota", post(update_quota::<Q>))
        .route("/report", get(report::<Q>))
        .with_state(service)
        .layer(middleware::from_fn_with_state(secret, require_secret))
        .layer(TraceLayer::new_for_http())
}

async fn onboard<Q: QuotaTool + 'static>(
    State(service): State<Service<Q>>,
    payload: Result<Json<OnboardRequest>, JsonRejection>,
) -> Result<Json<Customer>, ApiError> {
    let Json(request) = payload?;
    let customer = request
        .customer
        .ok_or(ApiError::MissingField("customer name"))?;

    let started = Instant::now();
    // Detached so a dropped connection cannot interrupt the registry commit.
    let task = tokio::spawn(
        async move { service.onboard(&customer).await }.in_current_span(),
    );
    let onboarded = task.await??;

    record_onboarding_duration(started.elapsed().as_secs_f64() * 1000.0);
    increment_onboardings();
    Ok(Json(onboarded))
}

async fn update_quota<Q: QuotaTool + 'static>(
    State(service): State<Service<Q>>,
    Path(customer): Path<String>,
    payload: Result<Json<QuotaRequest>, JsonRejection>,
) -> Result<Json<QuotaUpdated>, ApiError> {
    let Json(request) = payload?;
    let size = request.size.ok_or(ApiError::MissingField("quota size"))?;

    let (customer, size) = service.update_quota(&customer, &size).await?;
    increment_quota_updates();
    Ok(Json(QuotaUpdated { customer, size }))
}

async fn report<Q: QuotaTool + 'static>(
    State(service): State<Service<Q>>,
) -> Result<impl IntoResponse, ApiError> {
    let report = service.report().await?;
    increment_reports();
    Ok(([(header::CONTENT_TYPE, "text/plain")], report))
}

async fn customer<Q: QuotaTool + 'static>(
    State(service): State<Service<Q>>,
    Path(customer): Path<String>,
) -> Result<Json<Customer>, ApiError> {
    Ok(Json(service.customer(&customer).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode},
    };
    use projquota::{ProvisionConfig, RegistryPaths, XfsQuota};
    use serde_json::{Value, json};
    use std::path::PathBuf;
    use tempfile::TempDir;
    use tower::ServiceExt;

    const SECRET: &str = "s3cret";

    struct Harness {
        dir: TempDir,
        mount: PathBuf,
        app: Router,
    }

    impl Harness {
        /// `program` stands in for `xfs_quota`.
        async fn new(program: &str) -> Self {
            let dir = TempDir::new().unwrap();
            let mount = dir.path().join("mnt");
            let mut config = ProvisionConfig::new(&mount);
            config.registry = RegistryPaths {
                projects: dir.path().join("projects"),
                projid: dir.path().join("projid"),
            };
            config.quota_tool = program.into();

            let service: Service<XfsQuota> = Arc::new(ProvisioningService::from_config(config));
            service.initialize().await.unwrap();

            Self {
                app: router(service, Arc::from(SECRET)),
                dir,
                mount,
            }
        }

        async fn send(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, String) {
            let builder = Request::builder().method(method).uri(uri);
            let request = match body {
                Some(body) => builder
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string())),
                None => builder.body(Body::empty()),
            }
            .unwrap();

            let response = self.app.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            (status, String::from_utf8(bytes.to_vec()).unwrap())
        }

        async fn send_json(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
            let (status, body) = self.send(method, uri, body).await;
            (status, serde_json::from_str(&body).unwrap())
        }

        fn registry(&self, name: &str) -> String {
            std::fs::read_to_string(self.dir.path().join(name)).unwrap()
        }
    }

    fn authed(path: &str) -> String {
        format!("{path}?secret={SECRET}")
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn missing_secret_is_unauthorized() {
        let harness = Harness::new("echo").await;
        for uri in ["/report", "/report?secret=", "/nowhere"] {
            let (status, body) = harness.send_json("GET", uri, None).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
            assert_eq!(body, json!({ "error": "Secret key is required" }));
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn wrong_secret_is_forbidden() {
        let harness = Harness::new("echo").await;
        // includes secrets of a different length
        for secret in ["nope", "s3creT", "s3cre", "s3cret!"] {
            let (status, body) = harness
                .send_json(
                    "POST",
                    &format!("/customers?secret={secret}"),
                    Some(json!({ "customer": "acme" })),
                )
                .await;
            assert_eq!(status, StatusCode::FORBIDDEN, "{secret}");
            assert_eq!(body, json!({ "error": "Invalid secret key" }));
        }
        assert_eq!(harness.registry("projects"), "");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unknown_route_with_secret_is_not_found() {
        let harness = Harness::new("echo").await;
        let (status, _) = harness.send("GET", &authed("/nowhere"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn onboards_and_looks_up_customer() {
        let harness = Harness::new("echo").await;
        let path = harness.mount.join("acme");

        let (status, body) = harness
            .send_json("POST", &authed("/customers"), Some(json!({ "customer": "acme" })))
            .await;
        assert_eq!(status, StatusCode::OK);
        let expected = json!({
            "customerName": "acme",
            "projectId": 1,
            "path": path.to_str().unwrap(),
        });
        assert_eq!(body, expected);
        assert!(path.is_dir());
        assert_eq!(harness.registry("projects"), format!("1:{}\n", path.display()));
        assert_eq!(harness.registry("projid"), "acme:1\n");

        let (status, body) = harness.send_json("GET", &authed("/customers/acme"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, expected);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn onboarding_twice_conflicts() {
        let harness = Harness::new("echo").await;
        let request = Some(json!({ "customer": "acme" }));
        harness.send("POST", &authed("/customers"), request.clone()).await;

        let (status, body) = harness.send_json("POST", &authed("/customers"), request).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["kind"], "already_registered");
        assert_eq!(body["projectId"], 1);
        assert_eq!(harness.registry("projid"), "acme:1\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn malformed_onboarding_requests_are_bad_requests() {
        let harness = Harness::new("echo").await;

        for body in [json!({}), json!({ "customer": "" }), json!({ "customer": "a/b" })] {
            let (status, response) = harness.send_json("POST", &authed("/customers"), Some(body.clone())).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
            assert_eq!(response["kind"], "invalid_input");
        }

        let (status, response) = harness.send_json("POST", &authed("/customers"), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(response["kind"], "invalid_input");

        assert_eq!(harness.registry("projects"), "");
        assert_eq!(harness.registry("projid"), "");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn quota_failure_reports_assigned_project_id() {
        let harness = Harness::new("false").await;
        let (status, body) = harness
            .send_json("POST", &authed("/customers"), Some(json!({ "customer": "acme" })))
            .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["kind"], "quota_apply_failed");
        assert_eq!(body["projectId"], 1);
        assert_eq!(harness.registry("projid"), "acme:1\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn updates_quota() {
        let harness = Harness::new("echo").await;
        let (status, body) = harness
            .send_json("POST", &authed("/customers/acme/quota"), Some(json!({ "size": "100G" })))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "customer": "acme", "size": "100G" }));

        for bad in [json!({ "size": "abc" }), json!({})] {
            let (status, body) = harness
                .send_json("POST", &authed("/customers/acme/quota"), Some(bad))
                .await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["kind"], "invalid_input");
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn report_is_plain_text_passthrough() {
        let harness = Harness::new("echo").await;
        let request = Request::builder()
            .uri(authed("/report"))
            .body(Body::empty())
            .unwrap();
        let response = harness.app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(
            response.headers()[header::CONTENT_TYPE]
                .to_str()
                .unwrap()
                .starts_with("text/plain")
        );
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(
            bytes,
            format!("-x -c report -p {}\n", harness.mount.display()).as_bytes()
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failing_tool_is_bad_gateway() {
        let harness = Harness::new("false").await;
        let (status, body) = harness.send_json("GET", &authed("/report"), None).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["kind"], "quota_tool_error");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unknown_customer_is_not_found() {
        let harness = Harness::new("echo").await;
        let (status, body) = harness.send_json("GET", &authed("/customers/ghost"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["kind"], "not_found");
    }
}
