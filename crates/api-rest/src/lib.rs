//! # API REST
//!
//! REST API implementation for the eGFR service.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON serialization, CORS, API key)
//!
//! All calculation, storage and validation lives in `egfr-core`; handlers translate between
//! JSON bodies and core calls and map [`EgfrError`] onto status codes.

#![warn(rust_2018_idioms)]

pub mod auth;
pub mod dto;
pub mod health;

use axum::{
    extract::{Path as AxumPath, Query, State},
    http::{header, StatusCode},
    middleware,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::{IntoParams, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use dto::{
    AccountRes, BatchRes, BatchRowRes, DashboardRes, EmailRes, EstimateRes, HealthRes, ListResultsRes,
    ListUsersRes, RegisterReq, ResultRes, SaveResultReq, SkippedRowRes, StageRes,
};
use egfr_core::measurement::MeasurementInput;
use egfr_core::report::{mailto_link, render_text_report, report_filename, EMAIL_SUBJECT};
use egfr_core::requests::{AdultRequest, CalculationRequest, PediatricRequest};
use egfr_core::{
    batch, dashboard, engine, AccountService, CoreConfig, EgfrError, Registered, Role,
};
use health::HealthService;

/// Application state for the REST API
///
/// Configuration is resolved once at startup; handlers never read the environment.
#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<CoreConfig>,
    pub api_key: Option<String>,
}

impl AppState {
    /// A blank `api_key` is treated as not configured.
    pub fn new(cfg: Arc<CoreConfig>, api_key: Option<String>) -> Self {
        Self {
            cfg,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        calculate_adult,
        calculate_pediatric,
        calculate_auto,
        stage_for_value,
        register_user,
        list_users,
        get_user,
        get_dashboard,
        save_result,
        list_results,
        result_report,
        result_email,
        upload_batch,
    ),
    components(schemas(
        HealthRes,
        dto::AdultReq,
        dto::PediatricReq,
        dto::AutoReq,
        EstimateRes,
        StageRes,
        RegisterReq,
        AccountRes,
        ListUsersRes,
        ResultRes,
        ListResultsRes,
        EmailRes,
        dto::RecentPatientRes,
        DashboardRes,
        BatchRowRes,
        SkippedRowRes,
        BatchRes,
    ))
)]
struct ApiDoc;

/// Builds the REST router: public health and docs routes plus the API-key protected routes.
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/egfr", post(calculate_auto))
        .route("/egfr/adult", post(calculate_adult))
        .route("/egfr/pediatric", post(calculate_pediatric))
        .route("/stages/:value", get(stage_for_value))
        .route("/users", get(list_users).post(register_user))
        .route("/users/:id", get(get_user))
        .route("/users/:id/dashboard", get(get_dashboard))
        .route("/users/:id/results", get(list_results).post(save_result))
        .route("/users/:id/results/:result_id/report", get(result_report))
        .route("/users/:id/results/:result_id/email", get(result_email))
        .route("/users/:id/batch", post(upload_batch))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_api_key,
        ));

    Router::new()
        .route("/health", get(health))
        .merge(protected)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

type ApiError = (StatusCode, String);

/// Status code for a core error.
pub fn status_for(error: &EgfrError) -> StatusCode {
    match error {
        EgfrError::InsufficientInput { .. } | EgfrError::InvalidInput(_) | EgfrError::Csv(_) => {
            StatusCode::BAD_REQUEST
        }
        EgfrError::Unauthenticated => StatusCode::UNAUTHORIZED,
        EgfrError::Forbidden(_) => StatusCode::FORBIDDEN,
        EgfrError::NotFound(_) => StatusCode::NOT_FOUND,
        EgfrError::PediatricFormulaRequired { .. } | EgfrError::DuplicateAccount { .. } => {
            StatusCode::CONFLICT
        }
        EgfrError::StorageDirCreation(_)
        | EgfrError::FileWrite(_)
        | EgfrError::FileRead(_)
        | EgfrError::Serialization(_)
        | EgfrError::Deserialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn api_error(context: &str, error: EgfrError) -> ApiError {
    let status = status_for(&error);
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!("{} error: {:?}", context, error);
        (status, "Internal error".into())
    } else {
        tracing::debug!("{} rejected: {}", context, error);
        (status, error.to_string())
    }
}

fn load_account(state: &AppState, id: &str) -> Result<AccountService<Registered>, ApiError> {
    AccountService::with_id(state.cfg.clone(), id).map_err(|e| api_error("Load account", e))
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for the REST API
///
/// Used for monitoring and load balancer health checks; needs no API key.
#[axum::debug_handler]
async fn health(State(_state): State<AppState>) -> Json<HealthRes> {
    Json(HealthService::check_health())
}

#[utoipa::path(
    post,
    path = "/egfr/adult",
    request_body = dto::AdultReq,
    responses(
        (status = 200, description = "Adult eGFR", body = EstimateRes),
        (status = 400, description = "Missing or invalid input"),
        (status = 409, description = "Patient is under 18; use the pediatric formula")
    )
)]
/// Calculate an adult eGFR (MDRD)
///
/// # Errors
/// Returns `409 Conflict` for a patient under 18 rather than computing an adult value.
#[axum::debug_handler]
async fn calculate_adult(
    State(_state): State<AppState>,
    Json(req): Json<AdultRequest>,
) -> Result<Json<EstimateRes>, ApiError> {
    let evaluation = req.evaluate().map_err(|e| api_error("Adult eGFR", e))?;
    Ok(Json(evaluation.estimate.into()))
}

#[utoipa::path(
    post,
    path = "/egfr/pediatric",
    request_body = dto::PediatricReq,
    responses(
        (status = 200, description = "Pediatric eGFR", body = EstimateRes),
        (status = 400, description = "Missing or invalid input")
    )
)]
/// Calculate a pediatric eGFR (bedside Schwartz)
#[axum::debug_handler]
async fn calculate_pediatric(
    State(_state): State<AppState>,
    Json(req): Json<PediatricRequest>,
) -> Result<Json<EstimateRes>, ApiError> {
    let evaluation = req.evaluate().map_err(|e| api_error("Pediatric eGFR", e))?;
    Ok(Json(evaluation.estimate.into()))
}

#[utoipa::path(
    post,
    path = "/egfr",
    request_body = dto::AutoReq,
    responses(
        (status = 200, description = "eGFR using the formula for the patient's age", body = EstimateRes),
        (status = 400, description = "Missing or invalid input")
    )
)]
/// Calculate an eGFR, choosing the formula from the age
#[axum::debug_handler]
async fn calculate_auto(
    State(_state): State<AppState>,
    Json(input): Json<MeasurementInput>,
) -> Result<Json<EstimateRes>, ApiError> {
    let evaluation = CalculationRequest::Auto(input)
        .evaluate()
        .map_err(|e| api_error("eGFR", e))?;
    Ok(Json(evaluation.estimate.into()))
}

#[utoipa::path(
    get,
    path = "/stages/{value}",
    params(("value" = f64, Path, description = "eGFR in mL/min/1.73m²")),
    responses(
        (status = 200, description = "CKD stage for the value", body = StageRes)
    )
)]
/// Classify an eGFR value into a CKD stage
#[axum::debug_handler]
async fn stage_for_value(
    State(_state): State<AppState>,
    AxumPath(value): AxumPath<f64>,
) -> Json<StageRes> {
    Json(StageRes::new(value, engine::classify_ckd_stage(value)))
}

#[utoipa::path(
    post,
    path = "/users",
    request_body = RegisterReq,
    responses(
        (status = 201, description = "Account registered", body = AccountRes),
        (status = 400, description = "Bad request"),
        (status = 409, description = "Account already exists"),
        (status = 500, description = "Internal server error")
    )
)]
/// Register a patient or clinician account
#[axum::debug_handler]
async fn register_user(
    State(state): State<AppState>,
    Json(req): Json<RegisterReq>,
) -> Result<(StatusCode, Json<AccountRes>), ApiError> {
    let role: Role = req.role.parse().map_err(|e| api_error("Register", e))?;
    let service = AccountService::new(state.cfg.clone())
        .register(&req.identifier, role, req.first_name, req.last_name)
        .map_err(|e| api_error("Register", e))?;
    Ok((StatusCode::CREATED, Json(service.account().into())))
}

#[utoipa::path(
    get,
    path = "/users",
    responses(
        (status = 200, description = "All accounts", body = ListUsersRes)
    )
)]
/// List all accounts, oldest first
#[axum::debug_handler]
async fn list_users(State(state): State<AppState>) -> Json<ListUsersRes> {
    let users = AccountService::new(state.cfg.clone())
        .list()
        .iter()
        .map(AccountRes::from)
        .collect();
    Json(ListUsersRes { users })
}

#[utoipa::path(
    get,
    path = "/users/{id}",
    params(("id" = String, Path, description = "Canonical account id")),
    responses(
        (status = 200, description = "Account", body = AccountRes),
        (status = 400, description = "Malformed id"),
        (status = 401, description = "No such account")
    )
)]
#[axum::debug_handler]
async fn get_user(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<AccountRes>, ApiError> {
    let account = load_account(&state, &id)?;
    Ok(Json(account.account().into()))
}

#[utoipa::path(
    get,
    path = "/users/{id}/dashboard",
    params(("id" = String, Path, description = "Canonical account id")),
    responses(
        (status = 200, description = "Role-specific dashboard", body = DashboardRes),
        (status = 401, description = "No such account"),
        (status = 500, description = "Internal server error")
    )
)]
/// Dashboard for an account
///
/// Patients get their latest result; clinicians get the most recent results labelled
/// `Patient 1..N`.
#[axum::debug_handler]
async fn get_dashboard(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<DashboardRes>, ApiError> {
    let account = load_account(&state, &id)?;
    let dashboard = dashboard::dashboard_for(&account).map_err(|e| api_error("Dashboard", e))?;
    Ok(Json(DashboardRes::from(&dashboard)))
}

#[utoipa::path(
    post,
    path = "/users/{id}/results",
    params(("id" = String, Path, description = "Canonical account id")),
    request_body(
        content = dto::AutoReq,
        description = "Calculation fields tagged by `formula` (`adult`, `pediatric` or `auto`), plus an optional `patient_ref`"
    ),
    responses(
        (status = 201, description = "Result calculated and saved", body = ResultRes),
        (status = 400, description = "Missing or invalid input"),
        (status = 401, description = "No such account"),
        (status = 409, description = "Adult formula requested for a patient under 18"),
        (status = 500, description = "Internal server error")
    )
)]
/// Calculate an eGFR and save it to the account
#[axum::debug_handler]
async fn save_result(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    Json(req): Json<SaveResultReq>,
) -> Result<(StatusCode, Json<ResultRes>), ApiError> {
    let account = load_account(&state, &id)?;
    let evaluation = req
        .calculation
        .evaluate()
        .map_err(|e| api_error("Save result", e))?;
    let record = account
        .results()
        .save(&evaluation, req.patient_ref)
        .map_err(|e| api_error("Save result", e))?;
    Ok((StatusCode::CREATED, Json(ResultRes::from(&record))))
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
struct ResultsQuery {
    /// Defaults to the configured dashboard size.
    limit: Option<usize>,
}

#[utoipa::path(
    get,
    path = "/users/{id}/results",
    params(("id" = String, Path, description = "Canonical account id"), ResultsQuery),
    responses(
        (status = 200, description = "Most recent results, newest first", body = ListResultsRes),
        (status = 401, description = "No such account"),
        (status = 500, description = "Internal server error")
    )
)]
#[axum::debug_handler]
async fn list_results(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    Query(query): Query<ResultsQuery>,
) -> Result<Json<ListResultsRes>, ApiError> {
    let account = load_account(&state, &id)?;
    let limit = query.limit.unwrap_or_else(|| state.cfg.recent_limit());
    let results = account
        .results()
        .recent(limit)
        .map_err(|e| api_error("List results", e))?
        .iter()
        .map(ResultRes::from)
        .collect();
    Ok(Json(ListResultsRes { results }))
}

#[utoipa::path(
    get,
    path = "/users/{id}/results/{result_id}/report",
    params(
        ("id" = String, Path, description = "Canonical account id"),
        ("result_id" = String, Path, description = "Canonical result id")
    ),
    responses(
        (status = 200, description = "Plain-text report", body = String, content_type = "text/plain"),
        (status = 401, description = "No such account"),
        (status = 404, description = "No such result")
    )
)]
/// Download a plain-text report of one saved result
#[axum::debug_handler]
async fn result_report(
    State(state): State<AppState>,
    AxumPath((id, result_id)): AxumPath<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let account = load_account(&state, &id)?;
    let record = account
        .results()
        .get(&result_id)
        .map_err(|e| api_error("Read result", e))?;

    let body = render_text_report(&record.estimate(), record.created_at);
    let disposition = format!(
        "attachment; filename=\"{}\"",
        report_filename(record.created_at.date_naive())
    );
    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    ))
}

#[utoipa::path(
    get,
    path = "/users/{id}/results/{result_id}/email",
    params(
        ("id" = String, Path, description = "Canonical account id"),
        ("result_id" = String, Path, description = "Canonical result id")
    ),
    responses(
        (status = 200, description = "Subject, body and mailto link", body = EmailRes),
        (status = 401, description = "No such account"),
        (status = 404, description = "No such result")
    )
)]
/// Email content for one saved result
#[axum::debug_handler]
async fn result_email(
    State(state): State<AppState>,
    AxumPath((id, result_id)): AxumPath<(String, String)>,
) -> Result<Json<EmailRes>, ApiError> {
    let account = load_account(&state, &id)?;
    let record = account
        .results()
        .get(&result_id)
        .map_err(|e| api_error("Read result", e))?;

    let estimate = record.estimate();
    Ok(Json(EmailRes {
        subject: EMAIL_SUBJECT.into(),
        body: render_text_report(&estimate, record.created_at),
        mailto: mailto_link(&estimate, record.created_at),
    }))
}

#[utoipa::path(
    post,
    path = "/users/{id}/batch",
    params(("id" = String, Path, description = "Canonical clinician account id")),
    request_body(content = String, content_type = "text/csv",
        description = "CSV with columns PatientID, Gender, Ethnicity, Age, Creatinine, Height"),
    responses(
        (status = 200, description = "Saved rows and skipped rows", body = BatchRes),
        (status = 400, description = "Unreadable CSV"),
        (status = 401, description = "No such account"),
        (status = 403, description = "Account is not a clinician"),
        (status = 500, description = "Internal server error")
    )
)]
/// Upload a CSV of patients, calculate each row and save the results
#[axum::debug_handler]
async fn upload_batch(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    body: String,
) -> Result<Json<BatchRes>, ApiError> {
    let account = load_account(&state, &id)?;
    let ingestion =
        batch::ingest_and_save(&account, body.as_bytes()).map_err(|e| api_error("Batch", e))?;

    let results = ingestion
        .outcome
        .entries
        .iter()
        .zip(&ingestion.saved)
        .map(|(entry, record)| {
            let estimate = EstimateRes::from(entry.estimate);
            BatchRowRes {
                line: entry.line,
                patient_id: entry.patient_id.clone(),
                result_id: record.id.to_string(),
                egfr: estimate.egfr,
                stage: estimate.stage,
                formula: estimate.formula,
                risk: estimate.risk,
                flagged: estimate.flagged,
            }
        })
        .collect();
    let skipped = ingestion
        .outcome
        .skipped
        .iter()
        .map(SkippedRowRes::from)
        .collect();

    Ok(Json(BatchRes {
        results,
        skipped,
        skipped_count: ingestion.outcome.skipped_count(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn test_app(temp_dir: &TempDir, api_key: Option<&str>) -> Router {
        let cfg = Arc::new(
            CoreConfig::new(temp_dir.path().to_path_buf(), 5).expect("CoreConfig::new should succeed"),
        );
        router(AppState::new(cfg, api_key.map(String::from)))
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, bytes.to_vec())
    }

    async fn post_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let (status, bytes) = send(app, request).await;
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let (status, bytes) = send(app, request).await;
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    async fn register(app: &Router, identifier: &str, role: &str) -> String {
        let (status, body) = post_json(
            app,
            "/users",
            json!({"identifier": identifier, "role": role}),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let app = test_app(&temp_dir, Some("secret"));
        let (status, body) = get_json(&app, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
    }

    #[tokio::test]
    async fn test_adult_calculation() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let app = test_app(&temp_dir, None);
        let (status, body) = post_json(
            &app,
            "/egfr/adult",
            json!({"age": 40, "gender": "male", "ethnicity": "white", "creatinine": 88.4}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["egfr"], 88.0);
        assert_eq!(body["stage"], "Stage 2");
        assert_eq!(body["formula"], "adult");
    }

    #[tokio::test]
    async fn test_adult_calculation_error_statuses() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let app = test_app(&temp_dir, None);

        let (status, _) =
            post_json(&app, "/egfr/adult", json!({"age": 12, "creatinine": 50})).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = post_json(&app, "/egfr/adult", json!({"creatinine": 50})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_auto_calculation_picks_pediatric() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let app = test_app(&temp_dir, None);
        let (status, body) = post_json(
            &app,
            "/egfr",
            json!({"age": 9, "creatinine": 44.2, "height_cm": 110}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["egfr"], 90.9);
        assert_eq!(body["formula"], "pediatric");
    }

    #[tokio::test]
    async fn test_stage_lookup() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let app = test_app(&temp_dir, None);
        let (status, body) = get_json(&app, "/stages/89.9").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["stage"], "Stage 2");
    }

    #[tokio::test]
    async fn test_api_key_is_enforced() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let app = test_app(&temp_dir, Some("secret"));

        let (status, _) = get_json(&app, "/stages/50").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let request = Request::builder()
            .uri("/stages/50")
            .header(auth::API_KEY_HEADER, "secret")
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_and_malformed_users() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let app = test_app(&temp_dir, None);

        let (status, _) = get_json(&app, "/users/0123456789abcdef0123456789abcdef").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = get_json(&app, "/users/not-an-id/dashboard").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_duplicate_registration_conflicts() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let app = test_app(&temp_dir, None);
        register(&app, "HCP-1", "clinician").await;

        let (status, _) = post_json(
            &app,
            "/users",
            json!({"identifier": "HCP-1", "role": "clinician"}),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (_, body) = get_json(&app, "/users").await;
        assert_eq!(body["users"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_patient_saves_result_and_downloads_report() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let app = test_app(&temp_dir, None);
        let id = register(&app, "9434765919", "patient").await;

        let (status, saved) = post_json(
            &app,
            &format!("/users/{id}/results"),
            json!({"formula": "adult", "age": 60, "gender": "female", "ethnicity": "black", "creatinine": 106.08}),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(saved["egfr"], 58.9);

        let (status, dashboard) = get_json(&app, &format!("/users/{id}/dashboard")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(dashboard["role"], "Patient");
        assert_eq!(dashboard["latest"]["id"], saved["id"]);
        assert_eq!(dashboard["latest"]["stage"], "Stage 3a");

        let result_id = saved["id"].as_str().unwrap();
        let request = Request::builder()
            .uri(format!("/users/{id}/results/{result_id}/report"))
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let disposition = response.headers()[header::CONTENT_DISPOSITION]
            .to_str()
            .unwrap()
            .to_string();
        assert!(disposition.contains("eGFR-Results-"));
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("- eGFR: 58.9mL/min/1.73m²"));
        assert!(text.contains("Stage 3a"));

        let (status, email) =
            get_json(&app, &format!("/users/{id}/results/{result_id}/email")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(email["subject"], "Your eGFR Calculator Results");
        assert_eq!(email["body"].as_str().unwrap(), text);
        let mailto = email["mailto"].as_str().unwrap();
        assert!(mailto.starts_with("mailto:?subject=Your%20eGFR%20Calculator%20Results&body="));
        assert!(mailto.contains("58.9mL%2Fmin%2F1.73m%C2%B2"));
    }

    #[tokio::test]
    async fn test_clinician_batch_upload() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let app = test_app(&temp_dir, None);
        let clinician = register(&app, "HCP-9", "clinician").await;
        let patient = register(&app, "9434765919", "patient").await;

        let csv = "PatientID,Gender,Ethnicity,Age,Creatinine,Height\n\
                   A1,1,W,40,88.4,\n\
                   A2,0,B,60,106.08,\n\
                   A3,1,W,,88.4,\n";

        let upload = |id: String| {
            Request::builder()
                .method("POST")
                .uri(format!("/users/{id}/batch"))
                .header("content-type", "text/csv")
                .body(Body::from(csv))
                .unwrap()
        };

        let (status, bytes) = send(&app, upload(clinician.clone())).await;
        assert_eq!(status, StatusCode::OK);
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["results"].as_array().unwrap().len(), 2);
        assert_eq!(body["results"][1]["patient_id"], "A2");
        assert_eq!(body["skipped_count"], 1);
        assert_eq!(body["skipped"][0]["line"], 4);

        let (_, dashboard) = get_json(&app, &format!("/users/{clinician}/dashboard")).await;
        let recent = dashboard["recent"].as_array().unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0]["label"], "Patient 1");

        let (status, _) = send(&app, upload(patient)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }
}
