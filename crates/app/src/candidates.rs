//! `candidates.*` procedures. Every procedure answers with a JSON array: the affected
//! rows on success, `[]` when the target id does not exist.

use std::time::Instant;

use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    Json,
};
use metrics::{counter, histogram};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{error, info, warn};

use hireboard_core::types::Candidate;
use hireboard_core::validation::{
    CandidateIdInput, CreateCandidateInput, Field, FieldErrorCode, UpdateCandidateRequest,
    ValidationErrors,
};
use hireboard_storage::CandidateError;

use crate::auth::RequireSession;
use crate::problem::ProblemResponse;
use crate::router::AppState;

const GET_MANY: &str = "candidates.getMany";
const GET_ONE: &str = "candidates.getOne";
const CREATE: &str = "candidates.create";
const UPDATE: &str = "candidates.update";
const DELETE: &str = "candidates.delete";

#[derive(Debug, Error)]
pub enum ProcedureError {
    #[error("{0}")]
    Validation(ValidationErrors),
    #[error("failed to parse request body: {0}")]
    InvalidJson(String),
    #[error("storage failure: {0}")]
    Storage(#[from] CandidateError),
}

impl ProcedureError {
    fn result_label(&self) -> &'static str {
        match self {
            Self::Validation(_) => "invalid",
            Self::InvalidJson(_) => "invalid_json",
            Self::Storage(_) => "error",
        }
    }
}

impl From<ValidationErrors> for ProcedureError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors)
    }
}

impl From<ProcedureError> for ProblemResponse {
    fn from(err: ProcedureError) -> Self {
        match err {
            ProcedureError::Validation(errors) => ProblemResponse::new(
                StatusCode::BAD_REQUEST,
                "validation_failed",
                errors.first_message().unwrap_or("invalid input"),
            )
            .with_errors(errors.errors()),
            ProcedureError::InvalidJson(detail) => {
                ProblemResponse::new(StatusCode::BAD_REQUEST, "invalid_json", detail)
            }
            ProcedureError::Storage(_) => ProblemResponse::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "failed to process the request",
            ),
        }
    }
}

type ProcedureResult = Result<Json<Vec<Candidate>>, ProblemResponse>;

#[derive(Debug, Default, Deserialize)]
pub struct GetOneQuery {
    #[serde(default)]
    id: Option<String>,
}

pub async fn get_many(State(state): State<AppState>) -> ProcedureResult {
    let start = Instant::now();
    let result = state
        .storage()
        .candidates()
        .list_all()
        .await
        .map_err(ProcedureError::from);
    finish(GET_MANY, start, result)
}

pub async fn get_one(
    State(state): State<AppState>,
    query: Result<Query<GetOneQuery>, QueryRejection>,
) -> ProcedureResult {
    let start = Instant::now();
    let result = match query {
        Ok(Query(query)) => run_get_one(&state, query).await,
        Err(rejection) => Err(ProcedureError::Validation(ValidationErrors::single(
            "id",
            FieldErrorCode::InvalidType,
            rejection.body_text(),
        ))),
    };
    finish(GET_ONE, start, result)
}

pub async fn create(
    State(state): State<AppState>,
    RequireSession(session): RequireSession,
    body: Bytes,
) -> ProcedureResult {
    let start = Instant::now();
    let result = run_create(&state, &session.user.id, &body).await;
    finish(CREATE, start, result)
}

pub async fn update(
    State(state): State<AppState>,
    RequireSession(session): RequireSession,
    body: Bytes,
) -> ProcedureResult {
    let start = Instant::now();
    let result = run_update(&state, &session.user.id, &body).await;
    finish(UPDATE, start, result)
}

pub async fn delete(
    State(state): State<AppState>,
    RequireSession(session): RequireSession,
    body: Bytes,
) -> ProcedureResult {
    let start = Instant::now();
    let result = run_delete(&state, &session.user.id, &body).await;
    finish(DELETE, start, result)
}

async fn run_get_one(state: &AppState, query: GetOneQuery) -> Result<Vec<Candidate>, ProcedureError> {
    let input = CandidateIdInput {
        id: query
            .id
            .map_or(Field::Missing, |id| Field::Present(Value::String(id))),
    };
    let id = input.validate()?;
    let found = state.storage().candidates().fetch_one(&id).await?;
    Ok(found.into_iter().collect())
}

async fn run_create(
    state: &AppState,
    user_id: &str,
    body: &[u8],
) -> Result<Vec<Candidate>, ProcedureError> {
    let input: CreateCandidateInput = parse_body(body)?;
    let candidate = input.validate()?;
    let created = state
        .storage()
        .candidates()
        .insert(user_id, &candidate, state.now())
        .await?;
    counter!("candidates_mutations_total", "kind" => "create").increment(1);
    info!(stage = "rpc", procedure = CREATE, candidate_id = %created.id, user_id, "candidate created");
    Ok(vec![created])
}

async fn run_update(
    state: &AppState,
    user_id: &str,
    body: &[u8],
) -> Result<Vec<Candidate>, ProcedureError> {
    let request: UpdateCandidateRequest = parse_body(body)?;
    let (id, patch) = request.validate()?;
    let updated = state
        .storage()
        .candidates()
        .update(&id, &patch, state.now())
        .await?;
    if updated.is_some() {
        counter!("candidates_mutations_total", "kind" => "update").increment(1);
        info!(stage = "rpc", procedure = UPDATE, candidate_id = %id, user_id, "candidate updated");
    } else {
        info!(stage = "rpc", procedure = UPDATE, candidate_id = %id, user_id, "update target not found");
    }
    Ok(updated.into_iter().collect())
}

async fn run_delete(
    state: &AppState,
    user_id: &str,
    body: &[u8],
) -> Result<Vec<Candidate>, ProcedureError> {
    let input: CandidateIdInput = parse_body(body)?;
    let id = input.validate()?;
    let deleted = state.storage().candidates().delete(&id).await?;
    if deleted.is_some() {
        counter!("candidates_mutations_total", "kind" => "delete").increment(1);
        info!(stage = "rpc", procedure = DELETE, candidate_id = %id, user_id, "candidate deleted");
    } else {
        info!(stage = "rpc", procedure = DELETE, candidate_id = %id, user_id, "delete target not found");
    }
    Ok(deleted.into_iter().collect())
}

/// Parses a JSON body into a raw input struct. Syntax errors are `invalid_json`; a
/// well-formed body that is not an object is reported as a validation failure.
fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, ProcedureError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|err| ProcedureError::InvalidJson(err.to_string()))?;
    if !value.is_object() {
        return Err(ProcedureError::Validation(ValidationErrors::single(
            "input",
            FieldErrorCode::InvalidType,
            format!("Expected object, received {}", json_kind(&value)),
        )));
    }
    serde_json::from_value(value).map_err(|err| {
        ProcedureError::Validation(ValidationErrors::single(
            "input",
            FieldErrorCode::InvalidType,
            err.to_string(),
        ))
    })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn finish(
    procedure: &'static str,
    start: Instant,
    result: Result<Vec<Candidate>, ProcedureError>,
) -> ProcedureResult {
    histogram!("rpc_latency_seconds", "procedure" => procedure)
        .record(start.elapsed().as_secs_f64());

    match result {
        Ok(rows) => {
            counter!("rpc_requests_total", "procedure" => procedure, "result" => "ok").increment(1);
            Ok(Json(rows))
        }
        Err(err) => {
            counter!("rpc_requests_total", "procedure" => procedure, "result" => err.result_label())
                .increment(1);
            match &err {
                ProcedureError::Storage(source) => {
                    error!(stage = "rpc", procedure, error = %source, "procedure failed");
                }
                other => {
                    warn!(stage = "rpc", procedure, error = %other, "procedure input rejected");
                }
            }
            Err(err.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::auth::SessionUser;
    use crate::router::{app_router, tests::setup_state};
    use axum::{body::Body, http::Request, Router};
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use http_body_util::BodyExt;
    use serde_json::json;
    use tower::ServiceExt;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    struct Harness {
        app: Router,
        token: String,
    }

    async fn harness() -> Harness {
        let state = setup_state()
            .await
            .with_clock(Arc::new(fixed_now));
        let token = state
            .sessions()
            .issue(&SessionUser::new("user-1"), fixed_now() + Duration::hours(1))
            .expect("issue token");
        Harness {
            app: app_router(state),
            token,
        }
    }

    fn payload() -> Value {
        json!({
            "firstName": "John",
            "lastName": "Doe",
            "email": "jdoe@example.com",
            "phone": "+1 555 0100",
            "title": "Backend Engineer",
            "experience": 5,
            "location": "NYC",
            "status": "active",
            "skills": "Rust, SQL"
        })
    }

    impl Harness {
        async fn call(&self, request: Request<Body>) -> (StatusCode, Value) {
            let response = self
                .app
                .clone()
                .oneshot(request)
                .await
                .expect("handler should respond");
            let status = response.status();
            let bytes = response
                .into_body()
                .collect()
                .await
                .expect("body should read")
                .to_bytes();
            let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
            (status, body)
        }

        async fn post(&self, procedure: &str, body: &str, authenticated: bool) -> (StatusCode, Value) {
            let mut builder = Request::builder()
                .method("POST")
                .uri(format!("/rpc/{procedure}"))
                .header("content-type", "application/json");
            if authenticated {
                builder = builder.header("authorization", format!("Bearer {}", self.token));
            }
            self.call(builder.body(Body::from(body.to_string())).unwrap())
                .await
        }

        async fn get(&self, path: &str) -> (StatusCode, Value) {
            self.call(Request::builder().uri(path).body(Body::empty()).unwrap())
                .await
        }

        async fn create(&self, body: Value) -> Value {
            let (status, rows) = self.post(CREATE, &body.to_string(), true).await;
            assert_eq!(status, StatusCode::OK, "create failed: {rows}");
            rows[0].clone()
        }
    }

    #[tokio::test]
    async fn get_many_starts_empty() {
        let harness = harness().await;
        let (status, body) = harness.get("/rpc/candidates.getMany").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn create_assigns_fresh_id_and_caller_as_owner() {
        let harness = harness().await;
        let first = harness.create(payload()).await;
        let second = harness.create(payload()).await;

        assert_ne!(first["id"], second["id"]);
        assert_eq!(first["userId"], json!("user-1"));
        assert_eq!(first["firstName"], json!("John"));
        assert_eq!(first["status"], json!("active"));
        assert_eq!(first["appliedAt"], first["createdAt"]);

        let (_, all) = harness.get("/rpc/candidates.getMany").await;
        assert_eq!(all.as_array().map(Vec::len), Some(2));
    }

    #[tokio::test]
    async fn mutations_without_session_are_rejected() {
        let harness = harness().await;

        let (status, body) = harness.post(CREATE, &payload().to_string(), false).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["type"], json!("unauthenticated"));

        let (_, all) = harness.get("/rpc/candidates.getMany").await;
        assert_eq!(all, json!([]));
    }

    #[tokio::test]
    async fn unauthenticated_update_and_delete_leave_row_untouched() {
        let harness = harness().await;
        let created = harness.create(payload()).await;
        let id = created["id"].as_str().expect("id").to_string();

        let (status, body) = harness
            .post(
                UPDATE,
                &json!({"id": id, "data": {"title": "Staff Engineer"}}).to_string(),
                false,
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["type"], json!("unauthenticated"));

        let (status, body) = harness
            .post(DELETE, &json!({"id": id}).to_string(), false)
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["type"], json!("unauthenticated"));

        let (status, rows) = harness.get(&format!("/rpc/candidates.getOne?id={id}")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(rows, json!([created]));
    }

    #[tokio::test]
    async fn expired_session_is_rejected() {
        let state = setup_state()
            .await
            .with_clock(Arc::new(fixed_now));
        let stale = state
            .sessions()
            .issue(&SessionUser::new("user-1"), fixed_now() - Duration::minutes(1))
            .expect("issue token");
        let harness = Harness {
            app: app_router(state),
            token: stale,
        };

        let (status, _) = harness.post(CREATE, &payload().to_string(), true).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn experience_bounds_are_enforced() {
        let harness = harness().await;

        for (years, code) in [(51, "too_big"), (-1, "too_small")] {
            let mut body = payload();
            body["experience"] = json!(years);
            let (status, problem) = harness.post(CREATE, &body.to_string(), true).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(problem["type"], json!("validation_failed"));
            assert_eq!(problem["errors"][0]["field"], json!("experience"));
            assert_eq!(problem["errors"][0]["code"], json!(code));
        }

        let mut body = payload();
        body["experience"] = json!(50);
        let created = harness.create(body).await;
        assert_eq!(created["experience"], json!(50));
    }

    #[tokio::test]
    async fn validation_reports_every_field() {
        let harness = harness().await;
        let (status, problem) = harness
            .post(
                CREATE,
                &json!({"firstName": "", "email": "not-an-email"}).to_string(),
                true,
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let fields: Vec<_> = problem["errors"]
            .as_array()
            .expect("errors array")
            .iter()
            .map(|error| error["field"].as_str().unwrap_or_default().to_string())
            .collect();
        for field in ["firstName", "lastName", "email", "title", "experience", "location", "status"] {
            assert!(fields.iter().any(|f| f == field), "missing error for {field}");
        }
    }

    #[tokio::test]
    async fn malformed_json_is_rejected() {
        let harness = harness().await;
        let (status, problem) = harness.post(CREATE, "{not json", true).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(problem["type"], json!("invalid_json"));

        let (status, problem) = harness.post(CREATE, "[1, 2]", true).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(problem["type"], json!("validation_failed"));
    }

    #[tokio::test]
    async fn update_leaves_absent_fields_unchanged() {
        let harness = harness().await;
        let created = harness.create(payload()).await;
        let id = created["id"].as_str().expect("id").to_string();

        let (status, rows) = harness
            .post(
                UPDATE,
                &json!({"id": id, "data": {"title": "Staff Engineer", "skills": null}}).to_string(),
                true,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        let updated = &rows[0];
        assert_eq!(updated["title"], json!("Staff Engineer"));
        assert_eq!(updated["skills"], json!(null));
        for key in ["firstName", "lastName", "email", "phone", "experience", "location", "status", "createdAt", "userId"] {
            assert_eq!(updated[key], created[key], "{key} changed");
        }

        let created_at: DateTime<Utc> =
            serde_json::from_value(updated["createdAt"].clone()).expect("createdAt");
        let updated_at: DateTime<Utc> =
            serde_json::from_value(updated["updatedAt"].clone()).expect("updatedAt");
        assert!(created_at <= updated_at);
    }

    #[tokio::test]
    async fn update_rejects_invalid_patch() {
        let harness = harness().await;
        let created = harness.create(payload()).await;

        let (status, problem) = harness
            .post(
                UPDATE,
                &json!({"id": created["id"], "data": {"status": "hired"}}).to_string(),
                true,
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(problem["errors"][0]["field"], json!("status"));

        let (_, rows) = harness
            .get(&format!("/rpc/candidates.getOne?id={}", created["id"].as_str().unwrap()))
            .await;
        assert_eq!(rows[0]["status"], json!("active"));
    }

    #[tokio::test]
    async fn unknown_ids_yield_empty_arrays() {
        let harness = harness().await;

        let (status, rows) = harness.get("/rpc/candidates.getOne?id=missing").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(rows, json!([]));

        let (status, rows) = harness
            .post(UPDATE, &json!({"id": "missing", "data": {"title": "X"}}).to_string(), true)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(rows, json!([]));

        let (status, rows) = harness
            .post(DELETE, &json!({"id": "missing"}).to_string(), true)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(rows, json!([]));
    }

    #[tokio::test]
    async fn get_one_requires_id() {
        let harness = harness().await;
        let (status, problem) = harness.get("/rpc/candidates.getOne").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(problem["errors"][0]["field"], json!("id"));
    }

    #[tokio::test]
    async fn get_one_with_malformed_query_returns_problem() {
        let harness = harness().await;
        let response = harness
            .app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/rpc/candidates.getOne?id=a&id=b")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .expect("handler should respond");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.headers().get("content-type").unwrap(),
            "application/problem+json"
        );

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let problem: Value = serde_json::from_slice(&bytes).expect("problem body");
        assert_eq!(problem["type"], json!("validation_failed"));
        assert_eq!(problem["errors"][0]["field"], json!("id"));
        assert_eq!(problem["errors"][0]["code"], json!("invalid_type"));
    }

    #[tokio::test]
    async fn delete_then_get_one_is_empty() {
        let harness = harness().await;
        let created = harness.create(payload()).await;
        let id = created["id"].as_str().expect("id").to_string();

        let (_, rows) = harness.get(&format!("/rpc/candidates.getOne?id={id}")).await;
        assert_eq!(rows[0]["id"], json!(id));

        let (status, rows) = harness
            .post(DELETE, &json!({"id": id}).to_string(), true)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(rows[0]["id"], json!(id));

        let (_, rows) = harness.get(&format!("/rpc/candidates.getOne?id={id}")).await;
        assert_eq!(rows, json!([]));
    }
}
