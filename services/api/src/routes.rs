use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use trustlend_engine::engine::{ParameterChanges, Role};

use crate::infra::{AppState, DecisionLog, LoanRepository, RepositoryError, UserDirectory};
use crate::loans::{CreateLoanRequest, LoanService, LoanServiceError};

#[derive(Debug, Deserialize)]
pub(crate) struct RegisterUserRequest {
    pub(crate) id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EndorseRequest {
    pub(crate) supporter_id: String,
    pub(crate) stake_amount_micro: i64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PaymentRequest {
    pub(crate) amount_micro: i64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LiquidationRequest {
    pub(crate) mutual_fund_available_micro: i64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ParameterProposalRequest {
    pub(crate) proposer_id: String,
    pub(crate) proposer_role: Role,
    pub(crate) changes: ParameterChanges,
}

impl IntoResponse for LoanServiceError {
    fn into_response(self) -> Response {
        let status = match &self {
            LoanServiceError::LoanNotFound(_) => StatusCode::NOT_FOUND,
            LoanServiceError::DuplicateLoan(_) | LoanServiceError::DuplicateEndorsement(_) => {
                StatusCode::CONFLICT
            }
            LoanServiceError::Engine(_) | LoanServiceError::NonPositiveStake(_) => {
                StatusCode::BAD_REQUEST
            }
            LoanServiceError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
            LoanServiceError::Repository(RepositoryError::Conflict) => StatusCode::CONFLICT,
            LoanServiceError::InvalidState { .. }
            | LoanServiceError::OverCreditLimit { .. }
            | LoanServiceError::InsufficientCoverage { .. }
            | LoanServiceError::UnderReview(_)
            | LoanServiceError::SelfEndorsement
            | LoanServiceError::NothingOverdue(_) => StatusCode::UNPROCESSABLE_ENTITY,
        };
        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

pub(crate) fn loan_router<R, U, D>(service: Arc<LoanService<R, U, D>>) -> Router
where
    R: LoanRepository + 'static,
    U: UserDirectory + 'static,
    D: DecisionLog + 'static,
{
    Router::new()
        .route("/api/v1/users", post(register_user_handler::<R, U, D>))
        .route("/api/v1/loans", post(create_loan_handler::<R, U, D>))
        .route("/api/v1/loans/:loan_id", get(get_loan_handler::<R, U, D>))
        .route(
            "/api/v1/loans/:loan_id/endorsements",
            post(endorse_handler::<R, U, D>),
        )
        .route(
            "/api/v1/loans/:loan_id/approval",
            post(approve_handler::<R, U, D>),
        )
        .route(
            "/api/v1/loans/:loan_id/payments",
            post(payment_handler::<R, U, D>),
        )
        .route(
            "/api/v1/loans/:loan_id/late-check",
            post(late_check_handler::<R, U, D>),
        )
        .route(
            "/api/v1/loans/:loan_id/default",
            post(default_handler::<R, U, D>),
        )
        .route(
            "/api/v1/loans/:loan_id/liquidation",
            post(liquidation_handler::<R, U, D>),
        )
        .route(
            "/api/v1/loans/:loan_id/decisions",
            get(decisions_handler::<R, U, D>),
        )
        .route(
            "/api/v1/parameters",
            get(parameters_handler::<R, U, D>).post(propose_parameters_handler::<R, U, D>),
        )
        .with_state(service)
}

pub(crate) fn with_loan_routes<R, U, D>(service: Arc<LoanService<R, U, D>>) -> Router
where
    R: LoanRepository + 'static,
    U: UserDirectory + 'static,
    D: DecisionLog + 'static,
{
    loan_router(service)
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

async fn register_user_handler<R, U, D>(
    State(service): State<Arc<LoanService<R, U, D>>>,
    Json(payload): Json<RegisterUserRequest>,
) -> Result<Response, LoanServiceError>
where
    R: LoanRepository + 'static,
    U: UserDirectory + 'static,
    D: DecisionLog + 'static,
{
    let user = service.register_user(&payload.id, Utc::now())?;
    Ok((StatusCode::CREATED, Json(user)).into_response())
}

async fn create_loan_handler<R, U, D>(
    State(service): State<Arc<LoanService<R, U, D>>>,
    Json(payload): Json<CreateLoanRequest>,
) -> Result<Response, LoanServiceError>
where
    R: LoanRepository + 'static,
    U: UserDirectory + 'static,
    D: DecisionLog + 'static,
{
    let record = service.create_loan(payload, Utc::now())?;
    Ok((StatusCode::CREATED, Json(record)).into_response())
}

async fn get_loan_handler<R, U, D>(
    State(service): State<Arc<LoanService<R, U, D>>>,
    Path(loan_id): Path<String>,
) -> Result<Response, LoanServiceError>
where
    R: LoanRepository + 'static,
    U: UserDirectory + 'static,
    D: DecisionLog + 'static,
{
    let record = service.get(&loan_id)?;
    Ok(Json(record).into_response())
}

async fn endorse_handler<R, U, D>(
    State(service): State<Arc<LoanService<R, U, D>>>,
    Path(loan_id): Path<String>,
    Json(payload): Json<EndorseRequest>,
) -> Result<Response, LoanServiceError>
where
    R: LoanRepository + 'static,
    U: UserDirectory + 'static,
    D: DecisionLog + 'static,
{
    let outcome = service.endorse(
        &loan_id,
        &payload.supporter_id,
        payload.stake_amount_micro,
        Utc::now(),
    )?;
    Ok(Json(outcome).into_response())
}

async fn approve_handler<R, U, D>(
    State(service): State<Arc<LoanService<R, U, D>>>,
    Path(loan_id): Path<String>,
) -> Result<Response, LoanServiceError>
where
    R: LoanRepository + 'static,
    U: UserDirectory + 'static,
    D: DecisionLog + 'static,
{
    let record = service.approve(&loan_id, Utc::now())?;
    Ok(Json(record).into_response())
}

async fn payment_handler<R, U, D>(
    State(service): State<Arc<LoanService<R, U, D>>>,
    Path(loan_id): Path<String>,
    Json(payload): Json<PaymentRequest>,
) -> Result<Response, LoanServiceError>
where
    R: LoanRepository + 'static,
    U: UserDirectory + 'static,
    D: DecisionLog + 'static,
{
    let summary = service.repay(&loan_id, payload.amount_micro, Utc::now())?;
    Ok(Json(summary).into_response())
}

async fn late_check_handler<R, U, D>(
    State(service): State<Arc<LoanService<R, U, D>>>,
    Path(loan_id): Path<String>,
) -> Result<Response, LoanServiceError>
where
    R: LoanRepository + 'static,
    U: UserDirectory + 'static,
    D: DecisionLog + 'static,
{
    let record = service.refresh_late(&loan_id, Utc::now())?;
    Ok(Json(record).into_response())
}

async fn default_handler<R, U, D>(
    State(service): State<Arc<LoanService<R, U, D>>>,
    Path(loan_id): Path<String>,
) -> Result<Response, LoanServiceError>
where
    R: LoanRepository + 'static,
    U: UserDirectory + 'static,
    D: DecisionLog + 'static,
{
    let record = service.mark_default(&loan_id, Utc::now())?;
    Ok(Json(record).into_response())
}

async fn liquidation_handler<R, U, D>(
    State(service): State<Arc<LoanService<R, U, D>>>,
    Path(loan_id): Path<String>,
    Json(payload): Json<LiquidationRequest>,
) -> Result<Response, LoanServiceError>
where
    R: LoanRepository + 'static,
    U: UserDirectory + 'static,
    D: DecisionLog + 'static,
{
    let summary =
        service.liquidate(&loan_id, payload.mutual_fund_available_micro, Utc::now())?;
    Ok(Json(summary).into_response())
}

async fn decisions_handler<R, U, D>(
    State(service): State<Arc<LoanService<R, U, D>>>,
    Path(loan_id): Path<String>,
) -> Result<Response, LoanServiceError>
where
    R: LoanRepository + 'static,
    U: UserDirectory + 'static,
    D: DecisionLog + 'static,
{
    let decisions = service.decisions(&loan_id)?;
    Ok(Json(decisions).into_response())
}

async fn parameters_handler<R, U, D>(
    State(service): State<Arc<LoanService<R, U, D>>>,
) -> Response
where
    R: LoanRepository + 'static,
    U: UserDirectory + 'static,
    D: DecisionLog + 'static,
{
    Json(service.active_parameters(Utc::now())).into_response()
}

/// Proposals never error; rejections come back in the outcome body.
async fn propose_parameters_handler<R, U, D>(
    State(service): State<Arc<LoanService<R, U, D>>>,
    Json(payload): Json<ParameterProposalRequest>,
) -> Result<Response, LoanServiceError>
where
    R: LoanRepository + 'static,
    U: UserDirectory + 'static,
    D: DecisionLog + 'static,
{
    let outcome = service.propose_parameters(
        &payload.changes,
        payload.proposer_role,
        &payload.proposer_id,
        Utc::now(),
    )?;
    Ok(Json(outcome).into_response())
}
