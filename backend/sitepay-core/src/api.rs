// src/api.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::balance::{ledger, EmployeeLedger};
use crate::clock::Clock;
use crate::models::PayrollRun;
use crate::payment_editor::Selection;
use crate::run_controller::{DraftView, RunConfirmation, RunController, RunError};
use crate::store::{PayrollStore, StoreError};

// --- State ---

pub struct PayrollSession {
    pub controller: RunController,
    pub store: Box<dyn PayrollStore>,
}

#[derive(Clone)]
pub struct AppState {
    pub session: Arc<Mutex<PayrollSession>>,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    pub fn new(controller: RunController, store: Box<dyn PayrollStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            session: Arc::new(Mutex::new(PayrollSession { controller, store })),
            clock,
        }
    }
}

// --- Errors ---

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Run(#[from] RunError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("No payment for employee {0} in the open draft")]
    PaymentNotFound(String),

    #[error("Employee {employee_id} has no deduction at index {index}")]
    DeductionNotFound { employee_id: String, index: usize },

    #[error("Employee not found: {0}")]
    EmployeeNotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),
}

fn store_status(err: &StoreError) -> StatusCode {
    match err {
        StoreError::RunNotFound { .. } => StatusCode::NOT_FOUND,
        StoreError::RunAlreadyPaid { .. } => StatusCode::CONFLICT,
        StoreError::Io { .. } | StoreError::Json(_) | StoreError::InvalidEmployee { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Run(run_err) => match run_err {
                RunError::EmptyDraft { .. }
                | RunError::NoActiveDraft
                | RunError::WeekPinned { .. }
                | RunError::RunAlreadyPaid { .. } => StatusCode::CONFLICT,
                RunError::Edit(_) | RunError::WeekOutOfRange(_) => StatusCode::BAD_REQUEST,
                RunError::Store(store_err) => store_status(store_err),
            },
            ApiError::Store(store_err) => store_status(store_err),
            ApiError::PaymentNotFound(_)
            | ApiError::DeductionNotFound { .. }
            | ApiError::EmployeeNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Error occurred: {:?}", self);
        } else {
            info!("Request rejected: Status={}, Reason={}", status, self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

// --- Requests ---

#[derive(Debug, Deserialize)]
pub struct SelectWeekRequest {
    pub week: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct ShiftWeekRequest {
    pub weeks: i64,
}

#[derive(Debug, Deserialize)]
pub struct PaidAmountRequest {
    pub amount: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddDeductionRequest {
    pub employee_ids: Selection,
    pub description: String,
    pub amount: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingBalanceRequest {
    pub employee_ids: Selection,
    pub amount: Decimal,
}

// --- Router ---

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route(
            "/api/payroll/draft",
            get(handle_get_draft).delete(handle_discard_draft),
        )
        .route("/api/payroll/draft/week", post(handle_select_week))
        .route("/api/payroll/draft/week/shift", post(handle_shift_week))
        .route(
            "/api/payroll/draft/payments/{employee_id}/paid-amount",
            put(handle_set_paid_amount),
        )
        .route(
            "/api/payroll/draft/payments/{employee_id}/deductions/{index}",
            delete(handle_remove_deduction),
        )
        .route("/api/payroll/draft/deductions", post(handle_add_deduction))
        .route(
            "/api/payroll/draft/pending-balance",
            post(handle_add_pending_balance),
        )
        .route("/api/payroll/draft/confirm", post(handle_confirm))
        .route("/api/payroll/runs", get(handle_list_runs))
        .route("/api/payroll/runs/{id}", get(handle_get_run))
        .route("/api/payroll/runs/{id}/edit", post(handle_edit_run))
        .route("/api/payroll/runs/{id}/paid", post(handle_mark_paid))
        .route(
            "/api/employees/{employee_id}/ledger",
            get(handle_employee_ledger),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// --- Handlers ---

async fn handle_health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn handle_get_draft(State(state): State<AppState>) -> Json<DraftView> {
    let session = state.session.lock().await;
    Json(session.controller.view())
}

async fn handle_discard_draft(State(state): State<AppState>) -> Json<DraftView> {
    let mut session = state.session.lock().await;
    session.controller.discard();
    Json(session.controller.view())
}

async fn handle_select_week(
    State(state): State<AppState>,
    Json(request): Json<SelectWeekRequest>,
) -> Result<Json<DraftView>, ApiError> {
    info!("Selecting payroll week: Date={}", request.week);
    let mut guard = state.session.lock().await;
    let session = &mut *guard;
    let time_logs = session.store.time_logs()?;
    let employees = session.store.employees()?;
    session
        .controller
        .select_week(request.week, &time_logs, &employees)?;
    Ok(Json(session.controller.view()))
}

async fn handle_shift_week(
    State(state): State<AppState>,
    Json(request): Json<ShiftWeekRequest>,
) -> Result<Json<DraftView>, ApiError> {
    let mut guard = state.session.lock().await;
    let session = &mut *guard;
    let time_logs = session.store.time_logs()?;
    let employees = session.store.employees()?;
    session
        .controller
        .shift_week(request.weeks, &time_logs, &employees)?;
    Ok(Json(session.controller.view()))
}

async fn handle_set_paid_amount(
    State(state): State<AppState>,
    Path(employee_id): Path<String>,
    Json(request): Json<PaidAmountRequest>,
) -> Result<Json<DraftView>, ApiError> {
    let mut session = state.session.lock().await;
    if !session
        .controller
        .editor()?
        .set_paid_amount(&employee_id, request.amount)
    {
        return Err(ApiError::PaymentNotFound(employee_id));
    }
    Ok(Json(session.controller.view()))
}

async fn handle_add_deduction(
    State(state): State<AppState>,
    Json(request): Json<AddDeductionRequest>,
) -> Result<Json<DraftView>, ApiError> {
    if request.description.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "Deduction description must not be empty".to_string(),
        ));
    }
    let mut session = state.session.lock().await;
    let changed = session
        .controller
        .editor()?
        .add_deduction(&request.employee_ids, &request.description, request.amount)
        .map_err(RunError::from)?;
    if changed == 0 {
        return Err(ApiError::BadRequest(
            "No selected employee has a payment in the draft".to_string(),
        ));
    }
    Ok(Json(session.controller.view()))
}

async fn handle_add_pending_balance(
    State(state): State<AppState>,
    Json(request): Json<PendingBalanceRequest>,
) -> Result<Json<DraftView>, ApiError> {
    let mut session = state.session.lock().await;
    let changed = session
        .controller
        .editor()?
        .add_pending_balance(&request.employee_ids, request.amount)
        .map_err(RunError::from)?;
    if changed == 0 {
        return Err(ApiError::BadRequest(
            "No selected employee has a payment in the draft".to_string(),
        ));
    }
    Ok(Json(session.controller.view()))
}

async fn handle_remove_deduction(
    State(state): State<AppState>,
    Path((employee_id, index)): Path<(String, usize)>,
) -> Result<Json<DraftView>, ApiError> {
    let mut session = state.session.lock().await;
    let editor = session.controller.editor()?;
    if editor.payment(&employee_id).is_none() {
        return Err(ApiError::PaymentNotFound(employee_id));
    }
    if !editor.remove_deduction(&employee_id, index) {
        return Err(ApiError::DeductionNotFound { employee_id, index });
    }
    Ok(Json(session.controller.view()))
}

async fn handle_confirm(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<RunConfirmation>), ApiError> {
    let mut guard = state.session.lock().await;
    let session = &mut *guard;
    let confirmation = session
        .controller
        .confirm(session.store.as_mut(), state.clock.as_ref())?;
    Ok((StatusCode::CREATED, Json(confirmation)))
}

async fn handle_list_runs(State(state): State<AppState>) -> Result<Json<Vec<PayrollRun>>, ApiError> {
    let session = state.session.lock().await;
    let mut runs = session.store.runs()?;
    runs.sort_by(|a, b| {
        b.week_start_date
            .cmp(&a.week_start_date)
            .then(b.processing_date.cmp(&a.processing_date))
    });
    Ok(Json(runs))
}

async fn handle_get_run(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PayrollRun>, ApiError> {
    let session = state.session.lock().await;
    Ok(Json(session.store.run(&id)?))
}

async fn handle_edit_run(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DraftView>, ApiError> {
    let mut session = state.session.lock().await;
    let run = session.store.run(&id)?;
    session.controller.edit_run(run)?;
    Ok(Json(session.controller.view()))
}

async fn handle_mark_paid(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PayrollRun>, ApiError> {
    let mut session = state.session.lock().await;
    let run = session.store.mark_run_paid(&id)?;
    session.controller.observe_paid(&id);
    Ok(Json(run))
}

async fn handle_employee_ledger(
    State(state): State<AppState>,
    Path(employee_id): Path<String>,
) -> Result<Json<EmployeeLedger>, ApiError> {
    let session = state.session.lock().await;
    let employee = session
        .store
        .employees()?
        .into_iter()
        .find(|e| e.id == employee_id)
        .ok_or(ApiError::EmployeeNotFound(employee_id))?;
    Ok(Json(ledger(&employee)))
}
