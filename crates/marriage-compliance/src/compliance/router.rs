use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::{Local, NaiveDate};
use serde::Deserialize;
use serde_json::json;

use super::domain::{AlertId, CoupleId, FormSubmissionId, OrganizationId, UserId};
use super::report::FormStatusView;
use super::repository::{ComplianceStore, RepositoryError};
use super::service::{ComplianceService, ComplianceServiceError};

#[derive(Debug, Default, Deserialize)]
pub struct InitializeFormsRequest {
    #[serde(default)]
    pub today: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct SubmitFormRequest {
    pub file_ref: String,
    pub submitted_by: String,
}

#[derive(Debug, Deserialize)]
pub struct ValidateFormRequest {
    pub validator_id: String,
    pub is_valid: bool,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResolveAlertRequest {
    pub resolved_by: String,
}

/// Router builder exposing the compliance operations over HTTP.
pub fn compliance_router<S>(service: Arc<ComplianceService<S>>) -> Router
where
    S: ComplianceStore + 'static,
{
    Router::new()
        .route(
            "/api/v1/couples/:couple_id/forms",
            post(initialize_handler::<S>).get(couple_status_handler::<S>),
        )
        .route("/api/v1/forms/:form_id/start", post(start_handler::<S>))
        .route("/api/v1/forms/:form_id/submit", post(submit_handler::<S>))
        .route("/api/v1/forms/:form_id/validate", post(validate_handler::<S>))
        .route(
            "/api/v1/alerts/:alert_id/resolve",
            post(resolve_alert_handler::<S>),
        )
        .route(
            "/api/v1/organizations/:organization_id/dashboard",
            get(dashboard_handler::<S>),
        )
        .route(
            "/api/v1/organizations/:organization_id/alerts",
            get(open_alerts_handler::<S>),
        )
        .with_state(service)
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// HTTP status for a service failure.
pub fn status_for(error: &ComplianceServiceError) -> StatusCode {
    match error {
        ComplianceServiceError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
        ComplianceServiceError::Repository(RepositoryError::Conflict) => StatusCode::CONFLICT,
        ComplianceServiceError::Repository(RepositoryError::Unavailable(_)) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        ComplianceServiceError::Deadline(_) | ComplianceServiceError::Transition(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
    }
}

pub(crate) fn error_response(error: ComplianceServiceError) -> Response {
    let status = status_for(&error);
    let payload = json!({ "error": error.to_string() });
    (status, axum::Json(payload)).into_response()
}

pub(crate) async fn initialize_handler<S>(
    State(service): State<Arc<ComplianceService<S>>>,
    Path(couple_id): Path<String>,
    axum::Json(request): axum::Json<InitializeFormsRequest>,
) -> Response
where
    S: ComplianceStore + 'static,
{
    let today = request.today.unwrap_or_else(today);
    match service.initialize_forms_for_couple(&CoupleId(couple_id), today) {
        Ok(created) => {
            let views: Vec<FormStatusView> = created
                .iter()
                .map(|form| FormStatusView::from_form(form, today))
                .collect();
            (StatusCode::CREATED, axum::Json(views)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn couple_status_handler<S>(
    State(service): State<Arc<ComplianceService<S>>>,
    Path(couple_id): Path<String>,
) -> Response
where
    S: ComplianceStore + 'static,
{
    match service.couple_forms_status(&CoupleId(couple_id), today()) {
        Ok(views) => (StatusCode::OK, axum::Json(views)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn start_handler<S>(
    State(service): State<Arc<ComplianceService<S>>>,
    Path(form_id): Path<String>,
) -> Response
where
    S: ComplianceStore + 'static,
{
    match service.start_form(&FormSubmissionId(form_id)) {
        Ok(form) => (
            StatusCode::OK,
            axum::Json(FormStatusView::from_form(&form, today())),
        )
            .into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn submit_handler<S>(
    State(service): State<Arc<ComplianceService<S>>>,
    Path(form_id): Path<String>,
    axum::Json(request): axum::Json<SubmitFormRequest>,
) -> Response
where
    S: ComplianceStore + 'static,
{
    match service.submit_form(
        &FormSubmissionId(form_id),
        &request.file_ref,
        &UserId(request.submitted_by),
    ) {
        Ok(form) => (
            StatusCode::OK,
            axum::Json(FormStatusView::from_form(&form, today())),
        )
            .into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn validate_handler<S>(
    State(service): State<Arc<ComplianceService<S>>>,
    Path(form_id): Path<String>,
    axum::Json(request): axum::Json<ValidateFormRequest>,
) -> Response
where
    S: ComplianceStore + 'static,
{
    match service.validate_form(
        &FormSubmissionId(form_id),
        &UserId(request.validator_id),
        request.is_valid,
        request.notes,
    ) {
        Ok(form) => (
            StatusCode::OK,
            axum::Json(FormStatusView::from_form(&form, today())),
        )
            .into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn resolve_alert_handler<S>(
    State(service): State<Arc<ComplianceService<S>>>,
    Path(alert_id): Path<String>,
    axum::Json(request): axum::Json<ResolveAlertRequest>,
) -> Response
where
    S: ComplianceStore + 'static,
{
    match service.resolve_alert(&AlertId(alert_id), &UserId(request.resolved_by)) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn dashboard_handler<S>(
    State(service): State<Arc<ComplianceService<S>>>,
    Path(organization_id): Path<String>,
) -> Response
where
    S: ComplianceStore + 'static,
{
    match service.dashboard(&OrganizationId(organization_id), today()) {
        Ok(dashboard) => (StatusCode::OK, axum::Json(dashboard)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn open_alerts_handler<S>(
    State(service): State<Arc<ComplianceService<S>>>,
    Path(organization_id): Path<String>,
) -> Response
where
    S: ComplianceStore + 'static,
{
    match service.open_alerts(&OrganizationId(organization_id)) {
        Ok(alerts) => (StatusCode::OK, axum::Json(alerts)).into_response(),
        Err(error) => error_response(error),
    }
}
