use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::error::AppError;
use crate::outcome::MetricKey;
use crate::server::AppState;
use crate::webhook::events::{ClassificationResponse, ConfirmRequest, ErrorResponse, ExecutionEvent};
use crate::webhook::signature::{verify_signature, SIGNATURE_HEADER};

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

/// Status for an error no handler arm deals with specifically.
fn error_status(e: &AppError) -> StatusCode {
    match e {
        AppError::InvalidInput(_) => StatusCode::UNPROCESSABLE_ENTITY,
        AppError::NotFound(_) => StatusCode::NOT_FOUND,
        e if e.is_recoverable() => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Reject the request unless it carries a valid signature over `body`.
fn authorize(state: &AppState, headers: &HeaderMap, body: &[u8]) -> Result<(), Response> {
    let signature = match headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok()) {
        Some(sig) => sig,
        None => {
            tracing::warn!("Missing X-Signature-256 header");
            return Err(StatusCode::UNAUTHORIZED.into_response());
        }
    };

    if let Err(e) = verify_signature(state.config.webhook_secret(), body, signature) {
        tracing::warn!(error = %e, "Request signature verification failed");
        return Err(StatusCode::UNAUTHORIZED.into_response());
    }

    Ok(())
}

/// `POST /webhooks/executions`: classify a finished execution.
pub async fn handle_execution(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Err(rejection) = authorize(&state, &headers, &body) {
        return rejection;
    }

    let event = match ExecutionEvent::parse(&body) {
        Ok(event) => event,
        Err(e) => {
            tracing::error!(error = %e, "Failed to parse execution event");
            return error_response(StatusCode::BAD_REQUEST, e.to_string());
        }
    };

    let execution_id = event.execution_id.clone();
    let company_id = event.company_id.clone();
    tracing::info!(execution_id = %execution_id, company_id = ?company_id, "Received execution");

    match state
        .classifier
        .classify_execution(&execution_id, event.into_summary(), company_id.as_deref())
        .await
    {
        Ok(result) => {
            (StatusCode::OK, Json(ClassificationResponse::new(execution_id, result))).into_response()
        }
        Err(e) => {
            let status = error_status(&e);
            if status.is_server_error() {
                tracing::error!(execution_id = %execution_id, error = %e, "Classification failed");
            }
            error_response(status, e.to_string())
        }
    }
}

/// `POST /executions/{id}/confirm`: record a human's chosen outcome.
pub async fn handle_confirm(
    State(state): State<Arc<AppState>>,
    Path(execution_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Err(rejection) = authorize(&state, &headers, &body) {
        return rejection;
    }

    let request: ConfirmRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            tracing::error!(error = %e, "Failed to parse confirmation");
            return error_response(StatusCode::BAD_REQUEST, e.to_string());
        }
    };

    let metric_key: MetricKey = match request.metric_key.parse() {
        Ok(key) => key,
        Err(e) => return error_response(StatusCode::UNPROCESSABLE_ENTITY, e.to_string()),
    };

    let outcome = state
        .classifier
        .confirm(
            &execution_id,
            metric_key,
            request.custom_description.as_deref(),
            request.company_id.as_deref(),
        )
        .await;

    match outcome {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        // The confirmation is stored; only the learned description is missing.
        Err(AppError::ExternalServiceUnavailable(message)) => {
            error_response(StatusCode::ACCEPTED, message)
        }
        Err(e) => {
            let status = error_status(&e);
            if status.is_server_error() {
                tracing::error!(execution_id = %execution_id, error = %e, "Confirmation failed");
            }
            error_response(status, e.to_string())
        }
    }
}

/// `GET /executions/{id}`: the stored classification and any confirmation.
///
/// There is no body, so the signature covers the request path.
pub async fn get_execution(
    State(state): State<Arc<AppState>>,
    Path(execution_id): Path<String>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    if let Err(rejection) = authorize(&state, &headers, uri.path().as_bytes()) {
        return rejection;
    }

    match state.classifier.executions().get(&execution_id).await {
        Some(record) => Json(record).into_response(),
        None => error_response(StatusCode::NOT_FOUND, format!("execution {execution_id}")),
    }
}
