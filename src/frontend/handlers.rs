use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use tracing::{debug, warn};

use crate::error::{ReplyStatus, SchedulerError};
use crate::types::{OrderId, Params};

use super::{AppState, CHECK_TIMEOUT, EVICT_TIMEOUT, SUBMIT_TIMEOUT};

/// Minimal HTML error body: `Bad request: <code>:<description> <exception?>`,
/// trailing space before an empty exception string included.
fn bad_request(status: ReplyStatus, exc: impl AsRef<str>) -> Response {
    let body = format!(
        "<html><head><meta charset=\"utf-8\"><title>Bad request</title></head><body><p>Bad request: {}:{} {}</p></body></html>",
        status.http_code(),
        status.description(),
        exc.as_ref(),
    );
    let code = StatusCode::from_u16(status.http_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (code, [("content-type", "text/html")], body).into_response()
}

fn scheduler_error_status(err: SchedulerError) -> ReplyStatus {
    match err {
        SchedulerError::Timeout => ReplyStatus::Timeout,
        SchedulerError::Disconnected => ReplyStatus::RequestFailed,
    }
}

/// `GET /` — dispatches between the start page, a new submission, and a
/// poll/retrieve request based on which query parameters are present.
pub async fn get_root(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if params.is_empty() {
        let body = state.templates.render_start(&state.server_address, state.server_port);
        return (StatusCode::OK, [("content-type", "text/html")], body).into_response();
    }

    if !params.contains_key("orderId") {
        return submit(&state, &headers, params).await;
    }

    retrieve(&state, params).await
}

fn is_gis_agent(headers: &HeaderMap) -> bool {
    headers
        .get("agent")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.contains("gis"))
        .unwrap_or(false)
}

async fn submit(state: &AppState, headers: &HeaderMap, params: HashMap<String, String>) -> Response {
    let gis_agent = is_gis_agent(headers);

    let reply = state
        .scheduler
        .submit(Params::from_map(params), SUBMIT_TIMEOUT)
        .await;

    let ((id, pincode), ok) = match reply {
        Ok(result) => result,
        Err(err) => {
            warn!(%err, "scheduler did not answer SUBMIT in time");
            return bad_request(scheduler_error_status(err), "");
        },
    };

    if !ok {
        return bad_request(ReplyStatus::InvalidParam, "");
    }

    debug!(%id, "submission accepted");

    if gis_agent {
        (
            StatusCode::OK,
            [("content-type", "text/plain")],
            format!("orderId={id}, pincode={pincode}"),
        )
            .into_response()
    } else {
        let body = state.templates.render_order(
            &state.server_address,
            state.server_port,
            id.0,
            &pincode.to_string(),
        );
        (StatusCode::OK, [("content-type", "text/html")], body).into_response()
    }
}

async fn retrieve(state: &AppState, params: HashMap<String, String>) -> Response {
    let Some(pincode) = params.get("pincode") else {
        return bad_request(ReplyStatus::InvalidParam, "");
    };

    // An unparseable orderId is treated as an unexpected protocol failure
    // rather than a validation error, since a well-behaved client always
    // echoes back the integer id it was handed.
    let Ok(raw_id) = params["orderId"].parse::<u64>() else {
        return bad_request(ReplyStatus::RequestFailed, "orderId must be an integer");
    };
    let id = OrderId(raw_id);

    let status = match state.scheduler.check(id, pincode.clone(), CHECK_TIMEOUT).await {
        Ok(status) => status,
        Err(err) => {
            warn!(%err, "scheduler did not answer CHECK in time");
            return bad_request(scheduler_error_status(err), "");
        },
    };

    if status != ReplyStatus::Ready {
        return bad_request(status, "");
    }

    let entry = {
        let buffer = state.buffer.lock().await;
        buffer.pop_by_id(id)
    };

    match entry {
        Some((payload, format)) => {
            (StatusCode::OK, [("content-type", format)], payload).into_response()
        },
        None => {
            warn!(%id, "order ready but missing from buffer");
            bad_request(ReplyStatus::RequestFailed, "artifact missing from buffer")
        },
    }
}

/// `POST /` — the renderer's result upload.
pub async fn post_root(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    if headers.get("content-length").is_none() {
        return bad_request(ReplyStatus::InvalidParam, "missing Content-Length");
    }

    let Some(order_id) = headers
        .get("orderId")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .map(OrderId)
    else {
        return bad_request(ReplyStatus::InvalidParam, "missing or invalid orderId header");
    };

    let Some(format) = headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
    else {
        return bad_request(ReplyStatus::InvalidParam, "missing Content-Type");
    };

    let (status, evicted) = {
        let mut buffer = state.buffer.lock().await;
        buffer.push(order_id, body, format)
    };

    if status != ReplyStatus::Ready {
        return bad_request(status, "Id is busy");
    }

    match state.scheduler.evict(evicted, EVICT_TIMEOUT).await {
        Ok(true) => (StatusCode::OK, "Accepted").into_response(),
        Ok(false) => bad_request(
            ReplyStatus::RequestFailed,
            "Scheduler could not delete previous ids from table",
        ),
        Err(err) => {
            warn!(%err, "scheduler did not acknowledge EVICT in time");
            bad_request(scheduler_error_status(err), "Scheduler did not respond")
        },
    }
}
