use std::convert::Infallible;

use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::header::{
    HeaderValue, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, ALLOW, CONTENT_TYPE,
};
use hyper::{Method, Request, Response, StatusCode};
use opswatch_adapters::QueryError;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, error};

use super::AppState;
use crate::data::NarrativeCategory;

const ALLOWED_METHODS: &str = "GET, OPTIONS";

pub async fn handle_request(
    req: Request<Incoming>,
    state: &AppState,
) -> Result<Response<Full<Bytes>>, Infallible> {
    Ok(route(state, req.method(), req.uri().path()).await)
}

/// Dispatch a request to its handler. Every response carries CORS headers.
pub async fn route(state: &AppState, method: &Method, path: &str) -> Response<Full<Bytes>> {
    debug!(%method, path, "request");

    let mut response = if *method == Method::OPTIONS {
        preflight()
    } else if !is_known(path) {
        error_response(StatusCode::NOT_FOUND, &format!("no route for {}", path))
    } else if *method != Method::GET {
        let mut response = error_response(
            StatusCode::METHOD_NOT_ALLOWED,
            &format!("method {} not allowed", method),
        );
        response
            .headers_mut()
            .insert(ALLOW, HeaderValue::from_static(ALLOWED_METHODS));
        response
    } else {
        get(state, path).await
    };

    response
        .headers_mut()
        .insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    response
}

fn is_known(path: &str) -> bool {
    matches!(
        path,
        "/api/metrics"
            | "/api/planning"
            | "/api/analysis"
            | "/api/thresholds"
            | "/api/anomalies"
            | "/health"
            | "/healthz"
    )
}

async fn get(state: &AppState, path: &str) -> Response<Full<Bytes>> {
    match path {
        "/api/metrics" => match live_samples(state).await {
            Ok(samples) => json_response(StatusCode::OK, &samples),
            Err(e) => query_failure(path, e),
        },
        "/api/planning" => narrative(state, path, NarrativeCategory::Planner).await,
        "/api/analysis" => narrative(state, path, NarrativeCategory::Analysis).await,
        "/api/thresholds" => json_response(StatusCode::OK, state.thresholds.table().as_ref()),
        "/api/anomalies" => match live_samples(state).await {
            Ok(samples) => {
                let anomalies = state.thresholds.table().evaluate_all(&samples);
                json_response(StatusCode::OK, &anomalies)
            }
            Err(e) => query_failure(path, e),
        },
        "/health" | "/healthz" => text_response(StatusCode::OK, "OK"),
        _ => error_response(StatusCode::NOT_FOUND, &format!("no route for {}", path)),
    }
}

async fn live_samples(state: &AppState) -> Result<Vec<opswatch_types::MetricSample>, QueryError> {
    state
        .live_metrics
        .fetch(state.engine.as_ref(), &state.shaper)
        .await
}

async fn narrative(
    state: &AppState,
    path: &str,
    category: NarrativeCategory,
) -> Response<Full<Bytes>> {
    match state.narratives.fetch(state.engine.as_ref(), category).await {
        Ok(narrative) => json_response(
            StatusCode::OK,
            &json!({ "response": narrative.into_text() }),
        ),
        Err(e) => query_failure(path, e),
    }
}

fn query_failure(path: &str, err: QueryError) -> Response<Full<Bytes>> {
    error!(path, "query failed: {}", err);
    let status = if err.is_transient() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::BAD_GATEWAY
    };
    error_response(status, &err.to_string())
}

fn preflight() -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = StatusCode::NO_CONTENT;
    let headers = response.headers_mut();
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOWED_METHODS),
    );
    headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static("*"));
    response
}

fn json_response<T: Serialize + ?Sized>(status: StatusCode, value: &T) -> Response<Full<Bytes>> {
    match serde_json::to_vec(value) {
        Ok(body) => with_body(status, "application/json", body),
        Err(e) => {
            error!("failed to encode response: {}", e);
            with_body(
                StatusCode::INTERNAL_SERVER_ERROR,
                "application/json",
                br#"{"error":"failed to encode response"}"#.to_vec(),
            )
        }
    }
}

fn error_response(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    json_response(status, &json!({ "error": message }))
}

fn text_response(status: StatusCode, body: &'static str) -> Response<Full<Bytes>> {
    with_body(status, "text/plain", body.as_bytes().to_vec())
}

fn with_body(
    status: StatusCode,
    content_type: &'static str,
    body: Vec<u8>,
) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}
