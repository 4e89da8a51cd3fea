use axum::extract::{Request, State};
use axum::http::header::{HeaderMap, HeaderValue, RETRY_AFTER};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use crate::agent::AgentVerdict;
use crate::identity::ClientIdentity;
use crate::metrics::{ADMISSION_LATENCY, REJECTIONS, REQUEST_TOTAL};
use crate::rate_limit::{LimitVerdict, ceil_secs};
use crate::state::AppState;

pub const PROTECTION_HEADER: &str = "x-admission-protection";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Forward,
    RejectAgent,
    RejectLimit(LimitVerdict),
}

impl Admission {
    fn reason(&self) -> &'static str {
        match self {
            Admission::Forward => "active",
            Admission::RejectAgent => "suspicious-identity",
            Admission::RejectLimit(LimitVerdict::Blocked { .. }) => "blocked",
            Admission::RejectLimit(_) => "rate-limited",
        }
    }
}

// Agent filter first (never spends budget), then bypass prefixes, then the limiter
pub fn admit(state: &AppState, identity: &ClientIdentity, path: &str, now: Instant) -> Admission {
    if state.classifier.classify(&identity.agent) == AgentVerdict::Suspicious {
        return Admission::RejectAgent;
    }

    if state.config.is_bypassed(path) {
        return Admission::Forward;
    }

    match state.limiter.check(&identity.key, now) {
        LimitVerdict::Allowed => Admission::Forward,
        verdict => Admission::RejectLimit(verdict),
    }
}

pub async fn admission_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    REQUEST_TOTAL.inc();
    let started = Instant::now();

    let identity = ClientIdentity::from_request(&request);
    debug!(
        client = %identity.key,
        method = %request.method(),
        path = request.uri().path(),
        agent = identity.agent_preview(),
        "Inbound request"
    );

    let admission = admit(&state, &identity, request.uri().path(), started);
    ADMISSION_LATENCY.observe(started.elapsed().as_secs_f64());

    if admission != Admission::Forward {
        REJECTIONS.with_label_values(&[admission.reason()]).inc();
        warn!(
            client = %identity.key,
            path = request.uri().path(),
            reason = admission.reason(),
            "Request rejected"
        );
        return rejection_response(admission);
    }

    let mut response = next.run(request).await;
    apply_security_headers(response.headers_mut());
    response
}

fn rejection_response(admission: Admission) -> Response {
    let marker = HeaderValue::from_static(admission.reason());

    match admission {
        Admission::RejectLimit(verdict) => {
            let mut response =
                (StatusCode::TOO_MANY_REQUESTS, "too many requests").into_response();
            let headers = response.headers_mut();
            headers.insert(PROTECTION_HEADER, marker);
            if let Some(wait) = verdict.retry_after() {
                headers.insert(RETRY_AFTER, HeaderValue::from(ceil_secs(wait)));
            }
            response
        }
        // Forward never reaches here, fail closed if it does
        Admission::RejectAgent | Admission::Forward => {
            let mut response = (StatusCode::FORBIDDEN, "access restricted").into_response();
            response.headers_mut().insert(
                PROTECTION_HEADER,
                HeaderValue::from_static(Admission::RejectAgent.reason()),
            );
            response
        }
    }
}

pub fn apply_security_headers(headers: &mut HeaderMap) {
    headers.insert("x-content-type-options", HeaderValue::from_static("nosniff"));
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert("x-xss-protection", HeaderValue::from_static("1; mode=block"));
    headers.insert(PROTECTION_HEADER, HeaderValue::from_static("active"));
}
