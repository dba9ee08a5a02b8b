use bytes::Bytes;
use http_body_util::Full;
use hyper::{StatusCode, header::{self, HeaderValue}};

use super::Response;


/// Builds a response with the given status, content type and body.
pub(crate) fn with_body(
    status: StatusCode,
    content_type: &'static str,
    body: impl Into<Bytes>,
) -> Response {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response.headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

fn plain(status: StatusCode, body: &'static str) -> Response {
    with_body(status, "text/plain; charset=UTF-8", body)
}

pub(crate) fn service_unavailable() -> Response {
    plain(
        StatusCode::SERVICE_UNAVAILABLE,
        "Server error: service unavailable. Potentially try again later.",
    )
}

pub(crate) fn bad_request(msg: impl Into<String>) -> Response {
    with_body(StatusCode::BAD_REQUEST, "text/plain; charset=UTF-8", msg.into())
}

pub(crate) fn payload_too_large() -> Response {
    plain(StatusCode::PAYLOAD_TOO_LARGE, "413 Payload too large")
}

pub(crate) fn not_found() -> Response {
    plain(StatusCode::NOT_FOUND, "404 Not found")
}

pub(crate) fn method_not_allowed() -> Response {
    plain(StatusCode::METHOD_NOT_ALLOWED, "405 Method not allowed")
}

pub(crate) fn internal_server_error() -> Response {
    plain(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
}
