//! HTTP request handling
//!
//! # Supported Endpoints
//!
//! * `GET /` - Landing page with the upload form
//! * `GET /health` - Health check (returns "ok")
//! * `POST /upload` - Relay the `file` part of a multipart form to storage
//!
//! Everything else is `404 Not Found`, or `405 Method Not Allowed` for a
//! known path with the wrong method.
//!
//! # Upload outcomes
//!
//! | Outcome | Status | Body |
//! |---------|--------|------|
//! | Stored | 303, `Location: /` | empty |
//! | Missing or malformed `file` part | 400 | `Could not read uploaded file: ...` |
//! | Body could not be read | 500 | `Could not open uploaded file: ...` |
//! | Storage rejected the write | 500 | `Failed to upload file: ...` |

use super::AppContext;
use crate::metrics;
use crate::upload::multipart::{extract_boundary, parse_form};
use crate::upload::UploadError;
use bytes::Bytes;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::Body;
use hyper::header::{self, HeaderValue};
use hyper::{Method, Request, Response, StatusCode};
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{info, warn, Instrument};

/// Form field that carries the uploaded file
pub const FILE_FIELD: &str = "file";

/// Where a successful upload redirects to
pub const LANDING_ROUTE: &str = "/";

const LANDING_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>Baby Photos</title>
</head>
<body>
    <h1>Welcome to Baby Photos!</h1>
    <form method="POST" action="/upload" enctype="multipart/form-data">
        <input type="file" name="file" accept="image/*" required>
        <button type="submit">Upload Photo</button>
    </form>
</body>
</html>
"#;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Handle HTTP request
///
/// Generic over the body type so the same code path serves live connections
/// (`hyper::body::Incoming`) and in-memory bodies.
pub async fn handle_request<B>(
    req: Request<B>,
    context: Arc<AppContext>,
) -> Result<Response<String>, Infallible>
where
    B: Body<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    let request_id = uuid::Uuid::new_v4();
    let span = tracing::info_span!(
        "http.request",
        request_id = %request_id,
        http.method = %req.method(),
        http.path = %req.uri().path(),
        http.status_code = tracing::field::Empty
    );

    async move {
        let (route, response) = route(req, &context).await;
        let status = response.status().as_u16();

        tracing::Span::current().record("http.status_code", status);
        metrics::record_request(route, status);
        info!(status, "Request completed");

        Ok(response)
    }
    .instrument(span)
    .await
}

async fn route<B>(req: Request<B>, context: &AppContext) -> (&'static str, Response<String>)
where
    B: Body<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    match path.as_str() {
        "/" => match method {
            Method::GET | Method::HEAD => ("landing", landing_page()),
            _ => ("landing", method_not_allowed("GET, HEAD")),
        },
        "/health" => match method {
            Method::GET | Method::HEAD => ("health", text_response(StatusCode::OK, "ok")),
            _ => ("health", method_not_allowed("GET, HEAD")),
        },
        "/upload" => match method {
            Method::POST => ("upload", handle_upload(req, context).await),
            _ => ("upload", method_not_allowed("POST")),
        },
        _ => ("not_found", text_response(StatusCode::NOT_FOUND, "Not Found")),
    }
}

/// Relay the `file` part of the form to storage.
///
/// The upload stream is opened only after the form has been validated and
/// is owned by this function for the rest of its body, so it is released on
/// every path out, including a panic inside the relay.
async fn handle_upload<B>(req: Request<B>, context: &AppContext) -> Response<String>
where
    B: Body<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    let content_type = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());

    // Reject non-form requests before reading their body
    if let Err(e) = extract_boundary(content_type.as_deref()) {
        return intake_error(e);
    }

    let body = match read_body(req.into_body(), context.max_body_bytes()).await {
        Ok(body) => body,
        Err(e) => return intake_error(e),
    };

    let part = match parse_form(content_type.as_deref(), &body) {
        Ok(mut form) => match form.take_file(FILE_FIELD) {
            Some(part) => part,
            None => {
                return intake_error(UploadError::InvalidForm(format!(
                    "no file part named \"{}\" in form",
                    FILE_FIELD
                )))
            }
        },
        Err(e) => return intake_error(e),
    };

    let mut stream = context
        .streams()
        .open(part.filename, part.content_type, part.data);
    let key = stream.filename().to_string();

    info!(
        key = %key,
        bytes = stream.size(),
        content_type = ?stream.content_type(),
        "Upload received"
    );

    let outcome = context.relay().put(&key, &mut stream).await;
    stream.close();

    match outcome {
        Ok(_) => redirect(LANDING_ROUTE),
        Err(e) => text_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to upload file: {}", e),
        ),
    }
}

/// Collect the request body, bounded by `limit` bytes when a cap is set.
async fn read_body<B>(body: B, limit: Option<usize>) -> Result<Bytes, UploadError>
where
    B: Body<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    let Some(limit) = limit else {
        return match body.collect().await {
            Ok(collected) => Ok(collected.to_bytes()),
            Err(e) => {
                let e: BoxError = e.into();
                Err(UploadError::BodyRead(e.to_string()))
            }
        };
    };

    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => Err(
            UploadError::InvalidForm(format!("request body exceeds {} bytes", limit)),
        ),
        Err(e) => Err(UploadError::BodyRead(e.to_string())),
    }
}

/// Map a failure that happened before any storage call.
fn intake_error(err: UploadError) -> Response<String> {
    match err {
        UploadError::InvalidForm(msg) => {
            warn!(error = %msg, "Rejected upload form");
            text_response(
                StatusCode::BAD_REQUEST,
                format!("Could not read uploaded file: {}", msg),
            )
        }
        other => {
            metrics::record_error("upload_read");
            warn!(error = %other, "Failed to read upload");
            text_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Could not open uploaded file: {}", other),
            )
        }
    }
}

fn landing_page() -> Response<String> {
    let mut response = Response::new(LANDING_PAGE.to_string());
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/html; charset=utf-8"),
    );
    response
}

fn redirect(location: &'static str) -> Response<String> {
    let mut response = Response::new(String::new());
    *response.status_mut() = StatusCode::SEE_OTHER;
    response
        .headers_mut()
        .insert(header::LOCATION, HeaderValue::from_static(location));
    response
}

fn method_not_allowed(allow: &'static str) -> Response<String> {
    let mut response = text_response(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed");
    response
        .headers_mut()
        .insert(header::ALLOW, HeaderValue::from_static(allow));
    response
}

fn text_response(status: StatusCode, body: impl Into<String>) -> Response<String> {
    let mut response = Response::new(body.into());
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}
