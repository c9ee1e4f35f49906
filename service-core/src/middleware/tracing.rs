use axum::http::HeaderValue;
use axum::{extract::Request, middleware::Next, response::Response};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Ensure every request carries a request id and echo it on the response,
/// so log lines and client reports can be correlated. An id supplied by
/// the caller (e.g. an upstream proxy) is honored rather than replaced.
pub async fn request_id_middleware(mut req: Request, next: Next) -> Response {
    let request_id = match req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
    {
        Some(existing) => existing.to_string(),
        None => {
            let generated = Uuid::new_v4().to_string();
            if let Ok(value) = HeaderValue::from_str(&generated) {
                req.headers_mut().insert(REQUEST_ID_HEADER, value);
            }
            generated
        }
    };

    let mut response = next.run(req).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    response
}
