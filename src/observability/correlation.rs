use axum::extract::Request;
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use tracing::{info_span, Instrument};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// Assign a request id to every incoming request, wrap the handler in a span
/// carrying it, and echo it back in the response headers.
pub async fn request_id_middleware(mut req: Request, next: Next) -> Result<Response, StatusCode> {
    let request_id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let span = info_span!(
        "http_request",
        request_id = %request_id,
        method = %req.method(),
        path = %req.uri().path(),
    );

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        req.headers_mut().insert(REQUEST_ID_HEADER, value.clone());

        let mut response = next.run(req).instrument(span).await;
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
        Ok(response)
    } else {
        Ok(next.run(req).instrument(span).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_request_ids_are_unique() {
        let a = Uuid::new_v4().to_string();
        let b = Uuid::new_v4().to_string();
        assert_ne!(a, b);
        assert!(HeaderValue::from_str(&a).is_ok());
    }
}
