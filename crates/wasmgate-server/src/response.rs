//! HTTP response construction.

use axum::body::Body;
use axum::http::{HeaderName, HeaderValue, Response, StatusCode};

/// Response produced by the gateway.
#[derive(Debug, Clone)]
pub struct GatewayResponse {
    /// HTTP status code
    pub status: u16,
    /// Response headers as key-value pairs
    pub headers: Vec<(String, String)>,
    /// Response body
    pub body: Vec<u8>,
}

impl GatewayResponse {
    /// Successful invocation: the captured guest output, verbatim, with an
    /// implicit 200 status and no forced content type.
    pub fn output(body: String) -> Self {
        Self {
            status: 200,
            headers: Vec::new(),
            body: body.into_bytes(),
        }
    }

    /// Create a simple text response.
    pub fn text(status: u16, body: &str) -> Self {
        Self {
            status,
            headers: vec![(
                "content-type".to_string(),
                "text/plain; charset=utf-8".to_string(),
            )],
            body: body.as_bytes().to_vec(),
        }
    }

    /// Create an error response with JSON body.
    pub fn error(status: u16, message: &str) -> Self {
        let body = serde_json::json!({
            "error": message
        })
        .to_string();
        Self {
            status,
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body: body.into_bytes(),
        }
    }

    /// Convert to Axum response.
    pub fn into_axum_response(self) -> Response<Body> {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let mut response = Response::builder().status(status);

        for (name, value) in &self.headers {
            if let (Ok(name), Ok(value)) = (
                HeaderName::try_from(name.as_str()),
                HeaderValue::try_from(value.as_str()),
            ) {
                response = response.header(name, value);
            }
        }

        response.body(Body::from(self.body)).unwrap_or_else(|_| {
            Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .body(Body::from("Internal server error"))
                .unwrap()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_response_is_verbatim() {
        let resp = GatewayResponse::output("raw guest output".to_string());
        assert_eq!(resp.status, 200);
        assert_eq!(resp.body, b"raw guest output");
        assert!(resp.headers.is_empty());
    }

    #[test]
    fn test_text_response() {
        let resp = GatewayResponse::text(200, "OK");
        assert_eq!(resp.status, 200);
        assert_eq!(resp.body, b"OK");
        assert_eq!(
            resp.headers[0],
            (
                "content-type".to_string(),
                "text/plain; charset=utf-8".to_string()
            )
        );
    }

    #[test]
    fn test_error_response() {
        let resp = GatewayResponse::error(404, "unable to find module target/missing.wasm");
        assert_eq!(resp.status, 404);
        assert!(String::from_utf8_lossy(&resp.body).contains("target/missing.wasm"));
    }

    #[test]
    fn test_into_axum_response() {
        let resp = GatewayResponse::output("Hello".to_string());
        let axum_resp = resp.into_axum_response();
        assert_eq!(axum_resp.status(), StatusCode::OK);
    }
}
