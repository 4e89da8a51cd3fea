use axum::body::{Body, to_bytes};
use axum::extract::Request;
use axum::http::{HeaderMap, HeaderValue, header};
use axum::response::Response;
use tracing::{debug, warn};

use crate::error::GatewayError;
use crate::identity::ClientKey;

// Largest request body relayed to the storefront
const MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

// The storefront application behind the gateway
pub struct Upstream {
    client: reqwest::Client,
    base_url: String,
}

impl Upstream {
    // Accepts "localhost:8080" or "http://localhost:8080/"
    pub fn new(client: reqwest::Client, url: &str) -> Result<Self, GatewayError> {
        let url = url.trim().trim_end_matches('/');
        if url.is_empty() {
            return Err(GatewayError::InvalidUrl("empty upstream url".to_string()));
        }

        // add http:// if not present
        let base_url = if url.starts_with("http") {
            url.to_string()
        } else {
            format!("http://{}", url)
        };

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn forward(&self, client: &ClientKey, req: Request) -> Result<Response, GatewayError> {
        let (parts, body) = req.into_parts();
        let path = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        let url = format!("{}{}", self.base_url, path);

        let bytes = to_bytes(body, MAX_BODY_BYTES).await?;

        let mut headers = strip_hop_by_hop(parts.headers);
        headers.remove(header::HOST);
        headers.remove(header::CONTENT_LENGTH);
        if let Ok(value) = HeaderValue::from_str(client.as_str()) {
            headers.append("x-forwarded-for", value);
        }

        debug!(method = %parts.method, url = %url, "Forwarding to storefront");

        let res = self
            .client
            .request(parts.method, &url)
            .headers(headers)
            .body(bytes)
            .send()
            .await
            .inspect_err(|e| warn!("Storefront request to {url} failed: {e}"))?;

        let status = res.status();
        let mut out_headers = strip_hop_by_hop(res.headers().clone());
        out_headers.remove(header::CONTENT_LENGTH);
        let body = res.bytes().await?;

        let mut response = Response::new(Body::from(body));
        *response.status_mut() = status;
        *response.headers_mut() = out_headers;
        Ok(response)
    }
}

// Connection-scoped headers must not be relayed
fn strip_hop_by_hop(mut headers: HeaderMap) -> HeaderMap {
    let hop_by_hop = [
        header::CONNECTION,
        header::PROXY_AUTHENTICATE,
        header::PROXY_AUTHORIZATION,
        header::TE,
        header::TRAILER,
        header::TRANSFER_ENCODING,
        header::UPGRADE,
    ];
    for name in hop_by_hop {
        headers.remove(name);
    }
    headers
}
