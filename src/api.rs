//! Order-recording backend client.
//!
//! Submits finished orders to the shop backend and pings its check-in
//! endpoint. Both calls are best-effort from the counter's point of view:
//! callers log failures and carry on. Also hosts the URL and error-message
//! helpers shared with the payment client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;

use crate::customers::OrderLine;

// ---------------------------------------------------------------------------
// URL normalisation
// ---------------------------------------------------------------------------

/// Normalise a service base URL:
/// - ensure a scheme is present (https, or http for localhost)
/// - strip trailing slashes
pub fn normalize_base_url(url: &str) -> String {
    let mut url = url.trim().to_string();

    if !url.starts_with("http://") && !url.starts_with("https://") {
        if url.starts_with("localhost") || url.starts_with("127.0.0.1") {
            url = format!("http://{url}");
        } else {
            url = format!("https://{url}");
        }
    }

    while url.ends_with('/') {
        url.pop();
    }

    url
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

/// Convert a `reqwest::Error` into a user-friendly message.
pub(crate) fn friendly_error(url: &str, err: &reqwest::Error) -> String {
    if err.is_connect() {
        return format!("Cannot reach {url}");
    }
    if err.is_timeout() {
        return format!("Connection to {url} timed out");
    }
    if err.is_builder() {
        return format!("Invalid URL: {url}");
    }
    format!("Network error communicating with {url}: {err}")
}

/// Convert an HTTP status code into a user-friendly message.
pub(crate) fn status_error(status: StatusCode) -> String {
    match status.as_u16() {
        401 => "Request was not authorized".to_string(),
        404 => "Endpoint not found".to_string(),
        s if s >= 500 => format!("Server error (HTTP {s})"),
        s => format!("Unexpected response (HTTP {s})"),
    }
}

pub(crate) fn build_client(timeout: Duration) -> Result<Client, String> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| format!("Failed to create HTTP client: {e}"))
}

// ---------------------------------------------------------------------------
// Order submission
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemPayload {
    pub product_name: String,
    pub product_id: String,
    pub quantity: u32,
    #[serde(with = "rust_decimal::serde::float")]
    pub unit_price: Decimal,
}

/// Body of `POST /api/orders`. The counter always records orders as cash
/// with an empty note; card settlement is tracked by the payment flow.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSubmission {
    pub phone: String,
    pub name: String,
    pub items: Vec<OrderItemPayload>,
    pub payment_method: String,
    pub note: String,
}

impl OrderSubmission {
    pub fn new(name: &str, phone: &str, lines: &[OrderLine]) -> Self {
        Self {
            phone: phone.to_string(),
            name: name.to_string(),
            items: lines
                .iter()
                .map(|line| OrderItemPayload {
                    product_name: line.name.clone(),
                    product_id: line.product_id.clone(),
                    quantity: line.quantity,
                    unit_price: line.unit_price,
                })
                .collect(),
            payment_method: "cash".to_string(),
            note: String::new(),
        }
    }
}

#[async_trait]
pub trait OrderBackend: Send + Sync {
    async fn submit_order(&self, order: &OrderSubmission) -> Result<(), String>;
    async fn confirm_check_in(&self) -> Result<(), String>;
}

pub struct BackendClient {
    client: Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, String> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: normalize_base_url(base_url),
        })
    }
}

#[async_trait]
impl OrderBackend for BackendClient {
    async fn submit_order(&self, order: &OrderSubmission) -> Result<(), String> {
        let url = format!("{}/api/orders", self.base_url);
        let resp = self
            .client
            .post(&url)
            .json(order)
            .send()
            .await
            .map_err(|e| friendly_error(&self.base_url, &e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(status_error(status));
        }
        info!(items = order.items.len(), "Order submitted to backend");
        Ok(())
    }

    async fn confirm_check_in(&self) -> Result<(), String> {
        let url = format!("{}/api/checkin/", self.base_url);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| friendly_error(&self.base_url, &e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(status_error(status));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{one_shot_server, refused_url, request_json};
    use rust_decimal_macros::dec;

    fn client(base: &str) -> BackendClient {
        BackendClient::new(base, Duration::from_secs(5)).expect("client")
    }

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(
            normalize_base_url("https://backend.example.com/"),
            "https://backend.example.com"
        );
        assert_eq!(normalize_base_url("localhost:5000//"), "http://localhost:5000");
        assert_eq!(normalize_base_url(" shop.example.com "), "https://shop.example.com");
    }

    #[test]
    fn test_status_error_messages() {
        assert_eq!(
            status_error(StatusCode::BAD_GATEWAY),
            "Server error (HTTP 502)"
        );
        assert_eq!(status_error(StatusCode::NOT_FOUND), "Endpoint not found");
        assert_eq!(
            status_error(StatusCode::CONFLICT),
            "Unexpected response (HTTP 409)"
        );
    }

    #[tokio::test]
    async fn test_submit_order_posts_expected_body() {
        let (base, server) = one_shot_server(201, "{}");
        let lines = vec![OrderLine {
            product_id: "banh-mi".into(),
            name: "Bánh Mì Roll".into(),
            unit_price: dec!(3.25),
            quantity: 2,
        }];
        let order = OrderSubmission::new("Linh", "0412345678", &lines);

        client(&format!("{base}/")).submit_order(&order).await.expect("submitted");

        let raw = server.join().unwrap();
        assert!(raw.starts_with("POST /api/orders HTTP/1.1"));
        let body = request_json(&raw);
        assert_eq!(body["phone"], "0412345678");
        assert_eq!(body["name"], "Linh");
        assert_eq!(body["paymentMethod"], "cash");
        assert_eq!(body["note"], "");
        assert_eq!(body["items"][0]["productName"], "Bánh Mì Roll");
        assert_eq!(body["items"][0]["productId"], "banh-mi");
        assert_eq!(body["items"][0]["quantity"], 2);
        assert_eq!(body["items"][0]["unitPrice"], 3.25);
    }

    #[tokio::test]
    async fn test_submit_order_reports_server_error() {
        let (base, server) = one_shot_server(500, r#"{"error":"boom"}"#);
        let order = OrderSubmission::new("Linh", "0412345678", &[]);
        let err = client(&base).submit_order(&order).await.unwrap_err();
        assert_eq!(err, "Server error (HTTP 500)");
        server.join().unwrap();
    }

    #[tokio::test]
    async fn test_confirm_check_in() {
        let (base, server) = one_shot_server(200, "[]");
        client(&base).confirm_check_in().await.expect("check-in ok");
        let raw = server.join().unwrap();
        assert!(raw.starts_with("GET /api/checkin/ HTTP/1.1"));
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_an_error() {
        let base = refused_url();
        let err = client(&base).confirm_check_in().await.unwrap_err();
        assert!(err.contains("127.0.0.1"), "unexpected message: {err}");
    }
}
