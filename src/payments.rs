//! Card payment client.
//!
//! Talks to the local payment proxy (`/api/payment`) that fronts the card
//! gateway. Every failure is folded into a [`PaymentResult`] value; nothing
//! here returns an error to the caller.
//!
//! When the gateway is unreachable the checkout flow can fall back to
//! [`PaymentGateway::create_fallback_payment`], a local stand-in that always
//! approves after a short delay and never asks for a redirect.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::api::{build_client, normalize_base_url};
use crate::customers::PaymentStatus;

pub const PAYMENT_INITIATION_FAILED: &str = "Payment initiation failed";
pub const PAYMENT_INITIATION_UNEXPECTED: &str =
    "An unexpected error occurred during payment initiation";

const FALLBACK_ID_PREFIX: &str = "TEST";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub currency: String,
    /// The customer id doubles as the order id.
    pub order_id: String,
    pub customer_name: String,
    pub customer_phone: String,
}

/// Outcome of a payment attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum PaymentResult {
    /// Accepted by the gateway (or the fallback). A `redirect_url` means the
    /// customer still has to finish on the gateway's hosted page.
    Approved {
        payment_id: Option<String>,
        redirect_url: Option<String>,
    },
    Declined {
        error_message: String,
    },
}

impl PaymentResult {
    pub fn declined(message: impl Into<String>) -> Self {
        PaymentResult::Declined {
            error_message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, PaymentResult::Approved { .. })
    }

    pub fn payment_id(&self) -> Option<&str> {
        match self {
            PaymentResult::Approved { payment_id, .. } => payment_id.as_deref(),
            PaymentResult::Declined { .. } => None,
        }
    }

    pub fn redirect_url(&self) -> Option<&str> {
        match self {
            PaymentResult::Approved { redirect_url, .. } => redirect_url.as_deref(),
            PaymentResult::Declined { .. } => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            PaymentResult::Approved { .. } => None,
            PaymentResult::Declined { error_message } => Some(error_message),
        }
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// One call to the payment-initiation endpoint.
    async fn initiate_payment(&self, request: &PaymentRequest) -> PaymentResult;

    /// Poll the status of an earlier payment. Any failure reads as `Failed`.
    async fn check_payment_status(&self, payment_id: &str) -> PaymentStatus;

    /// Local stand-in used when `initiate_payment` fails.
    async fn create_fallback_payment(&self, request: &PaymentRequest) -> PaymentResult;
}

/// Build the approved result the fallback path hands back after `delay`.
///
/// The id is `TEST-{unix_millis}-{uuid}`; it carries no redirect URL, so the
/// checkout treats it as settled immediately.
pub async fn fallback_payment(request: &PaymentRequest, delay: Duration) -> PaymentResult {
    info!(order_id = %request.order_id, "Using fallback payment mechanism");

    tokio::time::sleep(delay).await;

    let payment_id = format!(
        "{FALLBACK_ID_PREFIX}-{}-{}",
        Utc::now().timestamp_millis(),
        Uuid::new_v4().simple()
    );
    info!(payment_id = %payment_id, "Created fallback payment");

    PaymentResult::Approved {
        payment_id: Some(payment_id),
        redirect_url: None,
    }
}

// ---------------------------------------------------------------------------
// HTTP client
// ---------------------------------------------------------------------------

pub struct HttpPaymentClient {
    client: Client,
    base_url: String,
    fallback_delay: Duration,
}

impl HttpPaymentClient {
    pub fn new(base_url: &str, timeout: Duration, fallback_delay: Duration) -> Result<Self, String> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: normalize_base_url(base_url),
            fallback_delay,
        })
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentClient {
    async fn initiate_payment(&self, request: &PaymentRequest) -> PaymentResult {
        info!(
            order_id = %request.order_id,
            amount = %request.amount,
            currency = %request.currency,
            "Initiating payment"
        );

        let url = format!("{}/api/payment", self.base_url);
        let resp = match self.client.post(&url).json(request).send().await {
            Ok(r) => r,
            Err(e) => {
                error!(order_id = %request.order_id, error = %e, "Payment request failed");
                return PaymentResult::declined(PAYMENT_INITIATION_UNEXPECTED);
            }
        };

        let status = resp.status();
        let body = match resp.text().await {
            Ok(b) => b,
            Err(e) => {
                error!(order_id = %request.order_id, error = %e, "Payment response unreadable");
                return PaymentResult::declined(PAYMENT_INITIATION_UNEXPECTED);
            }
        };
        let data = serde_json::from_str::<Value>(&body).ok();

        if status.is_success() {
            let Some(data) = data else {
                error!(order_id = %request.order_id, "Payment response is not JSON");
                return PaymentResult::declined(PAYMENT_INITIATION_UNEXPECTED);
            };
            let payment_id = non_empty_str(&data, "paymentId");
            let redirect_url = non_empty_str(&data, "redirectUrl");
            info!(
                order_id = %request.order_id,
                payment_id = payment_id.as_deref().unwrap_or(""),
                redirect = redirect_url.is_some(),
                "Payment initiated"
            );
            PaymentResult::Approved {
                payment_id,
                redirect_url,
            }
        } else {
            let message = data
                .as_ref()
                .and_then(|d| non_empty_str(d, "errorMessage"))
                .unwrap_or_else(|| PAYMENT_INITIATION_FAILED.to_string());
            warn!(
                order_id = %request.order_id,
                status = status.as_u16(),
                message = %message,
                "Payment initiation failed"
            );
            PaymentResult::Declined {
                error_message: message,
            }
        }
    }

    async fn check_payment_status(&self, payment_id: &str) -> PaymentStatus {
        let url = format!("{}/api/payment/status", self.base_url);
        let resp = match self
            .client
            .get(&url)
            .query(&[("paymentId", payment_id)])
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                error!(payment_id, error = %e, "Payment status request failed");
                return PaymentStatus::Failed;
            }
        };

        let status = resp.status();
        if !status.is_success() {
            warn!(payment_id, status = status.as_u16(), "Payment status check failed");
            return PaymentStatus::Failed;
        }

        match resp.json::<Value>().await {
            Ok(data) => match data
                .get("status")
                .and_then(Value::as_str)
                .and_then(PaymentStatus::parse)
            {
                Some(s) => s,
                None => {
                    warn!(payment_id, "Payment status response has no usable status");
                    PaymentStatus::Failed
                }
            },
            Err(e) => {
                error!(payment_id, error = %e, "Payment status response is not JSON");
                PaymentStatus::Failed
            }
        }
    }

    async fn create_fallback_payment(&self, request: &PaymentRequest) -> PaymentResult {
        fallback_payment(request, self.fallback_delay).await
    }
}

fn non_empty_str(v: &Value, key: &str) -> Option<String> {
    v.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}
