use serde::Deserialize;

use super::object_payload;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaymentStatusPayload {
    #[serde(alias = "payment_id", alias = "id")]
    payment_id: String,
}

fn parse_payment_status_payload(
    arg0: Option<serde_json::Value>,
) -> Result<PaymentStatusPayload, String> {
    let payload = object_payload(arg0, "paymentId");
    let mut parsed: PaymentStatusPayload =
        serde_json::from_value(payload).map_err(|e| format!("Invalid payment id payload: {e}"))?;
    parsed.payment_id = parsed.payment_id.trim().to_string();
    if parsed.payment_id.is_empty() {
        return Err("Missing paymentId".into());
    }
    Ok(parsed)
}

/// Poll the proxy for a payment's status. Unreachable or unknown reads as
/// `failed`.
pub async fn payment_status_check(
    arg0: Option<serde_json::Value>,
    state: &AppState,
) -> Result<serde_json::Value, String> {
    let payload = parse_payment_status_payload(arg0)?;
    let status = state
        .services
        .payments
        .check_payment_status(&payload.payment_id)
        .await;
    Ok(serde_json::json!({
        "success": true,
        "paymentId": payload.payment_id,
        "status": status.as_str(),
    }))
}
