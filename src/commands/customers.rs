use serde::Deserialize;
use tracing::info;

use super::object_payload;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CustomerLookupPayload {
    #[serde(alias = "customer_id", alias = "id")]
    customer_id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CheckInPayload {
    #[serde(default, alias = "customerName", alias = "customer_name")]
    name: String,
    #[serde(default, alias = "customerPhone", alias = "customer_phone", alias = "mobile")]
    phone: String,
}

fn parse_lookup_payload(arg0: Option<serde_json::Value>) -> Result<CustomerLookupPayload, String> {
    let payload = object_payload(arg0, "customerId");
    let mut parsed: CustomerLookupPayload =
        serde_json::from_value(payload).map_err(|e| format!("Invalid customer id payload: {e}"))?;
    parsed.customer_id = parsed.customer_id.trim().to_string();
    if parsed.customer_id.is_empty() {
        return Err("Missing customerId".into());
    }
    Ok(parsed)
}

fn parse_check_in_payload(arg0: Option<serde_json::Value>) -> Result<CheckInPayload, String> {
    let payload = match arg0 {
        Some(serde_json::Value::Null) | None => return Ok(CheckInPayload::default()),
        Some(v) => v,
    };
    let mut parsed: CheckInPayload =
        serde_json::from_value(payload).map_err(|e| format!("Invalid check-in payload: {e}"))?;
    parsed.name = parsed.name.trim().to_string();
    parsed.phone = parsed.phone.trim().to_string();
    Ok(parsed)
}

/// Register a walk-in customer. Name and phone are optional here; the order
/// screen validates them at checkout.
pub fn customer_check_in(
    arg0: Option<serde_json::Value>,
    state: &AppState,
) -> Result<serde_json::Value, String> {
    let payload = parse_check_in_payload(arg0)?;
    let id = state
        .services
        .store
        .create_customer(&payload.name, &payload.phone)
        .map_err(|e| format!("Failed to check in customer: {e}"))?;
    info!(customer_id = %id, "Customer checked in");

    Ok(serde_json::json!({
        "success": true,
        "customerId": id,
        "customer": state.services.store.get_by_id(&id),
    }))
}

pub fn customer_get(
    arg0: Option<serde_json::Value>,
    state: &AppState,
) -> Result<serde_json::Value, String> {
    let payload = parse_lookup_payload(arg0)?;
    Ok(serde_json::json!({
        "success": true,
        "customer": state.services.store.get_by_id(&payload.customer_id),
    }))
}

pub fn customers_active(state: &AppState) -> Result<serde_json::Value, String> {
    Ok(serde_json::json!({
        "success": true,
        "customers": state.services.store.list_active(),
    }))
}

pub fn customer_mark_completed(
    arg0: Option<serde_json::Value>,
    state: &AppState,
) -> Result<serde_json::Value, String> {
    let payload = parse_lookup_payload(arg0)?;
    state
        .services
        .store
        .mark_completed(&payload.customer_id)
        .map_err(|e| format!("Failed to complete customer: {e}"))?;
    info!(customer_id = %payload.customer_id, "Customer marked completed");
    Ok(serde_json::json!({ "success": true }))
}

pub fn customer_remove(
    arg0: Option<serde_json::Value>,
    state: &AppState,
) -> Result<serde_json::Value, String> {
    let payload = parse_lookup_payload(arg0)?;
    state
        .services
        .store
        .remove(&payload.customer_id)
        .map_err(|e| format!("Failed to remove customer: {e}"))?;
    Ok(serde_json::json!({ "success": true }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::memory_state;

    #[test]
    fn parse_lookup_payload_supports_string_and_aliases() {
        let from_string = parse_lookup_payload(Some(serde_json::json!(" 1700 "))).unwrap();
        let from_snake =
            parse_lookup_payload(Some(serde_json::json!({ "customer_id": "1701" }))).unwrap();
        let from_id = parse_lookup_payload(Some(serde_json::json!({ "id": "1702" }))).unwrap();
        assert_eq!(from_string.customer_id, "1700");
        assert_eq!(from_snake.customer_id, "1701");
        assert_eq!(from_id.customer_id, "1702");
    }

    #[test]
    fn parse_lookup_payload_rejects_missing_id() {
        assert_eq!(
            parse_lookup_payload(Some(serde_json::json!("  "))).unwrap_err(),
            "Missing customerId"
        );
        assert!(parse_lookup_payload(None).is_err());
    }

    #[test]
    fn check_in_then_get_and_list() {
        let state = memory_state();
        let resp = customer_check_in(
            Some(serde_json::json!({ "customerName": " Linh ", "mobile": "0412345678" })),
            &state,
        )
        .unwrap();
        let id = resp["customerId"].as_str().unwrap().to_string();
        assert_eq!(resp["customer"]["name"], "Linh");
        assert_eq!(resp["customer"]["paymentStatus"], "pending");
        assert_eq!(resp["customer"]["totalAmount"], 0.0);

        let got = customer_get(Some(serde_json::json!(id.clone())), &state).unwrap();
        assert_eq!(got["customer"]["phone"], "0412345678");

        let active = customers_active(&state).unwrap();
        assert_eq!(active["customers"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn check_in_without_details_creates_blank_record() {
        let state = memory_state();
        let resp = customer_check_in(None, &state).unwrap();
        assert_eq!(resp["customer"]["name"], "");
        assert_eq!(resp["customer"]["phone"], "");
    }

    #[test]
    fn get_unknown_customer_returns_null() {
        let state = memory_state();
        let resp = customer_get(Some(serde_json::json!("999")), &state).unwrap();
        assert_eq!(resp["success"], true);
        assert!(resp["customer"].is_null());
    }

    #[test]
    fn completed_and_removed_customers_leave_active_list() {
        let state = memory_state();
        let first = customer_check_in(None, &state).unwrap()["customerId"].clone();
        let second = customer_check_in(None, &state).unwrap()["customerId"].clone();

        customer_mark_completed(Some(first.clone()), &state).unwrap();
        let active = customers_active(&state).unwrap();
        assert_eq!(active["customers"].as_array().unwrap().len(), 1);
        assert_eq!(active["customers"][0]["id"], second);

        customer_remove(Some(serde_json::json!({ "customerId": second })), &state).unwrap();
        assert!(customers_active(&state).unwrap()["customers"]
            .as_array()
            .unwrap()
            .is_empty());
        // Completed records stay retrievable.
        assert_eq!(
            customer_get(Some(first), &state).unwrap()["customer"]["completed"],
            true
        );
    }
}
