//! Counter POS - bakery ordering and checkout backend
//!
//! Walk-in customers are checked in at the counter, pick bread on the order
//! screen and pay by card through the local payment proxy. This crate owns
//! the customer store, the checkout flow and the JSON handlers the UI calls
//! (see [`commands`]).

use std::sync::Arc;

use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;

pub mod api;
pub mod catalog;
pub mod checkout;
pub mod commands;
pub mod config;
pub mod customers;
pub mod db;
pub mod error;
pub mod logging;
pub mod money;
pub mod navigation;
pub mod payments;

#[cfg(test)]
mod test_support;

use api::BackendClient;
use checkout::{CheckoutScreen, CheckoutServices};
use config::AppConfig;
use customers::CustomerStore;
use navigation::SystemBrowser;
use payments::HttpPaymentClient;

/// Everything the UI handlers need, built once at start-up.
pub struct AppState {
    pub config: AppConfig,
    pub services: CheckoutServices,
}

impl AppState {
    pub fn new(config: AppConfig, services: CheckoutServices) -> Self {
        Self { config, services }
    }

    /// Open the SQLite-backed customer store and the outbound HTTP clients.
    pub fn init(config: AppConfig) -> Result<Self, String> {
        let db_state =
            db::init(&config.db_path()).map_err(|e| format!("Failed to initialize database: {e}"))?;
        let store = CustomerStore::open(Box::new(db_state))
            .map_err(|e| format!("Failed to load customers: {e}"))?;

        let payments = HttpPaymentClient::new(
            &config.payment_api_url,
            config.http_timeout,
            config.fallback_payment_delay,
        )?;
        let backend = BackendClient::new(&config.backend_url, config.http_timeout)?;

        let services = CheckoutServices {
            store: Arc::new(store),
            payments: Arc::new(payments),
            backend: Arc::new(backend),
            navigator: Arc::new(SystemBrowser),
        };
        Ok(Self::new(config, services))
    }

    /// A fresh order screen for `customer_id`.
    pub fn checkout_screen(&self, customer_id: &str) -> CheckoutScreen {
        CheckoutScreen::open(self.services.clone(), &self.config, customer_id)
    }
}

/// Read the environment, install logging and open the app state.
///
/// Keep the returned guard alive until exit; dropping it flushes the log file.
pub fn start() -> Result<(AppState, WorkerGuard), String> {
    let config = AppConfig::from_env().map_err(|e| e.to_string())?;
    let guard = logging::init(&config)?;

    info!("Starting Counter POS v{}", env!("CARGO_PKG_VERSION"));

    let state = AppState::init(config)?;
    info!(
        customers = state.services.store.all().len(),
        "Customer store and payment clients ready"
    );
    Ok((state, guard))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::customers::customer_check_in;

    #[test]
    fn test_init_persists_customers_across_restarts() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig {
            data_dir: dir.path().to_path_buf(),
            ..AppConfig::default()
        };

        let id = {
            let state = AppState::init(config.clone()).unwrap();
            let resp =
                customer_check_in(Some(serde_json::json!({ "name": "Linh" })), &state).unwrap();
            resp["customerId"].as_str().unwrap().to_string()
        };

        let reopened = AppState::init(config).unwrap();
        let customer = reopened.services.store.get_by_id(&id).expect("persisted");
        assert_eq!(customer.name, "Linh");

        let screen = reopened.checkout_screen(&id);
        assert_eq!(screen.name(), "Linh");
        assert_eq!(screen.total(), rust_decimal::Decimal::ZERO);
    }
}
