//! Checkout screen controller.
//!
//! Owns the order being built at the counter (quantities seeded from the
//! catalog, a running total, the contact fields) and drives the checkout:
//! validate, save to the customer store, hand the order to the backend,
//! take payment, and move the screen to its next state.
//!
//! Payment progress is a small state machine:
//!
//! ```text
//! Idle ──Start──> Processing ──Redirect──> Redirecting
//!  ^                  │  │
//!  └──────Settle──────┘  └──Fail──> Error ──Start──> Processing
//!  ^                                  │
//!  └─────────────Dismiss──────────────┘
//! ```
//!
//! `checkout()` never fails. Every path returns a [`CheckoutOutcome`] and
//! leaves the screen in a state the customer can retry from.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Url;
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::api::{normalize_base_url, OrderBackend, OrderSubmission};
use crate::catalog;
use crate::config::AppConfig;
use crate::customers::{CustomerStore, OrderLine, PaymentStatus};
use crate::money;
use crate::navigation::{validate_redirect_url, Navigator};
use crate::payments::{PaymentGateway, PaymentRequest, PaymentResult};

pub const NAME_REQUIRED: &str = "Please enter your name";
pub const PHONE_REQUIRED: &str = "Please enter your phone number";
pub const PHONE_INVALID: &str = "Please enter a valid 10-digit phone number";
pub const CUSTOMER_NOT_FOUND: &str = "Customer information not found. Please try again.";
pub const SELECT_ITEM: &str = "Please select at least one item";
pub const ORDER_NOT_SAVED: &str = "Your order could not be saved. Please try again.";
pub const PAYMENT_FAILED: &str = "Payment failed. Please try again.";
pub const PAYMENT_UNEXPECTED: &str =
    "An unexpected error occurred during payment. Please try again.";

// ---------------------------------------------------------------------------
// Payment phase
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentPhase {
    Idle,
    Processing,
    Redirecting,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseEvent {
    Start,
    Redirect,
    Settle,
    Fail,
    Dismiss,
}

impl PaymentPhase {
    /// The phase `event` leads to, or `None` if it is not allowed here.
    pub fn next(self, event: PhaseEvent) -> Option<PaymentPhase> {
        match (self, event) {
            (PaymentPhase::Idle | PaymentPhase::Error, PhaseEvent::Start) => {
                Some(PaymentPhase::Processing)
            }
            (PaymentPhase::Processing, PhaseEvent::Redirect) => Some(PaymentPhase::Redirecting),
            (PaymentPhase::Processing, PhaseEvent::Settle) => Some(PaymentPhase::Idle),
            (PaymentPhase::Processing, PhaseEvent::Fail) => Some(PaymentPhase::Error),
            (PaymentPhase::Error, PhaseEvent::Dismiss) => Some(PaymentPhase::Idle),
            _ => None,
        }
    }

    /// The checkout trigger is disabled while a payment is in flight or the
    /// customer has been sent to the gateway.
    pub fn accepts_checkout(self) -> bool {
        matches!(self, PaymentPhase::Idle | PaymentPhase::Error)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Screen {
    Order,
    Success,
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Per-field validation messages; `None` means the field is fine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ContactErrors {
    pub name: Option<String>,
    pub phone: Option<String>,
}

impl ContactErrors {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.phone.is_none()
    }
}

pub fn validate_contact(name: &str, phone: &str) -> ContactErrors {
    let mut errors = ContactErrors::default();

    if name.trim().is_empty() {
        errors.name = Some(NAME_REQUIRED.to_string());
    }

    if phone.trim().is_empty() {
        errors.phone = Some(PHONE_REQUIRED.to_string());
    } else if !is_valid_phone(phone) {
        errors.phone = Some(PHONE_INVALID.to_string());
    }

    errors
}

/// Exactly ten digits once whitespace is removed.
fn is_valid_phone(phone: &str) -> bool {
    let compact: Vec<char> = phone.chars().filter(|c| !c.is_whitespace()).collect();
    compact.len() == 10 && compact.iter().all(|c| c.is_ascii_digit())
}

// ---------------------------------------------------------------------------
// Screen controller
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum CheckoutOutcome {
    /// A payment is already in flight or the customer has been redirected.
    Busy,
    CustomerNotFound,
    InvalidContact(ContactErrors),
    EmptyOrder,
    /// Customer sent to the gateway's hosted page.
    Redirected { payment_id: String, url: String },
    /// Paid without a redirect; the success screen is showing.
    Settled { payment_id: String },
    Failed { message: String },
}

/// Collaborators the checkout screen talks to.
#[derive(Clone)]
pub struct CheckoutServices {
    pub store: Arc<CustomerStore>,
    pub payments: Arc<dyn PaymentGateway>,
    pub backend: Arc<dyn OrderBackend>,
    pub navigator: Arc<dyn Navigator>,
}

pub struct CheckoutScreen {
    services: CheckoutServices,
    customer_id: String,
    currency: String,
    success_delay: Duration,
    /// Relative redirect URLs resolve against the payment proxy.
    payment_base: Option<Url>,
    lines: Vec<OrderLine>,
    total: Decimal,
    name: String,
    phone: String,
    field_errors: ContactErrors,
    error_message: Option<String>,
    phase: watch::Sender<PaymentPhase>,
    screen: Screen,
    navigation_target: Option<String>,
}

impl CheckoutScreen {
    /// Open the order screen for `customer_id`. Every catalog product starts
    /// at quantity zero; name and phone are pre-filled from the customer
    /// record when it has them.
    pub fn open(services: CheckoutServices, config: &AppConfig, customer_id: &str) -> Self {
        let lines = catalog::products()
            .iter()
            .map(|p| OrderLine {
                product_id: p.id.to_string(),
                name: p.name.to_string(),
                unit_price: p.price,
                quantity: 0,
            })
            .collect();

        let (mut name, mut phone) = (String::new(), String::new());
        match services.store.get_by_id(customer_id) {
            Some(customer) => {
                debug!(customer_id, "Opening order screen");
                if !customer.name.is_empty() {
                    name = customer.name;
                }
                if !customer.phone.is_empty() {
                    phone = customer.phone;
                }
            }
            None => warn!(customer_id, "Opening order screen for unknown customer"),
        }

        let (phase, _) = watch::channel(PaymentPhase::Idle);

        Self {
            services,
            customer_id: customer_id.to_string(),
            currency: config.currency.clone(),
            success_delay: config.success_display_delay,
            payment_base: Url::parse(&normalize_base_url(&config.payment_api_url)).ok(),
            lines,
            total: Decimal::ZERO,
            name,
            phone,
            field_errors: ContactErrors::default(),
            error_message: None,
            phase,
            screen: Screen::Order,
            navigation_target: None,
        }
    }

    pub fn customer_id(&self) -> &str {
        &self.customer_id
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    pub fn total(&self) -> Decimal {
        self.total
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn phone(&self) -> &str {
        &self.phone
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    pub fn set_phone(&mut self, phone: &str) {
        self.phone = phone.to_string();
    }

    pub fn field_errors(&self) -> &ContactErrors {
        &self.field_errors
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn phase(&self) -> PaymentPhase {
        *self.phase.borrow()
    }

    /// Watch phase changes, e.g. to disable the checkout button.
    pub fn subscribe(&self) -> watch::Receiver<PaymentPhase> {
        self.phase.subscribe()
    }

    pub fn screen(&self) -> Screen {
        self.screen
    }

    /// Where the customer was sent to finish paying, once redirected.
    pub fn navigation_target(&self) -> Option<&str> {
        self.navigation_target.as_deref()
    }

    pub fn can_checkout(&self) -> bool {
        self.total > Decimal::ZERO && self.phase().accepts_checkout()
    }

    /// Change one product's quantity by `delta`, never going below zero, and
    /// recompute the total. Returns the new quantity, or `None` for a product
    /// that is not on the screen.
    pub fn adjust_quantity(&mut self, product_id: &str, delta: i64) -> Option<u32> {
        let line = self.lines.iter_mut().find(|l| l.product_id == product_id)?;
        let next = i64::from(line.quantity)
            .saturating_add(delta)
            .clamp(0, i64::from(u32::MAX));
        line.quantity = next as u32;
        let quantity = line.quantity;

        self.total = money::order_total(self.lines.iter().map(|l| (l.unit_price, l.quantity)));
        Some(quantity)
    }

    /// Lines that go into the submitted order.
    pub fn submitted_lines(&self) -> Vec<OrderLine> {
        self.lines
            .iter()
            .filter(|l| l.quantity > 0)
            .cloned()
            .collect()
    }

    /// Clear a payment error and return to idle.
    pub fn dismiss_error(&mut self) {
        if self.phase() == PaymentPhase::Error {
            self.transition(PhaseEvent::Dismiss);
            self.error_message = None;
        }
    }

    pub async fn checkout(&mut self) -> CheckoutOutcome {
        if !self.phase().accepts_checkout() {
            debug!(customer_id = %self.customer_id, phase = ?self.phase(), "Checkout ignored while busy");
            return CheckoutOutcome::Busy;
        }

        if self.services.store.get_by_id(&self.customer_id).is_none() {
            error!(customer_id = %self.customer_id, "Customer not found");
            self.error_message = Some(CUSTOMER_NOT_FOUND.to_string());
            return CheckoutOutcome::CustomerNotFound;
        }

        let errors = validate_contact(&self.name, &self.phone);
        self.field_errors = errors.clone();
        if !errors.is_empty() {
            debug!(customer_id = %self.customer_id, "Contact validation failed");
            return CheckoutOutcome::InvalidContact(errors);
        }

        let items = self.submitted_lines();
        if items.is_empty() {
            self.error_message = Some(SELECT_ITEM.to_string());
            return CheckoutOutcome::EmptyOrder;
        }
        let total = self.total;

        if let Err(e) = self.save_order(&items, total) {
            error!(customer_id = %self.customer_id, error = %e, "Failed to save order");
            self.error_message = Some(ORDER_NOT_SAVED.to_string());
            return CheckoutOutcome::Failed {
                message: ORDER_NOT_SAVED.to_string(),
            };
        }

        self.submit_to_backend(&items).await;

        self.transition(PhaseEvent::Start);
        self.error_message = None;

        let request = PaymentRequest {
            amount: total,
            currency: self.currency.clone(),
            order_id: self.customer_id.clone(),
            customer_name: self.name.clone(),
            customer_phone: self.phone.clone(),
        };

        match self.take_payment(request).await {
            Ok(outcome) => outcome,
            Err(detail) => {
                error!(customer_id = %self.customer_id, detail = %detail, "Unexpected payment error");
                if let Err(e) = self.services.store.update_payment_status(
                    &self.customer_id,
                    PaymentStatus::Failed,
                    None,
                ) {
                    error!(customer_id = %self.customer_id, error = %e, "Failed to record payment failure");
                }
                self.transition(PhaseEvent::Fail);
                self.error_message = Some(PAYMENT_UNEXPECTED.to_string());
                CheckoutOutcome::Failed {
                    message: PAYMENT_UNEXPECTED.to_string(),
                }
            }
        }
    }

    fn save_order(&self, items: &[OrderLine], total: Decimal) -> Result<(), crate::error::StoreError> {
        self.services.store.record_order(
            &self.customer_id,
            &self.name,
            &self.phone,
            items.to_vec(),
            total,
        )
    }

    /// Best-effort: record the order with the backend and confirm the
    /// check-in. Failures are logged and never stop the payment.
    async fn submit_to_backend(&self, items: &[OrderLine]) {
        let backend = &self.services.backend;
        let order = OrderSubmission::new(&self.name, &self.phone, items);
        match backend.submit_order(&order).await {
            Ok(()) => {
                if let Err(e) = backend.confirm_check_in().await {
                    warn!(customer_id = %self.customer_id, error = %e, "Check-in confirmation failed");
                }
            }
            Err(e) => {
                warn!(customer_id = %self.customer_id, error = %e, "Order submission failed, continuing to payment");
            }
        }
    }

    /// Primary initiation, then the fallback once if that fails. Runs on its
    /// own task so a panicking gateway surfaces as an `Err` here.
    async fn run_gateway(&self, request: PaymentRequest) -> Result<PaymentResult, String> {
        let gateway = Arc::clone(&self.services.payments);
        tokio::spawn(async move {
            let primary = gateway.initiate_payment(&request).await;
            if primary.is_success() {
                return primary;
            }
            warn!(
                order_id = %request.order_id,
                error = primary.error_message().unwrap_or(""),
                "Payment initiation failed, trying fallback payment"
            );
            gateway.create_fallback_payment(&request).await
        })
        .await
        .map_err(|e| format!("payment task failed: {e}"))
    }

    async fn take_payment(&mut self, request: PaymentRequest) -> Result<CheckoutOutcome, String> {
        let result = self.run_gateway(request).await?;
        let store = Arc::clone(&self.services.store);

        let (payment_id, redirect_url) = match result {
            PaymentResult::Approved {
                payment_id: Some(payment_id),
                redirect_url,
            } => (payment_id, redirect_url),
            other => {
                let message = other.error_message().unwrap_or(PAYMENT_FAILED).to_string();
                warn!(customer_id = %self.customer_id, message = %message, "Payment failed");
                store
                    .update_payment_status(&self.customer_id, PaymentStatus::Failed, None)
                    .map_err(|e| e.to_string())?;
                self.transition(PhaseEvent::Fail);
                self.error_message = Some(message.clone());
                return Ok(CheckoutOutcome::Failed { message });
            }
        };

        // Initiation accepted counts as paid; settlement is not polled here.
        match redirect_url {
            Some(url) => {
                let target = validate_redirect_url(&url, self.payment_base.as_ref())?;
                let url = target.to_string();
                store
                    .update_payment_status(&self.customer_id, PaymentStatus::Paid, Some(&payment_id))
                    .map_err(|e| e.to_string())?;
                self.transition(PhaseEvent::Redirect);
                self.navigation_target = Some(url.clone());
                info!(
                    customer_id = %self.customer_id,
                    payment_id = %payment_id,
                    host = target.host_str().unwrap_or(""),
                    "Redirecting to payment gateway"
                );
                if let Err(e) = self.services.navigator.open(&target) {
                    error!(customer_id = %self.customer_id, error = %e, "Could not open payment page");
                }
                Ok(CheckoutOutcome::Redirected { payment_id, url })
            }
            None => {
                store
                    .update_payment_status(&self.customer_id, PaymentStatus::Paid, Some(&payment_id))
                    .map_err(|e| e.to_string())?;
                self.transition(PhaseEvent::Settle);
                info!(
                    customer_id = %self.customer_id,
                    payment_id = %payment_id,
                    "Payment settled without redirect"
                );
                tokio::time::sleep(self.success_delay).await;
                self.screen = Screen::Success;
                Ok(CheckoutOutcome::Settled { payment_id })
            }
        }
    }

    fn transition(&mut self, event: PhaseEvent) {
        let current = self.phase();
        match current.next(event) {
            Some(next) => {
                debug!(from = ?current, to = ?next, "Payment phase change");
                self.phase.send_replace(next);
            }
            None => warn!(from = ?current, event = ?event, "Ignoring invalid payment phase change"),
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
