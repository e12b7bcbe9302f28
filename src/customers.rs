//! Customer record store.
//!
//! Holds every customer checked in at the counter together with their
//! current order, total and payment status. All mutation goes through the
//! store's update methods; callers only ever receive copies of records.
//!
//! The full collection is loaded once when the store is opened and saved
//! back through the configured [`CustomerPersistence`] after every
//! mutating call, so a restart picks up exactly where the counter left off.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::StoreError;

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(PaymentStatus::Pending),
            "paid" => Some(PaymentStatus::Paid),
            "failed" => Some(PaymentStatus::Failed),
            _ => None,
        }
    }
}

/// One product's selected quantity within an order. Name and price are
/// copied from the catalog when the line is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    #[serde(rename = "id")]
    pub product_id: String,
    pub name: String,
    #[serde(rename = "price", with = "rust_decimal::serde::float")]
    pub unit_price: Decimal,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerRecord {
    pub id: String,
    pub name: String,
    pub phone: String,
    /// Creation time, unix milliseconds.
    pub timestamp: i64,
    pub completed: bool,
    pub order: Vec<OrderLine>,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_amount: Decimal,
    pub payment_status: PaymentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

/// Durable home of the customer collection. `save` always receives the
/// whole collection in store order.
pub trait CustomerPersistence: Send + Sync {
    fn load(&self) -> Result<Vec<CustomerRecord>, StoreError>;
    fn save(&self, customers: &[CustomerRecord]) -> Result<(), StoreError>;
}

/// Keeps the serialized collection in memory. Clones share the same slot, so
/// a second store opened on a clone sees what the first one saved.
#[derive(Debug, Clone, Default)]
pub struct MemoryPersistence {
    slot: Arc<Mutex<Option<String>>>,
    saves: Arc<AtomicUsize>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `save` calls seen so far.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl CustomerPersistence for MemoryPersistence {
    fn load(&self) -> Result<Vec<CustomerRecord>, StoreError> {
        let slot = self.slot.lock().map_err(|_| StoreError::Lock)?;
        match slot.as_deref() {
            Some(raw) => Ok(serde_json::from_str(raw)?),
            None => Ok(Vec::new()),
        }
    }

    fn save(&self, customers: &[CustomerRecord]) -> Result<(), StoreError> {
        let raw = serde_json::to_string(customers)?;
        *self.slot.lock().map_err(|_| StoreError::Lock)? = Some(raw);
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

struct StoreInner {
    customers: Vec<CustomerRecord>,
    /// Highest millisecond id handed out (or loaded); new ids go above it.
    last_id_ms: i64,
}

pub struct CustomerStore {
    inner: Mutex<StoreInner>,
    persistence: Box<dyn CustomerPersistence>,
}

impl CustomerStore {
    /// Load the collection from `persistence` and wrap it in a store.
    pub fn open(persistence: Box<dyn CustomerPersistence>) -> Result<Self, StoreError> {
        let customers = persistence.load()?;
        let last_id_ms = customers
            .iter()
            .filter_map(|c| c.id.parse::<i64>().ok())
            .max()
            .unwrap_or(0);
        info!(count = customers.len(), "Customer store loaded");
        Ok(Self {
            inner: Mutex::new(StoreInner {
                customers,
                last_id_ms,
            }),
            persistence,
        })
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Check a new customer in. The record starts with an empty order, a zero
    /// total and a pending payment.
    pub fn create_customer(&self, name: &str, phone: &str) -> Result<String, StoreError> {
        let mut inner = self.lock();
        let now = Utc::now().timestamp_millis();
        let id_ms = now.max(inner.last_id_ms + 1);

        let id = id_ms.to_string();
        let mut next = inner.customers.clone();
        next.push(CustomerRecord {
            id: id.clone(),
            name: name.to_string(),
            phone: phone.to_string(),
            timestamp: now,
            completed: false,
            order: Vec::new(),
            total_amount: Decimal::ZERO,
            payment_status: PaymentStatus::Pending,
            payment_id: None,
        });
        self.commit(&mut inner, next)?;
        inner.last_id_ms = id_ms;

        info!(customer_id = %id, "Customer created");
        Ok(id)
    }

    pub fn update_contact_info(&self, id: &str, name: &str, phone: &str) -> Result<(), StoreError> {
        self.update(id, "update_contact_info", |c| {
            c.name = name.to_string();
            c.phone = phone.to_string();
        })
    }

    pub fn update_order(
        &self,
        id: &str,
        lines: Vec<OrderLine>,
        total: Decimal,
    ) -> Result<(), StoreError> {
        self.update(id, "update_order", |c| {
            c.order = lines;
            c.total_amount = total;
        })
    }

    /// Contact details and order in one write, as checkout saves them.
    pub fn record_order(
        &self,
        id: &str,
        name: &str,
        phone: &str,
        lines: Vec<OrderLine>,
        total: Decimal,
    ) -> Result<(), StoreError> {
        self.update(id, "record_order", |c| {
            c.name = name.to_string();
            c.phone = phone.to_string();
            c.order = lines;
            c.total_amount = total;
        })
    }

    /// Set the payment status. The stored payment id is replaced by
    /// `payment_id`, so passing `None` clears any earlier id.
    pub fn update_payment_status(
        &self,
        id: &str,
        status: PaymentStatus,
        payment_id: Option<&str>,
    ) -> Result<(), StoreError> {
        self.update(id, "update_payment_status", |c| {
            c.payment_status = status;
            c.payment_id = payment_id.map(str::to_string);
        })
    }

    pub fn mark_completed(&self, id: &str) -> Result<(), StoreError> {
        self.update(id, "mark_completed", |c| c.completed = true)
    }

    pub fn remove(&self, id: &str) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let mut next = inner.customers.clone();
        next.retain(|c| c.id != id);
        let removed = next.len() != inner.customers.len();
        self.commit(&mut inner, next)?;
        if removed {
            info!(customer_id = %id, "Customer removed");
        } else {
            debug!(customer_id = %id, "remove: no such customer");
        }
        Ok(())
    }

    pub fn get_by_id(&self, id: &str) -> Option<CustomerRecord> {
        self.lock().customers.iter().find(|c| c.id == id).cloned()
    }

    /// Customers not yet marked completed, in check-in order.
    pub fn list_active(&self) -> Vec<CustomerRecord> {
        self.lock()
            .customers
            .iter()
            .filter(|c| !c.completed)
            .cloned()
            .collect()
    }

    /// Every record, completed or not, in store order.
    pub fn all(&self) -> Vec<CustomerRecord> {
        self.lock().customers.clone()
    }

    /// Apply `apply` to the matching record, if any, then save. An unknown id
    /// is not an error: nothing changes and the collection is saved as is.
    fn update<F>(&self, id: &str, op: &str, apply: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut CustomerRecord),
    {
        let mut inner = self.lock();
        let mut next = inner.customers.clone();
        match next.iter_mut().find(|c| c.id == id) {
            Some(customer) => apply(customer),
            None => debug!(customer_id = %id, op, "no such customer, update skipped"),
        }
        self.commit(&mut inner, next)
    }

    /// Persist `next` and only then make it the live collection, so a failed
    /// save leaves the store exactly as it was.
    fn commit(&self, inner: &mut StoreInner, next: Vec<CustomerRecord>) -> Result<(), StoreError> {
        self.persistence.save(&next)?;
        inner.customers = next;
        Ok(())
    }
}

// ===========================================================================
// Tests
// ===========================================================================
