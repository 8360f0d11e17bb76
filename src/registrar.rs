use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tracing::{info, warn};

use crate::events::{EventBus, LedgerEvent};
use crate::gateway::{NewInvoice, RemoteGateway};
use crate::models::{InvoiceStatus, LedgerKind};
use crate::store::InvoiceStore;

/// Promotes invoices that stay `Detailed` through a grace period to
/// `Registered`, without user action. An invoice that leaves `Detailed`
/// before the grace elapses is left alone.
pub struct AutoRegistrar {
    store: Arc<InvoiceStore>,
    gateway: Arc<dyn RemoteGateway>,
    events: EventBus,
    pending: Arc<DashMap<i64, ()>>,
    grace: Duration,
}

impl AutoRegistrar {
    pub fn new(
        store: Arc<InvoiceStore>,
        gateway: Arc<dyn RemoteGateway>,
        events: EventBus,
        grace: Duration,
    ) -> Self {
        Self {
            store,
            gateway,
            events,
            pending: Arc::new(DashMap::new()),
            grace,
        }
    }

    /// Arms the grace timer for an invoice that just became `Detailed`.
    /// A second call while a timer is pending is a no-op.
    pub fn watch(&self, kind: LedgerKind, id: i64) {
        if self.pending.insert(id, ()).is_some() {
            return;
        }

        let store = Arc::clone(&self.store);
        let gateway = Arc::clone(&self.gateway);
        let events = self.events.clone();
        let pending = Arc::clone(&self.pending);
        let grace = self.grace;

        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            fire(&store, gateway.as_ref(), &events, kind, id).await;
            pending.remove(&id);
        });
    }

    /// Drops the pending timer when the invoice leaves `Detailed` by some
    /// other path (manual confirmation, bulk registration, logout).
    pub fn release(&self, id: i64) {
        self.pending.remove(&id);
    }
}

async fn fire(
    store: &InvoiceStore,
    gateway: &dyn RemoteGateway,
    events: &EventBus,
    kind: LedgerKind,
    id: i64,
) {
    let invoice = match store.find(kind, id) {
        Some(invoice) if invoice.status == InvoiceStatus::Detailed => invoice,
        // Registered manually (or gone) inside the grace window.
        _ => return,
    };

    let payload = vec![NewInvoice::from_invoice(&invoice)];
    match gateway.register_invoices_batch(&payload).await {
        Ok(response)
            if !response.results.is_empty()
                && response.results.iter().all(|result| result.success) =>
        {
            store.set_status(kind, id, InvoiceStatus::Registered);
            info!("📌 Invoice {} auto-registered", id);
            events.emit(LedgerEvent::AutoRegistered { kind, id });
        }
        Ok(_) => warn!("Backend declined auto-registration of invoice {}", id),
        Err(err) => warn!("Auto-registration of invoice {} failed: {}", id, err),
    }
}
