use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::models::{Invoice, InvoiceStatus, LedgerKind, LineItem};

// ============================================================================
// INVOICE STORE
// ============================================================================

struct Ledger {
    rows: Mutex<Vec<Invoice>>,
    tx: watch::Sender<Vec<Invoice>>,
}

impl Ledger {
    fn new() -> Self {
        let (tx, _rx) = watch::channel(Vec::new());
        Self {
            rows: Mutex::new(Vec::new()),
            tx,
        }
    }
}

/// Single source of truth for both ledgers, the period result cache and
/// the issuer-RUC side index. All mutations pass through [`update`],
/// which serializes on a per-ledger lock; everything else is a read.
/// None of these operations can fail.
///
/// [`update`]: InvoiceStore::update
pub struct InvoiceStore {
    purchases: Ledger,
    sales: Ledger,
    period_cache: DashMap<(LedgerKind, String), Vec<Invoice>>,
    issuer_rucs: DashMap<i64, String>,
}

impl InvoiceStore {
    pub fn new() -> Self {
        Self {
            purchases: Ledger::new(),
            sales: Ledger::new(),
            period_cache: DashMap::new(),
            issuer_rucs: DashMap::new(),
        }
    }

    fn ledger(&self, kind: LedgerKind) -> &Ledger {
        match kind {
            LedgerKind::Purchases => &self.purchases,
            LedgerKind::Sales => &self.sales,
        }
    }

    /// Latest committed state of a ledger. Never blocks on background work.
    pub fn snapshot(&self, kind: LedgerKind) -> Vec<Invoice> {
        self.ledger(kind).rows.lock().clone()
    }

    /// Applies `f` to the collection and commits the result atomically.
    /// Concurrent updates on the same ledger serialize; subscribers see a
    /// coalesced stream that always ends in the final value.
    pub fn update(&self, kind: LedgerKind, f: impl FnOnce(&mut Vec<Invoice>)) {
        let ledger = self.ledger(kind);
        let snapshot = {
            let mut rows = ledger.rows.lock();
            f(&mut rows);
            rows.clone()
        };
        ledger.tx.send_replace(snapshot);
    }

    /// Unconditionally sets a ledger, as after a remote fetch.
    pub fn replace(&self, kind: LedgerKind, invoices: Vec<Invoice>) {
        self.update(kind, |rows| *rows = invoices);
    }

    pub fn subscribe(&self, kind: LedgerKind) -> watch::Receiver<Vec<Invoice>> {
        self.ledger(kind).tx.subscribe()
    }

    pub fn find(&self, kind: LedgerKind, id: i64) -> Option<Invoice> {
        self.ledger(kind)
            .rows
            .lock()
            .iter()
            .find(|invoice| invoice.id == id)
            .cloned()
    }

    /// Synthetic ids are allocated `max(existing) + 1` across both ledgers
    /// and never reused.
    pub fn next_id(&self) -> i64 {
        let purchases_max = self
            .purchases
            .rows
            .lock()
            .iter()
            .map(|invoice| invoice.id)
            .max()
            .unwrap_or(0);
        let sales_max = self
            .sales
            .rows
            .lock()
            .iter()
            .map(|invoice| invoice.id)
            .max()
            .unwrap_or(0);
        purchases_max.max(sales_max) + 1
    }

    /// Commits `next` only when the state machine allows it. Stale or
    /// duplicate triggers degrade to a no-op; returns whether it applied.
    pub fn set_status(&self, kind: LedgerKind, id: i64, next: InvoiceStatus) -> bool {
        let mut applied = false;
        self.update(kind, |rows| {
            if let Some(invoice) = rows.iter_mut().find(|invoice| invoice.id == id) {
                if invoice.status.can_transition(next) {
                    invoice.status = next;
                    applied = true;
                }
            }
        });
        applied
    }

    /// Commits the extracted line items together with the `Detailed`
    /// promotion, as one atomic update.
    pub fn set_detailed(&self, kind: LedgerKind, id: i64, items: Vec<LineItem>) -> bool {
        let mut applied = false;
        self.update(kind, |rows| {
            if let Some(invoice) = rows.iter_mut().find(|invoice| invoice.id == id) {
                if invoice.status.can_transition(InvoiceStatus::Detailed) {
                    invoice.items = items;
                    invoice.status = InvoiceStatus::Detailed;
                    applied = true;
                }
            }
        });
        applied
    }

    // ------------------------------------------------------------------
    // Period cache: populated once per (kind, period), dropped only by
    // clear_all.
    // ------------------------------------------------------------------

    pub fn cache_get(&self, kind: LedgerKind, period: &str) -> Option<Vec<Invoice>> {
        self.period_cache
            .get(&(kind, period.to_string()))
            .map(|entry| entry.value().clone())
    }

    pub fn cache_put(&self, kind: LedgerKind, period: &str, invoices: Vec<Invoice>) {
        self.period_cache.insert((kind, period.to_string()), invoices);
    }

    // ------------------------------------------------------------------
    // Issuer index: invoice id -> RUC of the document issuer, needed by
    // the detail-extraction request.
    // ------------------------------------------------------------------

    pub fn set_issuer_ruc(&self, id: i64, ruc: impl Into<String>) {
        self.issuer_rucs.insert(id, ruc.into());
    }

    pub fn issuer_ruc(&self, id: i64) -> Option<String> {
        self.issuer_rucs.get(&id).map(|entry| entry.value().clone())
    }

    /// Logout. In-flight background tasks are not cancelled; their late
    /// writes land on the cleared collections as no-ops.
    pub fn clear_all(&self) {
        self.replace(LedgerKind::Purchases, Vec::new());
        self.replace(LedgerKind::Sales, Vec::new());
        self.period_cache.clear();
        self.issuer_rucs.clear();
    }
}

impl Default for InvoiceStore {
    fn default() -> Self {
        Self::new()
    }
}
