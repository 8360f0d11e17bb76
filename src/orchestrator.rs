use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tracing::{debug, info, warn};

use crate::config::CoreConfig;
use crate::error::LedgerError;
use crate::events::{EventBus, LedgerEvent};
use crate::gateway::{JobState, RawJobItem, RemoteGateway};
use crate::models::{
    format_quantity, format_unit_cost, Credentials, Invoice, InvoiceStatus, LedgerKind, LineItem,
};
use crate::registrar::AutoRegistrar;
use crate::store::InvoiceStore;

// ============================================================================
// DETAIL JOB ORCHESTRATOR
// ============================================================================

/// Queues server-side detail extraction for one invoice and resolves it
/// to line items in the background. `request_detail` returns once the job
/// is queued; the outcome arrives on the event stream.
pub struct DetailOrchestrator {
    store: Arc<InvoiceStore>,
    gateway: Arc<dyn RemoteGateway>,
    events: EventBus,
    registrar: Arc<AutoRegistrar>,
    active: Arc<DashMap<i64, ()>>,
    config: CoreConfig,
}

impl DetailOrchestrator {
    pub fn new(
        store: Arc<InvoiceStore>,
        gateway: Arc<dyn RemoteGateway>,
        events: EventBus,
        registrar: Arc<AutoRegistrar>,
        config: CoreConfig,
    ) -> Self {
        Self {
            store,
            gateway,
            events,
            registrar,
            active: Arc::new(DashMap::new()),
            config,
        }
    }

    pub async fn request_detail(
        &self,
        kind: LedgerKind,
        id: i64,
        credentials: &Credentials,
    ) -> Result<(), LedgerError> {
        if !credentials.is_complete() {
            return Err(LedgerError::MissingCredentials);
        }

        let invoice = self
            .store
            .find(kind, id)
            .ok_or(LedgerError::InvoiceNotFound { id })?;

        match invoice.status {
            InvoiceStatus::Processing => return Err(LedgerError::AlreadyProcessing { id }),
            // Line items are already attached; nothing to re-fetch.
            InvoiceStatus::Detailed | InvoiceStatus::Registered => return Ok(()),
            InvoiceStatus::Fetched => {}
        }

        // One polling loop per invoice, even when two triggers race.
        if self.active.insert(id, ()).is_some() {
            return Err(LedgerError::AlreadyProcessing { id });
        }

        let issuer_ruc = self
            .store
            .issuer_ruc(id)
            .unwrap_or_else(|| invoice.ruc.clone());
        let counterparty_ruc = match kind {
            LedgerKind::Purchases => credentials.ruc.clone(),
            LedgerKind::Sales => invoice.ruc.clone(),
        };

        let queued = self
            .gateway
            .enqueue_detail_job(
                &issuer_ruc,
                &invoice.series,
                &invoice.number,
                &counterparty_ruc,
                credentials,
            )
            .await;

        let job_id = match queued {
            Ok(response) if response.success => response.job_id,
            Ok(_) => {
                self.active.remove(&id);
                return Err(LedgerError::Transport {
                    message: "el servidor rechazó el encolado del trabajo".to_string(),
                });
            }
            Err(err) => {
                self.active.remove(&id);
                return Err(err);
            }
        };

        self.store.set_status(kind, id, InvoiceStatus::Processing);
        info!("🔄 Detail job {} queued for invoice {}", job_id, id);
        self.events.emit(LedgerEvent::DetailQueued { kind, id });

        self.spawn_poll_loop(kind, invoice, job_id);
        Ok(())
    }

    fn spawn_poll_loop(&self, kind: LedgerKind, invoice: Invoice, job_id: String) {
        let store = Arc::clone(&self.store);
        let gateway = Arc::clone(&self.gateway);
        let events = self.events.clone();
        let registrar = Arc::clone(&self.registrar);
        let active = Arc::clone(&self.active);
        let interval = self.config.poll_interval;
        let max_attempts = self.config.poll_max_attempts;

        tokio::spawn(async move {
            let id = invoice.id;
            let outcome = poll_job(gateway.as_ref(), &job_id, interval, max_attempts).await;

            match outcome {
                PollOutcome::Completed(raw_items) => {
                    let items = map_line_items(raw_items);
                    let count = items.len();
                    if store.set_detailed(kind, id, items.clone()) {
                        info!("✅ Invoice {} detailed with {} items", id, count);
                        events.emit(LedgerEvent::DetailCompleted { kind, id, items: count });
                        registrar.watch(kind, id);
                        persist_detail(gateway, &invoice, items).await;
                    } else {
                        // The session was cleared while we were polling.
                        warn!("Detail for invoice {} arrived after its ledger was reset", id);
                    }
                }
                PollOutcome::Failed(reason) => {
                    store.set_status(kind, id, InvoiceStatus::Fetched);
                    warn!("❌ Detail job for invoice {} failed: {}", id, reason);
                    events.emit(LedgerEvent::DetailFailed { kind, id, reason });
                }
                PollOutcome::TimedOut(attempts) => {
                    store.set_status(kind, id, InvoiceStatus::Fetched);
                    let reason = LedgerError::Timeout { attempts }.to_string();
                    warn!("⏰ Detail job {} for invoice {} timed out", job_id, id);
                    events.emit(LedgerEvent::DetailFailed { kind, id, reason });
                }
            }

            active.remove(&id);
        });
    }
}

enum PollOutcome {
    Completed(Vec<RawJobItem>),
    Failed(String),
    TimedOut(u32),
}

/// Bounded poll: every tick consumes one attempt, transport errors
/// included, until the job resolves or the budget runs out.
async fn poll_job(
    gateway: &dyn RemoteGateway,
    job_id: &str,
    interval: Duration,
    max_attempts: u32,
) -> PollOutcome {
    for attempt in 1..=max_attempts {
        tokio::time::sleep(interval).await;

        match gateway.poll_job_status(job_id).await {
            Ok(status) => match status.state {
                JobState::Completed => {
                    let items = status.result.map(|result| result.items).unwrap_or_default();
                    return PollOutcome::Completed(items);
                }
                JobState::Failed => {
                    let reason = status
                        .reason
                        .unwrap_or_else(|| "extracción fallida".to_string());
                    return PollOutcome::Failed(reason);
                }
                JobState::Queued => {
                    debug!("Job {} still queued ({}/{})", job_id, attempt, max_attempts);
                }
            },
            Err(err) => {
                // A lost poll is a wasted attempt, not a fatal error.
                warn!("Poll {}/{} for job {} failed: {}", attempt, max_attempts, job_id, err);
            }
        }
    }

    PollOutcome::TimedOut(max_attempts)
}

fn map_line_items(items: Vec<RawJobItem>) -> Vec<LineItem> {
    items
        .into_iter()
        .map(|item| LineItem {
            description: item.description,
            quantity: format_quantity(item.quantity),
            unit_cost: format_unit_cost(item.unit_value),
            unit_of_measure: item.unit.unwrap_or_default(),
        })
        .collect()
}

/// Best-effort persistence of the extracted items; failures never reach
/// the presentation layer.
async fn persist_detail(gateway: Arc<dyn RemoteGateway>, invoice: &Invoice, items: Vec<LineItem>) {
    let document_number = invoice.document_number();

    let (saved, marked) = tokio::join!(
        gateway.persist_line_items(&document_number, &items),
        gateway.mark_extraction_complete(&document_number, &items),
    );

    if let Err(err) = saved {
        warn!("Saving products for {} failed: {}", document_number, err);
    }
    if let Err(err) = marked {
        warn!(
            "Marking extraction complete for {} failed: {}",
            document_number, err
        );
    }
}
