use std::sync::Arc;

use anyhow::Result;
use tokio::sync::{broadcast, watch};
use tracing::info;

use crate::config::CoreConfig;
use crate::error::LedgerError;
use crate::events::{EventBus, LedgerEvent};
use crate::gateway::http::HttpGateway;
use crate::gateway::{NewInvoice, RemoteGateway};
use crate::models::{Credentials, Invoice, InvoiceStatus, LedgerKind};
use crate::orchestrator::DetailOrchestrator;
use crate::reconcile::Reconciler;
use crate::registrar::AutoRegistrar;
use crate::store::InvoiceStore;

const EVENT_CAPACITY: usize = 64;

// ============================================================================
// SESSION ROOT
// ============================================================================

/// Per-user session root. Owns the store and every engine component;
/// constructed explicitly at the application root and passed by
/// reference, never a process-wide singleton.
pub struct LedgerSession {
    store: Arc<InvoiceStore>,
    gateway: Arc<dyn RemoteGateway>,
    reconciler: Reconciler,
    orchestrator: DetailOrchestrator,
    registrar: Arc<AutoRegistrar>,
    events: EventBus,
}

impl LedgerSession {
    /// Wires the session against the real HTTP gateway.
    pub fn connect(config: CoreConfig) -> Result<Self> {
        let gateway: Arc<dyn RemoteGateway> = Arc::new(HttpGateway::new(&config)?);
        Ok(Self::with_gateway(config, gateway))
    }

    /// Wires the session against any gateway implementation; tests inject
    /// their double here.
    pub fn with_gateway(config: CoreConfig, gateway: Arc<dyn RemoteGateway>) -> Self {
        let store = Arc::new(InvoiceStore::new());
        let events = EventBus::new(EVENT_CAPACITY);

        let registrar = Arc::new(AutoRegistrar::new(
            Arc::clone(&store),
            Arc::clone(&gateway),
            events.clone(),
            config.auto_register_grace,
        ));
        let reconciler = Reconciler::new(Arc::clone(&store), Arc::clone(&gateway));
        let orchestrator = DetailOrchestrator::new(
            Arc::clone(&store),
            Arc::clone(&gateway),
            events.clone(),
            Arc::clone(&registrar),
            config,
        );

        Self {
            store,
            gateway,
            reconciler,
            orchestrator,
            registrar,
            events,
        }
    }

    // ------------------------------------------------------------------
    // Operations exposed to the presentation layer
    // ------------------------------------------------------------------

    /// Fetches a period from the authority and reconciles it into the
    /// store. A period already in the cache skips the remote roundtrip.
    pub async fn sync_ledger(
        &self,
        kind: LedgerKind,
        period_start: &str,
        period_end: &str,
        credentials: &Credentials,
    ) -> Result<usize, LedgerError> {
        if !credentials.is_complete() {
            return Err(LedgerError::MissingCredentials);
        }

        if let Some(cached) = self.store.cache_get(kind, period_start) {
            let count = cached.len();
            info!(
                "Ledger {} period {} served from cache ({} rows)",
                kind.as_str(),
                period_start,
                count
            );
            self.store.replace(kind, cached);
            self.events.emit(LedgerEvent::LedgerSynced { kind, count });
            return Ok(count);
        }

        let response = match self
            .gateway
            .fetch_invoices(period_start, period_end, credentials)
            .await
        {
            Ok(response) => response,
            Err(err) => {
                self.events.emit(LedgerEvent::TransportError {
                    message: err.to_string(),
                });
                return Err(err);
            }
        };

        if !response.success {
            let err = LedgerError::Transport {
                message: "la consulta de comprobantes fue rechazada".to_string(),
            };
            self.events.emit(LedgerEvent::TransportError {
                message: err.to_string(),
            });
            return Err(err);
        }

        let records: Vec<_> = response
            .results
            .into_iter()
            .flat_map(|result| result.content)
            .collect();
        let invoices = self.reconciler.reconcile(kind, records).await;
        let count = invoices.len();

        self.store.cache_put(kind, period_start, invoices.clone());
        self.store.replace(kind, invoices);
        info!(
            "📥 Ledger {} synced: {} invoices for {}",
            kind.as_str(),
            count,
            period_start
        );
        self.events.emit(LedgerEvent::LedgerSynced { kind, count });
        Ok(count)
    }

    /// User "view detail" action. Returns once the extraction job is
    /// queued; completion arrives on the event stream.
    pub async fn request_detail(
        &self,
        kind: LedgerKind,
        id: i64,
        credentials: &Credentials,
    ) -> Result<(), LedgerError> {
        self.orchestrator.request_detail(kind, id, credentials).await
    }

    /// Explicit bulk registration of `Detailed` invoices. Successes commit
    /// individually; one failed row fails the whole operation's report,
    /// without rolling the committed ones back.
    pub async fn register_invoices(
        &self,
        kind: LedgerKind,
        ids: &[i64],
    ) -> Result<(), LedgerError> {
        let candidates: Vec<Invoice> = self
            .store
            .snapshot(kind)
            .into_iter()
            .filter(|invoice| {
                ids.contains(&invoice.id) && invoice.status == InvoiceStatus::Detailed
            })
            .collect();

        if candidates.is_empty() {
            return Ok(());
        }

        let payload: Vec<NewInvoice> = candidates.iter().map(NewInvoice::from_invoice).collect();
        let response = self.gateway.register_invoices_batch(&payload).await?;

        let mut ok = 0usize;
        let mut failed = 0usize;
        for invoice in &candidates {
            let result = response
                .results
                .iter()
                .find(|result| result.document_number == invoice.document_number());
            match result {
                Some(result) if result.success => {
                    self.store
                        .set_status(kind, invoice.id, InvoiceStatus::Registered);
                    self.registrar.release(invoice.id);
                    ok += 1;
                }
                _ => failed += 1,
            }
        }

        self.events
            .emit(LedgerEvent::BatchRegistered { kind, ok, failed });

        if failed > 0 {
            return Err(LedgerError::PartialRegistration {
                failed,
                total: candidates.len(),
            });
        }
        Ok(())
    }

    pub fn snapshot(&self, kind: LedgerKind) -> Vec<Invoice> {
        self.store.snapshot(kind)
    }

    pub fn subscribe(&self, kind: LedgerKind) -> watch::Receiver<Vec<Invoice>> {
        self.store.subscribe(kind)
    }

    pub fn issuer_ruc(&self, id: i64) -> Option<String> {
        self.store.issuer_ruc(id)
    }

    pub fn events(&self) -> broadcast::Receiver<LedgerEvent> {
        self.events.subscribe()
    }

    pub fn store(&self) -> &Arc<InvoiceStore> {
        &self.store
    }

    /// Logout: wipes both ledgers, the period cache and the issuer index.
    /// In-flight extraction tasks run to completion and land on the
    /// cleared collections as no-ops.
    pub fn logout(&self) {
        self.store.clear_all();
        self.events.emit(LedgerEvent::SessionCleared);
        info!("Session cleared");
    }
}
