#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use sunat_ledger::error::LedgerError;
use sunat_ledger::gateway::{
    BackendInvoice, BatchItemResult, BatchRegisterResponse, EnqueueJobResponse,
    FetchInvoicesResponse, JobStatusResponse, NewInvoice, RawInvoiceRecord, RegisterResponse,
    RemoteGateway,
};
use sunat_ledger::models::{Credentials, LineItem};
use sunat_ledger::{CoreConfig, LedgerSession};

// ============================================================================
// MOCK GATEWAY
// ============================================================================

/// Programmable gateway double: scripted responses plus call recording.
/// An empty poll script answers `queued` forever.
pub struct MockGateway {
    pub fetch_response: Mutex<FetchInvoicesResponse>,
    pub fail_fetch: Mutex<bool>,
    pub backend: Mutex<HashMap<String, BackendInvoice>>,
    pub fail_lookups: Mutex<bool>,
    pub enqueue_ok: Mutex<bool>,
    pub poll_script: Mutex<VecDeque<JobStatusResponse>>,
    pub batch_response: Mutex<Option<BatchRegisterResponse>>,

    pub fetch_calls: Mutex<u32>,
    pub lookup_calls: Mutex<u32>,
    pub enqueue_calls: Mutex<u32>,
    pub poll_calls: Mutex<u32>,
    pub registered: Mutex<Vec<NewInvoice>>,
    pub batch_calls: Mutex<Vec<Vec<NewInvoice>>>,
    pub persisted: Mutex<Vec<(String, Vec<LineItem>)>>,
    pub completed_marks: Mutex<Vec<String>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            fetch_response: Mutex::new(FetchInvoicesResponse {
                success: true,
                results: Vec::new(),
            }),
            fail_fetch: Mutex::new(false),
            backend: Mutex::new(HashMap::new()),
            fail_lookups: Mutex::new(false),
            enqueue_ok: Mutex::new(true),
            poll_script: Mutex::new(VecDeque::new()),
            batch_response: Mutex::new(None),
            fetch_calls: Mutex::new(0),
            lookup_calls: Mutex::new(0),
            enqueue_calls: Mutex::new(0),
            poll_calls: Mutex::new(0),
            registered: Mutex::new(Vec::new()),
            batch_calls: Mutex::new(Vec::new()),
            persisted: Mutex::new(Vec::new()),
            completed_marks: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl RemoteGateway for MockGateway {
    async fn fetch_invoices(
        &self,
        _period_start: &str,
        _period_end: &str,
        _credentials: &Credentials,
    ) -> Result<FetchInvoicesResponse, LedgerError> {
        *self.fetch_calls.lock() += 1;
        if *self.fail_fetch.lock() {
            return Err(LedgerError::Transport {
                message: "connection refused".to_string(),
            });
        }
        Ok(self.fetch_response.lock().clone())
    }

    async fn lookup_invoice(&self, document_number: &str) -> Result<BackendInvoice, LedgerError> {
        *self.lookup_calls.lock() += 1;
        if *self.fail_lookups.lock() {
            return Err(LedgerError::Transport {
                message: "connection refused".to_string(),
            });
        }
        self.backend
            .lock()
            .get(document_number)
            .cloned()
            .ok_or_else(|| LedgerError::NotFound {
                document_number: document_number.to_string(),
            })
    }

    async fn register_invoice(
        &self,
        invoice: &NewInvoice,
    ) -> Result<RegisterResponse, LedgerError> {
        self.registered.lock().push(invoice.clone());
        Ok(RegisterResponse {
            success: true,
            id: 1,
        })
    }

    async fn enqueue_detail_job(
        &self,
        _issuer_ruc: &str,
        _series: &str,
        _number: &str,
        _counterparty_ruc: &str,
        _credentials: &Credentials,
    ) -> Result<EnqueueJobResponse, LedgerError> {
        *self.enqueue_calls.lock() += 1;
        if !*self.enqueue_ok.lock() {
            return Err(LedgerError::Transport {
                message: "connection refused".to_string(),
            });
        }
        Ok(EnqueueJobResponse {
            success: true,
            job_id: "job-1".to_string(),
        })
    }

    async fn poll_job_status(&self, _job_id: &str) -> Result<JobStatusResponse, LedgerError> {
        *self.poll_calls.lock() += 1;
        // Default response is `queued`.
        Ok(self.poll_script.lock().pop_front().unwrap_or_default())
    }

    async fn persist_line_items(
        &self,
        document_number: &str,
        items: &[LineItem],
    ) -> Result<(), LedgerError> {
        self.persisted
            .lock()
            .push((document_number.to_string(), items.to_vec()));
        Ok(())
    }

    async fn mark_extraction_complete(
        &self,
        document_number: &str,
        _items: &[LineItem],
    ) -> Result<(), LedgerError> {
        self.completed_marks.lock().push(document_number.to_string());
        Ok(())
    }

    async fn register_invoices_batch(
        &self,
        invoices: &[NewInvoice],
    ) -> Result<BatchRegisterResponse, LedgerError> {
        self.batch_calls.lock().push(invoices.to_vec());
        let scripted = self.batch_response.lock().clone();
        Ok(scripted.unwrap_or_else(|| BatchRegisterResponse {
            results: invoices
                .iter()
                .map(|invoice| BatchItemResult {
                    success: true,
                    id: 1,
                    document_number: invoice.document_number.clone(),
                })
                .collect(),
        }))
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub fn test_session(gateway: Arc<MockGateway>) -> LedgerSession {
    LedgerSession::with_gateway(CoreConfig::default(), gateway)
}

pub fn credentials() -> Credentials {
    Credentials {
        ruc: "20600000001".to_string(),
        username: "MODDATOS".to_string(),
        password: "moddatos".to_string(),
    }
}

pub fn raw_record(ruc: &str, series: &str, number: &str, date: &str, total: f64) -> RawInvoiceRecord {
    RawInvoiceRecord {
        issuer_ruc: ruc.to_string(),
        issuer_name: "PROVEEDOR UNO SAC".to_string(),
        period: "202506".to_string(),
        issue_date: date.to_string(),
        document_type: "01".to_string(),
        series: series.to_string(),
        number: number.to_string(),
        receiver_doc_type: "6".to_string(),
        receiver_ruc: "20600000001".to_string(),
        receiver_name: "MI EMPRESA SAC".to_string(),
        taxable_base: Some(total / 1.18),
        igv: Some(total - total / 1.18),
        non_taxed_amount: None,
        total: Some(total),
        currency: "PEN".to_string(),
        exchange_rate: None,
        status: "1".to_string(),
    }
}
