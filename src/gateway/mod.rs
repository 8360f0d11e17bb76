pub mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::models::{Credentials, Invoice, InvoiceStatus, LineItem};

// ============================================================================
// WIRE MODELS: tax-authority API
// ============================================================================

/// Raw search row as returned by the authority. Missing fields
/// deserialize to their defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawInvoiceRecord {
    pub issuer_ruc: String,
    pub issuer_name: String,
    pub period: String,
    pub issue_date: String,    // dd/mm/yyyy
    pub document_type: String, // catalog 01 code
    pub series: String,
    pub number: String,
    pub receiver_doc_type: String,
    pub receiver_ruc: String,
    pub receiver_name: String,
    pub taxable_base: Option<f64>,
    pub igv: Option<f64>,
    pub non_taxed_amount: Option<f64>,
    pub total: Option<f64>,
    pub currency: String,
    pub exchange_rate: Option<f64>,
    pub status: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PeriodResult {
    pub period: String,
    pub content: Vec<RawInvoiceRecord>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchInvoicesResponse {
    pub success: bool,
    pub results: Vec<PeriodResult>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EnqueueJobResponse {
    pub success: bool,
    pub job_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    #[default]
    Queued,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawJobItem {
    pub description: String,
    pub quantity: Option<f64>,
    pub unit_value: Option<f64>,
    pub unit: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct JobResult {
    pub items: Vec<RawJobItem>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct JobStatusResponse {
    pub state: JobState,
    pub progress: Option<f32>,
    pub result: Option<JobResult>,
    pub reason: Option<String>,
}

// ============================================================================
// WIRE MODELS: backend API
// ============================================================================

/// The backend's persisted view of an invoice, addressed by document
/// number (`SERIES-NUMBER`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BackendInvoice {
    pub id: i64,
    pub status: InvoiceStatus,
    pub series: String,
    pub number: String,
    pub details: Vec<BackendDetail>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BackendDetail {
    pub description: String,
    pub quantity: String,
    pub unit_cost: String,
    pub unit_of_measure: String,
}

impl From<BackendDetail> for LineItem {
    fn from(detail: BackendDetail) -> Self {
        LineItem {
            description: detail.description,
            quantity: detail.quantity,
            unit_cost: detail.unit_cost,
            unit_of_measure: detail.unit_of_measure,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LookupResponse {
    pub invoice: Option<BackendInvoice>,
}

/// Registration payload for a document first seen on the authority side.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewInvoice {
    pub document_number: String,
    pub ruc: String,
    pub business_name: String,
    pub series: String,
    pub number: String,
    pub issue_date: String,
    pub document_type: String,
    pub year: String,
    pub currency: String,
    pub taxable_base: String,
    pub igv: String,
    pub total: String,
    pub exchange_rate: String,
    pub status: InvoiceStatus,
}

impl NewInvoice {
    pub fn from_invoice(invoice: &Invoice) -> Self {
        Self {
            document_number: invoice.document_number(),
            ruc: invoice.ruc.clone(),
            business_name: invoice.business_name.clone(),
            series: invoice.series.clone(),
            number: invoice.number.clone(),
            issue_date: invoice.issue_date.clone(),
            document_type: invoice.doc_type.label().to_string(),
            year: invoice.year.clone(),
            currency: invoice.currency.to_string(),
            taxable_base: invoice.taxable_base.clone(),
            igv: invoice.tax.clone(),
            total: invoice.total.clone(),
            exchange_rate: invoice.exchange_rate.clone(),
            status: invoice.status,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RegisterResponse {
    pub success: bool,
    pub id: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BatchItemResult {
    pub success: bool,
    pub id: i64,
    pub document_number: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchRegisterResponse {
    pub results: Vec<BatchItemResult>,
}

// ============================================================================
// GATEWAY CONTRACT
// ============================================================================

/// Boundary to the tax-authority API and the backend API. The engine
/// depends on this contract only; transport lives in
/// [`http::HttpGateway`], tests plug in their own double.
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    async fn fetch_invoices(
        &self,
        period_start: &str,
        period_end: &str,
        credentials: &Credentials,
    ) -> Result<FetchInvoicesResponse, LedgerError>;

    /// Backend lookup by `SERIES-NUMBER`. Absence is
    /// [`LedgerError::NotFound`], not an empty payload.
    async fn lookup_invoice(&self, document_number: &str) -> Result<BackendInvoice, LedgerError>;

    async fn register_invoice(&self, invoice: &NewInvoice)
        -> Result<RegisterResponse, LedgerError>;

    async fn enqueue_detail_job(
        &self,
        issuer_ruc: &str,
        series: &str,
        number: &str,
        counterparty_ruc: &str,
        credentials: &Credentials,
    ) -> Result<EnqueueJobResponse, LedgerError>;

    async fn poll_job_status(&self, job_id: &str) -> Result<JobStatusResponse, LedgerError>;

    async fn persist_line_items(
        &self,
        document_number: &str,
        items: &[LineItem],
    ) -> Result<(), LedgerError>;

    async fn mark_extraction_complete(
        &self,
        document_number: &str,
        items: &[LineItem],
    ) -> Result<(), LedgerError>;

    async fn register_invoices_batch(
        &self,
        invoices: &[NewInvoice],
    ) -> Result<BatchRegisterResponse, LedgerError>;
}
