use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::json;
use tracing::debug;

use super::{
    BackendInvoice, BatchRegisterResponse, EnqueueJobResponse, FetchInvoicesResponse,
    JobStatusResponse, LookupResponse, NewInvoice, RegisterResponse, RemoteGateway,
};
use crate::config::CoreConfig;
use crate::error::LedgerError;
use crate::models::{Credentials, LineItem};

/// HTTP implementation of [`RemoteGateway`]: the authority API for search
/// and extraction jobs, the backend API for persistence.
pub struct HttpGateway {
    client: Client,
    authority_base_url: String,
    backend_base_url: String,
}

impl HttpGateway {
    pub fn new(config: &CoreConfig) -> Result<Self> {
        // The authority portal tracks the SOL session with cookies.
        let cookie_jar = Arc::new(reqwest::cookie::Jar::default());
        let client = Client::builder()
            .cookie_provider(cookie_jar)
            .cookie_store(true)
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            authority_base_url: config.authority_base_url.trim_end_matches('/').to_string(),
            backend_base_url: config.backend_base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl RemoteGateway for HttpGateway {
    async fn fetch_invoices(
        &self,
        period_start: &str,
        period_end: &str,
        credentials: &Credentials,
    ) -> Result<FetchInvoicesResponse, LedgerError> {
        let url = format!("{}/comprobantes/consulta", self.authority_base_url);
        debug!("🌐 Fetching invoices for {} .. {}", period_start, period_end);

        let response = self
            .client
            .post(&url)
            .json(&json!({
                "periodStart": period_start,
                "periodEnd": period_end,
                "ruc": credentials.ruc,
                "username": credentials.username,
                "password": credentials.password,
            }))
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json().await?)
    }

    async fn lookup_invoice(&self, document_number: &str) -> Result<BackendInvoice, LedgerError> {
        let url = format!("{}/invoices/{}", self.backend_base_url, document_number);

        let response = self.client.get(&url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(LedgerError::NotFound {
                document_number: document_number.to_string(),
            });
        }

        let body: LookupResponse = response.error_for_status()?.json().await?;
        body.invoice.ok_or_else(|| LedgerError::NotFound {
            document_number: document_number.to_string(),
        })
    }

    async fn register_invoice(
        &self,
        invoice: &NewInvoice,
    ) -> Result<RegisterResponse, LedgerError> {
        let url = format!("{}/invoices", self.backend_base_url);

        let response = self
            .client
            .post(&url)
            .json(invoice)
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json().await?)
    }

    async fn enqueue_detail_job(
        &self,
        issuer_ruc: &str,
        series: &str,
        number: &str,
        counterparty_ruc: &str,
        credentials: &Credentials,
    ) -> Result<EnqueueJobResponse, LedgerError> {
        let url = format!("{}/jobs/detalle", self.authority_base_url);
        debug!("🔄 Queuing detail job for {}-{}", series, number);

        let response = self
            .client
            .post(&url)
            .json(&json!({
                "issuerRuc": issuer_ruc,
                "series": series,
                "number": number,
                "counterpartyRuc": counterparty_ruc,
                "ruc": credentials.ruc,
                "username": credentials.username,
                "password": credentials.password,
            }))
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json().await?)
    }

    async fn poll_job_status(&self, job_id: &str) -> Result<JobStatusResponse, LedgerError> {
        let url = format!("{}/jobs/detalle/{}", self.authority_base_url, job_id);

        let response = self.client.get(&url).send().await?.error_for_status()?;
        Ok(response.json().await?)
    }

    async fn persist_line_items(
        &self,
        document_number: &str,
        items: &[LineItem],
    ) -> Result<(), LedgerError> {
        let url = format!("{}/invoices/{}/products", self.backend_base_url, document_number);

        self.client
            .post(&url)
            .json(&items)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn mark_extraction_complete(
        &self,
        document_number: &str,
        items: &[LineItem],
    ) -> Result<(), LedgerError> {
        let url = format!(
            "{}/invoices/{}/scraping-completed",
            self.backend_base_url, document_number
        );

        self.client
            .post(&url)
            .json(&items)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn register_invoices_batch(
        &self,
        invoices: &[NewInvoice],
    ) -> Result<BatchRegisterResponse, LedgerError> {
        let url = format!("{}/invoices/batch", self.backend_base_url);
        debug!("📦 Registering batch of {} invoices", invoices.len());

        let response = self
            .client
            .post(&url)
            .json(&invoices)
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json().await?)
    }
}
