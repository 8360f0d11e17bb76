use std::sync::Arc;

use tracing::{debug, warn};

use crate::gateway::{NewInvoice, RawInvoiceRecord, RemoteGateway};
use crate::models::{
    format_amount, format_exchange_rate, parse_issue_date, Currency, DocumentType, Invoice,
    InvoiceStatus, LedgerKind, LineItem,
};
use crate::store::InvoiceStore;

/// Merges a freshly fetched authority result set with what the store and
/// the backend already know, keyed by (counterparty RUC, series, number).
/// Locally established lifecycle state survives a re-fetch; everything
/// the authority refreshes on every search (amounts, names, dates) is
/// taken from the new data.
pub struct Reconciler {
    store: Arc<InvoiceStore>,
    gateway: Arc<dyn RemoteGateway>,
}

impl Reconciler {
    pub fn new(store: Arc<InvoiceStore>, gateway: Arc<dyn RemoteGateway>) -> Self {
        Self { store, gateway }
    }

    pub async fn reconcile(
        &self,
        kind: LedgerKind,
        records: Vec<RawInvoiceRecord>,
    ) -> Vec<Invoice> {
        let existing = self.store.snapshot(kind);
        let mut next_id = self.store.next_id();
        let mut merged = Vec::with_capacity(records.len());

        for record in records {
            let mut invoice = Self::from_record(kind, &record);

            let known = existing.iter().find(|candidate| {
                candidate.natural_key()
                    == (
                        invoice.ruc.as_str(),
                        invoice.series.as_str(),
                        invoice.number.as_str(),
                    )
            });

            if let Some(known) = known {
                invoice.id = known.id;
                invoice.status = known.status;
                invoice.selected = known.selected;
                invoice.items = known.items.clone();
                if !known.exchange_rate.is_empty() {
                    invoice.exchange_rate = known.exchange_rate.clone();
                }
            } else {
                match self.gateway.lookup_invoice(&invoice.document_number()).await {
                    Ok(backend) => {
                        debug!(
                            "Backend already tracks {} as id {}",
                            invoice.document_number(),
                            backend.id
                        );
                        invoice.id = backend.id;
                        invoice.status = backend.status;
                        invoice.items = backend.details.into_iter().map(LineItem::from).collect();
                    }
                    Err(err) => {
                        invoice.id = next_id;
                        next_id += 1;
                        debug!(
                            "No backend record for {} ({}); registering in background",
                            invoice.document_number(),
                            err
                        );
                        self.spawn_deferred_registration(&invoice);
                    }
                }
            }

            self.store.set_issuer_ruc(invoice.id, record.issuer_ruc.clone());
            merged.push(invoice);
        }

        merged.sort_by_key(|invoice| invoice.issue_date_parsed());
        merged
    }

    fn from_record(kind: LedgerKind, record: &RawInvoiceRecord) -> Invoice {
        // The counterparty depends on which side of the operation we are.
        let (ruc, business_name) = match kind {
            LedgerKind::Purchases => (record.issuer_ruc.clone(), record.issuer_name.clone()),
            LedgerKind::Sales => (record.receiver_ruc.clone(), record.receiver_name.clone()),
        };

        Invoice {
            id: 0,
            ruc,
            business_name,
            series: record.series.clone(),
            number: record.number.clone(),
            issue_date: record.issue_date.clone(),
            doc_type: DocumentType::from_code(&record.document_type),
            year: fiscal_year(record),
            currency: Currency::from_code(&record.currency),
            taxable_base: format_amount(record.taxable_base),
            tax: format_amount(record.igv),
            total: format_amount(record.total),
            exchange_rate: format_exchange_rate(record.exchange_rate),
            status: InvoiceStatus::Fetched,
            selected: false,
            items: Vec::new(),
        }
    }

    /// Best-effort backfill of a document the backend has never seen.
    /// Never awaited by the caller, never surfaced to the user.
    fn spawn_deferred_registration(&self, invoice: &Invoice) {
        let gateway = Arc::clone(&self.gateway);
        let payload = NewInvoice::from_invoice(invoice);

        tokio::spawn(async move {
            match gateway.register_invoice(&payload).await {
                Ok(response) if response.success => {
                    debug!(
                        "Deferred registration of {} done (id {})",
                        payload.document_number, response.id
                    );
                }
                Ok(_) => warn!(
                    "Backend declined deferred registration of {}",
                    payload.document_number
                ),
                Err(err) => warn!(
                    "Deferred registration of {} failed: {}",
                    payload.document_number, err
                ),
            }
        });
    }
}

fn fiscal_year(record: &RawInvoiceRecord) -> String {
    // Period comes as yyyymm; fall back to the issue date when absent.
    if record.period.len() >= 4 && record.period.is_char_boundary(4) {
        record.period[..4].to_string()
    } else {
        parse_issue_date(&record.issue_date).format("%Y").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fiscal_year_prefers_the_period() {
        let record = RawInvoiceRecord {
            period: "202506".to_string(),
            issue_date: "15/06/2025".to_string(),
            ..Default::default()
        };
        assert_eq!(fiscal_year(&record), "2025");
    }

    #[test]
    fn fiscal_year_falls_back_to_issue_date() {
        let record = RawInvoiceRecord {
            period: String::new(),
            issue_date: "15/06/2024".to_string(),
            ..Default::default()
        };
        assert_eq!(fiscal_year(&record), "2024");
    }

    #[test]
    fn purchases_take_the_issuer_as_counterparty_sales_the_receiver() {
        let record = RawInvoiceRecord {
            issuer_ruc: "20111111111".to_string(),
            issuer_name: "PROVEEDOR SA".to_string(),
            receiver_ruc: "20999999999".to_string(),
            receiver_name: "CLIENTE SAC".to_string(),
            ..Default::default()
        };

        let purchase = Reconciler::from_record(LedgerKind::Purchases, &record);
        assert_eq!(purchase.ruc, "20111111111");
        assert_eq!(purchase.business_name, "PROVEEDOR SA");

        let sale = Reconciler::from_record(LedgerKind::Sales, &record);
        assert_eq!(sale.ruc, "20999999999");
        assert_eq!(sale.business_name, "CLIENTE SAC");
    }
}
