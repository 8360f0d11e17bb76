use chrono::NaiveDate;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// LEDGER / CREDENTIALS
// ============================================================================

/// Which ledger a document belongs to, seen from the session owner's side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerKind {
    Purchases,
    Sales,
}

impl LedgerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerKind::Purchases => "purchases",
            LedgerKind::Sales => "sales",
        }
    }
}

/// Clave SOL credentials for the tax-authority portal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Credentials {
    pub ruc: String,
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn is_complete(&self) -> bool {
        !self.ruc.is_empty() && !self.username.is_empty() && !self.password.is_empty()
    }
}

// ============================================================================
// LIFECYCLE
// ============================================================================

/// Lifecycle of a tracked document. Forward-only, except the explicit
/// `Processing -> Fetched` rollback used on job failure or timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceStatus {
    #[default]
    Fetched,
    Processing,
    Detailed,
    Registered,
}

impl InvoiceStatus {
    /// Legal transitions only; everything else is treated as a stale or
    /// duplicate trigger and ignored by callers.
    pub fn can_transition(self, next: InvoiceStatus) -> bool {
        use InvoiceStatus::*;
        matches!(
            (self, next),
            (Fetched, Processing)
                | (Processing, Detailed)
                | (Processing, Fetched)
                | (Detailed, Registered)
        )
    }
}

// ============================================================================
// CATALOG ENUMS
// ============================================================================

/// Document class, from SUNAT catalog 01.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Factura,
    Boleta,
    Otro,
}

impl DocumentType {
    /// Accepts both the numeric catalog code and the printed name.
    pub fn from_code(code: &str) -> Self {
        match code.trim().to_ascii_uppercase().as_str() {
            "01" | "1" | "FACTURA" => DocumentType::Factura,
            "03" | "3" | "BOLETA" | "BOLETA DE VENTA" => DocumentType::Boleta,
            _ => DocumentType::Otro,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DocumentType::Factura => "Factura",
            DocumentType::Boleta => "Boleta de venta",
            DocumentType::Otro => "Otro",
        }
    }
}

/// Settlement currency. Unknown codes pass through untouched so the UI
/// shows exactly what the authority sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Currency {
    Soles,
    Dolares,
    Otra(String),
}

impl Currency {
    pub fn from_code(code: &str) -> Self {
        let trimmed = code.trim();
        match trimmed.to_ascii_uppercase().as_str() {
            "PEN" | "SOLES" => Currency::Soles,
            "USD" | "DOLARES" => Currency::Dolares,
            _ => Currency::Otra(trimmed.to_string()),
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Currency::Soles => write!(f, "Soles (PEN)"),
            Currency::Dolares => write!(f, "Dólares (USD)"),
            Currency::Otra(raw) => write!(f, "{}", raw),
        }
    }
}

// ============================================================================
// ENTITIES
// ============================================================================

/// One line of the extracted detail. String-typed decimals, exactly as
/// delivered to the UI; replaced wholesale on update, never patched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub description: String,
    pub quantity: String,
    pub unit_cost: String,
    pub unit_of_measure: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: i64,
    pub ruc: String,            // counterparty RUC for the active ledger
    pub business_name: String,
    pub series: String,
    pub number: String,
    pub issue_date: String,     // dd/mm/yyyy, as printed by the authority
    pub doc_type: DocumentType,
    pub year: String,
    pub currency: Currency,
    pub taxable_base: String,
    pub tax: String,
    pub total: String,
    pub exchange_rate: String,  // empty when not applicable
    pub status: InvoiceStatus,
    pub selected: bool,
    pub items: Vec<LineItem>,
}

impl Invoice {
    /// The key the backend addresses documents by.
    pub fn document_number(&self) -> String {
        format!("{}-{}", self.series, self.number)
    }

    /// De-duplication identity within one ledger.
    pub fn natural_key(&self) -> (&str, &str, &str) {
        (&self.ruc, &self.series, &self.number)
    }

    /// Issue date parsed for ordering. Unparsable dates sort as epoch.
    pub fn issue_date_parsed(&self) -> NaiveDate {
        parse_issue_date(&self.issue_date)
    }
}

// ============================================================================
// PARSE / FORMAT HELPERS
// ============================================================================

pub fn parse_issue_date(raw: &str) -> NaiveDate {
    NaiveDate::parse_from_str(raw.trim(), "%d/%m/%Y").unwrap_or_default()
}

/// Fixed two-decimal rendering for monetary amounts (118 -> "118.00").
/// A missing amount renders as "0.00".
pub fn format_amount(value: Option<f64>) -> String {
    match value.and_then(Decimal::from_f64) {
        Some(mut amount) => {
            amount.rescale(2);
            amount.to_string()
        }
        None => "0.00".to_string(),
    }
}

/// Quantity rendering: whole values drop their trailing zeros (3.0 -> "3").
pub fn format_quantity(value: Option<f64>) -> String {
    match value.and_then(Decimal::from_f64) {
        Some(quantity) => quantity.normalize().to_string(),
        None => "0".to_string(),
    }
}

/// Unit-cost rendering: two decimals when present, empty when missing.
pub fn format_unit_cost(value: Option<f64>) -> String {
    match value.and_then(Decimal::from_f64) {
        Some(mut cost) => {
            cost.rescale(2);
            cost.to_string()
        }
        None => String::new(),
    }
}

/// Exchange rate keeps whatever precision the authority sent; empty when
/// the document settles in local currency.
pub fn format_exchange_rate(value: Option<f64>) -> String {
    match value.and_then(Decimal::from_f64) {
        Some(rate) => rate.normalize().to_string(),
        None => String::new(),
    }
}
