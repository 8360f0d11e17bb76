pub mod invoice;

pub use invoice::{
    format_amount, format_exchange_rate, format_quantity, format_unit_cost, parse_issue_date,
    Credentials, Currency, DocumentType, Invoice, InvoiceStatus, LedgerKind, LineItem,
};
