pub mod invoice_service;
pub mod ledger;
pub mod meter;
pub mod sources;
pub mod visibility;

pub use invoice_service::InvoiceService;
