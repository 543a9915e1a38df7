pub mod approval;
pub mod handlers;
pub mod service;
pub mod types;

pub use handlers::configure;
pub use types::{Quotation, QuotationStatus};
