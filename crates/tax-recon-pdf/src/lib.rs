pub mod layout;
pub mod membership;
pub mod pdf;
pub mod report;

pub use layout::Document;
pub use membership::{membership_document, membership_tax_document};
pub use report::{ReportInfo, reconciliation_document};

/// File name prefix of the reconciliation report.
pub const RECONCILIATION_PREFIX: &str = "Transaction_Tax_Analysis";
/// File name prefix of the membership report.
pub const MEMBERSHIP_PREFIX: &str = "Membership_Analysis";
/// File name prefix of the membership tax summary.
pub const MEMBERSHIP_TAX_PREFIX: &str = "Membership_Tax";
