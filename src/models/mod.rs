//! Data models for the library server

pub mod enums;
pub mod loan;
pub mod publication;
pub mod user;

// Re-export commonly used types
pub use enums::{LoanStatus, PublicationType, Role};
pub use loan::{BorrowingStats, Loan, LoanDetails, LoanFilter, LoanPolicy};
pub use publication::Publication;
pub use user::{Account, Actor, BorrowerSummary, UserClaims};
