//! Storage seam of the borrow/return ledger.
//!
//! A [`LedgerTx`] is a scoped transaction: the rows it locks stay locked
//! until [`LedgerTx::commit`] or until the handle is dropped, in which case
//! every staged write is rolled back.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::{
    error::AppResult,
    models::{
        loan::{BorrowingStats, Loan, LoanDetails, LoanFilter, NewLoan},
        publication::Publication,
    },
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Open a transaction
    async fn begin(&self) -> AppResult<Box<dyn LedgerTx>>;

    /// Every loan of a borrower, newest first
    async fn borrower_loans(&self, borrower_id: i32, today: NaiveDate) -> AppResult<Vec<LoanDetails>>;

    /// Most recent loans passing `filter`, newest first
    async fn recent_loans(
        &self,
        filter: &LoanFilter,
        today: NaiveDate,
        limit: i64,
    ) -> AppResult<Vec<LoanDetails>>;

    async fn stats(&self, today: NaiveDate) -> AppResult<BorrowingStats>;
}

#[async_trait]
pub trait LedgerTx: Send {
    /// Lock a borrower row so that borrows by one borrower run one at a
    /// time. `false` when the borrower does not exist.
    async fn lock_borrower(&mut self, borrower_id: i32) -> AppResult<bool>;

    /// Lock a publication row and read it
    async fn lock_publication(&mut self, publication_id: i32) -> AppResult<Option<Publication>>;

    /// Lock a loan row and read it
    async fn lock_loan(&mut self, loan_id: i32) -> AppResult<Option<Loan>>;

    async fn has_active_loan(&mut self, publication_id: i32, borrower_id: i32) -> AppResult<bool>;

    async fn count_active_loans(&mut self, borrower_id: i32) -> AppResult<i64>;

    async fn insert_loan(&mut self, loan: &NewLoan) -> AppResult<Loan>;

    /// Add `delta` to the shelf count of a publication
    async fn adjust_available_copies(&mut self, publication_id: i32, delta: i32) -> AppResult<()>;

    /// Persist due date, return date, fine and status of a loan
    async fn update_loan(&mut self, loan: &Loan) -> AppResult<()>;

    async fn loan_details(&mut self, loan_id: i32, today: NaiveDate) -> AppResult<LoanDetails>;

    async fn commit(self: Box<Self>) -> AppResult<()>;
}
