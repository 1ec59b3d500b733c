//! Borrow/return ledger service.
//!
//! Every mutating operation runs in one [`LedgerTx`]: the contended row is
//! locked first, preconditions are checked against what the lock returned,
//! and all writes commit together. Returning early with an error drops the
//! transaction, which rolls it back.

use std::sync::Arc;

use chrono::{Days, NaiveDate, Utc};
use rust_decimal::Decimal;

use crate::{
    error::{AppError, AppResult},
    models::{
        loan::{
            compute_fine, BorrowingStats, ClearedFine, Extension, Loan, LoanDetails, LoanFilter, NewLoan,
            ReturnReceipt, LOAN_LIST_LIMIT, MAX_EXTENSION_DAYS,
        },
        user::Actor,
        LoanStatus,
    },
    repository::{LedgerStore, LedgerTx},
};

/// Source of the current calendar date
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Calendar date in UTC
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Utc::now().date_naive()
    }
}

#[derive(Clone)]
pub struct LoansService {
    store: Arc<dyn LedgerStore>,
    clock: Arc<dyn Clock>,
}

impl LoansService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<dyn LedgerStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Borrow one copy of a publication
    pub async fn borrow(&self, actor: &Actor, publication_id: i32) -> AppResult<LoanDetails> {
        let policy = actor.loan_policy()?;
        let today = self.clock.today();

        let mut tx = self.store.begin().await?;

        // Borrower row first; the active loan count must hold until commit.
        if !tx.lock_borrower(actor.id).await? {
            return Err(AppError::NotFound(format!("Borrower with id {} not found", actor.id)));
        }

        let publication = tx
            .lock_publication(publication_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Publication with id {} not found", publication_id)))?;

        if publication.available_copies <= 0 {
            return Err(AppError::Unavailable(
                "Publication is not available for borrowing".to_string(),
            ));
        }

        if tx.has_active_loan(publication_id, actor.id).await? {
            return Err(AppError::AlreadyBorrowed(
                "You have already borrowed this publication".to_string(),
            ));
        }

        let active = tx.count_active_loans(actor.id).await?;
        if active >= policy.loan_cap {
            return Err(AppError::LimitExceeded(format!(
                "You have reached your borrowing limit of {} publications",
                policy.loan_cap
            )));
        }

        let loan = tx
            .insert_loan(&NewLoan::new(publication_id, actor.id, &policy, today))
            .await?;
        tx.adjust_available_copies(publication_id, -1).await?;
        let details = tx.loan_details(loan.id, today).await?;
        tx.commit().await?;

        tracing::info!(
            loan_id = loan.id,
            publication_id,
            borrower_id = actor.id,
            due_date = %loan.due_date,
            "Publication borrowed"
        );

        Ok(details)
    }

    /// Return a loan held by the caller
    pub async fn return_loan(&self, actor: &Actor, loan_id: i32) -> AppResult<ReturnReceipt> {
        self.close_loan(loan_id, Some(actor.id)).await
    }

    /// Librarian check-in of any active loan
    pub async fn manual_return(&self, actor: &Actor, loan_id: i32) -> AppResult<ReturnReceipt> {
        actor.require_librarian()?;
        self.close_loan(loan_id, None).await
    }

    async fn close_loan(&self, loan_id: i32, owner: Option<i32>) -> AppResult<ReturnReceipt> {
        let today = self.clock.today();
        let mut tx = self.store.begin().await?;

        let mut loan = lock_active_loan(tx.as_mut(), loan_id).await?;
        if owner.is_some_and(|owner| owner != loan.borrower_id) {
            return Err(not_found_or_returned(loan_id));
        }

        let fine = compute_fine(loan.due_date, today, loan.fine_rate);
        loan.actual_return_date = Some(today);
        loan.total_fine = fine;
        loan.status = LoanStatus::Returned;

        tx.update_loan(&loan).await?;
        tx.adjust_available_copies(loan.publication_id, 1).await?;
        let details = tx.loan_details(loan_id, today).await?;
        tx.commit().await?;

        tracing::info!(
            loan_id,
            publication_id = loan.publication_id,
            borrower_id = loan.borrower_id,
            manual = owner.is_none(),
            fine = %fine,
            "Publication returned"
        );

        Ok(ReturnReceipt { fine, loan: details })
    }

    /// Waive the fine recorded on a loan
    pub async fn clear_fine(&self, actor: &Actor, loan_id: i32) -> AppResult<ClearedFine> {
        actor.require_librarian()?;
        let today = self.clock.today();
        let mut tx = self.store.begin().await?;

        let mut loan = tx
            .lock_loan(loan_id)
            .await?
            .filter(|l| l.total_fine > Decimal::ZERO)
            .ok_or_else(|| {
                AppError::NotFound(format!("Loan with id {} not found or has no fine to clear", loan_id))
            })?;

        let previous_fine = loan.total_fine;
        loan.total_fine = Decimal::ZERO;

        tx.update_loan(&loan).await?;
        let details = tx.loan_details(loan_id, today).await?;
        tx.commit().await?;

        tracing::info!(loan_id, previous_fine = %previous_fine, "Fine cleared");

        Ok(ClearedFine {
            previous_fine,
            new_fine: Decimal::ZERO,
            loan: details,
        })
    }

    /// Push the due date of an active loan back by `days`.
    /// The loan goes back to borrowed and any recorded fine is dropped.
    pub async fn extend_due_date(&self, actor: &Actor, loan_id: i32, days: i64) -> AppResult<Extension> {
        actor.require_librarian()?;
        if !(1..=MAX_EXTENSION_DAYS).contains(&days) {
            return Err(AppError::InvalidArgument(format!(
                "days must be between 1 and {}",
                MAX_EXTENSION_DAYS
            )));
        }

        let today = self.clock.today();
        let mut tx = self.store.begin().await?;

        let mut loan = lock_active_loan(tx.as_mut(), loan_id).await?;
        let old_due_date = loan.due_date;
        // 1..=30 always fits in u64
        loan.due_date = old_due_date + Days::new(days as u64);
        loan.status = LoanStatus::Borrowed;
        loan.total_fine = Decimal::ZERO;

        tx.update_loan(&loan).await?;
        let details = tx.loan_details(loan_id, today).await?;
        tx.commit().await?;

        tracing::info!(
            loan_id,
            old_due_date = %old_due_date,
            new_due_date = %loan.due_date,
            "Due date extended"
        );

        Ok(Extension {
            old_due_date,
            new_due_date: loan.due_date,
            extended_by_days: days,
            loan: details,
        })
    }

    /// Loan history of the caller, newest first
    pub async fn my_loans(&self, actor: &Actor) -> AppResult<Vec<LoanDetails>> {
        self.store.borrower_loans(actor.id, self.clock.today()).await
    }

    /// Most recent loans across all borrowers
    pub async fn all_loans(&self, actor: &Actor, filter: &LoanFilter) -> AppResult<Vec<LoanDetails>> {
        actor.require_librarian()?;
        self.store
            .recent_loans(filter, self.clock.today(), LOAN_LIST_LIMIT)
            .await
    }

    pub async fn stats(&self, actor: &Actor) -> AppResult<BorrowingStats> {
        actor.require_librarian()?;
        self.store.stats(self.clock.today()).await
    }
}

fn not_found_or_returned(loan_id: i32) -> AppError {
    AppError::NotFound(format!("Loan with id {} not found or already returned", loan_id))
}

async fn lock_active_loan(tx: &mut dyn LedgerTx, loan_id: i32) -> AppResult<Loan> {
    tx.lock_loan(loan_id)
        .await?
        .filter(|l| l.status.is_active())
        .ok_or_else(|| not_found_or_returned(loan_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use crate::repository::ledger::MockLedgerStore;

    fn service(store: MockLedgerStore) -> LoansService {
        LoansService::new(Arc::new(store))
    }

    fn untouched_store() -> MockLedgerStore {
        let mut store = MockLedgerStore::new();
        store.expect_begin().never();
        store.expect_recent_loans().never();
        store.expect_stats().never();
        store
    }

    #[tokio::test]
    async fn test_librarian_cannot_borrow() {
        let librarian = Actor::new(1, Role::Librarian);
        let result = service(untouched_store()).borrow(&librarian, 10).await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_librarian_operations_reject_borrowers() {
        let service = service(untouched_store());
        let student = Actor::new(2, Role::Student);

        assert!(matches!(service.manual_return(&student, 1).await, Err(AppError::Forbidden(_))));
        assert!(matches!(service.clear_fine(&student, 1).await, Err(AppError::Forbidden(_))));
        assert!(matches!(service.extend_due_date(&student, 1, 7).await, Err(AppError::Forbidden(_))));
        assert!(matches!(
            service.all_loans(&student, &LoanFilter::default()).await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(service.stats(&student).await, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_extension_range_checked_before_locking() {
        let service = service(untouched_store());
        let librarian = Actor::new(1, Role::Librarian);

        for days in [0, -3, 31] {
            let result = service.extend_due_date(&librarian, 1, days).await;
            assert!(matches!(result, Err(AppError::InvalidArgument(_))), "days = {}", days);
        }
    }

    #[tokio::test]
    async fn test_begin_failure_is_surfaced() {
        let mut store = MockLedgerStore::new();
        store
            .expect_begin()
            .times(1)
            .returning(|| Err(AppError::TransactionConflict("lock timeout".to_string())));

        let result = service(store).borrow(&Actor::new(3, Role::Faculty), 1).await;
        assert!(matches!(result, Err(AppError::TransactionConflict(_))));
    }
}
