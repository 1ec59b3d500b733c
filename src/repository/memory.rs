//! In-memory ledger store.
//!
//! Used by the test-suite and for local experiments without Postgres. A
//! single async mutex stands in for row locks: `begin` takes it and the
//! transaction holds it until commit or drop, so transactions run one after
//! another. Writes go to a staged copy of the state that only replaces the
//! shared state on commit.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    error::{AppError, AppResult},
    models::{
        loan::{BorrowingStats, Loan, LoanDetails, LoanFilter, NewLoan},
        publication::{CreatePublication, Publication},
        user::BorrowerSummary,
        LoanStatus, Role,
    },
};

use super::ledger::{LedgerStore, LedgerTx};

const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Default)]
struct MemoryState {
    publications: BTreeMap<i32, Publication>,
    borrowers: BTreeMap<i32, BorrowerSummary>,
    loans: BTreeMap<i32, Loan>,
    next_id: i32,
}

impl MemoryState {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }

    fn details(&self, loan: &Loan, today: NaiveDate) -> AppResult<LoanDetails> {
        let publication = self.publications.get(&loan.publication_id).ok_or_else(|| {
            AppError::NotFound(format!("Publication with id {} not found", loan.publication_id))
        })?;
        let borrower = self.borrowers.get(&loan.borrower_id).ok_or_else(|| {
            AppError::NotFound(format!("Borrower with id {} not found", loan.borrower_id))
        })?;
        Ok(LoanDetails::build(loan, publication.summary(), borrower.clone(), today))
    }

    /// Loans sorted newest first
    fn newest_first(&self) -> Vec<&Loan> {
        let mut loans: Vec<&Loan> = self.loans.values().collect();
        loans.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        loans
    }
}

#[derive(Clone)]
pub struct MemoryLedgerStore {
    state: Arc<Mutex<MemoryState>>,
    lock_timeout: Duration,
}

impl Default for MemoryLedgerStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::with_lock_timeout(DEFAULT_LOCK_TIMEOUT)
    }

    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState::default())),
            lock_timeout,
        }
    }

    /// Add a catalog entry with every copy on the shelf
    pub async fn add_publication(&self, publication: CreatePublication) -> Publication {
        let mut state = self.state.lock().await;
        let id = state.next_id();
        let now = Utc::now();
        let copies = publication.total_copies.unwrap_or(1);
        let created = Publication {
            id,
            title: publication.title,
            author: publication.author,
            isbn: publication.isbn,
            publication_year: publication.publication_year,
            publisher: publication.publisher,
            department: publication.department,
            publication_type: publication.publication_type,
            total_copies: copies,
            available_copies: copies,
            shelf_location: publication.shelf_location,
            description: publication.description,
            cover_url: publication.cover_url,
            created_at: now,
            updated_at: now,
        };
        state.publications.insert(id, created.clone());
        created
    }

    /// Register a borrower account, returns its id
    pub async fn add_borrower(&self, name: &str, email: &str, role: Role) -> i32 {
        let mut state = self.state.lock().await;
        let id = state.next_id();
        state.borrowers.insert(
            id,
            BorrowerSummary {
                id,
                name: name.to_string(),
                email: email.to_string(),
                role,
            },
        );
        id
    }

    pub async fn publication(&self, publication_id: i32) -> Option<Publication> {
        self.state.lock().await.publications.get(&publication_id).cloned()
    }

    pub async fn loan(&self, loan_id: i32) -> Option<Loan> {
        self.state.lock().await.loans.get(&loan_id).cloned()
    }

    /// Loans still out for a publication
    pub async fn active_loan_count(&self, publication_id: i32) -> usize {
        self.state
            .lock()
            .await
            .loans
            .values()
            .filter(|l| l.publication_id == publication_id && l.status.is_active())
            .count()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn begin(&self) -> AppResult<Box<dyn LedgerTx>> {
        let guard = tokio::time::timeout(self.lock_timeout, self.state.clone().lock_owned())
            .await
            .map_err(|_| AppError::TransactionConflict("Timed out waiting for a lock".to_string()))?;
        let staged = MemoryState::clone(&guard);

        Ok(Box::new(MemoryLedgerTx { guard, staged }))
    }

    async fn borrower_loans(&self, borrower_id: i32, today: NaiveDate) -> AppResult<Vec<LoanDetails>> {
        let state = self.state.lock().await;
        state
            .newest_first()
            .into_iter()
            .filter(|l| l.borrower_id == borrower_id)
            .map(|l| state.details(l, today))
            .collect()
    }

    async fn recent_loans(
        &self,
        filter: &LoanFilter,
        today: NaiveDate,
        limit: i64,
    ) -> AppResult<Vec<LoanDetails>> {
        let state = self.state.lock().await;
        state
            .newest_first()
            .into_iter()
            .filter(|l| filter.matches(l, today))
            .take(usize::try_from(limit).unwrap_or(0))
            .map(|l| state.details(l, today))
            .collect()
    }

    async fn stats(&self, today: NaiveDate) -> AppResult<BorrowingStats> {
        let state = self.state.lock().await;
        let loans: Vec<&Loan> = state.loans.values().collect();

        let active: Vec<&Loan> = loans.iter().copied().filter(|l| l.status.is_active()).collect();
        let mut borrowers: Vec<i32> = active.iter().map(|l| l.borrower_id).collect();
        borrowers.sort_unstable();
        borrowers.dedup();

        let overdue_filter = LoanFilter {
            status: Some(LoanStatus::Overdue),
            overdue: None,
        };

        Ok(BorrowingStats {
            total_borrowed: active.len() as i64,
            total_returned: loans.iter().filter(|l| l.status == LoanStatus::Returned).count() as i64,
            overdue_count: loans.iter().filter(|l| overdue_filter.matches(l, today)).count() as i64,
            total_fines: loans.iter().map(|l| l.total_fine).sum::<Decimal>(),
            active_borrowers: borrowers.len() as i64,
        })
    }
}

pub struct MemoryLedgerTx {
    guard: OwnedMutexGuard<MemoryState>,
    staged: MemoryState,
}

#[async_trait]
impl LedgerTx for MemoryLedgerTx {
    // Transactions already run one at a time behind the store mutex
    async fn lock_borrower(&mut self, borrower_id: i32) -> AppResult<bool> {
        Ok(self.staged.borrowers.contains_key(&borrower_id))
    }

    async fn lock_publication(&mut self, publication_id: i32) -> AppResult<Option<Publication>> {
        Ok(self.staged.publications.get(&publication_id).cloned())
    }

    async fn lock_loan(&mut self, loan_id: i32) -> AppResult<Option<Loan>> {
        Ok(self.staged.loans.get(&loan_id).cloned())
    }

    async fn has_active_loan(&mut self, publication_id: i32, borrower_id: i32) -> AppResult<bool> {
        Ok(self.staged.loans.values().any(|l| {
            l.publication_id == publication_id && l.borrower_id == borrower_id && l.status.is_active()
        }))
    }

    async fn count_active_loans(&mut self, borrower_id: i32) -> AppResult<i64> {
        Ok(self
            .staged
            .loans
            .values()
            .filter(|l| l.borrower_id == borrower_id && l.status.is_active())
            .count() as i64)
    }

    async fn insert_loan(&mut self, loan: &NewLoan) -> AppResult<Loan> {
        if !self.staged.borrowers.contains_key(&loan.borrower_id) {
            return Err(AppError::NotFound(format!("Borrower with id {} not found", loan.borrower_id)));
        }

        let id = self.staged.next_id();
        let now = Utc::now();
        let created = Loan {
            id,
            publication_id: loan.publication_id,
            borrower_id: loan.borrower_id,
            borrow_date: loan.borrow_date,
            due_date: loan.due_date,
            actual_return_date: None,
            fine_rate: loan.fine_rate,
            total_fine: Decimal::ZERO,
            status: LoanStatus::Borrowed,
            created_at: now,
            updated_at: now,
        };
        self.staged.loans.insert(id, created.clone());
        Ok(created)
    }

    async fn adjust_available_copies(&mut self, publication_id: i32, delta: i32) -> AppResult<()> {
        let publication = self.staged.publications.get_mut(&publication_id).ok_or_else(|| {
            AppError::NotFound(format!("Publication with id {} not found", publication_id))
        })?;

        let available = publication.available_copies + delta;
        // Same bounds as the CHECK constraint on the publications table
        if available < 0 || available > publication.total_copies {
            return Err(AppError::Internal(format!(
                "available_copies out of range for publication {}",
                publication_id
            )));
        }
        publication.available_copies = available;
        publication.updated_at = Utc::now();
        Ok(())
    }

    async fn update_loan(&mut self, loan: &Loan) -> AppResult<()> {
        let stored = self
            .staged
            .loans
            .get_mut(&loan.id)
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", loan.id)))?;

        stored.due_date = loan.due_date;
        stored.actual_return_date = loan.actual_return_date;
        stored.total_fine = loan.total_fine;
        stored.status = loan.status;
        stored.updated_at = Utc::now();
        Ok(())
    }

    async fn loan_details(&mut self, loan_id: i32, today: NaiveDate) -> AppResult<LoanDetails> {
        let loan = self
            .staged
            .loans
            .get(&loan_id)
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", loan_id)))?;
        self.staged.details(loan, today)
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let MemoryLedgerTx { mut guard, staged } = *self;
        *guard = staged;
        Ok(())
    }
}
