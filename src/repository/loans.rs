//! Loans repository: Postgres implementation of the ledger store

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{Pool, Postgres, QueryBuilder, Transaction};

use crate::{
    error::{AppError, AppResult},
    models::{
        loan::{BorrowingStats, Loan, LoanDetails, LoanDetailsRow, LoanFilter, NewLoan},
        publication::Publication,
        LoanStatus,
    },
};

use super::ledger::{LedgerStore, LedgerTx};

const LOAN_DETAILS_SELECT: &str = r#"
    SELECT l.id, l.publication_id, l.borrower_id, l.borrow_date, l.due_date,
           l.actual_return_date, l.fine_rate, l.total_fine, l.status,
           l.created_at, l.updated_at,
           p.title AS publication_title,
           p.author AS publication_author,
           p.cover_url AS publication_cover_url,
           p.type AS publication_type,
           u.name AS borrower_name,
           u.email AS borrower_email,
           u.role AS borrower_role
    FROM loans l
    JOIN publications p ON p.id = l.publication_id
    JOIN users u ON u.id = l.borrower_id
"#;

#[derive(Clone)]
pub struct LoansRepository {
    pool: Pool<Postgres>,
    lock_timeout_ms: u64,
}

impl LoansRepository {
    pub fn new(pool: Pool<Postgres>, lock_timeout_ms: u64) -> Self {
        Self { pool, lock_timeout_ms }
    }
}

#[async_trait]
impl LedgerStore for LoansRepository {
    async fn begin(&self) -> AppResult<Box<dyn LedgerTx>> {
        let mut tx = self.pool.begin().await?;

        // SET does not take bind parameters; the value is a plain integer.
        sqlx::query(&format!("SET LOCAL lock_timeout = {}", self.lock_timeout_ms))
            .execute(&mut *tx)
            .await?;

        Ok(Box::new(PgLedgerTx { tx }))
    }

    async fn borrower_loans(&self, borrower_id: i32, today: NaiveDate) -> AppResult<Vec<LoanDetails>> {
        let rows = sqlx::query_as::<_, LoanDetailsRow>(&format!(
            "{} WHERE l.borrower_id = $1 ORDER BY l.created_at DESC, l.id DESC",
            LOAN_DETAILS_SELECT
        ))
        .bind(borrower_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_details(today)).collect())
    }

    async fn recent_loans(
        &self,
        filter: &LoanFilter,
        today: NaiveDate,
        limit: i64,
    ) -> AppResult<Vec<LoanDetails>> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(LOAN_DETAILS_SELECT);
        qb.push(" WHERE 1=1");

        // Mirrors effective_status(): a borrowed loan past due reads as overdue.
        match filter.status {
            Some(LoanStatus::Borrowed) => {
                qb.push(" AND l.status = 'borrowed' AND l.due_date >= ");
                qb.push_bind(today);
            }
            Some(LoanStatus::Overdue) => {
                qb.push(" AND (l.status = 'overdue' OR (l.status = 'borrowed' AND l.due_date < ");
                qb.push_bind(today);
                qb.push("))");
            }
            Some(LoanStatus::Returned) => {
                qb.push(" AND l.status = 'returned'");
            }
            None => {}
        }

        if filter.overdue.unwrap_or(false) {
            qb.push(" AND (l.status = 'overdue' OR (l.status = 'borrowed' AND l.due_date < ");
            qb.push_bind(today);
            qb.push("))");
        }

        qb.push(" ORDER BY l.created_at DESC, l.id DESC LIMIT ");
        qb.push_bind(limit);

        let rows = qb
            .build_query_as::<LoanDetailsRow>()
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(|r| r.into_details(today)).collect())
    }

    async fn stats(&self, today: NaiveDate) -> AppResult<BorrowingStats> {
        let stats = sqlx::query_as::<_, BorrowingStats>(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE status IN ('borrowed', 'overdue')) AS total_borrowed,
                COUNT(*) FILTER (WHERE status = 'returned') AS total_returned,
                COUNT(*) FILTER (
                    WHERE status = 'overdue' OR (status = 'borrowed' AND due_date < $1)
                ) AS overdue_count,
                COALESCE(SUM(total_fine), 0)::NUMERIC(12, 2) AS total_fines,
                COUNT(DISTINCT borrower_id) FILTER (
                    WHERE status IN ('borrowed', 'overdue')
                ) AS active_borrowers
            FROM loans
            "#,
        )
        .bind(today)
        .fetch_one(&self.pool)
        .await?;

        Ok(stats)
    }
}

/// Ledger transaction over a pooled Postgres connection.
/// sqlx rolls the transaction back when it is dropped uncommitted.
pub struct PgLedgerTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LedgerTx for PgLedgerTx {
    async fn lock_borrower(&mut self, borrower_id: i32) -> AppResult<bool> {
        let locked: Option<i32> = sqlx::query_scalar("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(borrower_id)
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(locked.is_some())
    }

    async fn lock_publication(&mut self, publication_id: i32) -> AppResult<Option<Publication>> {
        let publication = sqlx::query_as::<_, Publication>(
            "SELECT * FROM publications WHERE id = $1 FOR UPDATE",
        )
        .bind(publication_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(publication)
    }

    async fn lock_loan(&mut self, loan_id: i32) -> AppResult<Option<Loan>> {
        let loan = sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = $1 FOR UPDATE")
            .bind(loan_id)
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(loan)
    }

    async fn has_active_loan(&mut self, publication_id: i32, borrower_id: i32) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM loans
                WHERE publication_id = $1 AND borrower_id = $2
                  AND status IN ('borrowed', 'overdue')
            )
            "#,
        )
        .bind(publication_id)
        .bind(borrower_id)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(exists)
    }

    async fn count_active_loans(&mut self, borrower_id: i32) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM loans WHERE borrower_id = $1 AND status IN ('borrowed', 'overdue')",
        )
        .bind(borrower_id)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(count)
    }

    async fn insert_loan(&mut self, loan: &NewLoan) -> AppResult<Loan> {
        let created = sqlx::query_as::<_, Loan>(
            r#"
            INSERT INTO loans (publication_id, borrower_id, borrow_date, due_date, fine_rate, total_fine, status)
            VALUES ($1, $2, $3, $4, $5, 0, $6)
            RETURNING *
            "#,
        )
        .bind(loan.publication_id)
        .bind(loan.borrower_id)
        .bind(loan.borrow_date)
        .bind(loan.due_date)
        .bind(loan.fine_rate)
        .bind(LoanStatus::Borrowed)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(created)
    }

    async fn adjust_available_copies(&mut self, publication_id: i32, delta: i32) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE publications
            SET available_copies = available_copies + $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(publication_id)
        .bind(delta)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Publication with id {} not found",
                publication_id
            )));
        }

        Ok(())
    }

    async fn update_loan(&mut self, loan: &Loan) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE loans
            SET due_date = $2, actual_return_date = $3, total_fine = $4, status = $5, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(loan.id)
        .bind(loan.due_date)
        .bind(loan.actual_return_date)
        .bind(loan.total_fine)
        .bind(loan.status)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn loan_details(&mut self, loan_id: i32, today: NaiveDate) -> AppResult<LoanDetails> {
        let row = sqlx::query_as::<_, LoanDetailsRow>(&format!("{} WHERE l.id = $1", LOAN_DETAILS_SELECT))
            .bind(loan_id)
            .fetch_optional(&mut *self.tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", loan_id)))?;

        Ok(row.into_details(today))
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
