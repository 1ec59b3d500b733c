//! Loan (borrow) model, lending policy and fine arithmetic

use chrono::{DateTime, Days, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

use super::enums::{LoanStatus, PublicationType, Role};
use super::user::BorrowerSummary;

/// Most recent loans returned by the librarian listing
pub const LOAN_LIST_LIMIT: i64 = 50;

/// Allowed range for a librarian due date extension, in days
pub const MAX_EXTENSION_DAYS: i64 = 30;

/// Lending terms attached to a borrowing role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoanPolicy {
    pub loan_period_days: u64,
    pub loan_cap: i64,
    /// Currency charged per overdue day
    pub daily_fine_rate: Decimal,
}

const STUDENT_POLICY: LoanPolicy = LoanPolicy {
    loan_period_days: 7,
    loan_cap: 3,
    daily_fine_rate: Decimal::from_parts(500, 0, 0, false, 2),
};

const FACULTY_POLICY: LoanPolicy = LoanPolicy {
    loan_period_days: 14,
    loan_cap: 10,
    daily_fine_rate: Decimal::ZERO,
};

impl LoanPolicy {
    /// Policy for a role, `None` for roles that cannot borrow
    pub fn for_role(role: Role) -> Option<LoanPolicy> {
        match role {
            Role::Student => Some(STUDENT_POLICY),
            Role::Faculty => Some(FACULTY_POLICY),
            Role::Librarian => None,
        }
    }

    pub fn due_date(&self, borrowed_on: NaiveDate) -> NaiveDate {
        borrowed_on + Days::new(self.loan_period_days)
    }
}

/// Whole days past the due date, zero when not late
pub fn overdue_days(due_date: NaiveDate, today: NaiveDate) -> i64 {
    (today - due_date).num_days().max(0)
}

/// Fine owed when the copy comes back `today`
pub fn compute_fine(due_date: NaiveDate, today: NaiveDate, fine_rate: Decimal) -> Decimal {
    Decimal::from(overdue_days(due_date, today)) * fine_rate
}

/// Status as presented to clients: a borrowed loan past its due date reads as overdue
pub fn effective_status(status: LoanStatus, due_date: NaiveDate, today: NaiveDate) -> LoanStatus {
    match status {
        LoanStatus::Borrowed if due_date < today => LoanStatus::Overdue,
        other => other,
    }
}

/// Loan model from database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Loan {
    pub id: i32,
    pub publication_id: i32,
    pub borrower_id: i32,
    pub borrow_date: NaiveDate,
    pub due_date: NaiveDate,
    pub actual_return_date: Option<NaiveDate>,
    pub fine_rate: Decimal,
    pub total_fine: Decimal,
    pub status: LoanStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Values for a freshly created loan
#[derive(Debug, Clone)]
pub struct NewLoan {
    pub publication_id: i32,
    pub borrower_id: i32,
    pub borrow_date: NaiveDate,
    pub due_date: NaiveDate,
    pub fine_rate: Decimal,
}

impl NewLoan {
    pub fn new(publication_id: i32, borrower_id: i32, policy: &LoanPolicy, today: NaiveDate) -> Self {
        Self {
            publication_id,
            borrower_id,
            borrow_date: today,
            due_date: policy.due_date(today),
            fine_rate: policy.daily_fine_rate,
        }
    }
}

/// Publication fields shown next to a loan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PublicationSummary {
    pub id: i32,
    pub title: String,
    pub author: String,
    pub cover_url: Option<String>,
    #[serde(rename = "type")]
    pub publication_type: PublicationType,
}

/// Loan with joined publication and borrower, status derived for `today`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LoanDetails {
    pub id: i32,
    pub borrow_date: NaiveDate,
    pub due_date: NaiveDate,
    pub actual_return_date: Option<NaiveDate>,
    pub fine_rate: Decimal,
    pub total_fine: Decimal,
    pub status: LoanStatus,
    pub overdue_days: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub publication: PublicationSummary,
    pub borrower: BorrowerSummary,
}

impl LoanDetails {
    pub fn build(
        loan: &Loan,
        publication: PublicationSummary,
        borrower: BorrowerSummary,
        today: NaiveDate,
    ) -> Self {
        let status = effective_status(loan.status, loan.due_date, today);
        let overdue_days = if status == LoanStatus::Overdue {
            overdue_days(loan.due_date, today)
        } else {
            0
        };

        Self {
            id: loan.id,
            borrow_date: loan.borrow_date,
            due_date: loan.due_date,
            actual_return_date: loan.actual_return_date,
            fine_rate: loan.fine_rate,
            total_fine: loan.total_fine,
            status,
            overdue_days,
            created_at: loan.created_at,
            updated_at: loan.updated_at,
            publication,
            borrower,
        }
    }
}

/// Flat row of the loan/publication/borrower join
#[derive(Debug, Clone, FromRow)]
pub struct LoanDetailsRow {
    #[sqlx(flatten)]
    pub loan: Loan,
    pub publication_title: String,
    pub publication_author: String,
    pub publication_cover_url: Option<String>,
    pub publication_type: PublicationType,
    pub borrower_name: String,
    pub borrower_email: String,
    pub borrower_role: Role,
}

impl LoanDetailsRow {
    pub fn into_details(self, today: NaiveDate) -> LoanDetails {
        let publication = PublicationSummary {
            id: self.loan.publication_id,
            title: self.publication_title,
            author: self.publication_author,
            cover_url: self.publication_cover_url,
            publication_type: self.publication_type,
        };
        let borrower = BorrowerSummary {
            id: self.loan.borrower_id,
            name: self.borrower_name,
            email: self.borrower_email,
            role: self.borrower_role,
        };
        LoanDetails::build(&self.loan, publication, borrower, today)
    }
}

/// Filters for the librarian loan listing
#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct LoanFilter {
    /// Match the status as displayed (overdue is derived from the due date)
    pub status: Option<LoanStatus>,
    /// Only loans past their due date
    pub overdue: Option<bool>,
}

impl LoanFilter {
    /// Whether a loan passes the filter on `today`
    pub fn matches(&self, loan: &Loan, today: NaiveDate) -> bool {
        let status = effective_status(loan.status, loan.due_date, today);
        if let Some(wanted) = self.status {
            if status != wanted {
                return false;
            }
        }
        if self.overdue.unwrap_or(false) && status != LoanStatus::Overdue {
            return false;
        }
        true
    }
}

/// Outcome of a return or manual return
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReturnReceipt {
    /// Fine charged for this return
    pub fine: Decimal,
    pub loan: LoanDetails,
}

/// Outcome of clearing a fine
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ClearedFine {
    pub previous_fine: Decimal,
    pub new_fine: Decimal,
    pub loan: LoanDetails,
}

/// Outcome of a due date extension
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Extension {
    pub old_due_date: NaiveDate,
    pub new_due_date: NaiveDate,
    pub extended_by_days: i64,
    pub loan: LoanDetails,
}

/// Aggregate lending figures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct BorrowingStats {
    /// Loans still out (borrowed or overdue)
    pub total_borrowed: i64,
    pub total_returned: i64,
    pub overdue_count: i64,
    /// Sum of every fine ever recorded
    pub total_fines: Decimal,
    /// Distinct borrowers holding at least one active loan
    pub active_borrowers: i64,
}
