//! Repository layer for database operations

pub mod ledger;
pub mod loans;
pub mod memory;
pub mod publications;
pub mod users;

use sqlx::{Pool, Postgres};

pub use ledger::{LedgerStore, LedgerTx};
pub use memory::MemoryLedgerStore;

/// Main repository struct holding database connection pool
#[derive(Clone)]
pub struct Repository {
    pub pool: Pool<Postgres>,
    pub publications: publications::PublicationsRepository,
    pub users: users::UsersRepository,
    pub loans: loans::LoansRepository,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>, lock_timeout_ms: u64) -> Self {
        Self {
            publications: publications::PublicationsRepository::new(pool.clone()),
            users: users::UsersRepository::new(pool.clone()),
            loans: loans::LoansRepository::new(pool.clone(), lock_timeout_ms),
            pool,
        }
    }

    /// Round-trip to the database
    pub async fn ping(&self) -> crate::error::AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
