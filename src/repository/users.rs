//! Accounts repository for database operations

use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::{
        user::{Account, NewAccount},
        Role,
    },
};

#[derive(Clone)]
pub struct UsersRepository {
    pool: Pool<Postgres>,
}

impl UsersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get account by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<Account> {
        sqlx::query_as::<_, Account>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))
    }

    /// Get account by email (login identifier)
    pub async fn get_by_email(&self, email: &str) -> AppResult<Option<Account>> {
        let account = sqlx::query_as::<_, Account>("SELECT * FROM users WHERE LOWER(email) = LOWER($1)")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(account)
    }

    /// Check if email already exists
    pub async fn email_exists(&self, email: &str) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(email) = LOWER($1))")
            .bind(email)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    /// Check if a university id is already registered
    pub async fn member_code_exists(&self, member_code: &str) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE member_code = $1)")
            .bind(member_code)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    pub async fn count_by_role(&self, role: Role) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = $1")
            .bind(role)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn list_by_role(&self, role: Role) -> AppResult<Vec<Account>> {
        let accounts = sqlx::query_as::<_, Account>("SELECT * FROM users WHERE role = $1 ORDER BY name, id")
            .bind(role)
            .fetch_all(&self.pool)
            .await?;
        Ok(accounts)
    }

    /// Insert a new account
    pub async fn create(&self, account: &NewAccount) -> AppResult<Account> {
        let created = sqlx::query_as::<_, Account>(
            r#"
            INSERT INTO users (email, password_hash, role, member_code, name, department, designation, phone)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(&account.email)
        .bind(&account.password_hash)
        .bind(account.role)
        .bind(&account.member_code)
        .bind(&account.name)
        .bind(&account.department)
        .bind(&account.designation)
        .bind(&account.phone)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }
}
