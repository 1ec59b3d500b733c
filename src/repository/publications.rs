//! Publications repository for database operations

use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::{
        publication::{CreatePublication, Publication, PublicationQuery, UpdatePublication},
        PublicationType,
    },
};

/// Number of entries on the featured shelf
const FEATURED_LIMIT: i64 = 5;

#[derive(Clone)]
pub struct PublicationsRepository {
    pool: Pool<Postgres>,
}

impl PublicationsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// List the catalog, optionally restricted to one type
    pub async fn list(&self, query: &PublicationQuery) -> AppResult<Vec<Publication>> {
        let publications = match query.publication_type {
            Some(publication_type) => {
                sqlx::query_as::<_, Publication>("SELECT * FROM publications WHERE type = $1 ORDER BY title, id")
                    .bind(publication_type)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                sqlx::query_as::<_, Publication>("SELECT * FROM publications ORDER BY title, id")
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        Ok(publications)
    }

    /// Get publication by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<Publication> {
        sqlx::query_as::<_, Publication>("SELECT * FROM publications WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Publication with id {} not found", id)))
    }

    /// Books most recently touched (added, edited, borrowed or returned)
    pub async fn featured(&self) -> AppResult<Vec<Publication>> {
        let publications = sqlx::query_as::<_, Publication>(
            "SELECT * FROM publications WHERE type = $1 ORDER BY updated_at DESC LIMIT $2",
        )
        .bind(PublicationType::Book)
        .bind(FEATURED_LIMIT)
        .fetch_all(&self.pool)
        .await?;

        Ok(publications)
    }

    /// Books of a department
    pub async fn books_by_department(&self, department: &str) -> AppResult<Vec<Publication>> {
        let publications = sqlx::query_as::<_, Publication>(
            "SELECT * FROM publications WHERE LOWER(department) = LOWER($1) AND type = $2 ORDER BY title, id",
        )
        .bind(department)
        .bind(PublicationType::Book)
        .fetch_all(&self.pool)
        .await?;

        Ok(publications)
    }

    /// Create a publication with every copy available
    pub async fn create(&self, publication: &CreatePublication) -> AppResult<Publication> {
        let copies = publication.total_copies.unwrap_or(1);

        let created = sqlx::query_as::<_, Publication>(
            r#"
            INSERT INTO publications (
                title, author, isbn, publication_year, publisher, department, type,
                total_copies, available_copies, shelf_location, description, cover_url
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(&publication.title)
        .bind(&publication.author)
        .bind(&publication.isbn)
        .bind(publication.publication_year)
        .bind(&publication.publisher)
        .bind(&publication.department)
        .bind(publication.publication_type)
        .bind(copies)
        .bind(&publication.shelf_location)
        .bind(&publication.description)
        .bind(&publication.cover_url)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    /// Update a publication. The row is locked so the shelf count cannot
    /// race with a concurrent borrow or return.
    pub async fn update(&self, id: i32, update: &UpdatePublication) -> AppResult<Publication> {
        let mut tx = self.pool.begin().await?;

        let exists: Option<i32> = sqlx::query_scalar(
            "SELECT id FROM publications WHERE id = $1 AND type = $2 FOR UPDATE",
        )
        .bind(id)
        .bind(update.publication_type)
        .fetch_optional(&mut *tx)
        .await?;

        if exists.is_none() {
            return Err(AppError::NotFound(format!(
                "Publication with id {} and type {} not found",
                id, update.publication_type
            )));
        }

        let on_loan: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM loans WHERE publication_id = $1 AND status IN ('borrowed', 'overdue')",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        if i64::from(update.total_copies) < on_loan {
            return Err(AppError::Validation(format!(
                "total_copies ({}) is below the number of copies on loan ({})",
                update.total_copies, on_loan
            )));
        }

        let updated = sqlx::query_as::<_, Publication>(
            r#"
            UPDATE publications
            SET title = $2, author = $3, publication_year = $4, publisher = $5,
                department = $6, total_copies = $7, available_copies = $7 - $8,
                shelf_location = $9, description = $10, cover_url = $11, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&update.title)
        .bind(&update.author)
        .bind(update.publication_year)
        .bind(&update.publisher)
        .bind(&update.department)
        .bind(update.total_copies)
        .bind(on_loan as i32)
        .bind(&update.shelf_location)
        .bind(&update.description)
        .bind(&update.cover_url)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(updated)
    }

    /// Delete a publication that was never lent
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        // Borrows lock this row before inserting a loan
        let exists: Option<i32> = sqlx::query_scalar("SELECT id FROM publications WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;

        if exists.is_none() {
            return Err(AppError::NotFound(format!("Publication with id {} not found", id)));
        }

        let has_history: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM loans WHERE publication_id = $1)",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        if has_history {
            return Err(AppError::Conflict(format!(
                "Publication with id {} has lending history and cannot be deleted",
                id
            )));
        }

        sqlx::query("DELETE FROM publications WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(())
    }
}
