//! Catalog management service

use validator::Validate;

use crate::{
    error::AppResult,
    models::{
        publication::{CreatePublication, Publication, PublicationQuery, UpdatePublication},
        user::Actor,
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
}

impl CatalogService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn list(&self, query: &PublicationQuery) -> AppResult<Vec<Publication>> {
        self.repository.publications.list(query).await
    }

    pub async fn get(&self, id: i32) -> AppResult<Publication> {
        self.repository.publications.get_by_id(id).await
    }

    pub async fn featured(&self) -> AppResult<Vec<Publication>> {
        self.repository.publications.featured().await
    }

    /// Books of the caller's department; empty when the account has none
    pub async fn recommended(&self, actor: &Actor) -> AppResult<Vec<Publication>> {
        let account = self.repository.users.get_by_id(actor.id).await?;
        match account.department.as_deref() {
            Some(department) => self.repository.publications.books_by_department(department).await,
            None => Ok(Vec::new()),
        }
    }

    pub async fn create(&self, actor: &Actor, publication: CreatePublication) -> AppResult<Publication> {
        actor.require_librarian()?;
        publication.validate()?;

        let created = self.repository.publications.create(&publication).await?;
        tracing::info!(publication_id = created.id, title = %created.title, "Publication created");
        Ok(created)
    }

    pub async fn update(&self, actor: &Actor, id: i32, update: UpdatePublication) -> AppResult<Publication> {
        actor.require_librarian()?;
        update.validate()?;

        let updated = self.repository.publications.update(id, &update).await?;
        tracing::info!(publication_id = id, "Publication updated");
        Ok(updated)
    }

    pub async fn delete(&self, actor: &Actor, id: i32) -> AppResult<()> {
        actor.require_librarian()?;
        self.repository.publications.delete(id).await?;
        tracing::info!(publication_id = id, "Publication deleted");
        Ok(())
    }
}
