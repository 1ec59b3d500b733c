//! Business logic services

pub mod catalog;
pub mod loans;
pub mod users;

use std::sync::Arc;

use crate::{
    config::{AccountsConfig, AuthConfig},
    error::AppResult,
    repository::Repository,
};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub users: users::UsersService,
    pub catalog: catalog::CatalogService,
    pub loans: loans::LoansService,
    repository: Repository,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository, auth_config: AuthConfig, accounts_config: AccountsConfig) -> Self {
        Self {
            users: users::UsersService::new(repository.clone(), auth_config, accounts_config),
            catalog: catalog::CatalogService::new(repository.clone()),
            loans: loans::LoansService::new(Arc::new(repository.loans.clone())),
            repository,
        }
    }

    /// Check that the database answers
    pub async fn ping(&self) -> AppResult<()> {
        self.repository.ping().await
    }
}
