//! Account registration and authentication service

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;
use once_cell::sync::Lazy;
use validator::Validate;

use crate::{
    config::{AccountsConfig, AuthConfig},
    error::{AppError, AppResult},
    models::{
        user::{Account, Actor, NewAccount, RegisterFaculty, RegisterLibrarian, RegisterStudent, UserClaims},
        Role,
    },
    repository::Repository,
};

const INVALID_CREDENTIALS: &str = "Invalid email or password";

/// Verified against on unknown emails so both login failures cost one argon2 run
static UNKNOWN_ACCOUNT_HASH: Lazy<String> =
    Lazy::new(|| hash_password("unknown-account-placeholder").unwrap_or_default());

#[derive(Clone)]
pub struct UsersService {
    repository: Repository,
    auth: AuthConfig,
    accounts: AccountsConfig,
}

impl UsersService {
    pub fn new(repository: Repository, auth: AuthConfig, accounts: AccountsConfig) -> Self {
        Self {
            repository,
            auth,
            accounts,
        }
    }

    /// Authenticate by email and password, returns a bearer token and the account
    pub async fn authenticate(&self, email: &str, password: &str) -> AppResult<(String, Account)> {
        let Some(account) = self.repository.users.get_by_email(email).await? else {
            return Err(reject_unknown_account(password));
        };

        if !verify_password(&account.password_hash, password)? {
            tracing::info!(user_id = account.id, "Rejected login attempt");
            return Err(AppError::Unauthenticated(INVALID_CREDENTIALS.to_string()));
        }

        let now = Utc::now().timestamp();
        let claims = UserClaims {
            sub: account.email.clone(),
            user_id: account.id,
            role: account.role,
            exp: now + (self.auth.jwt_expiration_hours as i64 * 3600),
            iat: now,
        };

        let token = claims
            .create_token(&self.auth.jwt_secret)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))?;

        Ok((token, account))
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<Account> {
        self.repository.users.get_by_id(id).await
    }

    pub async fn register_student(&self, request: RegisterStudent) -> AppResult<Account> {
        request.validate()?;
        let password_hash = hash_password(&request.password)?;

        self.register(NewAccount {
            email: request.email,
            password_hash,
            role: Role::Student,
            member_code: request.student_id,
            name: request.name,
            department: Some(request.department),
            designation: None,
            phone: request.phone,
        })
        .await
    }

    pub async fn register_faculty(&self, request: RegisterFaculty) -> AppResult<Account> {
        request.validate()?;
        let password_hash = hash_password(&request.password)?;

        self.register(NewAccount {
            email: request.email,
            password_hash,
            role: Role::Faculty,
            member_code: request.faculty_id,
            name: request.name,
            department: Some(request.department),
            designation: None,
            phone: request.phone,
        })
        .await
    }

    /// The first librarian may register freely; after that only librarians
    /// can add librarians.
    pub async fn register_librarian(&self, caller: Option<&Actor>, request: RegisterLibrarian) -> AppResult<Account> {
        let librarians = self.repository.users.count_by_role(Role::Librarian).await?;
        if librarians > 0 {
            caller
                .ok_or_else(|| AppError::Unauthenticated("Missing authorization header".to_string()))?
                .require_librarian()?;
        }

        request.validate()?;
        let password_hash = hash_password(&request.password)?;

        self.register(NewAccount {
            email: request.email,
            password_hash,
            role: Role::Librarian,
            member_code: request.librarian_id,
            name: request.name,
            department: None,
            designation: Some(request.designation),
            phone: request.phone,
        })
        .await
    }

    pub async fn list_students(&self, actor: &Actor) -> AppResult<Vec<Account>> {
        actor.require_librarian()?;
        self.repository.users.list_by_role(Role::Student).await
    }

    pub async fn list_librarians(&self, actor: &Actor) -> AppResult<Vec<Account>> {
        actor.require_librarian()?;
        self.repository.users.list_by_role(Role::Librarian).await
    }

    async fn register(&self, account: NewAccount) -> AppResult<Account> {
        if !email_in_domain(&account.email, &self.accounts.email_domain) {
            return Err(AppError::Validation(format!(
                "Email must be a @{} address",
                self.accounts.email_domain
            )));
        }

        if self.repository.users.member_code_exists(&account.member_code).await? {
            return Err(AppError::Conflict(format!(
                "{} id {} already exists",
                account.role, account.member_code
            )));
        }

        if self.repository.users.email_exists(&account.email).await? {
            return Err(AppError::Conflict("Email already registered".to_string()));
        }

        let created = self.repository.users.create(&account).await?;
        tracing::info!(user_id = created.id, role = %created.role, "Account registered");
        Ok(created)
    }
}

/// Burn the same argon2 work as a real password check, then fail
fn reject_unknown_account(password: &str) -> AppError {
    let _ = verify_password(&UNKNOWN_ACCOUNT_HASH, password);
    AppError::Unauthenticated(INVALID_CREDENTIALS.to_string())
}

/// Case-insensitive check that `email` ends with `@domain`
pub fn email_in_domain(email: &str, domain: &str) -> bool {
    match email.rsplit_once('@') {
        Some((local, host)) => !local.is_empty() && host.eq_ignore_ascii_case(domain),
        None => false,
    }
}

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
    Ok(hash.to_string())
}

pub fn verify_password(hash: &str, password: &str) -> AppResult<bool> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_domain() {
        assert!(email_in_domain("karim@aust.edu", "aust.edu"));
        assert!(email_in_domain("Karim@AUST.EDU", "aust.edu"));
        assert!(!email_in_domain("karim@gmail.com", "aust.edu"));
        assert!(!email_in_domain("karim@mail.aust.edu", "aust.edu"));
        assert!(!email_in_domain("@aust.edu", "aust.edu"));
        assert!(!email_in_domain("aust.edu", "aust.edu"));
    }

    #[test]
    fn test_password_hash_roundtrip() {
        let hash = hash_password("Secret#123").unwrap();
        assert!(verify_password(&hash, "Secret#123").unwrap());
        assert!(!verify_password(&hash, "secret#123").unwrap());
    }

    #[test]
    fn test_unknown_account_runs_a_real_verify() {
        assert!(PasswordHash::new(&UNKNOWN_ACCOUNT_HASH).is_ok());
        assert!(!verify_password(&UNKNOWN_ACCOUNT_HASH, "Secret#123").unwrap());

        let err = reject_unknown_account("Secret#123");
        assert!(matches!(err, AppError::Unauthenticated(ref m) if m == INVALID_CREDENTIALS));
    }

    #[tokio::test]
    async fn test_student_listing_requires_librarian() {
        use sqlx::postgres::PgPoolOptions;

        // Never connects: the role check fails before any query
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .unwrap();
        let service = UsersService::new(
            Repository::new(pool, 5000),
            AuthConfig::default(),
            AccountsConfig::default(),
        );

        let result = service.list_students(&Actor::new(7, Role::Student)).await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
        let result = service.list_students(&Actor::new(8, Role::Faculty)).await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[test]
    fn test_corrupt_hash_is_internal_error() {
        assert!(matches!(verify_password("not-a-hash", "x"), Err(AppError::Internal(_))));
    }
}
