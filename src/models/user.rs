//! Account model, registration payloads and JWT claims

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use super::enums::Role;
use super::loan::LoanPolicy;
use crate::error::{AppError, AppResult};

static MEMBER_CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9-]{2,31}$").expect("valid member code pattern"));

static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?[0-9][0-9 ()-]{4,18}$").expect("valid phone pattern"));

/// Account row from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Account {
    pub id: i32,
    pub email: String,
    /// Hashed password (argon2)
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    /// Student, faculty or librarian identifier issued by the university
    pub member_code: String,
    pub name: String,
    pub department: Option<String>,
    pub designation: Option<String>,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Borrower identity shown next to a loan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BorrowerSummary {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub role: Role,
}

impl From<&Account> for BorrowerSummary {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            name: account.name.clone(),
            email: account.email.clone(),
            role: account.role,
        }
    }
}

/// Password rule: at least one uppercase letter, one digit and one symbol.
/// Length is checked separately.
pub fn validate_password_strength(password: &str) -> Result<(), ValidationError> {
    let upper = password.chars().any(|c| c.is_ascii_uppercase());
    let digit = password.chars().any(|c| c.is_ascii_digit());
    let symbol = password.chars().any(|c| !c.is_ascii_alphanumeric());

    if upper && digit && symbol {
        Ok(())
    } else {
        let mut err = ValidationError::new("password_strength");
        err.message = Some("Password needs an uppercase letter, a digit and a symbol".into());
        Err(err)
    }
}

/// Register a student account
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterStudent {
    #[validate(regex(path = *MEMBER_CODE_RE, message = "Invalid student id"))]
    pub student_id: String,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(min = 1, max = 255))]
    pub department: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(regex(path = *PHONE_RE, message = "Invalid phone number"))]
    pub phone: Option<String>,
    #[validate(
        length(min = 8, message = "Password must be at least 8 characters"),
        custom(function = "validate_password_strength")
    )]
    pub password: String,
}

/// Register a faculty account
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterFaculty {
    #[validate(regex(path = *MEMBER_CODE_RE, message = "Invalid faculty id"))]
    pub faculty_id: String,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(min = 1, max = 255))]
    pub department: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(regex(path = *PHONE_RE, message = "Invalid phone number"))]
    pub phone: Option<String>,
    #[validate(
        length(min = 8, message = "Password must be at least 8 characters"),
        custom(function = "validate_password_strength")
    )]
    pub password: String,
}

/// Register a librarian account
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterLibrarian {
    #[validate(regex(path = *MEMBER_CODE_RE, message = "Invalid librarian id"))]
    pub librarian_id: String,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(min = 1, max = 255))]
    pub designation: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(regex(path = *PHONE_RE, message = "Invalid phone number"))]
    pub phone: Option<String>,
    #[validate(
        length(min = 8, message = "Password must be at least 8 characters"),
        custom(function = "validate_password_strength")
    )]
    pub password: String,
}

/// Role-independent insert payload, password already hashed
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub member_code: String,
    pub name: String,
    pub department: Option<String>,
    pub designation: Option<String>,
    pub phone: Option<String>,
}

/// Authenticated caller as seen by the services
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: i32,
    pub role: Role,
}

impl Actor {
    pub fn new(id: i32, role: Role) -> Self {
        Self { id, role }
    }

    pub fn is_librarian(&self) -> bool {
        self.role == Role::Librarian
    }

    /// Require librarian privileges
    pub fn require_librarian(&self) -> AppResult<()> {
        if self.is_librarian() {
            Ok(())
        } else {
            Err(AppError::Forbidden("Librarian privileges required".to_string()))
        }
    }

    /// Lending policy of the caller; librarians do not borrow
    pub fn loan_policy(&self) -> AppResult<LoanPolicy> {
        LoanPolicy::for_role(self.role).ok_or_else(|| {
            AppError::Forbidden("Only students and faculty can borrow publications".to_string())
        })
    }
}

/// JWT Claims for authenticated users
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserClaims {
    /// Account email
    pub sub: String,
    pub user_id: i32,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

impl UserClaims {
    /// Create a new JWT token
    pub fn create_token(&self, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{encode, EncodingKey, Header};
        encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    /// Parse JWT token
    pub fn from_token(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{decode, DecodingKey, Validation};
        let token_data = decode::<Self>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    pub fn actor(&self) -> Actor {
        Actor::new(self.user_id, self.role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn student() -> RegisterStudent {
        RegisterStudent {
            student_id: "20-42001-1".to_string(),
            name: "Rahim Uddin".to_string(),
            department: "CSE".to_string(),
            email: "rahim@aust.edu".to_string(),
            phone: Some("+880 1711-000000".to_string()),
            password: "Secret#123".to_string(),
        }
    }

    #[test]
    fn test_valid_registration() {
        assert!(student().validate().is_ok());
    }

    #[test]
    fn test_weak_password_rejected() {
        let mut s = student();
        s.password = "alllowercase1!".to_string();
        assert!(s.validate().is_err());

        s.password = "Sh0rt!".to_string();
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_bad_phone_rejected() {
        let mut s = student();
        s.phone = Some("call me".to_string());
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_librarian_cannot_borrow() {
        let actor = Actor::new(1, Role::Librarian);
        assert!(matches!(actor.loan_policy(), Err(AppError::Forbidden(_))));
        assert!(actor.require_librarian().is_ok());
        assert!(Actor::new(2, Role::Student).require_librarian().is_err());
    }

    #[test]
    fn test_token_roundtrip() {
        let now = Utc::now().timestamp();
        let claims = UserClaims {
            sub: "rahim@aust.edu".to_string(),
            user_id: 7,
            role: Role::Faculty,
            exp: now + 3600,
            iat: now,
        };
        let token = claims.create_token("secret").unwrap();
        let parsed = UserClaims::from_token(&token, "secret").unwrap();
        assert_eq!(parsed.actor(), Actor::new(7, Role::Faculty));
        assert!(UserClaims::from_token(&token, "other").is_err());
    }
}
