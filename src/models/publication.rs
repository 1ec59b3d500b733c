//! Publication (catalog entry) model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::enums::PublicationType;
use super::loan::PublicationSummary;

/// Publication from database. `available_copies` counts copies on the shelf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Publication {
    pub id: i32,
    pub title: String,
    pub author: String,
    pub isbn: Option<String>,
    pub publication_year: Option<i32>,
    pub publisher: Option<String>,
    pub department: Option<String>,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub publication_type: PublicationType,
    pub total_copies: i32,
    pub available_copies: i32,
    pub shelf_location: Option<String>,
    pub description: Option<String>,
    pub cover_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Publication {
    pub fn summary(&self) -> PublicationSummary {
        PublicationSummary {
            id: self.id,
            title: self.title.clone(),
            author: self.author.clone(),
            cover_url: self.cover_url.clone(),
            publication_type: self.publication_type,
        }
    }
}

/// Catalog query parameters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct PublicationQuery {
    /// Restrict to books or theses
    #[serde(rename = "type")]
    pub publication_type: Option<PublicationType>,
}

/// Create publication request. All copies start on the shelf.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreatePublication {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    #[validate(length(min = 1, max = 255))]
    pub author: String,
    pub isbn: Option<String>,
    #[validate(range(min = 1000, max = 9999))]
    pub publication_year: Option<i32>,
    pub publisher: Option<String>,
    pub department: Option<String>,
    #[serde(rename = "type")]
    pub publication_type: PublicationType,
    /// Defaults to a single copy
    #[validate(range(min = 0, max = 100000))]
    pub total_copies: Option<i32>,
    pub shelf_location: Option<String>,
    pub description: Option<String>,
    pub cover_url: Option<String>,
}

/// Update publication request. `type` selects the row together with the id;
/// available copies are recomputed from the new total and the loans still out.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct UpdatePublication {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    #[validate(length(min = 1, max = 255))]
    pub author: String,
    #[validate(range(min = 1000, max = 9999))]
    pub publication_year: Option<i32>,
    pub publisher: Option<String>,
    pub department: Option<String>,
    #[serde(rename = "type")]
    pub publication_type: PublicationType,
    #[validate(range(min = 0, max = 100000))]
    pub total_copies: i32,
    pub shelf_location: Option<String>,
    pub description: Option<String>,
    pub cover_url: Option<String>,
}
