//! Book (catalog inventory) model

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Book record
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: i32,
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub category: String,
    pub description: Option<String>,
    pub cover_image: Option<String>,
    pub total_quantity: i32,
    /// Copies on the shelf (0 ≤ available ≤ total)
    pub available_quantity: i32,
    pub shelf_location: Option<String>,
    pub rating: Decimal,
    pub num_reviews: i32,
    /// Charged when a rented copy is lost
    pub replacement_cost: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Book search parameters
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct BookQuery {
    /// Case-insensitive title search
    pub keyword: Option<String>,
}

/// Create book request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateBook {
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    #[validate(length(min = 1, message = "Author is required"))]
    pub author: String,
    #[validate(length(min = 1, message = "ISBN is required"))]
    pub isbn: String,
    #[validate(length(min = 1, message = "Category is required"))]
    pub category: String,
    pub description: Option<String>,
    pub cover_image: Option<String>,
    #[validate(range(min = 0, message = "Quantity cannot be negative"))]
    pub total_quantity: Option<i32>,
    pub shelf_location: Option<String>,
    pub replacement_cost: Option<Decimal>,
}

/// Update book request (absent fields are left unchanged)
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateBook {
    pub title: Option<String>,
    pub author: Option<String>,
    pub isbn: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub cover_image: Option<String>,
    #[validate(range(min = 0, message = "Quantity cannot be negative"))]
    pub total_quantity: Option<i32>,
    pub shelf_location: Option<String>,
    pub replacement_cost: Option<Decimal>,
}
