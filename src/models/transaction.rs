//! Rental transaction model and related types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use super::enums::{PaymentMethod, PaymentStatus, TransactionStatus};

/// Rental transaction from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Transaction {
    pub id: i32,
    pub user_id: i32,
    pub book_id: i32,
    pub issue_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    /// Rental length in days
    pub rental_duration: i32,
    pub rental_cost: Decimal,
    pub payment_status: PaymentStatus,
    pub delivery_address: Option<String>,
    pub status: TransactionStatus,
    /// Amount currently owed (gross fine minus waivers) as of the last recompute
    pub fine_amount: Decimal,
    pub fine_paid: bool,
    pub fine_payment_date: Option<DateTime<Utc>>,
    pub fine_payment_method: Option<PaymentMethod>,
    pub fine_start_date: Option<DateTime<Utc>>,
    pub grace_period_end_date: Option<DateTime<Utc>>,
    pub is_lost: bool,
    pub lost_date: Option<DateTime<Utc>>,
    pub replacement_cost: Option<Decimal>,
    /// Cumulative amount waived by administrators
    pub fine_waived_amount: Decimal,
    pub fine_waived_notes: Option<String>,
    pub fine_waived_by: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Transaction joined with the rented book's title and replacement cost
#[derive(Debug, Clone, FromRow)]
pub struct RentalRecord {
    #[sqlx(flatten)]
    pub transaction: Transaction,
    pub book_title: String,
    pub book_replacement_cost: Option<Decimal>,
}

/// Transaction as listed to patrons and staff, with its current fine
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TransactionView {
    #[serde(flatten)]
    pub transaction: Transaction,
    pub book_title: String,
    /// Owner name (admin listings only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_email: Option<String>,
    /// Amount currently owed on this rental
    pub current_fine: Decimal,
    pub days_overdue: i64,
}

/// Transaction joined with book and user, for admin listings
#[derive(Debug, Clone, FromRow)]
pub struct AdminRentalRecord {
    #[sqlx(flatten)]
    pub transaction: Transaction,
    pub book_title: String,
    pub book_replacement_cost: Option<Decimal>,
    pub user_name: String,
    pub user_email: String,
}

/// Rent a book request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RentBook {
    pub book_id: i32,
    /// Rental length in days (library default when omitted)
    #[validate(range(min = 1, message = "Rental duration must be at least one day"))]
    pub rental_duration: Option<i64>,
}

/// Return a book request
#[derive(Debug, Deserialize, ToSchema)]
pub struct ReturnBook {
    pub book_id: i32,
}

/// Data needed to insert a new rental
#[derive(Debug)]
pub struct NewTransaction {
    pub user_id: i32,
    pub book_id: i32,
    pub issue_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub grace_period_end_date: DateTime<Utc>,
    pub rental_duration: i32,
    pub rental_cost: Decimal,
    pub delivery_address: Option<String>,
}
