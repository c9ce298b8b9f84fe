//! Fine request / response types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use super::{
    enums::{AccountStatus, PaymentMethod, TransactionStatus},
    transaction::Transaction,
    user::{FinePayment, UserShort},
};
use crate::fines::{FineDetails, LostItemCharges};

/// A rental with its live fine, as shown on the patron's fines page
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FineEntry {
    pub transaction_id: i32,
    pub book_id: i32,
    pub book_title: String,
    pub issue_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    pub grace_period_end_date: Option<DateTime<Utc>>,
    pub status: TransactionStatus,
    pub is_lost: bool,
    pub lost_date: Option<DateTime<Utc>>,
    /// Amount owed, or the settled amount once paid
    pub fine_amount: Decimal,
    pub fine_paid: bool,
    pub fine_payment_date: Option<DateTime<Utc>>,
    pub fine_details: FineDetails,
    /// Still out and accruing
    pub currently_accruing: bool,
}

/// Patron fines page
#[derive(Debug, Serialize, ToSchema)]
pub struct UserFines {
    pub unpaid_fines: Vec<FineEntry>,
    pub paid_fines: Vec<FineEntry>,
    pub total_unpaid: Decimal,
    pub account_blocked: bool,
    pub block_threshold: Decimal,
}

/// Pay fine request
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct PayFineRequest {
    /// online (default for patrons), cash or card
    pub payment_method: Option<PaymentMethod>,
}

/// Result of paying a single fine
#[derive(Debug, Serialize, ToSchema)]
pub struct PayFineResponse {
    pub success: bool,
    pub message: String,
    pub transaction_id: i32,
    pub fine_amount: Decimal,
    pub fine_paid: bool,
    pub fine_payment_date: Option<DateTime<Utc>>,
    pub new_total_unpaid: Decimal,
    pub account_status: AccountStatus,
}

/// One fine settled by a bulk payment
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PaidTransaction {
    pub transaction_id: i32,
    pub book_title: String,
    pub amount: Decimal,
}

/// Result of paying every outstanding fine
#[derive(Debug, Serialize, ToSchema)]
pub struct PayAllResponse {
    pub success: bool,
    pub message: String,
    pub paid_transactions: Vec<PaidTransaction>,
    pub total_paid: Decimal,
    pub new_total_unpaid: Decimal,
    pub account_status: AccountStatus,
}

/// Payment history, newest first
#[derive(Debug, Serialize, ToSchema)]
pub struct FineHistory {
    pub history: Vec<FinePayment>,
    pub total_paid: Decimal,
}

/// Patron fine summary
#[derive(Debug, Serialize, ToSchema)]
pub struct FineSummary {
    pub total_unpaid_fines: Decimal,
    pub overdue_items: i64,
    pub lost_items: i64,
    pub is_blocked: bool,
    pub account_block_reason: Option<String>,
    pub daily_fine_rate: Decimal,
    pub grace_period_days: i64,
    pub max_fine_per_item: Decimal,
    pub block_threshold: Decimal,
}

/// Waive request: either everything or a bounded amount
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct WaiveFineRequest {
    pub waive_amount: Option<Decimal>,
    #[serde(default)]
    pub waive_all: bool,
    pub notes: Option<String>,
}

/// Waiver result
#[derive(Debug, Serialize, ToSchema)]
pub struct WaiveFineResponse {
    pub success: bool,
    pub message: String,
    pub transaction: Transaction,
    pub original_fine: Decimal,
    pub waived: Decimal,
    pub remaining: Decimal,
}

/// Mark-lost result
#[derive(Debug, Serialize, ToSchema)]
pub struct MarkLostResponse {
    pub success: bool,
    pub message: String,
    pub transaction: Transaction,
    pub charges: LostItemCharges,
}

/// Unpaid or recently paid fine line of the admin report
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct ReportFine {
    pub transaction_id: i32,
    pub user_id: i32,
    pub user_name: String,
    pub user_email: String,
    pub account_status: AccountStatus,
    pub book_title: String,
    pub status: TransactionStatus,
    pub fine_amount: Decimal,
    pub fine_payment_date: Option<DateTime<Utc>>,
    pub fine_payment_method: Option<PaymentMethod>,
}

/// Debtor aggregate of the admin report
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Debtor {
    pub user: UserShort,
    pub total_fines: Decimal,
    pub fine_count: i64,
}

/// Totals of the admin report
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReportSummary {
    pub total_unpaid_fines: Decimal,
    pub total_collected: Decimal,
    pub unpaid_count: i64,
    pub users_with_fines: i64,
}

/// Admin fine report
#[derive(Debug, Serialize, ToSchema)]
pub struct FineReport {
    pub unpaid_fines: Vec<ReportFine>,
    pub recently_paid: Vec<ReportFine>,
    pub top_debtors: Vec<Debtor>,
    pub summary: ReportSummary,
}
