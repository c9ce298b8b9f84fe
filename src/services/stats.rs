//! Dashboard statistics service

use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    models::enums::TransactionStatus,
    repository::Repository,
};

/// Admin dashboard counters
#[derive(Debug, Serialize, ToSchema)]
pub struct DashboardStats {
    pub total_books: i64,
    pub total_patrons: i64,
    pub total_transactions: i64,
    pub active_rentals: i64,
    pub overdue_rentals: i64,
    pub lost_items: i64,
    pub blocked_accounts: i64,
    /// Sum of the cached per-user unpaid totals
    pub total_unpaid_fines: Decimal,
    pub total_fines_collected: Decimal,
    pub rental_revenue: Decimal,
}

#[derive(Clone)]
pub struct StatsService {
    repository: Repository,
}

impl StatsService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn dashboard(&self) -> AppResult<DashboardStats> {
        let transactions = &self.repository.transactions;

        Ok(DashboardStats {
            total_books: self.repository.books.count().await?,
            total_patrons: self.repository.users.count_patrons().await?,
            total_transactions: transactions.count().await?,
            active_rentals: transactions
                .count_by_status(&[TransactionStatus::Issued, TransactionStatus::Overdue])
                .await?,
            overdue_rentals: transactions
                .count_by_status(&[TransactionStatus::Overdue])
                .await?,
            lost_items: transactions
                .count_by_status(&[TransactionStatus::Lost])
                .await?,
            blocked_accounts: self.repository.users.count_blocked().await?,
            total_unpaid_fines: self.repository.users.sum_unpaid_totals().await?,
            total_fines_collected: transactions.total_collected().await?,
            rental_revenue: transactions.rental_revenue().await?,
        })
    }
}
