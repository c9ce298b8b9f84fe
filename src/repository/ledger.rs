//! Fine ledger backed by PostgreSQL

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::Repository;
use crate::{
    error::AppResult,
    fines::OverdueUpdate,
    models::{
        transaction::{RentalRecord, Transaction},
        user::User,
    },
    services::fine_job::FineLedger,
};

#[async_trait]
impl FineLedger for Repository {
    async fn active_rentals(&self) -> AppResult<Vec<RentalRecord>> {
        self.transactions.active_records().await
    }

    async fn update_overdue(&self, transaction_id: i32, update: &OverdueUpdate) -> AppResult<()> {
        self.transactions
            .apply_overdue_update(transaction_id, update)
            .await
    }

    async fn mark_lost(
        &self,
        transaction_id: i32,
        lost_date: DateTime<Utc>,
        replacement_cost: Decimal,
        fine_amount: Decimal,
    ) -> AppResult<Transaction> {
        self.transactions
            .mark_lost(transaction_id, lost_date, replacement_cost, fine_amount)
            .await
    }

    async fn active_patrons(&self) -> AppResult<Vec<User>> {
        self.users.list_active_patrons().await
    }

    async fn user(&self, user_id: i32) -> AppResult<User> {
        self.users.get_by_id(user_id).await
    }

    async fn user_rentals(&self, user_id: i32) -> AppResult<Vec<RentalRecord>> {
        self.transactions.user_records(user_id).await
    }

    async fn store_unpaid_total(&self, user_id: i32, total: Decimal) -> AppResult<()> {
        self.users.store_unpaid_total(user_id, total).await
    }

    async fn block_user(&self, user_id: i32, reason: &str, date: DateTime<Utc>) -> AppResult<()> {
        self.users.block(user_id, reason, date).await.map(|_| ())
    }

    async fn unblock_user(&self, user_id: i32) -> AppResult<()> {
        self.users.unblock(user_id).await.map(|_| ())
    }
}
