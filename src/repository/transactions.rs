//! Rental transactions repository for database operations

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    fines::OverdueUpdate,
    models::{
        enums::{PaymentMethod, TransactionStatus},
        fine::ReportFine,
        transaction::{AdminRentalRecord, NewTransaction, RentalRecord, Transaction},
    },
};

const RECORD_SELECT: &str = r#"
    SELECT t.*, b.title AS book_title, b.replacement_cost AS book_replacement_cost
    FROM transactions t
    JOIN books b ON b.id = t.book_id
"#;

const REPORT_SELECT: &str = r#"
    SELECT t.id AS transaction_id, t.user_id, u.name AS user_name, u.email AS user_email,
           u.account_status, b.title AS book_title, t.status, t.fine_amount,
           t.fine_payment_date, t.fine_payment_method
    FROM transactions t
    JOIN users u ON u.id = t.user_id
    JOIN books b ON b.id = t.book_id
"#;

#[derive(Clone)]
pub struct TransactionsRepository {
    pool: Pool<Postgres>,
}

impl TransactionsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get transaction by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<Transaction> {
        sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Transaction with id {} not found", id)))
    }

    /// Get transaction with its book by ID
    pub async fn get_record(&self, id: i32) -> AppResult<RentalRecord> {
        sqlx::query_as::<_, RentalRecord>(&format!("{} WHERE t.id = $1", RECORD_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Transaction with id {} not found", id)))
    }

    /// All rentals of a user, newest first
    pub async fn user_records(&self, user_id: i32) -> AppResult<Vec<RentalRecord>> {
        let records = sqlx::query_as::<_, RentalRecord>(&format!(
            "{} WHERE t.user_id = $1 ORDER BY t.issue_date DESC, t.id DESC",
            RECORD_SELECT
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    /// Every rental with book and user, newest first
    pub async fn all_records(&self) -> AppResult<Vec<AdminRentalRecord>> {
        let records = sqlx::query_as::<_, AdminRentalRecord>(
            r#"
            SELECT t.*, b.title AS book_title, b.replacement_cost AS book_replacement_cost,
                   u.name AS user_name, u.email AS user_email
            FROM transactions t
            JOIN books b ON b.id = t.book_id
            JOIN users u ON u.id = t.user_id
            ORDER BY t.issue_date DESC, t.id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    /// Rentals still out with a patron
    pub async fn active_records(&self) -> AppResult<Vec<RentalRecord>> {
        let records = sqlx::query_as::<_, RentalRecord>(&format!(
            "{} WHERE t.status IN ('issued', 'overdue') AND t.return_date IS NULL ORDER BY t.due_date",
            RECORD_SELECT
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    /// Active rental of a given book by a given user, if any
    pub async fn find_active(&self, user_id: i32, book_id: i32) -> AppResult<Option<Transaction>> {
        let transaction = sqlx::query_as::<_, Transaction>(
            r#"
            SELECT * FROM transactions
            WHERE user_id = $1 AND book_id = $2 AND status IN ('issued', 'overdue')
            ORDER BY issue_date DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(book_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(transaction)
    }

    /// Insert a new rental
    pub async fn create(&self, rental: &NewTransaction) -> AppResult<Transaction> {
        let transaction = sqlx::query_as::<_, Transaction>(
            r#"
            INSERT INTO transactions (user_id, book_id, issue_date, due_date, grace_period_end_date,
                                      rental_duration, rental_cost, delivery_address)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(rental.user_id)
        .bind(rental.book_id)
        .bind(rental.issue_date)
        .bind(rental.due_date)
        .bind(rental.grace_period_end_date)
        .bind(rental.rental_duration)
        .bind(rental.rental_cost)
        .bind(&rental.delivery_address)
        .fetch_one(&self.pool)
        .await?;
        Ok(transaction)
    }

    /// Write back the fields the overdue sweep computed
    pub async fn apply_overdue_update(&self, id: i32, update: &OverdueUpdate) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE transactions SET
                status = COALESCE($2, status),
                fine_start_date = COALESCE($3, fine_start_date),
                fine_amount = COALESCE($4, fine_amount),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(update.status)
        .bind(update.fine_start_date)
        .bind(update.fine_amount)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Close a rental with its final fine
    pub async fn mark_returned(
        &self,
        id: i32,
        return_date: DateTime<Utc>,
        fine_amount: Decimal,
        fine_start_date: Option<DateTime<Utc>>,
    ) -> AppResult<Transaction> {
        sqlx::query_as::<_, Transaction>(
            r#"
            UPDATE transactions SET
                status = 'returned',
                return_date = $2,
                fine_amount = CASE WHEN fine_paid THEN fine_amount ELSE $3 END,
                fine_start_date = COALESCE(fine_start_date, $4),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(return_date)
        .bind(fine_amount)
        .bind(fine_start_date)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Transaction with id {} not found", id)))
    }

    /// Declare a rental lost with its flat charge
    pub async fn mark_lost(
        &self,
        id: i32,
        lost_date: DateTime<Utc>,
        replacement_cost: Decimal,
        fine_amount: Decimal,
    ) -> AppResult<Transaction> {
        sqlx::query_as::<_, Transaction>(
            r#"
            UPDATE transactions SET
                status = 'lost',
                is_lost = TRUE,
                lost_date = $2,
                replacement_cost = $3,
                fine_amount = $4,
                fine_paid = FALSE,
                fine_payment_date = NULL,
                fine_payment_method = NULL,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(lost_date)
        .bind(replacement_cost)
        .bind(fine_amount)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Transaction with id {} not found", id)))
    }

    /// Settle a fine
    pub async fn mark_fine_paid(
        &self,
        id: i32,
        amount: Decimal,
        method: PaymentMethod,
        date: DateTime<Utc>,
    ) -> AppResult<Transaction> {
        sqlx::query_as::<_, Transaction>(
            r#"
            UPDATE transactions SET
                fine_amount = $2,
                fine_paid = TRUE,
                fine_payment_method = $3,
                fine_payment_date = $4,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(amount)
        .bind(method)
        .bind(date)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Transaction with id {} not found", id)))
    }

    /// Record a waiver. `settled` clears the fine and marks it paid as waived.
    #[allow(clippy::too_many_arguments)]
    pub async fn apply_waiver(
        &self,
        id: i32,
        waived_total: Decimal,
        notes: Option<&str>,
        waived_by: i32,
        remaining: Decimal,
        settled: bool,
        date: DateTime<Utc>,
    ) -> AppResult<Transaction> {
        sqlx::query_as::<_, Transaction>(
            r#"
            UPDATE transactions SET
                fine_waived_amount = $2,
                fine_waived_notes = $3,
                fine_waived_by = $4,
                fine_amount = CASE WHEN $6 THEN 0 ELSE $5 END,
                fine_paid = CASE WHEN $6 THEN TRUE ELSE fine_paid END,
                fine_payment_method = CASE WHEN $6 THEN 'waived' ELSE fine_payment_method END,
                fine_payment_date = CASE WHEN $6 THEN $7 ELSE fine_payment_date END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(waived_total)
        .bind(notes)
        .bind(waived_by)
        .bind(remaining)
        .bind(settled)
        .bind(date)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Transaction with id {} not found", id)))
    }

    /// Mark the rental fee as paid
    pub async fn mark_rental_paid(&self, id: i32) -> AppResult<Transaction> {
        sqlx::query_as::<_, Transaction>(
            r#"
            UPDATE transactions SET payment_status = 'paid', updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Transaction with id {} not found", id)))
    }

    /// Unpaid fines of every user, largest first
    pub async fn report_unpaid(&self) -> AppResult<Vec<ReportFine>> {
        let fines = sqlx::query_as::<_, ReportFine>(&format!(
            "{} WHERE t.fine_paid = FALSE AND t.fine_amount > 0 ORDER BY t.fine_amount DESC, t.id",
            REPORT_SELECT
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(fines)
    }

    /// Most recently settled fines
    pub async fn report_recently_paid(&self, limit: i64) -> AppResult<Vec<ReportFine>> {
        let fines = sqlx::query_as::<_, ReportFine>(&format!(
            "{} WHERE t.fine_paid = TRUE AND t.fine_amount > 0 ORDER BY t.fine_payment_date DESC NULLS LAST LIMIT $1",
            REPORT_SELECT
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(fines)
    }

    /// Sum of fines collected by payment (waivers excluded)
    pub async fn total_collected(&self) -> AppResult<Decimal> {
        let total: Decimal = sqlx::query_scalar(
            "SELECT COALESCE(SUM(amount), 0) FROM fine_payments WHERE payment_method != 'waived'",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(total)
    }

    /// Count rentals in any of the given statuses
    pub async fn count_by_status(&self, statuses: &[TransactionStatus]) -> AppResult<i64> {
        let statuses: Vec<&str> = statuses.iter().map(|s| s.as_str()).collect();
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM transactions WHERE status = ANY($1)")
                .bind(statuses)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    /// Count every rental ever made
    pub async fn count(&self) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM transactions")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Sum of rental fees paid
    pub async fn rental_revenue(&self) -> AppResult<Decimal> {
        let total: Decimal = sqlx::query_scalar(
            "SELECT COALESCE(SUM(rental_cost), 0) FROM transactions WHERE payment_status = 'paid'",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(total)
    }
}
