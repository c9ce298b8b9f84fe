//! Users repository for database operations

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{types::Json, Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::{
        enums::{PaymentMethod, UserRole},
        user::{FinePayment, MembershipDetails, User, UserRow},
    },
};

#[derive(Clone)]
pub struct UsersRepository {
    pool: Pool<Postgres>,
}

impl UsersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get user by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<User> {
        sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(User::from)
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))
    }

    /// Get user by email (login identifier)
    pub async fn get_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE LOWER(email) = LOWER($1)")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(User::from))
    }

    /// Check if email already exists
    pub async fn email_exists(&self, email: &str) -> AppResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(email) = LOWER($1))")
                .bind(email)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    /// Whether at least one administrator account exists
    pub async fn admin_exists(&self) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE role = $1)")
            .bind(UserRole::Admin)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    /// Create a user with an already hashed password
    pub async fn create(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
        role: UserRole,
    ) -> AppResult<User> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (name, email, password, role)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .bind(role)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    /// List all users, newest first
    pub async fn list(&self) -> AppResult<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>("SELECT * FROM users ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(User::from).collect())
    }

    /// Patrons whose account is currently active
    pub async fn list_active_patrons(&self) -> AppResult<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(
            "SELECT * FROM users WHERE role = $1 AND account_status = 'active' ORDER BY id",
        )
        .bind(UserRole::User)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(User::from).collect())
    }

    /// Record the membership form and flag the user as a member
    pub async fn set_membership(&self, id: i32, details: &MembershipDetails) -> AppResult<User> {
        sqlx::query_as::<_, UserRow>(
            r#"
            UPDATE users SET is_member = TRUE, membership_details = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(Json(details))
        .fetch_optional(&self.pool)
        .await?
        .map(User::from)
        .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))
    }

    /// Store the cached unpaid fines total
    pub async fn store_unpaid_total(&self, id: i32, total: Decimal) -> AppResult<()> {
        sqlx::query("UPDATE users SET total_unpaid_fines = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(total)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Block an account
    pub async fn block(&self, id: i32, reason: &str, date: DateTime<Utc>) -> AppResult<User> {
        sqlx::query_as::<_, UserRow>(
            r#"
            UPDATE users SET account_status = 'blocked', account_block_reason = $2,
                             account_block_date = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(reason)
        .bind(date)
        .fetch_optional(&self.pool)
        .await?
        .map(User::from)
        .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))
    }

    /// Lift a block
    pub async fn unblock(&self, id: i32) -> AppResult<User> {
        sqlx::query_as::<_, UserRow>(
            r#"
            UPDATE users SET account_status = 'active', account_block_reason = NULL,
                             account_block_date = NULL, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(User::from)
        .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))
    }

    /// Append an entry to a user's payment history
    pub async fn record_fine_payment(
        &self,
        user_id: i32,
        transaction_id: i32,
        amount: Decimal,
        method: PaymentMethod,
        notes: Option<&str>,
        date: DateTime<Utc>,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO fine_payments (user_id, transaction_id, amount, payment_date, payment_method, notes)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(user_id)
        .bind(transaction_id)
        .bind(amount)
        .bind(date)
        .bind(method)
        .bind(notes)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Payment history of a user, newest first
    pub async fn fine_payments(&self, user_id: i32) -> AppResult<Vec<FinePayment>> {
        let payments = sqlx::query_as::<_, FinePayment>(
            "SELECT * FROM fine_payments WHERE user_id = $1 ORDER BY payment_date DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(payments)
    }

    /// Count users with the patron role
    pub async fn count_patrons(&self) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = $1")
            .bind(UserRole::User)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Count blocked accounts
    pub async fn count_blocked(&self) -> AppResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE account_status = 'blocked'")
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    /// Sum of cached unpaid totals
    pub async fn sum_unpaid_totals(&self) -> AppResult<Decimal> {
        let total: Decimal =
            sqlx::query_scalar("SELECT COALESCE(SUM(total_unpaid_fines), 0) FROM users")
                .fetch_one(&self.pool)
                .await?;
        Ok(total)
    }
}
