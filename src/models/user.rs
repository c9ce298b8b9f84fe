//! User model and related types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use utoipa::ToSchema;
use validator::Validate;

use super::enums::{AccountStatus, PaymentMethod, UserRole};
use crate::error::AppError;

/// Membership form details, stored as JSONB
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct MembershipDetails {
    pub full_name: Option<String>,
    pub cnic: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub emergency_contact: Option<String>,
    pub membership_date: Option<DateTime<Utc>>,
}

/// Internal row structure for database queries
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    id: i32,
    name: String,
    email: String,
    password: String,
    role: UserRole,
    is_member: bool,
    membership_details: Option<Json<MembershipDetails>>,
    account_status: AccountStatus,
    account_block_reason: Option<String>,
    account_block_date: Option<DateTime<Utc>>,
    total_unpaid_fines: Decimal,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            name: row.name,
            email: row.email,
            password: row.password,
            role: row.role,
            is_member: row.is_member,
            membership_details: row.membership_details.map(|Json(details)| details),
            account_status: row.account_status,
            account_block_reason: row.account_block_reason,
            account_block_date: row.account_block_date,
            total_unpaid_fines: row.total_unpaid_fines,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Full user model
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: i32,
    pub name: String,
    pub email: String,
    /// Hashed password (argon2)
    #[serde(skip_serializing)]
    pub password: String,
    pub role: UserRole,
    pub is_member: bool,
    pub membership_details: Option<MembershipDetails>,
    pub account_status: AccountStatus,
    pub account_block_reason: Option<String>,
    pub account_block_date: Option<DateTime<Utc>>,
    /// Cached sum of unpaid fines, refreshed on every recompute
    pub total_unpaid_fines: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_blocked(&self) -> bool {
        self.account_status == AccountStatus::Blocked
    }
}

/// Short user representation embedded in reports
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct UserShort {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub account_status: AccountStatus,
}

impl From<&User> for UserShort {
    fn from(user: &User) -> Self {
        UserShort {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            account_status: user.account_status,
        }
    }
}

/// Register request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterUser {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
}

/// Login request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Token issued on login or registration
#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: User,
}

/// Membership form submission
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SubmitMembership {
    #[validate(length(min = 1, message = "Full name is required"))]
    pub full_name: String,
    pub cnic: Option<String>,
    #[validate(length(min = 1, message = "Address is required"))]
    pub address: String,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub emergency_contact: Option<String>,
}

/// Membership status response
#[derive(Debug, Serialize, ToSchema)]
pub struct MembershipStatus {
    pub is_member: bool,
    pub membership_details: Option<MembershipDetails>,
}

/// Admin block request
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct BlockAccount {
    pub reason: Option<String>,
}

/// Entry of a user's fine payment history
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct FinePayment {
    pub id: i32,
    pub user_id: i32,
    pub transaction_id: i32,
    pub amount: Decimal,
    pub payment_date: DateTime<Utc>,
    pub payment_method: PaymentMethod,
    pub notes: Option<String>,
}

/// JWT Claims for authenticated users
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserClaims {
    pub sub: String,
    pub user_id: i32,
    pub role: UserRole,
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

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// Require admin privileges
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Authorization("Administrator privileges required".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(role: UserRole) -> UserClaims {
        let now = Utc::now().timestamp();
        UserClaims {
            sub: "reader@example.org".to_string(),
            user_id: 7,
            role,
            exp: now + 3600,
            iat: now,
        }
    }

    #[test]
    fn test_token_round_trip() {
        let token = claims(UserRole::User).create_token("secret").unwrap();
        let parsed = UserClaims::from_token(&token, "secret").unwrap();
        assert_eq!(parsed.user_id, 7);
        assert_eq!(parsed.role, UserRole::User);
        assert!(UserClaims::from_token(&token, "other-secret").is_err());
    }

    #[test]
    fn test_require_admin() {
        assert!(claims(UserRole::Admin).require_admin().is_ok());
        assert!(matches!(
            claims(UserRole::User).require_admin(),
            Err(AppError::Authorization(_))
        ));
    }
}
