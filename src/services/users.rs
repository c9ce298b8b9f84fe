//! Authentication and user account service

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;

use super::fine_job::{self, Recompute};
use crate::{
    config::AuthConfig,
    error::{AppError, AppResult},
    fines::LibraryPolicy,
    models::{
        enums::{AccountStatus, UserRole},
        user::{
            AuthResponse, MembershipDetails, MembershipStatus, RegisterUser, SubmitMembership, User,
            UserClaims,
        },
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct UsersService {
    repository: Repository,
    config: AuthConfig,
    policy: LibraryPolicy,
}

impl UsersService {
    pub fn new(repository: Repository, config: AuthConfig, policy: LibraryPolicy) -> Self {
        Self {
            repository,
            config,
            policy,
        }
    }

    /// Create a patron account and log it in
    pub async fn register(&self, request: RegisterUser) -> AppResult<AuthResponse> {
        let email = request.email.trim().to_lowercase();
        if self.repository.users.email_exists(&email).await? {
            return Err(AppError::Conflict("Email already registered".to_string()));
        }

        let hash = self.hash_password(&request.password)?;
        let user = self
            .repository
            .users
            .create(request.name.trim(), &email, &hash, UserRole::User)
            .await?;

        tracing::info!(user_id = user.id, "User registered");
        self.issue_token(user)
    }

    /// Authenticate by email and password and return a JWT
    pub async fn authenticate(&self, email: &str, password: &str) -> AppResult<AuthResponse> {
        let user = self
            .repository
            .users
            .get_by_email(email.trim())
            .await?
            .ok_or_else(|| AppError::Authentication("Invalid email or password".to_string()))?;

        if !self.verify_password(&user, password)? {
            return Err(AppError::Authentication("Invalid email or password".to_string()));
        }

        self.issue_token(user)
    }

    fn issue_token(&self, user: User) -> AppResult<AuthResponse> {
        let now = Utc::now().timestamp();
        let expires_in = self.config.jwt_expiration_hours as i64 * 3600;
        let claims = UserClaims {
            sub: user.email.clone(),
            user_id: user.id,
            role: user.role,
            exp: now + expires_in,
            iat: now,
        };

        let token = claims
            .create_token(&self.config.jwt_secret)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))?;

        Ok(AuthResponse {
            token,
            token_type: "Bearer".to_string(),
            expires_in,
            user,
        })
    }

    /// Verify user password
    fn verify_password(&self, user: &User, password: &str) -> AppResult<bool> {
        let parsed_hash = PasswordHash::new(&user.password)
            .map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    /// Hash a password using Argon2
    pub fn hash_password(&self, password: &str) -> AppResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
        Ok(hash.to_string())
    }

    /// Create the configured administrator when no admin exists yet
    pub async fn ensure_bootstrap_admin(&self) -> AppResult<()> {
        let (Some(email), Some(password)) = (
            self.config.bootstrap_admin_email.as_deref(),
            self.config.bootstrap_admin_password.as_deref(),
        ) else {
            return Ok(());
        };

        if self.repository.users.admin_exists().await? {
            return Ok(());
        }
        if self.repository.users.email_exists(email).await? {
            tracing::warn!(email, "Bootstrap admin email belongs to an existing patron");
            return Ok(());
        }

        let hash = self.hash_password(password)?;
        let admin = self
            .repository
            .users
            .create("Administrator", &email.to_lowercase(), &hash, UserRole::Admin)
            .await?;
        tracing::info!(user_id = admin.id, "Bootstrap administrator created");
        Ok(())
    }

    /// User with its cached unpaid total brought up to date
    async fn synced(&self, mut user: User) -> AppResult<User> {
        let refresh = fine_job::refresh_unpaid_total(
            &self.repository,
            user.id,
            &self.policy,
            Utc::now(),
            Recompute::Sync,
        )
        .await?;
        user.total_unpaid_fines = refresh.total;
        Ok(user)
    }

    /// Profile of the logged-in user
    pub async fn profile(&self, user_id: i32) -> AppResult<User> {
        let user = self.repository.users.get_by_id(user_id).await?;
        self.synced(user).await
    }

    /// Every account, with up to date unpaid totals
    pub async fn list_users(&self) -> AppResult<Vec<User>> {
        let users = self.repository.users.list().await?;
        let mut synced = Vec::with_capacity(users.len());
        for user in users {
            synced.push(self.synced(user).await?);
        }
        Ok(synced)
    }

    /// Record the membership form; membership is granted on submission
    pub async fn submit_membership(&self, user_id: i32, form: SubmitMembership) -> AppResult<User> {
        let details = MembershipDetails {
            full_name: Some(form.full_name),
            cnic: form.cnic,
            address: Some(form.address),
            phone: form.phone,
            city: form.city,
            postal_code: form.postal_code,
            emergency_contact: form.emergency_contact,
            membership_date: Some(Utc::now()),
        };

        let user = self.repository.users.set_membership(user_id, &details).await?;
        tracing::info!(user_id, "Membership submitted");
        Ok(user)
    }

    pub async fn membership_status(&self, user_id: i32) -> AppResult<MembershipStatus> {
        let user = self.repository.users.get_by_id(user_id).await?;
        Ok(MembershipStatus {
            is_member: user.is_member,
            membership_details: user.membership_details,
        })
    }

    /// Block an account by hand
    pub async fn block_account(&self, user_id: i32, reason: Option<String>) -> AppResult<User> {
        let user = self.repository.users.get_by_id(user_id).await?;
        if user.role == UserRole::Admin {
            return Err(AppError::BusinessRule(
                "Administrator accounts cannot be blocked".to_string(),
            ));
        }
        if user.account_status == AccountStatus::Blocked {
            return Err(AppError::BusinessRule("Account is already blocked".to_string()));
        }

        let reason = reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| "Blocked by administrator".to_string());
        let blocked = self.repository.users.block(user_id, &reason, Utc::now()).await?;
        tracing::info!(user_id, reason = %reason, "Account blocked by administrator");
        Ok(blocked)
    }

    /// Lift a block by hand, whatever the unpaid total
    pub async fn unblock_account(&self, user_id: i32) -> AppResult<User> {
        let user = self.repository.users.get_by_id(user_id).await?;
        if user.account_status != AccountStatus::Blocked {
            return Err(AppError::BusinessRule("Account is not blocked".to_string()));
        }

        let unblocked = self.repository.users.unblock(user_id).await?;
        tracing::info!(user_id, "Account unblocked by administrator");
        Ok(unblocked)
    }
}
