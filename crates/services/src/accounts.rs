//! # Accounts
//!
//! Signup, username availability, password sign-in and the profile page.
//!
//! Signup touches two systems that share no transaction: the auth service
//! and the `profiles` table. The auth user is created first; if the profile
//! insert then fails, that user is deleted again.

use std::sync::Arc;

use domains::{
    AuthAdmin, DomainError, DomainResult, Identity, NewAuthUser, NewProfile, Profile, ProfileRepository,
    Session, UserId, UserMetadata,
};
use serde::Deserialize;

use crate::validation::{normalize_phone, normalize_username, validate_password, NewAccount, USERNAME_MIN};

#[derive(Debug, Clone, Deserialize)]
pub struct SignupInput {
    pub full_name:    String,
    #[serde(default)]
    pub phone_number: Option<String>,
    pub username:     String,
    pub email:        String,
    pub password:     String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChangePasswordInput {
    pub old_password:     String,
    pub new_password:     String,
    pub confirm_password: String,
}

#[derive(Clone)]
pub struct AccountService {
    profiles: Arc<dyn ProfileRepository>,
    auth:     Arc<dyn AuthAdmin>,
}

impl AccountService {
    pub fn new(profiles: Arc<dyn ProfileRepository>, auth: Arc<dyn AuthAdmin>) -> Self {
        Self { profiles, auth }
    }

    /// Creates the auth user and its profile row; returns the new user's id.
    pub async fn signup(&self, input: SignupInput) -> DomainResult<UserId> {
        let account = NewAccount {
            full_name:    input.full_name.trim().to_string(),
            phone_number: normalize_phone(input.phone_number.as_deref()),
            username:     normalize_username(&input.username),
            email:        input.email.trim().to_string(),
            password:     input.password,
        };
        account.check()?;
        let NewAccount { full_name, phone_number, username, email, password } = account;

        if self.profiles.find_id_by_username(&username).await?.is_some() {
            return Err(DomainError::Conflict("Username already taken.".into()));
        }

        let created = self
            .auth
            .create_user(&NewAuthUser {
                email,
                password,
                metadata: UserMetadata {
                    full_name:    full_name.clone(),
                    username:     username.clone(),
                    phone_number: phone_number.clone(),
                },
            })
            .await
            .map_err(DomainError::rejected)?;

        let user_id = created.ok_or_else(|| DomainError::Internal("Auth user not created.".into()))?;

        let profile = NewProfile { id: user_id, full_name, phone_number, username };
        if let Err(e) = self.profiles.insert(&profile).await {
            tracing::warn!(%user_id, error = %e, "profile insert failed, deleting auth user");
            if let Err(cleanup) = self.auth.delete_user(user_id).await {
                tracing::error!(%user_id, error = %cleanup, "could not delete orphaned auth user");
            }
            return Err(DomainError::rejected(e));
        }

        tracing::info!(%user_id, username = %profile.username, "account created");
        Ok(user_id)
    }

    /// `true` when no profile holds the (normalized) username.
    pub async fn check_username(&self, raw: &str) -> DomainResult<bool> {
        let username = normalize_username(raw);
        if username.chars().count() < USERNAME_MIN {
            return Err(DomainError::Validation("username too short".into()));
        }
        Ok(self.profiles.find_id_by_username(&username).await?.is_none())
    }

    /// Refused credentials are a 401; an auth service that fails the call is not.
    pub async fn sign_in(&self, email: &str, password: &str) -> DomainResult<Session> {
        self.auth.sign_in_with_password(email.trim(), password).await.map_err(|e| {
            if e.is_credential_rejection() {
                DomainError::Unauthorized(e.message)
            } else {
                tracing::error!(error = %e, "password sign-in failed");
                DomainError::from(e)
            }
        })
    }

    pub async fn profile(&self, viewer: &Identity) -> DomainResult<Profile> {
        self.profiles
            .get(viewer.user_id)
            .await?
            .ok_or_else(|| DomainError::NotFound("Profile not found.".into()))
    }

    /// The old password is verified by signing in with it before the change.
    pub async fn change_password(&self, viewer: &Identity, input: ChangePasswordInput) -> DomainResult<()> {
        if input.old_password.trim().is_empty() {
            return Err(DomainError::Validation("Old password is required.".into()));
        }
        validate_password(&input.new_password)?;
        if input.new_password != input.confirm_password {
            return Err(DomainError::Validation("Passwords do not match.".into()));
        }
        let email = viewer
            .email
            .as_deref()
            .ok_or_else(|| DomainError::Unauthorized("Session has no email address.".into()))?;

        match self.auth.sign_in_with_password(email, &input.old_password).await {
            Ok(_) => {}
            Err(e) if e.is_credential_rejection() => {
                return Err(DomainError::Validation("Old password is incorrect.".into()));
            }
            Err(e) => return Err(e.into()),
        }

        self.auth
            .update_password(viewer.user_id, &input.new_password)
            .await
            .map_err(DomainError::rejected)?;
        tracing::info!(user_id = %viewer.user_id, "password changed");
        Ok(())
    }
}
