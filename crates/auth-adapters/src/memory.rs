//! # In-memory auth
//!
//! An `AuthAdmin` for local runs and tests. Passwords are stored as Argon2
//! PHC strings; sign-in mints tokens with [`JwtIssuer`] so the API's
//! [`crate::JwtVerifier`] accepts them like real Supabase tokens.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use dashmap::DashMap;
use domains::{AuthAdmin, BackendError, BackendResult, NewAuthUser, Session, UserId, UserMetadata};
use uuid::Uuid;

use crate::jwt::JwtIssuer;

#[derive(Debug, Clone)]
struct StoredUser {
    email:         String,
    password_hash: String,
    metadata:      UserMetadata,
}

pub struct MemoryAuth {
    users:  DashMap<UserId, StoredUser>,
    issuer: JwtIssuer,
}

impl MemoryAuth {
    pub fn new(issuer: JwtIssuer) -> Self {
        Self { users: DashMap::new(), issuer }
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn contains(&self, id: UserId) -> bool {
        self.users.contains_key(&id)
    }

    /// The metadata the user was created with.
    pub fn metadata(&self, id: UserId) -> Option<UserMetadata> {
        self.users.get(&id).map(|u| u.metadata.clone())
    }
}

fn hash_password(password: &str) -> BackendResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| BackendError::new(format!("password hashing failed: {e}")))
}

/// Verifies if a provided password matches a stored Argon2 hash.
fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(p) => p,
        Err(_) => return false,
    };
    Argon2::default().verify_password(password.as_bytes(), &parsed_hash).is_ok()
}

#[async_trait]
impl AuthAdmin for MemoryAuth {
    async fn create_user(&self, user: &NewAuthUser) -> BackendResult<Option<UserId>> {
        let email = user.email.to_lowercase();
        if self.users.iter().any(|u| u.email == email) {
            return Err(BackendError::with_code(
                "A user with this email address has already been registered",
                "email_exists",
            ));
        }
        let id = Uuid::new_v4();
        let stored = StoredUser { email, password_hash: hash_password(&user.password)?, metadata: user.metadata.clone() };
        self.users.insert(id, stored);
        Ok(Some(id))
    }

    async fn delete_user(&self, id: UserId) -> BackendResult<()> {
        self.users
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| BackendError::with_code("User not found", "user_not_found"))
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> BackendResult<Session> {
        let email = email.to_lowercase();
        let found = self
            .users
            .iter()
            .find(|u| u.email == email)
            .map(|u| (*u.key(), u.password_hash.clone()));

        match found {
            Some((id, hash)) if verify_password(password, &hash) => self.issuer.issue(id, Some(&email)),
            _ => Err(BackendError::with_code("Invalid login credentials", "invalid_credentials")),
        }
    }

    async fn update_password(&self, id: UserId, password: &str) -> BackendResult<()> {
        let hash = hash_password(password)?;
        let mut user = self
            .users
            .get_mut(&id)
            .ok_or_else(|| BackendError::with_code("User not found", "user_not_found"))?;
        user.password_hash = hash;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwt::JwtVerifier;
    use domains::TokenVerifier;

    const SECRET: &[u8] = b"memory-auth-test-secret-0123456789";

    fn new_user(email: &str) -> NewAuthUser {
        NewAuthUser {
            email:    email.into(),
            password: "hunter2hunter2".into(),
            metadata: UserMetadata { full_name: "Ace".into(), username: "ace".into(), phone_number: None },
        }
    }

    #[tokio::test]
    async fn sign_in_issues_a_verifiable_token() {
        let auth = MemoryAuth::new(JwtIssuer::new(SECRET, 3600));
        let id = auth.create_user(&new_user("Ace@Kashaaf.gg")).await.unwrap().unwrap();
        assert_eq!(auth.metadata(id).unwrap().username, "ace");

        let session = auth.sign_in_with_password("ace@kashaaf.gg", "hunter2hunter2").await.unwrap();
        assert_eq!(session.user_id, id);
        assert_eq!(JwtVerifier::new(SECRET).verify(&session.access_token).unwrap().user_id, id);

        assert!(auth.sign_in_with_password("ace@kashaaf.gg", "wrong-password").await.is_err());
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let auth = MemoryAuth::new(JwtIssuer::new(SECRET, 3600));
        auth.create_user(&new_user("ace@kashaaf.gg")).await.unwrap();
        let err = auth.create_user(&new_user("ACE@kashaaf.gg")).await.unwrap_err();
        assert_eq!(err.code.as_deref(), Some("email_exists"));
        assert_eq!(auth.user_count(), 1);
    }

    #[tokio::test]
    async fn password_update_and_delete() {
        let auth = MemoryAuth::new(JwtIssuer::new(SECRET, 3600));
        let id = auth.create_user(&new_user("ace@kashaaf.gg")).await.unwrap().unwrap();

        auth.update_password(id, "a-new-password").await.unwrap();
        assert!(auth.sign_in_with_password("ace@kashaaf.gg", "hunter2hunter2").await.is_err());
        assert!(auth.sign_in_with_password("ace@kashaaf.gg", "a-new-password").await.is_ok());

        auth.delete_user(id).await.unwrap();
        assert!(!auth.contains(id));
        assert!(auth.delete_user(id).await.is_err());
    }
}
