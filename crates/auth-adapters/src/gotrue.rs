//! # Supabase Auth (GoTrue)
//!
//! User administration with the service-role key and password sign-in with
//! the anon key, over the `/auth/v1` REST API.

use async_trait::async_trait;
use domains::{AuthAdmin, BackendError, BackendResult, NewAuthUser, Session, UserId, UserMetadata};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use storage_adapters::SupabaseClient;

pub struct GoTrueAdmin {
    client: SupabaseClient,
}

impl GoTrueAdmin {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }
}

#[derive(Serialize)]
struct CreateUserBody<'a> {
    email:         &'a str,
    password:      &'a str,
    email_confirm: bool,
    user_metadata: &'a UserMetadata,
}

#[derive(Deserialize)]
struct UserBody {
    id: Option<UserId>,
}

#[derive(Serialize)]
struct PasswordGrant<'a> {
    email:    &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct TokenBody {
    access_token:  String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in:    i64,
    user:          UserBody,
}

#[async_trait]
impl AuthAdmin for GoTrueAdmin {
    async fn create_user(&self, user: &NewAuthUser) -> BackendResult<Option<UserId>> {
        let body = CreateUserBody {
            email:         &user.email,
            password:      &user.password,
            email_confirm: true,
            user_metadata: &user.metadata,
        };
        let created: UserBody = self
            .client
            .send_json(self.client.service(Method::POST, "/auth/v1/admin/users").json(&body))
            .await?;
        Ok(created.id)
    }

    async fn delete_user(&self, id: UserId) -> BackendResult<()> {
        self.client
            .send_empty(self.client.service(Method::DELETE, &format!("/auth/v1/admin/users/{id}")))
            .await
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> BackendResult<Session> {
        let token: TokenBody = self
            .client
            .send_json(
                self.client
                    .anon(Method::POST, "/auth/v1/token")
                    .query(&[("grant_type", "password")])
                    .json(&PasswordGrant { email, password }),
            )
            .await?;
        let user_id = token.user.id.ok_or_else(|| BackendError::new("token response has no user id"))?;
        Ok(Session {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_in: token.expires_in,
            user_id,
        })
    }

    async fn update_password(&self, id: UserId, password: &str) -> BackendResult<()> {
        #[derive(Serialize)]
        struct Body<'a> {
            password: &'a str,
        }
        self.client
            .send_empty(
                self.client
                    .service(Method::PUT, &format!("/auth/v1/admin/users/{id}"))
                    .json(&Body { password }),
            )
            .await
    }
}
