// Copyright (c) 2026 Aisu OS
// SPDX-License-Identifier: AGPL-3.0
//! Registration, login and the bearer-token → user mapping used by every
//! authenticated route.

use std::sync::Arc;
use std::sync::OnceLock;

use chrono::Utc;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::domain::error::CoreError;
use crate::domain::store::{BetaAccessStore, StoreError, UserStore};
use crate::domain::user::{Role, User};
use crate::infrastructure::password::{hash_password, verify_password};
use crate::infrastructure::token::{create_access_token, decode_token, subject_user_id};

#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub email: String,
    pub username: String,
    pub display_name: String,
    pub password: String,
    pub avatar_emoji: Option<String>,
    pub beta_token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub username: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub wallpaper: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub role: Role,
    pub is_active: bool,
    pub cpu: i32,
    pub disk: i32,
    pub wallpaper: Option<String>,
    pub created_at: chrono::DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct UsernameInfoResponse {
    pub avatar_url: Option<String>,
    pub display_name: String,
    pub wallpaper: Option<String>,
}

pub struct AuthService {
    config: Arc<AppConfig>,
    users: Arc<dyn UserStore>,
    beta: Arc<dyn BetaAccessStore>,
}

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+$").unwrap())
}

/// Absolute URL for a stored avatar path. Full URLs and emoji are passed
/// through untouched.
pub fn with_full_url(config: &AppConfig, value: Option<&str>) -> Option<String> {
    let value = value?;
    if value.is_empty() {
        return None;
    }
    if value.starts_with('/') {
        return Some(format!(
            "{}{value}",
            config.app_url.trim_end_matches('/')
        ));
    }
    Some(value.to_string())
}

pub fn require_admin(user: &User) -> Result<(), CoreError> {
    if user.role != Role::Admin {
        return Err(CoreError::Forbidden("Admin privileges required".to_string()));
    }
    Ok(())
}

fn hash_beta_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

impl AuthService {
    pub fn new(
        config: Arc<AppConfig>,
        users: Arc<dyn UserStore>,
        beta: Arc<dyn BetaAccessStore>,
    ) -> Self {
        Self {
            config,
            users,
            beta,
        }
    }

    pub async fn register(&self, input: RegisterInput) -> Result<RegisterResponse, CoreError> {
        if !email_regex().is_match(&input.email) {
            return Err(CoreError::Unprocessable("Invalid email format".to_string()));
        }

        if self.users.find_by_email(&input.email).await?.is_some() {
            return Err(CoreError::Conflict(
                "This email is already registered".to_string(),
            ));
        }
        if self.users.find_by_username(&input.username).await?.is_some() {
            return Err(CoreError::Conflict(
                "This username is already taken".to_string(),
            ));
        }

        if let Some(token) = input.beta_token.as_deref() {
            self.consume_beta_token(&input.email, token).await?;
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: input.email,
            username: input.username,
            display_name: input.display_name,
            hashed_password: hash_password(&input.password)?,
            avatar_url: input.avatar_emoji,
            role: Role::User,
            is_active: true,
            cpu: self.config.default_user_cpu,
            disk: self.config.default_user_disk,
            wallpaper: Some(self.config.default_user_wallpaper.clone()),
            created_at: now,
            updated_at: now,
        };

        self.users.insert(&user).await.map_err(|err| match err {
            StoreError::Conflict(_) => {
                CoreError::Conflict("This email is already registered".to_string())
            }
            other => other.into(),
        })?;

        Ok(RegisterResponse {
            avatar_url: with_full_url(&self.config, user.avatar_url.as_deref()),
            username: user.username,
            display_name: user.display_name,
            wallpaper: user.wallpaper,
        })
    }

    async fn consume_beta_token(&self, email: &str, token: &str) -> Result<(), CoreError> {
        let normalized = email.trim().to_lowercase();
        let request = self
            .beta
            .find_by_email(&normalized)
            .await?
            .ok_or_else(|| {
                CoreError::Forbidden("Beta access request not found for this email".to_string())
            })?;

        if request.token_hash != hash_beta_token(token) {
            return Err(CoreError::Forbidden(
                "Invalid beta access token".to_string(),
            ));
        }
        if request.token_used_at.is_some() {
            return Err(CoreError::Forbidden(
                "Beta access token already used".to_string(),
            ));
        }
        if request.token_expires_at < Utc::now() {
            return Err(CoreError::Forbidden("Beta access token expired".to_string()));
        }

        self.beta.mark_used(request.id).await?;
        Ok(())
    }

    /// Login by username or email.
    pub async fn login(&self, data: LoginRequest) -> Result<TokenResponse, CoreError> {
        let user = match self.users.find_by_username(&data.username).await? {
            Some(user) => Some(user),
            None => self.users.find_by_email(&data.username).await?,
        };

        let Some(user) = user else {
            return Err(CoreError::Unauthorized(
                "Invalid username or password".to_string(),
            ));
        };
        if !verify_password(&data.password, &user.hashed_password) {
            return Err(CoreError::Unauthorized(
                "Invalid username or password".to_string(),
            ));
        }
        if !user.is_active {
            return Err(CoreError::Forbidden("Account is inactive".to_string()));
        }

        let access_token = create_access_token(
            user.id,
            &self.config.secret_key,
            &self.config.algorithm,
            self.config.access_token_expire_minutes,
        )?;

        Ok(TokenResponse {
            access_token,
            token_type: "bearer",
        })
    }

    /// Bearer token → user record. Any decoding or lookup failure is a
    /// plain 401; the caller learns nothing about which step failed.
    pub async fn current_user(&self, token: &str) -> Result<User, CoreError> {
        let claims = decode_token(token, &self.config.secret_key, &self.config.algorithm)
            .ok_or_else(|| CoreError::Unauthorized("Invalid token".to_string()))?;
        let user_id = subject_user_id(&claims)
            .ok_or_else(|| CoreError::Unauthorized("Invalid token".to_string()))?;
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| CoreError::Unauthorized("User not found".to_string()))
    }

    pub fn user_response(&self, user: &User) -> UserResponse {
        UserResponse {
            id: user.id,
            email: user.email.clone(),
            username: user.username.clone(),
            display_name: user.display_name.clone(),
            avatar_url: with_full_url(&self.config, user.avatar_url.as_deref()),
            role: user.role,
            is_active: user.is_active,
            cpu: user.cpu,
            disk: user.disk,
            wallpaper: user.wallpaper.clone(),
            created_at: user.created_at,
        }
    }

    pub async fn username_info(&self, username: &str) -> Result<UsernameInfoResponse, CoreError> {
        let user = self
            .users
            .find_by_username(username)
            .await?
            .ok_or_else(|| CoreError::NotFound("User not found".to_string()))?;

        Ok(UsernameInfoResponse {
            avatar_url: with_full_url(&self.config, user.avatar_url.as_deref()),
            display_name: user.display_name,
            wallpaper: user.wallpaper,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_user(role: Role) -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            email: "a@x".to_string(),
            username: "a".to_string(),
            display_name: "A".to_string(),
            hashed_password: String::new(),
            avatar_url: None,
            role,
            is_active: true,
            cpu: 2,
            disk: 5120,
            wallpaper: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn email_shape() {
        assert!(email_regex().is_match("a@x"));
        assert!(email_regex().is_match("user@example.com"));
        assert!(!email_regex().is_match("not-an-email"));
        assert!(!email_regex().is_match("a b@x"));
        assert!(!email_regex().is_match("a@"));
    }

    #[test]
    fn admin_gate() {
        assert!(require_admin(&test_user(Role::Admin)).is_ok());
        assert!(matches!(
            require_admin(&test_user(Role::User)),
            Err(CoreError::Forbidden(_))
        ));
    }

    #[test]
    fn full_url_only_prefixes_paths() {
        let config = AppConfig::default();
        assert_eq!(
            with_full_url(&config, Some("/uploads/a.png")).unwrap(),
            format!("{}/uploads/a.png", config.app_url)
        );
        assert_eq!(
            with_full_url(&config, Some("https://cdn.example/a.png")).unwrap(),
            "https://cdn.example/a.png"
        );
        assert_eq!(with_full_url(&config, None), None);
    }
}
