// Copyright (c) 2026 Aisu OS
// SPDX-License-Identifier: AGPL-3.0
//! Bearer token codec. The `sub` claim carries the user id string; nothing
//! else about the token format is relied on anywhere in the core.

use std::str::FromStr;

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::error::CoreError;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
}

fn parse_algorithm(name: &str) -> Algorithm {
    Algorithm::from_str(name).unwrap_or(Algorithm::HS256)
}

pub fn create_access_token(
    user_id: Uuid,
    secret: &str,
    algorithm: &str,
    ttl_minutes: i64,
) -> Result<String, CoreError> {
    let claims = Claims {
        sub: user_id.to_string(),
        exp: (Utc::now() + Duration::minutes(ttl_minutes)).timestamp(),
    };
    encode(
        &Header::new(parse_algorithm(algorithm)),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| CoreError::Internal(format!("Failed to sign token: {e}")))
}

/// Pure decode: `None` for anything invalid (bad signature, expired,
/// malformed). Callers translate that into 401 or a WS policy close.
pub fn decode_token(token: &str, secret: &str, algorithm: &str) -> Option<Claims> {
    let mut validation = Validation::new(parse_algorithm(algorithm));
    validation.leeway = 0;
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .ok()
    .map(|data| data.claims)
}

/// `sub` claim parsed as a user id.
pub fn subject_user_id(claims: &Claims) -> Option<Uuid> {
    Uuid::parse_str(&claims.sub).ok()
}
