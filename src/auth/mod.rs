pub mod middleware;

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AppError, Result};

/// Subset of the claims carried by a Supabase access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // auth user id
    pub email: Option<String>,
    pub role: Option<String>, // "authenticated", "service_role", ...
    pub exp: usize, // Expiration time
}

impl Claims {
    pub fn user_id(&self) -> Result<Uuid> {
        Uuid::parse_str(&self.sub).map_err(|_| AppError::AuthError("Invalid user ID in token".to_string()))
    }
}

pub struct AuthService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl AuthService {
    pub fn new(jwt_secret: String) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Supabase sets aud = "authenticated"; the signature and expiry are what matter here
        validation.validate_aud = false;

        Self {
            encoding_key: EncodingKey::from_secret(jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(jwt_secret.as_bytes()),
            validation,
        }
    }

    pub fn generate_token(&self, user_id: Uuid, email: Option<&str>, ttl: chrono::Duration) -> Result<String> {
        let claims = Claims {
            sub: user_id.to_string(),
            email: email.map(str::to_string),
            role: Some("authenticated".to_string()),
            exp: (Utc::now() + ttl).timestamp().max(0) as usize,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::InternalError(format!("Failed to sign token: {}", e)))
    }

    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| AppError::AuthError(format!("Invalid token: {}", e)))
    }
}
