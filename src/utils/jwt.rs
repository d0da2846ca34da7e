use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::AuthConfig,
    error::{AppError, Result},
};

pub const TOKEN_LIFETIME_HOURS: i64 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub jti: String,
    pub iss: String,
    pub aud: String,
    pub iat: usize,
    pub exp: usize,
}

/// Signing material derived once from the configured symmetric secret.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
}

impl JwtKeys {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
        }
    }

    pub fn generate_token(&self, subject: &str, email: &str) -> Result<String> {
        let now = chrono::Utc::now();
        let expiration = now
            .checked_add_signed(chrono::Duration::hours(TOKEN_LIFETIME_HOURS))
            .ok_or_else(|| AppError::InternalError("Failed to calculate expiration".to_string()))?;

        let claims = Claims {
            sub: subject.to_string(),
            email: email.to_string(),
            jti: Uuid::new_v4().to_string(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat: now.timestamp() as usize,
            exp: expiration.timestamp() as usize,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AppError::InternalError(format!("Token generation failed: {}", e)))
    }

    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);

        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| AppError::Unauthorized(format!("Invalid token: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    fn keys() -> JwtKeys {
        JwtKeys::new(&AppConfig::for_tests().auth)
    }

    #[test]
    fn token_round_trips_claims() {
        let keys = keys();
        let token = keys.generate_token("user-1", "admin@example.com").unwrap();
        let claims = keys.verify_token(&token).unwrap();

        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.email, "admin@example.com");
        assert_eq!(claims.iss, "contract-testing-api");
        assert_eq!(claims.aud, "contract-testing-app");
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn every_token_gets_a_fresh_jti() {
        let keys = keys();
        let first = keys.verify_token(&keys.generate_token("a", "a@b.c").unwrap()).unwrap();
        let second = keys.verify_token(&keys.generate_token("a", "a@b.c").unwrap()).unwrap();

        assert_ne!(first.jti, second.jti);
        assert!(Uuid::parse_str(&first.jti).is_ok());
    }

    #[test]
    fn tokens_from_another_secret_are_rejected() {
        let mut config = AppConfig::for_tests().auth;
        config.jwt_secret = "some-other-secret".to_string();
        let foreign = JwtKeys::new(&config).generate_token("a", "a@b.c").unwrap();

        assert!(matches!(
            keys().verify_token(&foreign),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn tokens_for_another_audience_are_rejected() {
        let mut config = AppConfig::for_tests().auth;
        config.audience = "someone-else".to_string();
        let token = JwtKeys::new(&config).generate_token("a", "a@b.c").unwrap();

        assert!(keys().verify_token(&token).is_err());
    }

    #[test]
    fn tokens_from_another_issuer_are_rejected() {
        let mut config = AppConfig::for_tests().auth;
        config.issuer = "someone-else".to_string();
        let token = JwtKeys::new(&config).generate_token("a", "a@b.c").unwrap();

        assert!(matches!(
            keys().verify_token(&token),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let keys = keys();
        let issued = chrono::Utc::now() - chrono::Duration::hours(2);
        let claims = Claims {
            sub: "a".to_string(),
            email: "a@b.c".to_string(),
            jti: Uuid::new_v4().to_string(),
            iss: keys.issuer.clone(),
            aud: keys.audience.clone(),
            iat: issued.timestamp() as usize,
            exp: (issued + chrono::Duration::hours(TOKEN_LIFETIME_HOURS)).timestamp() as usize,
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &keys.encoding).unwrap();

        assert!(matches!(
            keys.verify_token(&token),
            Err(AppError::Unauthorized(_))
        ));
    }
}
