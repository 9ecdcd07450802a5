//! Bearer-token identity.
//!
//! Tokens are HS256 JWTs minted by the platform's identity service; this
//! crate only verifies them. `issue` exists for the seed tool and tests.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::AuthConfig,
    domain::Beneficiary,
    error::{AppError, Result},
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Role {
    Customer,
    Seller,
    DeliveryPartner,
    Admin,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub role: Role,
    pub iss: String,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    /// The wallet this caller owns, if their role has one.
    pub fn beneficiary(&self) -> Option<Beneficiary> {
        match self.role {
            Role::Seller => Some(Beneficiary::seller(self.sub)),
            Role::DeliveryPartner => Some(Beneficiary::delivery_partner(self.sub)),
            Role::Customer | Role::Admin => None,
        }
    }
}

#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
}

impl TokenService {
    pub fn new(config: &AuthConfig) -> Self {
        let secret = config.token_secret.expose_secret().as_bytes();
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            issuer: config.token_issuer.clone(),
        }
    }

    pub fn issue(&self, subject: Uuid, role: Role, ttl: Duration) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: subject,
            role,
            iss: self.issuer.clone(),
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Failed to encode token: {}", e)))
    }

    pub fn verify(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.issuer.as_str()]);

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!("Rejected bearer token: {}", e);
                AppError::Unauthorized
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::Secret;

    fn service(secret: &str) -> TokenService {
        TokenService::new(&AuthConfig {
            token_secret: Secret::new(secret.to_string()),
            token_issuer: "bazaar".to_string(),
        })
    }

    #[test]
    fn test_issue_then_verify() {
        let tokens = service("secret");
        let seller = Uuid::new_v4();
        let token = tokens.issue(seller, Role::Seller, Duration::hours(1)).unwrap();

        let claims = tokens.verify(&token).unwrap();
        assert_eq!(claims.sub, seller);
        assert_eq!(claims.beneficiary(), Some(Beneficiary::seller(seller)));
    }

    #[test]
    fn test_wrong_secret_and_expired_rejected() {
        let token = service("secret").issue(Uuid::new_v4(), Role::Admin, Duration::hours(1)).unwrap();
        assert!(matches!(service("other").verify(&token), Err(AppError::Unauthorized)));

        let expired = service("secret").issue(Uuid::new_v4(), Role::Admin, Duration::hours(-2)).unwrap();
        assert!(matches!(service("secret").verify(&expired), Err(AppError::Unauthorized)));
    }
}
