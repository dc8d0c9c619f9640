use chrono::{Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use thiserror::Error;

use agora_types::api::Claims;

/// Why a token was rejected. Only ever logged; callers see one generic
/// "could not validate credentials" response whatever the variant.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("signature does not match")]
    Forged,
    #[error("token could not be decoded: {0}")]
    Malformed(String),
    #[error("token has expired")]
    Expired,
    #[error("token carries no subject")]
    MissingSubject,
    #[error("token could not be signed: {0}")]
    Encode(jsonwebtoken::errors::Error),
}

/// Issues and verifies stateless HS256 access tokens.
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl,
        }
    }

    pub fn issue(&self, user_id: i64) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = Claims {
            sub: Some(user_id),
            iat: now.timestamp() as usize,
            exp: (now + self.ttl).timestamp().max(0) as usize,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).map_err(TokenError::Encode)
    }

    pub fn verify(&self, token: &str) -> Result<i64, TokenError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => TokenError::Forged,
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Malformed(e.to_string()),
            }
        })?;

        data.claims.sub.ok_or(TokenError::MissingSubject)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> TokenService {
        TokenService::new("test-secret", Duration::minutes(30))
    }

    #[test]
    fn issued_token_verifies_to_same_user() {
        let svc = service();
        for id in [1, 42, i64::from(i32::MAX) + 7] {
            let token = svc.issue(id).unwrap();
            assert_eq!(svc.verify(&token).unwrap(), id);
        }
    }

    #[test]
    fn any_single_bit_flip_is_rejected() {
        let svc = service();
        let token = svc.issue(7).unwrap();

        for i in 0..token.len() {
            for bit in 0..7 {
                let mut bytes = token.clone().into_bytes();
                bytes[i] ^= 1 << bit;
                let Ok(mutated) = String::from_utf8(bytes) else {
                    continue;
                };
                assert!(
                    svc.verify(&mutated).is_err(),
                    "mutation at byte {i} bit {bit} was accepted"
                );
            }
        }
    }

    #[test]
    fn other_secret_is_forged() {
        let token = TokenService::new("someone-else", Duration::minutes(5))
            .issue(3)
            .unwrap();
        assert!(matches!(service().verify(&token), Err(TokenError::Forged)));
    }

    #[test]
    fn expired_token_is_rejected() {
        let svc = TokenService::new("test-secret", Duration::seconds(-30));
        let token = svc.issue(3).unwrap();
        assert!(matches!(svc.verify(&token), Err(TokenError::Expired)));
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(
            service().verify("not-a-token"),
            Err(TokenError::Malformed(_))
        ));
    }

    #[test]
    fn token_without_subject_is_rejected() {
        let now = Utc::now();
        let claims = Claims {
            sub: None,
            iat: now.timestamp() as usize,
            exp: (now + Duration::minutes(5)).timestamp() as usize,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();

        assert!(matches!(
            service().verify(&token),
            Err(TokenError::MissingSubject)
        ));
    }
}
