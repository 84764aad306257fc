//! crates/ticketing_core/src/token.rs
//!
//! Issues and verifies the two signed, time-limited session tokens.
//!
//! Both tokens are HS256 JWTs carrying `{ id, iat, exp }`. The access and refresh
//! tokens are signed with independent secrets, so a token of one kind never
//! verifies as the other. Rotating either secret invalidates every outstanding
//! token of that kind; there is no grace period for old keys.

use chrono::Duration;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use crate::clock::Clock;

/// Lifetime of an access token.
pub const ACCESS_TOKEN_TTL: Duration = Duration::minutes(25);
/// Lifetime of a refresh token.
pub const REFRESH_TOKEN_TTL: Duration = Duration::days(14);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn ttl(&self) -> Duration {
        match self {
            TokenKind::Access => ACCESS_TOKEN_TTL,
            TokenKind::Refresh => REFRESH_TOKEN_TTL,
        }
    }
}

/// Why a presented token was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum InvalidToken {
    #[error("token is malformed")]
    Malformed,
    #[error("token signature does not match")]
    BadSignature,
    #[error("token has expired")]
    Expired,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("failed to sign token: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

/// The claims carried by both token kinds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub id: Uuid,
    pub iat: i64,
    pub exp: i64,
}

/// A freshly issued access/refresh pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// The two signing secrets, loaded once at startup.
#[derive(Clone)]
pub struct TokenSecrets {
    pub access: String,
    pub refresh: String,
}

impl fmt::Debug for TokenSecrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSecrets")
            .field("access", &"<redacted>")
            .field("refresh", &"<redacted>")
            .finish()
    }
}

struct SigningKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl SigningKeys {
    fn from_secret(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

/// Signs and verifies session tokens against an injected clock.
pub struct TokenService {
    access: SigningKeys,
    refresh: SigningKeys,
    clock: Arc<dyn Clock>,
    validation: Validation,
}

impl fmt::Debug for TokenService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenService").finish_non_exhaustive()
    }
}

impl TokenService {
    pub fn new(secrets: TokenSecrets, clock: Arc<dyn Clock>) -> Self {
        // Expiry is checked against `clock`, not the system time jsonwebtoken would use.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            access: SigningKeys::from_secret(&secrets.access),
            refresh: SigningKeys::from_secret(&secrets.refresh),
            clock,
            validation,
        }
    }

    fn keys(&self, kind: TokenKind) -> &SigningKeys {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    /// Signs `{ id: principal }` with the secret and lifetime of `kind`.
    pub fn issue(&self, principal: Uuid, kind: TokenKind) -> Result<String, TokenError> {
        let now = self.clock.now();
        let claims = Claims {
            id: principal,
            iat: now.timestamp(),
            exp: (now + kind.ttl()).timestamp(),
        };
        let token = jsonwebtoken::encode(&Header::default(), &claims, &self.keys(kind).encoding)?;
        Ok(token)
    }

    pub fn issue_access_token(&self, principal: Uuid) -> Result<String, TokenError> {
        self.issue(principal, TokenKind::Access)
    }

    pub fn issue_refresh_token(&self, principal: Uuid) -> Result<String, TokenError> {
        self.issue(principal, TokenKind::Refresh)
    }

    pub fn issue_pair(&self, principal: Uuid) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access_token: self.issue_access_token(principal)?,
            refresh_token: self.issue_refresh_token(principal)?,
        })
    }

    /// Resolves a token of `kind` to its principal id.
    pub fn verify(&self, token: &str, kind: TokenKind) -> Result<Uuid, InvalidToken> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.keys(kind).decoding, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => InvalidToken::BadSignature,
                ErrorKind::ExpiredSignature => InvalidToken::Expired,
                _ => InvalidToken::Malformed,
            })?;

        if self.clock.now().timestamp() >= data.claims.exp {
            return Err(InvalidToken::Expired);
        }
        Ok(data.claims.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::{TimeZone, Utc};

    fn service() -> (TokenService, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap(),
        ));
        let secrets = TokenSecrets {
            access: "access-secret".to_string(),
            refresh: "refresh-secret".to_string(),
        };
        (TokenService::new(secrets, clock.clone()), clock)
    }

    #[test]
    fn access_token_resolves_to_its_principal() {
        let (tokens, _) = service();
        let principal = Uuid::new_v4();
        let token = tokens.issue_access_token(principal).unwrap();
        assert_eq!(tokens.verify(&token, TokenKind::Access), Ok(principal));
    }

    #[test]
    fn access_token_expires_after_25_minutes() {
        let (tokens, clock) = service();
        let token = tokens.issue_access_token(Uuid::new_v4()).unwrap();

        clock.advance(Duration::minutes(24) + Duration::seconds(59));
        assert!(tokens.verify(&token, TokenKind::Access).is_ok());

        clock.advance(Duration::seconds(1));
        assert_eq!(tokens.verify(&token, TokenKind::Access), Err(InvalidToken::Expired));
    }

    #[test]
    fn refresh_token_lives_for_two_weeks() {
        let (tokens, clock) = service();
        let principal = Uuid::new_v4();
        let token = tokens.issue_refresh_token(principal).unwrap();

        clock.advance(Duration::days(13));
        assert_eq!(tokens.verify(&token, TokenKind::Refresh), Ok(principal));

        clock.advance(Duration::days(1));
        assert_eq!(tokens.verify(&token, TokenKind::Refresh), Err(InvalidToken::Expired));
    }

    #[test]
    fn token_kinds_do_not_cross_verify() {
        let (tokens, _) = service();
        let pair = tokens.issue_pair(Uuid::new_v4()).unwrap();
        assert_eq!(
            tokens.verify(&pair.access_token, TokenKind::Refresh),
            Err(InvalidToken::BadSignature)
        );
        assert_eq!(
            tokens.verify(&pair.refresh_token, TokenKind::Access),
            Err(InvalidToken::BadSignature)
        );
    }

    #[test]
    fn garbage_is_malformed() {
        let (tokens, _) = service();
        assert_eq!(tokens.verify("", TokenKind::Access), Err(InvalidToken::Malformed));
        assert_eq!(
            tokens.verify("not.a.jwt", TokenKind::Access),
            Err(InvalidToken::Malformed)
        );
    }

    #[test]
    fn rotated_secret_rejects_old_tokens() {
        let (tokens, clock) = service();
        let token = tokens.issue_access_token(Uuid::new_v4()).unwrap();

        let rotated = TokenService::new(
            TokenSecrets {
                access: "rotated".to_string(),
                refresh: "refresh-secret".to_string(),
            },
            clock,
        );
        assert_eq!(
            rotated.verify(&token, TokenKind::Access),
            Err(InvalidToken::BadSignature)
        );
    }
}
