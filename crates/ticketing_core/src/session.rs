//! crates/ticketing_core/src/session.rs
//!
//! The session-renewal state machine.
//!
//! A request presents up to two tokens. Resolution is a short pipeline:
//! try the access token, then try the refresh token, then give up. A request
//! that gets through on the refresh token is issued a brand-new pair, refresh
//! token included, so the two-week window slides forward on every renewal.
//! Consequently a leaked refresh token keeps working for as long as it is used
//! at least once every two weeks.

use tracing::debug;
use uuid::Uuid;

use crate::token::{InvalidToken, TokenError, TokenKind, TokenPair, TokenService};

/// The raw credentials presented with a request. Empty strings count as absent.
#[derive(Debug, Clone, Copy, Default)]
pub struct PresentedTokens<'a> {
    pub access: Option<&'a str>,
    pub refresh: Option<&'a str>,
}

impl<'a> PresentedTokens<'a> {
    pub fn new(access: Option<&'a str>, refresh: Option<&'a str>) -> Self {
        Self {
            access: access.filter(|t| !t.is_empty()),
            refresh: refresh.filter(|t| !t.is_empty()),
        }
    }
}

/// The outcome of a successful resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedSession {
    /// The access token was valid; nothing needs to be reissued.
    Current(Uuid),
    /// The refresh token was used; both tokens must be sent back to the client.
    Renewed { principal: Uuid, tokens: TokenPair },
}

impl ResolvedSession {
    pub fn principal(&self) -> Uuid {
        match self {
            ResolvedSession::Current(principal) => *principal,
            ResolvedSession::Renewed { principal, .. } => *principal,
        }
    }

    pub fn renewed_tokens(&self) -> Option<&TokenPair> {
        match self {
            ResolvedSession::Current(_) => None,
            ResolvedSession::Renewed { tokens, .. } => Some(tokens),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("no valid credential was presented")]
    Unauthenticated,
    #[error(transparent)]
    Token(#[from] TokenError),
}

fn check(
    tokens: &TokenService,
    presented: Option<&str>,
    kind: TokenKind,
) -> Result<Uuid, Option<InvalidToken>> {
    let token = presented.ok_or(None)?;
    tokens.verify(token, kind).map_err(Some)
}

impl TokenService {
    /// Resolves the presented tokens to a principal, renewing the pair when only
    /// the refresh token is usable.
    pub fn resolve_session(
        &self,
        presented: PresentedTokens<'_>,
    ) -> Result<ResolvedSession, SessionError> {
        let access_failure = match check(self, presented.access, TokenKind::Access) {
            Ok(principal) => return Ok(ResolvedSession::Current(principal)),
            Err(reason) => reason,
        };

        match check(self, presented.refresh, TokenKind::Refresh) {
            Ok(principal) => {
                debug!(%principal, access = ?access_failure, "renewing session from refresh token");
                let tokens = self.issue_pair(principal)?;
                Ok(ResolvedSession::Renewed { principal, tokens })
            }
            Err(refresh_failure) => {
                debug!(access = ?access_failure, refresh = ?refresh_failure, "rejecting session");
                Err(SessionError::Unauthenticated)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::token::TokenSecrets;
    use chrono::{Duration, TimeZone, Utc};
    use std::sync::Arc;

    fn service() -> (TokenService, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 5, 10, 18, 0, 0).unwrap(),
        ));
        let secrets = TokenSecrets {
            access: "a-secret".to_string(),
            refresh: "r-secret".to_string(),
        };
        (TokenService::new(secrets, clock.clone()), clock)
    }

    #[test]
    fn valid_access_token_proceeds_without_reissue() {
        let (tokens, _) = service();
        let principal = Uuid::new_v4();
        let pair = tokens.issue_pair(principal).unwrap();

        let resolved = tokens
            .resolve_session(PresentedTokens::new(
                Some(&pair.access_token),
                Some(&pair.refresh_token),
            ))
            .unwrap();
        assert_eq!(resolved, ResolvedSession::Current(principal));
        assert!(resolved.renewed_tokens().is_none());
    }

    #[test]
    fn valid_access_token_alone_is_enough() {
        let (tokens, _) = service();
        let principal = Uuid::new_v4();
        let access = tokens.issue_access_token(principal).unwrap();

        let resolved = tokens
            .resolve_session(PresentedTokens::new(Some(&access), None))
            .unwrap();
        assert_eq!(resolved.principal(), principal);
    }

    #[test]
    fn expired_access_with_valid_refresh_renews_both_tokens() {
        let (tokens, clock) = service();
        let principal = Uuid::new_v4();
        let pair = tokens.issue_pair(principal).unwrap();

        clock.advance(Duration::minutes(30));
        let resolved = tokens
            .resolve_session(PresentedTokens::new(
                Some(&pair.access_token),
                Some(&pair.refresh_token),
            ))
            .unwrap();

        let renewed = resolved.renewed_tokens().cloned().unwrap();
        assert_eq!(resolved.principal(), principal);
        assert_ne!(renewed.access_token, pair.access_token);
        assert_ne!(renewed.refresh_token, pair.refresh_token);
        assert_eq!(tokens.verify(&renewed.access_token, TokenKind::Access), Ok(principal));
        assert_eq!(tokens.verify(&renewed.refresh_token, TokenKind::Refresh), Ok(principal));
    }

    #[test]
    fn absent_access_with_valid_refresh_renews() {
        let (tokens, _) = service();
        let principal = Uuid::new_v4();
        let refresh = tokens.issue_refresh_token(principal).unwrap();

        let resolved = tokens
            .resolve_session(PresentedTokens::new(None, Some(&refresh)))
            .unwrap();
        assert!(matches!(resolved, ResolvedSession::Renewed { principal: p, .. } if p == principal));
    }

    #[test]
    fn empty_and_malformed_cookies_count_as_absent() {
        let (tokens, _) = service();
        let principal = Uuid::new_v4();
        let refresh = tokens.issue_refresh_token(principal).unwrap();

        let resolved = tokens
            .resolve_session(PresentedTokens::new(Some(""), Some(&refresh)))
            .unwrap();
        assert_eq!(resolved.principal(), principal);

        let resolved = tokens
            .resolve_session(PresentedTokens::new(Some("garbage"), Some(&refresh)))
            .unwrap();
        assert_eq!(resolved.principal(), principal);
    }

    #[test]
    fn nothing_presented_is_unauthenticated() {
        let (tokens, _) = service();
        let result = tokens.resolve_session(PresentedTokens::default());
        assert!(matches!(result, Err(SessionError::Unauthenticated)));

        let result = tokens.resolve_session(PresentedTokens::new(Some(""), Some("")));
        assert!(matches!(result, Err(SessionError::Unauthenticated)));
    }

    #[test]
    fn both_invalid_is_unauthenticated() {
        let (tokens, clock) = service();
        let pair = tokens.issue_pair(Uuid::new_v4()).unwrap();
        clock.advance(Duration::days(15));

        let result = tokens.resolve_session(PresentedTokens::new(
            Some(&pair.access_token),
            Some(&pair.refresh_token),
        ));
        assert!(matches!(result, Err(SessionError::Unauthenticated)));
    }

    #[test]
    fn refresh_token_in_access_slot_is_not_accepted_as_access() {
        let (tokens, _) = service();
        let pair = tokens.issue_pair(Uuid::new_v4()).unwrap();

        let result = tokens.resolve_session(PresentedTokens::new(Some(&pair.refresh_token), None));
        assert!(matches!(result, Err(SessionError::Unauthenticated)));
    }

    #[test]
    fn renewal_slides_the_refresh_window_indefinitely() {
        // A refresh token used every 13 days never lapses: each renewal
        // issues a refresh token with a fresh 14-day lifetime.
        let (tokens, clock) = service();
        let principal = Uuid::new_v4();
        let mut refresh = tokens.issue_refresh_token(principal).unwrap();

        for _ in 0..6 {
            clock.advance(Duration::days(13));
            let resolved = tokens
                .resolve_session(PresentedTokens::new(None, Some(&refresh)))
                .unwrap();
            refresh = resolved.renewed_tokens().unwrap().refresh_token.clone();
        }
        assert_eq!(tokens.verify(&refresh, TokenKind::Refresh), Ok(principal));
    }
}
