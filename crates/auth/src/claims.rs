use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use chapterhub_core::{CityId, StateId, UserId};

/// Session claims model (transport-agnostic).
///
/// This is the minimal set of claims expected once a session token has been
/// decoded/verified by whatever identity provider is in use. `role` is kept as
/// the raw string so that unknown roles can be rejected here rather than
/// silently mapped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject / user identifier.
    pub sub: UserId,

    /// Global role name, e.g. `"CITY_DIRECTOR"`.
    pub role: String,

    pub state_id: Option<StateId>,
    pub city_id: Option<CityId>,

    /// Issued-at timestamp.
    pub issued_at: DateTime<Utc>,

    /// Expiration timestamp.
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("session has expired")]
    Expired,

    #[error("session not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid session time window (expires_at <= issued_at)")]
    InvalidTimeWindow,
}

/// Deterministically validate session claims.
///
/// Note: this validates the *claims* only. Signature verification / decoding is
/// intentionally outside this crate.
pub fn validate_claims(
    claims: &SessionClaims,
    now: DateTime<Utc>,
) -> Result<(), TokenValidationError> {
    if claims.expires_at <= claims.issued_at {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    if now < claims.issued_at {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= claims.expires_at {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn claims(issued_at: DateTime<Utc>, ttl: Duration) -> SessionClaims {
        SessionClaims {
            sub: UserId::new(),
            role: "USER".to_string(),
            state_id: None,
            city_id: None,
            issued_at,
            expires_at: issued_at + ttl,
        }
    }

    #[test]
    fn window_edges() {
        let t = Utc::now();
        let c = claims(t, Duration::hours(1));
        assert_eq!(validate_claims(&c, t), Ok(()));
        assert_eq!(
            validate_claims(&c, t - Duration::seconds(1)),
            Err(TokenValidationError::NotYetValid)
        );
        assert_eq!(
            validate_claims(&c, t + Duration::hours(1)),
            Err(TokenValidationError::Expired)
        );
        assert_eq!(
            validate_claims(&claims(t, Duration::zero()), t),
            Err(TokenValidationError::InvalidTimeWindow)
        );
    }
}
