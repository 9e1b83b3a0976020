//! Short-lived signed session tokens (HS256 JWT).
//!
//! Tokens are `base64url(header).base64url(claims).base64url(hmac)`. `iat` and `exp`
//! are `NumericDate` values with millisecond fractions so sub-second lifetimes
//! round-trip exactly.

use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::{sync::Arc, time::Duration};

use super::{AuthError, Clock, Identity};

type HmacSha256 = Hmac<Sha256>;

pub const DEFAULT_LIFETIME: Duration = Duration::from_secs(60 * 60);
pub const MAX_LIFETIME: Duration = Duration::from_secs(60 * 60);
pub const ISSUER: &str = "chirpy-access";

const ALG: &str = "HS256";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct TokenHeader {
    alg: String,
    typ: String,
}

impl TokenHeader {
    fn hs256() -> Self {
        Self {
            alg: ALG.to_string(),
            typ: "JWT".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionClaims {
    pub iss: String,
    pub sub: String,
    #[serde(with = "numeric_date")]
    pub iat: DateTime<Utc>,
    #[serde(with = "numeric_date")]
    pub exp: DateTime<Utc>,
}

mod numeric_date {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    #[allow(clippy::cast_precision_loss)]
    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.timestamp_millis() as f64 / 1000.0)
    }

    #[allow(clippy::cast_possible_truncation)]
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let seconds = f64::deserialize(deserializer)?;
        if !seconds.is_finite() {
            return Err(D::Error::custom("NumericDate must be finite"));
        }
        DateTime::from_timestamp_millis((seconds * 1000.0).round() as i64)
            .ok_or_else(|| D::Error::custom("NumericDate out of range"))
    }
}

/// Pick the lifetime for a new token.
///
/// Requests outside `(0, max]` fall back to `default` rather than being capped.
#[must_use]
pub fn clamp_lifetime(requested: Option<Duration>, default: Duration, max: Duration) -> Duration {
    match requested {
        Some(lifetime) if !lifetime.is_zero() && lifetime <= max => lifetime,
        _ => default,
    }
}

fn b64e_json<T: Serialize>(value: &T) -> Result<String, AuthError> {
    let json = serde_json::to_vec(value).map_err(|_| AuthError::Signing)?;
    Ok(Base64UrlUnpadded::encode_string(&json))
}

fn b64d_json<T: for<'de> Deserialize<'de>>(s: &str) -> Result<T, AuthError> {
    let bytes = Base64UrlUnpadded::decode_vec(s).map_err(|_| AuthError::TokenFormat)?;
    serde_json::from_slice(&bytes).map_err(|_| AuthError::TokenFormat)
}

fn mac(secret: &[u8], signing_input: &str) -> Result<HmacSha256, AuthError> {
    let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| AuthError::Signing)?;
    mac.update(signing_input.as_bytes());
    Ok(mac)
}

/// Sign claims into a compact token.
///
/// # Errors
///
/// Returns [`AuthError::Signing`] if the claims cannot be encoded.
pub fn sign(claims: &SessionClaims, secret: &[u8]) -> Result<String, AuthError> {
    let header_b64 = b64e_json(&TokenHeader::hs256())?;
    let claims_b64 = b64e_json(claims)?;
    let signing_input = format!("{header_b64}.{claims_b64}");
    let signature = mac(secret, &signing_input)?.finalize().into_bytes();
    let signature_b64 = Base64UrlUnpadded::encode_string(&signature);
    Ok(format!("{signing_input}.{signature_b64}"))
}

/// Verify a token's signature and expiry, returning its claims.
///
/// # Errors
///
/// - [`AuthError::TokenFormat`] for anything that is not a well-formed token of ours,
/// - [`AuthError::InvalidSignature`] when the signature does not match `secret`,
/// - [`AuthError::Expired`] when `now` is at or past `exp`.
pub fn verify(token: &str, secret: &[u8], now: DateTime<Utc>) -> Result<SessionClaims, AuthError> {
    let mut parts = token.split('.');
    let header_b64 = parts.next().ok_or(AuthError::TokenFormat)?;
    let claims_b64 = parts.next().ok_or(AuthError::TokenFormat)?;
    let sig_b64 = parts.next().ok_or(AuthError::TokenFormat)?;
    if parts.next().is_some() {
        return Err(AuthError::TokenFormat);
    }

    let header: TokenHeader = b64d_json(header_b64)?;
    if header.alg != ALG {
        return Err(AuthError::TokenFormat);
    }

    let signature = Base64UrlUnpadded::decode_vec(sig_b64).map_err(|_| AuthError::TokenFormat)?;
    mac(secret, &format!("{header_b64}.{claims_b64}"))?
        .verify_slice(&signature)
        .map_err(|_| AuthError::InvalidSignature)?;

    let claims: SessionClaims = b64d_json(claims_b64)?;
    if claims.iss != ISSUER {
        return Err(AuthError::TokenFormat);
    }
    if now >= claims.exp {
        return Err(AuthError::Expired);
    }

    Ok(claims)
}

/// Issue a token for `identity` valid from `now`.
///
/// # Errors
///
/// Returns [`AuthError::Signing`] if the token cannot be encoded.
pub fn issue(
    identity: Identity,
    secret: &[u8],
    lifetime: Option<Duration>,
    now: DateTime<Utc>,
) -> Result<String, AuthError> {
    issue_clamped(
        identity,
        secret,
        clamp_lifetime(lifetime, DEFAULT_LIFETIME, MAX_LIFETIME),
        now,
    )
}

fn issue_clamped(
    identity: Identity,
    secret: &[u8],
    lifetime: Duration,
    now: DateTime<Utc>,
) -> Result<String, AuthError> {
    let lifetime = chrono::Duration::from_std(lifetime).map_err(|_| AuthError::Signing)?;
    let exp = now
        .checked_add_signed(lifetime)
        .and_then(ceil_to_millis)
        .ok_or(AuthError::Signing)?;
    let claims = SessionClaims {
        iss: ISSUER.to_string(),
        sub: identity.to_string(),
        iat: now,
        exp,
    };
    sign(&claims, secret)
}

/// `exp` is encoded in whole milliseconds; round up so a positive lifetime never
/// lands at or before `now`.
fn ceil_to_millis(value: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let millis = value.timestamp_millis();
    if value.timestamp_subsec_nanos() % 1_000_000 == 0 {
        Some(value)
    } else {
        DateTime::from_timestamp_millis(millis.checked_add(1)?)
    }
}

/// Validate a token and return the identity it was issued to.
///
/// # Errors
///
/// Same as [`verify`]; a `sub` that is not a user id is a format error.
pub fn validate(token: &str, secret: &[u8], now: DateTime<Utc>) -> Result<Identity, AuthError> {
    let claims = verify(token, secret, now)?;
    claims.sub.parse().map_err(|_| AuthError::TokenFormat)
}

/// Session token issuer/validator bound to the server secret and a clock.
#[derive(Clone, Debug)]
pub struct SessionTokens {
    secret: SecretString,
    default_lifetime: Duration,
    max_lifetime: Duration,
    clock: Arc<dyn Clock>,
}

impl SessionTokens {
    #[must_use]
    pub fn new(secret: SecretString, clock: Arc<dyn Clock>) -> Self {
        Self {
            secret,
            default_lifetime: DEFAULT_LIFETIME,
            max_lifetime: MAX_LIFETIME,
            clock,
        }
    }

    #[must_use]
    pub fn with_lifetimes(mut self, default: Duration, max: Duration) -> Self {
        self.default_lifetime = default;
        self.max_lifetime = max;
        self
    }

    #[must_use]
    pub fn lifetime_for(&self, requested: Option<Duration>) -> Duration {
        clamp_lifetime(requested, self.default_lifetime, self.max_lifetime)
    }

    /// # Errors
    ///
    /// Returns [`AuthError::Signing`] if the token cannot be encoded.
    pub fn issue(&self, identity: Identity, requested: Option<Duration>) -> Result<String, AuthError> {
        issue_clamped(
            identity,
            self.secret.expose_secret().as_bytes(),
            self.lifetime_for(requested),
            self.clock.now(),
        )
    }

    /// # Errors
    ///
    /// See [`verify`].
    pub fn validate(&self, token: &str) -> Result<Identity, AuthError> {
        validate(token, self.secret.expose_secret().as_bytes(), self.clock.now())
    }
}
