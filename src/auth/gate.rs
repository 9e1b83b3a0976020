//! Authentication Gate.
//!
//! Flow Overview: a request runs through an ordered [`Pipeline`] of named
//! [`Stage`]s. The default pipeline extracts the `Bearer` credential, then
//! verifies it as a session token and records a [`VerifiedIdentity`]. The first
//! failing stage rejects the request with `401` before the protected handler runs.
//!
//! Security boundaries: [`VerifiedIdentity`] has no public constructor, and any
//! copy already present on an inbound request is stripped before the pipeline
//! runs, so handlers can trust it came from this gate. The gate is pure
//! cryptography; it never reads the store.

use axum::{
    Extension,
    extract::{FromRequestParts, Request},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::{fmt, sync::Arc};
use tracing::debug;

use super::{AuthError, Identity, SessionTokens, credentials::extract_bearer};

/// Identity attached to a request by the gate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VerifiedIdentity(Identity);

impl VerifiedIdentity {
    #[must_use]
    pub const fn identity(&self) -> Identity {
        self.0
    }
}

impl<S: Send + Sync> FromRequestParts<S> for VerifiedIdentity {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Self>()
            .copied()
            .ok_or(AuthError::MalformedCredential(
                "request did not pass the authentication gate",
            ))
    }
}

/// Raw bearer credential handed from extraction to verification.
#[derive(Clone)]
struct PresentedBearer(String);

/// One named step of the gate.
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    /// Inspect or augment the request head.
    ///
    /// # Errors
    ///
    /// Any error rejects the request and stops the pipeline.
    fn apply(&self, parts: &mut Parts) -> Result<(), AuthError>;
}

/// Pulls the `Bearer` token out of the `Authorization` header.
#[derive(Clone, Copy, Debug, Default)]
pub struct BearerExtraction;

impl Stage for BearerExtraction {
    fn name(&self) -> &'static str {
        "bearer_extraction"
    }

    fn apply(&self, parts: &mut Parts) -> Result<(), AuthError> {
        let token = extract_bearer(&parts.headers)?;
        parts.extensions.insert(PresentedBearer(token));
        Ok(())
    }
}

/// Verifies the extracted token as a session token.
#[derive(Clone, Debug)]
pub struct SessionVerification {
    sessions: SessionTokens,
}

impl SessionVerification {
    #[must_use]
    pub fn new(sessions: SessionTokens) -> Self {
        Self { sessions }
    }
}

impl Stage for SessionVerification {
    fn name(&self) -> &'static str {
        "session_verification"
    }

    fn apply(&self, parts: &mut Parts) -> Result<(), AuthError> {
        let PresentedBearer(token) = parts
            .extensions
            .remove::<PresentedBearer>()
            .ok_or(AuthError::MalformedCredential("no bearer credential extracted"))?;
        let identity = self.sessions.validate(&token)?;
        parts.extensions.insert(VerifiedIdentity(identity));
        Ok(())
    }
}

/// Ordered stages; stops at the first failure.
#[derive(Clone, Default)]
pub struct Pipeline {
    stages: Vec<Arc<dyn Stage>>,
}

impl Pipeline {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn stage(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    #[must_use]
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    /// # Errors
    ///
    /// The error of the first stage that fails.
    pub fn run(&self, parts: &mut Parts) -> Result<(), AuthError> {
        for stage in &self.stages {
            if let Err(err) = stage.apply(parts) {
                debug!(stage = stage.name(), "Request rejected: {err}");
                return Err(err);
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stage_names())
            .finish()
    }
}

/// A request that passed the gate, paired with the identity it proved.
#[derive(Debug)]
pub struct AuthenticatedRequest<B> {
    identity: Identity,
    request: axum::http::Request<B>,
}

impl<B> AuthenticatedRequest<B> {
    #[must_use]
    pub const fn identity(&self) -> Identity {
        self.identity
    }

    #[must_use]
    pub const fn request(&self) -> &axum::http::Request<B> {
        &self.request
    }

    #[must_use]
    pub fn into_request(self) -> axum::http::Request<B> {
        self.request
    }
}

#[derive(Clone, Debug)]
pub struct AuthGate {
    pipeline: Arc<Pipeline>,
}

impl AuthGate {
    /// Gate that requires a valid session token.
    #[must_use]
    pub fn new(sessions: SessionTokens) -> Self {
        Self::from_pipeline(
            Pipeline::new()
                .stage(BearerExtraction)
                .stage(SessionVerification::new(sessions)),
        )
    }

    #[must_use]
    pub fn from_pipeline(pipeline: Pipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }

    #[must_use]
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Run the pipeline and return the request with its verified identity.
    ///
    /// # Errors
    ///
    /// The first stage failure, or [`AuthError::MalformedCredential`] if the
    /// pipeline finished without establishing an identity.
    pub fn authenticate<B>(
        &self,
        request: axum::http::Request<B>,
    ) -> Result<AuthenticatedRequest<B>, AuthError> {
        let (mut parts, body) = request.into_parts();
        parts.extensions.remove::<VerifiedIdentity>();
        parts.extensions.remove::<PresentedBearer>();

        self.pipeline.run(&mut parts)?;

        let identity = parts
            .extensions
            .get::<VerifiedIdentity>()
            .map(VerifiedIdentity::identity)
            .ok_or(AuthError::MalformedCredential("identity not established"))?;

        Ok(AuthenticatedRequest {
            identity,
            request: axum::http::Request::from_parts(parts, body),
        })
    }
}

/// Axum middleware running the gate in front of protected routes.
///
/// Expects the [`AuthGate`] as a request extension; install it with
/// `middleware::from_fn(require_session)` under an `Extension(gate)` layer.
pub async fn require_session(
    Extension(gate): Extension<AuthGate>,
    request: Request,
    next: Next,
) -> Response {
    match gate.authenticate(request) {
        Ok(authenticated) => next.run(authenticated.into_request()).await,
        Err(err) => err.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::ManualClock;
    use anyhow::Result;
    use axum::http::{self, HeaderValue, StatusCode, header::AUTHORIZATION};
    use secrecy::SecretString;
    use std::sync::atomic::{AtomicBool, Ordering};
    use uuid::Uuid;

    fn sessions(clock: Arc<ManualClock>) -> SessionTokens {
        SessionTokens::new(SecretString::from("gate-secret".to_string()), clock)
    }

    fn request_with(authorization: Option<&str>) -> Result<http::Request<()>> {
        let mut builder = http::Request::builder().uri("/api/me");
        if let Some(value) = authorization {
            builder = builder.header(AUTHORIZATION, HeaderValue::from_str(value)?);
        }
        Ok(builder.body(())?)
    }

    #[test]
    fn default_pipeline_order() {
        let gate = AuthGate::new(sessions(Arc::new(ManualClock::starting_now())));
        assert_eq!(
            gate.pipeline().stage_names(),
            vec!["bearer_extraction", "session_verification"]
        );
    }

    #[test]
    fn valid_token_yields_identity() -> Result<()> {
        let tokens = sessions(Arc::new(ManualClock::starting_now()));
        let gate = AuthGate::new(tokens.clone());
        let identity = Identity::new(Uuid::new_v4());
        let token = tokens.issue(identity, None)?;

        let authenticated = gate.authenticate(request_with(Some(&format!("Bearer {token}")))?)?;
        assert_eq!(authenticated.identity(), identity);
        let attached = authenticated
            .request()
            .extensions()
            .get::<VerifiedIdentity>()
            .map(VerifiedIdentity::identity);
        assert_eq!(attached, Some(identity));
        Ok(())
    }

    #[test]
    fn missing_or_malformed_header_is_rejected() -> Result<()> {
        let gate = AuthGate::new(sessions(Arc::new(ManualClock::starting_now())));
        for header in [None, Some("token"), Some("Bearer  token"), Some("Basic abc")] {
            let result = gate.authenticate(request_with(header)?);
            assert!(matches!(result, Err(AuthError::MalformedCredential(_))));
        }
        Ok(())
    }

    #[test]
    fn forged_or_expired_tokens_are_rejected() -> Result<()> {
        let clock = Arc::new(ManualClock::starting_now());
        let gate = AuthGate::new(sessions(clock.clone()));
        let identity = Identity::new(Uuid::new_v4());

        let foreign = SessionTokens::new(SecretString::from("other-secret".to_string()), clock.clone())
            .issue(identity, None)?;
        let result = gate.authenticate(request_with(Some(&format!("Bearer {foreign}")))?);
        assert!(matches!(result, Err(AuthError::InvalidSignature)));

        let token = sessions(clock.clone()).issue(identity, Some(std::time::Duration::from_secs(5)))?;
        clock.advance(chrono::Duration::seconds(5));
        let result = gate.authenticate(request_with(Some(&format!("Bearer {token}")))?);
        assert!(matches!(result, Err(AuthError::Expired)));
        Ok(())
    }

    #[test]
    fn upstream_identity_is_discarded() -> Result<()> {
        let tokens = sessions(Arc::new(ManualClock::starting_now()));
        let gate = AuthGate::new(tokens.clone());
        let forged = Identity::new(Uuid::new_v4());

        let mut request = request_with(None)?;
        request.extensions_mut().insert(VerifiedIdentity(forged));
        assert!(gate.authenticate(request).is_err());

        let real = Identity::new(Uuid::new_v4());
        let token = tokens.issue(real, None)?;
        let mut request = request_with(Some(&format!("Bearer {token}")))?;
        request.extensions_mut().insert(VerifiedIdentity(forged));
        let authenticated = gate.authenticate(request)?;
        assert_eq!(authenticated.identity(), real);
        Ok(())
    }

    struct Recording(Arc<AtomicBool>);

    impl Stage for Recording {
        fn name(&self) -> &'static str {
            "recording"
        }

        fn apply(&self, _parts: &mut Parts) -> Result<(), AuthError> {
            self.0.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn pipeline_short_circuits_on_first_failure() -> Result<()> {
        let reached = Arc::new(AtomicBool::new(false));
        let gate = AuthGate::from_pipeline(
            Pipeline::new()
                .stage(BearerExtraction)
                .stage(Recording(reached.clone())),
        );
        assert!(gate.authenticate(request_with(None)?).is_err());
        assert!(!reached.load(Ordering::SeqCst));
        Ok(())
    }

    #[test]
    fn pipeline_without_verification_establishes_nothing() -> Result<()> {
        let gate = AuthGate::from_pipeline(Pipeline::new().stage(BearerExtraction));
        let result = gate.authenticate(request_with(Some("Bearer anything"))?);
        assert!(matches!(result, Err(AuthError::MalformedCredential(_))));
        Ok(())
    }

    #[tokio::test]
    async fn extractor_rejects_ungated_requests() -> Result<()> {
        let (mut parts, ()) = request_with(None)?.into_parts();
        let result = VerifiedIdentity::from_request_parts(&mut parts, &()).await;
        let status = result.err().map(|err| err.into_response().status());
        assert_eq!(status, Some(StatusCode::UNAUTHORIZED));
        Ok(())
    }
}
