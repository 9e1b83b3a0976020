use crate::{
    api,
    auth::{AuthConfig, AuthState, Clock, SystemClock},
    store::{MemoryStore, PgStore},
};
use anyhow::{Context, Result};
use secrecy::SecretString;
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tracing::{info, warn};

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: Option<String>,
    pub auth_secret: SecretString,
    pub polka_key: Option<SecretString>,
    pub session_ttl_seconds: u64,
    pub refresh_token_ttl_seconds: u64,
    pub conceal_unknown_email: bool,
}

impl Args {
    fn auth_config(&self) -> AuthConfig {
        let config = AuthConfig::new(self.auth_secret.clone())
            .with_session_ttl(Duration::from_secs(self.session_ttl_seconds))
            .with_refresh_token_ttl(Duration::from_secs(self.refresh_token_ttl_seconds))
            .with_conceal_unknown_email(self.conceal_unknown_email);

        match &self.polka_key {
            Some(key) => config.with_polka_key(key.clone()),
            None => {
                warn!("No polka key configured, webhooks will be rejected");
                config
            }
        }
    }
}

/// Execute the server action.
/// # Errors
/// Returns an error if the database is unreachable or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let auth_config = args.auth_config();
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let state = match &args.dsn {
        Some(dsn) => {
            let pool = PgPoolOptions::new()
                .min_connections(1)
                .max_connections(5)
                .max_lifetime(Duration::from_secs(60 * 2))
                .test_before_acquire(true)
                .connect(dsn)
                .await
                .context("Failed to connect to database")?;
            info!("Using PostgreSQL store");
            AuthState::with_store(auth_config, Arc::new(PgStore::new(pool)), clock)
        }
        None => {
            warn!("No DSN configured, using in-memory store");
            AuthState::with_store(
                auth_config,
                Arc::new(MemoryStore::with_clock(clock.clone())),
                clock,
            )
        }
    };

    let result = api::new(args.port, Arc::new(state)).await;

    crate::cli::telemetry::shutdown_tracer();

    result
}
