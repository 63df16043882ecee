use crate::{
    api::{self, AppState},
    auth::{AuthConfig, KeySource, PasswordHasher},
    cli::{commands::bootstrap, telemetry},
    store::Stores,
};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: Option<String>,
    pub auth: AuthConfig,
    pub admin: Option<bootstrap::Options>,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the signing key, the store or the bootstrap admin cannot be set up,
/// or if the server fails.
pub async fn execute(args: Args) -> Result<()> {
    let codec = args
        .auth
        .build_codec()
        .context("Failed to build the token signing key")?;
    if codec.source() == KeySource::Generated {
        warn!("Issued tokens are only valid for this process");
    }

    let stores = match &args.dsn {
        Some(dsn) => Stores::postgres(dsn).await?,
        None => {
            warn!("No DSN configured, using the in-memory store; data is lost on restart");
            Stores::memory()
        }
    };

    let hasher = PasswordHasher::new().context("Failed to initialize password hasher")?;
    let state = Arc::new(AppState::new(stores, hasher, Arc::new(codec)));

    if let Some(admin) = &args.admin {
        let identity = state
            .authenticator
            .bootstrap_admin(&admin.username, &admin.email, &admin.password)
            .await
            .context("Failed to bootstrap the administrator account")?;
        info!(user_id = %identity.id, username = %identity.username, "administrator ready");
    }

    let result = api::new(args.port, state).await;
    telemetry::shutdown_tracer();
    result
}
