// server/src/cli/handlers.rs

// Implementations of the `medcor` subcommands.
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use lib::billing::ManualGateway;
use lib::config::AppConfig;
use lib::logging::init_logging;
use lib::notifications::LogTransport;
use lib::seed::{seed_demo, SeedOptions};
use lib::{create_storage, Actor, Platform, StorageEngine};
use models::medical::{NewUser, UserRole};
use rest_api::AppState;
use security::RolesConfig;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use crate::cli::commands::{CreateAdminArgs, SeedArgs};

const MAIL_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = AppConfig::load(path).context("Failed to load configuration")?;
    init_logging(&config.logging);
    if config.uses_dev_secret() {
        warn!("auth.jwt_secret is the built-in development secret; set MEDCOR_AUTH__JWT_SECRET");
    }
    Ok(config)
}

fn open_platform(config: AppConfig) -> Result<(Platform, JoinHandle<()>)> {
    let storage = create_storage(&config.storage).context("Failed to open storage")?;
    Ok(Platform::new(config, storage, Arc::new(LogTransport), Arc::new(ManualGateway)))
}

fn load_roles(config: &AppConfig) -> Result<RolesConfig> {
    match &config.auth.roles_file {
        Some(path) => RolesConfig::from_yaml_file(path),
        None => RolesConfig::bundled(),
    }
}

/// Waits for queued mail, then flushes storage. The mail worker only exits
/// after every service holding a `Mailer` is gone.
async fn drain(storage: Arc<dyn StorageEngine>, mail_worker: JoinHandle<()>) -> Result<()> {
    if tokio::time::timeout(MAIL_DRAIN_TIMEOUT, mail_worker).await.is_err() {
        warn!("mail queue did not drain within {:?}", MAIL_DRAIN_TIMEOUT);
    }
    storage.flush().await?;
    Ok(())
}

async fn close_platform(platform: Platform, mail_worker: JoinHandle<()>) -> Result<()> {
    let storage = platform.storage.clone();
    drop(platform);
    drain(storage, mail_worker).await
}

async fn resolve_addr(host: &str, port: u16) -> Result<SocketAddr> {
    tokio::net::lookup_host((host, port))
        .await
        .with_context(|| format!("Failed to resolve {}:{}", host, port))?
        .next()
        .ok_or_else(|| anyhow!("{}:{} resolved to no address", host, port))
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl-C, shutting down"),
        Err(e) => warn!("Failed to listen for Ctrl-C: {}", e),
    }
}

pub async fn handle_serve(config_path: Option<&Path>, port: Option<u16>) -> Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(port) = port {
        config.server.port = port;
    }
    let addr = resolve_addr(&config.server.host, config.server.port).await?;
    let roles = load_roles(&config)?;
    let (platform, mail_worker) = open_platform(config)?;
    let sweep = platform.spawn_billing_sweep();
    let storage = platform.storage.clone();

    let served = rest_api::start_server(AppState::new(platform, roles), addr, shutdown_signal()).await;

    sweep.abort();
    drain(storage, mail_worker).await?;
    served
}

pub async fn handle_seed(config_path: Option<&Path>, args: SeedArgs) -> Result<()> {
    let config = load_config(config_path)?;
    let (platform, mail_worker) = open_platform(config)?;
    let options = SeedOptions {
        admin_username: args.admin_username,
        admin_email: args.admin_email,
        admin_password: args.admin_password,
    };
    let summary = seed_demo(&platform, &options).await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    close_platform(platform, mail_worker).await
}

pub async fn handle_create_admin(config_path: Option<&Path>, args: CreateAdminArgs) -> Result<()> {
    let config = load_config(config_path)?;
    let (platform, mail_worker) = open_platform(config)?;
    if platform.users.find_by_username(&args.username).await?.is_some() {
        close_platform(platform, mail_worker).await?;
        return Err(anyhow!("username '{}' is already taken", args.username));
    }

    let mut new_user = NewUser {
        first: "Administrator".into(),
        last: args.username.clone(),
        username: args.username,
        email: args.email,
        password: args.password,
        phone: None,
        role: UserRole::Admin,
        tenant_id: None,
    };
    let created = match args.tenant {
        None => platform.users.bootstrap_admin(new_user).await,
        Some(key) => {
            let hospital = platform.tenants.resolve(&key).await?;
            new_user.tenant_id = Some(hospital.id);
            // The command line acts with platform rights.
            let operator = Actor::new(Uuid::nil(), UserRole::Admin, None);
            platform.users.register(Some(&operator), new_user).await
        }
    };
    match created {
        Ok(user) => {
            let scope = user.tenant_id.map_or_else(|| "the platform".to_string(), |id| format!("hospital {}", id));
            println!("Created administrator '{}' ({}) for {}", user.username, user.id, scope);
            close_platform(platform, mail_worker).await
        }
        Err(e) => {
            close_platform(platform, mail_worker).await?;
            Err(e.into())
        }
    }
}

pub fn handle_check_config(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    load_roles(&config).context("Roles configuration is invalid")?;
    println!("{:#?}", config);
    println!("Configuration is valid.");
    Ok(())
}
