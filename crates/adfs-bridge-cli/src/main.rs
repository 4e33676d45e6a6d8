//! CLI entry point for adfs-bridge.
//!
//! This binary provides the `adfs-bridge` command with subcommands for
//! serving the sign-in routes, inspecting configuration, rotating tokens and
//! decoding access tokens.

mod cli;
mod helpers;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::info;
use url::Url;

use adfs_bridge_auth::{AdfsClient, LogoutSettings, logout_destination};
use adfs_bridge_web::{AppState, WebConfig, WebServer};

use crate::cli::{Cli, Commands};
use crate::helpers::{init_tracing, load_config, load_dotenv, mask, yes_no};

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let dotenv = load_dotenv();
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            bind,
            port,
            secure_cookies,
            trust_proxy,
        } => {
            init_tracing("info");
            if let Some(path) = dotenv {
                info!(path = %path.display(), "loaded .env");
            }
            cmd_serve(WebConfig {
                bind_addr: bind,
                port,
                secure_cookies,
                trust_proxy,
            })
            .await
        }
        Commands::Status => {
            init_tracing("warn");
            cmd_status()
        }
        Commands::Rotate {
            access_token,
            refresh_token,
            endpoint,
        } => {
            init_tracing("warn");
            cmd_rotate(&access_token, &refresh_token, endpoint.as_deref()).await
        }
        Commands::Decode { token, claim } => {
            init_tracing("warn");
            cmd_decode(&token, claim.as_deref())
        }
    }
}

// ---------------------------------------------------------------------------
// Subcommand: serve
// ---------------------------------------------------------------------------

async fn cmd_serve(web: WebConfig) -> Result<()> {
    let adfs = load_config()?;
    if !adfs.is_enabled() {
        tracing::warn!("ADFS_CLIENT_ID, ADFS_CLIENT_SECRET and ADFS_URI are not all set; sign-in is disabled");
    }

    let state = AppState::in_memory(web, adfs).context("failed to assemble application state")?;
    let server = WebServer::new(state);

    info!(addr = %server.addr(), "adfs-bridge listening");
    server
        .start()
        .await
        .map_err(|e| anyhow::anyhow!(e))
        .context("web server failed")
}

// ---------------------------------------------------------------------------
// Subcommand: status
// ---------------------------------------------------------------------------

fn cmd_status() -> Result<()> {
    let config = load_config()?;

    println!();
    println!("  adfs-bridge Status");
    println!("  ==================");
    println!();
    println!("  Enabled:          {}", yes_no(config.is_enabled()));
    println!(
        "  Client id:        {}",
        config.client_id.as_deref().map(mask).unwrap_or_else(|| "NOT SET".into())
    );
    println!(
        "  Client secret:    {}",
        if config.client_secret.is_some() { "SET" } else { "NOT SET" }
    );
    println!(
        "  Provider:         {}",
        config
            .base_url
            .as_ref()
            .map(Url::to_string)
            .unwrap_or_else(|| "NOT SET".into())
    );
    println!("  Display name:     {}", config.display_name);
    println!("  Username claim:   {}", config.username_claim);
    println!("  Scopes:           {}", config.scope_param());
    println!("  Resource:         {}", config.resource);
    println!("  Auto redirect:    {}", yes_no(!config.disable_redirect));
    println!("  Callback URL:     {}", config.callback_url()?);
    println!(
        "  Logout target:    {}",
        logout_destination(&LogoutSettings::from(&config))
    );
    println!();

    Ok(())
}

// ---------------------------------------------------------------------------
// Subcommand: rotate
// ---------------------------------------------------------------------------

async fn cmd_rotate(access_token: &str, refresh_token: &str, endpoint: Option<&str>) -> Result<()> {
    let config = load_config()?;
    if !config.is_enabled() {
        bail!("ADFS is not configured: set ADFS_CLIENT_ID, ADFS_CLIENT_SECRET and ADFS_URI");
    }
    let client = AdfsClient::from_config(&config)?;

    let tokens = match endpoint {
        Some(raw) => {
            let endpoint = Url::parse(raw).with_context(|| format!("invalid endpoint: {raw}"))?;
            client.rotate_token_at(access_token, refresh_token, &endpoint).await
        }
        None => client.rotate_token(access_token, refresh_token).await,
    }
    .context("token rotation failed")?;

    println!("{}", serde_json::to_string_pretty(&tokens)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// Subcommand: decode
// ---------------------------------------------------------------------------

fn cmd_decode(token: &str, claim: Option<&str>) -> Result<()> {
    let profile = adfs_bridge_auth::decode_payload(token).context("could not decode token")?;

    match claim {
        Some(path) => match adfs_bridge_auth::resolve_claim(&profile, path) {
            Some(value) => println!("{value}"),
            None => bail!("claim `{path}` is not present"),
        },
        None => println!("{}", serde_json::to_string_pretty(&profile)?),
    }
    Ok(())
}
