mod config;
mod mercury;
mod settleup;
mod show;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{CommandFactory as _, Parser, Subcommand};
use mercury_settleup::SyncMode;

use crate::config::{Config, Credentials};
use crate::mercury::MercuryClient;
use crate::settleup::SettleUpClient;

#[derive(Parser)]
#[command(
    name = "mercury-settleup",
    about = "Mirror Mercury bank transactions into Settle Up groups"
)]
#[command(disable_help_subcommand = true)]
struct Args {
    /// Config file path. Defaults to mercury-settleup.toml in the current directory.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Use the Mercury and Settle Up sandboxes
    #[arg(long)]
    sandbox: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync every configuration and delete stale transactions (default)
    Sync,
    /// Show what a sync would change without writing anything
    Plan,
}

pub async fn run(args: impl IntoIterator<Item = String>) -> Result<ExitCode> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "mercury_settleup=info,mercury_settleup_cli=info".into());
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    clap_complete::CompleteEnv::with_factory(Args::command).complete();

    let args = Args::parse_from(args);
    let mode = match args.command.unwrap_or(Commands::Sync) {
        Commands::Sync => SyncMode::Apply,
        Commands::Plan => SyncMode::DryRun,
    };

    let config = match &args.config {
        Some(path) => Config::load_from_file(path)?,
        None => Config::find_and_load()?
            .context("No config file found, pass --config or create mercury-settleup.toml")?,
    };
    let sandbox = args.sandbox || config.sandbox || std::env::var_os("SANDBOX").is_some();
    if sandbox {
        tracing::info!("using sandbox environments");
    }

    let credentials = Credentials::from_env(mercury::TOKENS_PAGE)?;
    let database_url = if sandbox {
        settleup::SANDBOX_DATABASE_URL
    } else {
        settleup::LIVE_DATABASE_URL
    };
    let ledger = SettleUpClient::sign_in(
        settleup::IDENTITY_URL,
        database_url,
        &credentials.settleup_api_key,
        &credentials.settleup_email,
        &credentials.settleup_password,
    )
    .await
    .context("Failed to sign in to Settle Up")?;
    let feed = MercuryClient::new(credentials.mercury_token, sandbox)?;

    let report =
        mercury_settleup::sync_all(&feed, &ledger, &config.sync, chrono::Utc::now(), mode).await;
    show::show_report(&report, mode);

    if report.succeeded() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
