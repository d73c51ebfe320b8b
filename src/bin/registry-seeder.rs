//! Registry Seeder CLI
//!
//! Provisions test users on an npm registry and (re)publishes fixture packages

use anyhow::{Context, Result};
use clap::Parser;
use registry_seeder::{
    ConfigLoadOptions, ConfigLoader, DEFAULT_PASSWORD, DEFAULT_REGISTRY_ADDR, INVALID_TOKEN,
    NpmCli, NpmrcInstaller, RegistryClient, RegistrySeeder, SafeCommandExecutor, SeedError,
    SeedOptions,
    security::current_account,
};
use std::collections::HashMap;
use std::path::PathBuf;
use std::process;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Provision registry test users and fixture packages
#[derive(Parser, Debug)]
#[command(name = "registry-seeder")]
#[command(version)]
#[command(about = "Provision registry test users and fixture packages", long_about = None)]
struct Cli {
    /// Registry base URL
    #[arg(long, env = "NPM_REGISTRY_ADDR", default_value = DEFAULT_REGISTRY_ADDR)]
    registry_addr: String,

    /// Password for fixture users without an explicit one
    #[arg(long, env = "NPM_DEFAULT_PASSWORD", default_value = DEFAULT_PASSWORD)]
    #[arg(hide_env_values = true)]
    default_password: String,

    /// Token held for user-1 of the built-in fixtures
    #[arg(long = "user-1-token", env = "USER_1_NPM_TOKEN", default_value = INVALID_TOKEN)]
    #[arg(hide_env_values = true)]
    user_1_token: String,

    /// Token held for user-2 of the built-in fixtures
    #[arg(long = "user-2-token", env = "USER_2_NPM_TOKEN", default_value = INVALID_TOKEN)]
    #[arg(hide_env_values = true)]
    user_2_token: String,

    /// Credentials file copied into the executing account's home
    #[arg(long, env = "NPMRC_SOURCE", default_value = ".npmrc")]
    npmrc_source: PathBuf,

    /// Where to install the credentials file (defaults to ~/.npmrc of the executing account)
    #[arg(long, env = "NPMRC_TARGET")]
    npmrc_target: Option<PathBuf>,

    /// Directory holding one sub-directory per fixture package
    #[arg(long, env = "PACKAGE_DIR", default_value = "package")]
    package_dir: PathBuf,

    /// npm executable
    #[arg(long, env = "NPM_BIN", default_value = "npm")]
    npm_bin: String,

    /// YAML fixture file replacing the built-in users and packages
    #[arg(long, env = "SEED_FIXTURES")]
    fixtures: Option<PathBuf>,

    /// Seconds to wait for the registry before the first request
    #[arg(long, env = "STARTUP_DELAY_SECS", default_value = "6")]
    startup_delay_secs: u64,

    /// HTTP request timeout in seconds (transport default when unset)
    #[arg(long, env = "HTTP_TIMEOUT_SECS")]
    http_timeout_secs: Option<u64>,

    /// Fail when npm exits non-zero even if its error stream is clean
    #[arg(long, env = "STRICT_EXIT_CODE")]
    strict_exit_code: bool,

    /// Exit after DONE instead of idling
    #[arg(long, env = "NO_KEEP_ALIVE")]
    no_keep_alive: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("registry_seeder=debug,info")),
        )
        .init();

    let cli = Cli::parse();
    let keep_alive = !cli.no_keep_alive;

    match run(cli).await {
        Ok(()) => {
            if keep_alive {
                // Keeps the container alive for the test suite
                std::future::pending::<()>().await;
            }
        }
        Err(e) => {
            error!("ERR {:#}", e);
            if let Some(seed_error) = e.downcast_ref::<SeedError>() {
                for action in seed_error.suggested_actions() {
                    warn!("  - {}", action);
                }
            }
            process::exit(1);
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut env: HashMap<String, String> = std::env::vars_os()
        .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
        .collect();
    env.insert("USER_1_NPM_TOKEN".to_string(), cli.user_1_token.clone());
    env.insert("USER_2_NPM_TOKEN".to_string(), cli.user_2_token.clone());

    let mut config = ConfigLoader::load(ConfigLoadOptions {
        registry_addr: cli.registry_addr.clone(),
        default_password: cli.default_password.clone(),
        fixtures_path: cli.fixtures.clone(),
        env,
        http_timeout: cli.http_timeout_secs.map(Duration::from_secs),
    })
    .await?;
    info!(registry = %config.registry_url, "seeding registry");

    let installer = match cli.npmrc_target {
        Some(path) => NpmrcInstaller::new(&cli.npmrc_source, path),
        None => NpmrcInstaller::for_account(&cli.npmrc_source, &current_account()?),
    };
    debug!(
        source = %installer.source().display(),
        destination = %installer.destination().display(),
        "credentials"
    );

    let client = RegistryClient::new(config.registry_url.clone(), config.http_timeout)?;
    let working_dir = std::env::current_dir().context("cannot read working directory")?;
    let executor = SafeCommandExecutor::new(&working_dir)?;
    let npm = NpmCli::new(executor, cli.npm_bin, cli.package_dir)
        .with_strict_exit_code(cli.strict_exit_code);

    let seeder = RegistrySeeder::new(
        &client,
        &npm,
        SeedOptions {
            startup_delay: Duration::from_secs(cli.startup_delay_secs),
        },
    )
    .with_credentials(installer);

    let report = seeder.run(&mut config.fixtures).await?;
    debug!(
        report = %serde_json::to_string(&report).unwrap_or_default(),
        "run report"
    );
    info!(published = ?report.published(), "fixtures ready");

    Ok(())
}
