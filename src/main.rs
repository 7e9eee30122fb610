use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use statline::config::Config;
use statline::server::{ApiServer, AppState};
use statline::social::SocialPoster;
use statline::store::StatStore;

#[derive(Parser)]
#[command(name = "statline")]
#[command(about = "Personal gaming stats tracker with a live overlay dashboard")]
#[command(version)]
struct Cli {
    /// Path to the working directory (defaults to current directory)
    #[arg(short, long, global = true)]
    path: Option<PathBuf>,

    /// Path to the config file (defaults to .statline/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API server
    Serve,

    /// Initialize a .statline/config.toml with generated secrets
    Init {
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },

    /// Manually trigger a social post for the current live selection
    Post,

    /// Ping a running server
    Health,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    let work_dir = cli.path.unwrap_or_else(|| PathBuf::from("."));
    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_dir(&work_dir)?,
    };

    match cli.command {
        Some(Commands::Init { force }) => init_command(&work_dir, force),
        Some(Commands::Post) => post_command(&config),
        Some(Commands::Health) => health_command(&config),
        Some(Commands::Serve) | None => serve_command(config),
    }
}

fn serve_command(config: Config) -> Result<()> {
    let store = StatStore::with_pool(&config.database_path(), config.database.pool_size)?;
    let addr = format!("{}:{}", config.server.bind, config.server.port);
    let state = AppState::new(config, store);

    let server = ApiServer::bind(&addr, state)?;
    println!("statline listening on {addr}");
    server.run();
    Ok(())
}

fn init_command(work_dir: &std::path::Path, force: bool) -> Result<()> {
    let config_dir = work_dir.join(".statline");
    let config_path = config_dir.join("config.toml");

    if config_path.exists() && !force {
        anyhow::bail!(
            "Config already exists at {} (use --force to overwrite)",
            config_path.display()
        );
    }

    std::fs::create_dir_all(&config_dir)
        .with_context(|| format!("Failed to create {}", config_dir.display()))?;

    let config = Config::with_generated_secrets();
    let content = toml::to_string_pretty(&config).context("Failed to serialize config")?;
    std::fs::write(&config_path, content)
        .with_context(|| format!("Failed to write {}", config_path.display()))?;

    println!("Wrote {}", config_path.display());
    println!("Secrets were generated; set [social].webhook_key to enable posting.");
    Ok(())
}

/// Run the social pipeline once for the current live selection.
fn post_command(config: &Config) -> Result<()> {
    let store = StatStore::with_pool(&config.database_path(), config.database.pool_size)?;
    let queries = store.query();

    let state = queries.dashboard_state()?;
    let Some((player_id, game_id)) = state.selection() else {
        anyhow::bail!("No live game/player selected");
    };

    let player_name = queries
        .player_name(player_id)?
        .context("Player not found")?;
    let (game_name, game_installment) = queries
        .game_identity(game_id)?
        .context("Game not found")?;
    let game = statline::store::GameIdentity {
        game_name,
        game_installment,
        ..Default::default()
    };

    let poster = SocialPoster::new(config.social.clone());
    let outcome = poster.post_session_update(
        &queries,
        player_id,
        game_id,
        &player_name,
        &game,
        false,
        chrono::Utc::now(),
    )?;

    match outcome {
        statline::social::PostOutcome::Posted { image_url } => {
            println!("Posted: {image_url}");
        }
        statline::social::PostOutcome::Skipped(reason) => {
            println!("Skipped: {reason}");
        }
    }
    Ok(())
}

fn health_command(config: &Config) -> Result<()> {
    let url = format!("http://127.0.0.1:{}/health", config.server.port);
    let response = ureq::get(&url)
        .call()
        .with_context(|| format!("Failed to reach {url}"))?;
    println!("{} {}", response.status(), response.into_string()?);
    Ok(())
}
