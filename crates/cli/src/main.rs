use std::path::Path;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use scribe_core::ProjectStatus;
use server::config::{StudioConfig, CONFIG_FILE, DEFAULT_DB_NAME, STUDIO_DIR};
use server::{create_router, state::AppState};
use sqlx::SqlitePool;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "scribe-studio")]
#[command(about = "Content workflow studio: plan, research, write and edit articles", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Overrides the port from config.toml
    #[arg(short, long)]
    port: Option<u16>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create .scribe-studio with a default config and database
    Init,
    /// Start the API server
    Serve {
        #[arg(short, long)]
        port: Option<u16>,

        #[arg(long)]
        host: Option<String>,
    },
    /// Show the projects of this studio
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Init) => init_studio().await,
        Some(Commands::Serve { port, host }) => serve(port, host).await,
        Some(Commands::Status) => status().await,
        None => serve(cli.port, None).await,
    }
}

async fn open_database(db_path: &Path) -> Result<SqlitePool> {
    let database_url = format!("sqlite:{}", db_path.display());
    let pool = db::create_pool(&database_url)
        .await
        .context("Failed to create database pool")?;
    db::run_migrations(&pool)
        .await
        .context("Failed to run migrations")?;
    Ok(pool)
}

async fn init_studio() -> Result<()> {
    let cwd = std::env::current_dir()?;
    let studio_dir = StudioConfig::studio_dir(&cwd);

    if studio_dir.exists() {
        println!("Studio already initialized at {}", studio_dir.display());
        return Ok(());
    }

    println!("Initializing Scribe Studio in {}", cwd.display());

    let mut config = StudioConfig::default();
    if let Some(name) = cwd.file_name().and_then(|n| n.to_str()) {
        config.project.name = name.to_string();
    }
    config
        .write(&cwd)
        .await
        .context("Failed to write config")?;

    open_database(&StudioConfig::database_path(&cwd)).await?;

    println!();
    println!("Initialized Scribe Studio for '{}'", config.project.name);
    println!();
    println!("Created:");
    println!("  {}/", STUDIO_DIR);
    println!("  ├── {}", CONFIG_FILE);
    println!("  └── {}", DEFAULT_DB_NAME);
    println!();
    println!("Next steps:");
    println!("  1. Run 'scribe-studio serve' to start the server");
    println!(
        "  2. Open http://localhost:{}/swagger-ui to explore the API",
        config.server.port
    );

    Ok(())
}

async fn serve(port: Option<u16>, host: Option<String>) -> Result<()> {
    init_tracing();

    let cwd = std::env::current_dir()?;
    let studio_dir = StudioConfig::studio_dir(&cwd);
    if !studio_dir.exists() {
        println!("No {} directory found.", STUDIO_DIR);
        println!("Run 'scribe-studio init' first, or using default configuration.");
        println!();
        tokio::fs::create_dir_all(&studio_dir).await?;
    }

    let mut config = StudioConfig::read(&cwd).await;
    if let Some(port) = port {
        config.server.port = port;
    }
    if let Some(host) = host {
        config.server.host = host;
    }

    let db_path = StudioConfig::database_path(&cwd);
    tracing::info!(path = %db_path.display(), "Opening database");
    let pool = open_database(&db_path).await?;

    let state = AppState::new(pool, &config);
    let app = create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    println!();
    println!("Scribe Studio - {}", config.project.name);
    println!("════════════════════════════════════════");
    println!();
    println!("  API Server:  http://{}", addr);
    println!("  Swagger UI:  http://{}/swagger-ui", addr);
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    tracing::info!(
        addr = %addr,
        max_attempts = config.executor.max_attempts,
        stage_timeout_ms = config.executor.stage_timeout_ms,
        "Server listening"
    );
    axum::serve(listener, app).await?;

    Ok(())
}

async fn status() -> Result<()> {
    let cwd = std::env::current_dir()?;
    let studio_dir = StudioConfig::studio_dir(&cwd);

    if !studio_dir.exists() {
        println!("Not a Scribe Studio directory.");
        println!("Run 'scribe-studio init' to initialize.");
        return Ok(());
    }

    let config = StudioConfig::read(&cwd).await;
    let db_path = StudioConfig::database_path(&cwd);

    if !db_path.exists() {
        println!("Studio: {} (database not initialized)", config.project.name);
        return Ok(());
    }

    let pool = open_database(&db_path).await?;
    let projects = db::ProjectRepository::new(pool);
    let total = projects.count().await?;
    let recent = projects.find_page(50, 0).await?;

    println!();
    println!("Studio: {}", config.project.name);
    println!("Path:   {}", cwd.display());
    println!();

    if recent.is_empty() {
        println!("No projects yet.");
    } else {
        println!("Projects ({}):", total);
        for project in &recent {
            let status_icon = match project.status {
                ProjectStatus::Created => "○",
                ProjectStatus::TitlesGenerated | ProjectStatus::TitleSelected => "◔",
                ProjectStatus::PlanGenerated | ProjectStatus::PlanApproved => "◑",
                ProjectStatus::Researching | ProjectStatus::Writing | ProjectStatus::Editing => "◕",
                ProjectStatus::DraftReady | ProjectStatus::Published => "●",
                ProjectStatus::Failed => "✗",
            };
            println!("  {} [{}] {}", status_icon, project.status, project.topic);
        }
    }

    println!();

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "scribe_studio=info,server=info,orchestrator=info,tower_http=info".into()
            }),
        )
        .init();
}
