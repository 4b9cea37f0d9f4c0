//! Quire blog server.
//!
//! `quire serve` runs the HTTP server; `quire user create` adds an account
//! from the command line.

use std::net::SocketAddr;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use quire_kernel::models::{CreateUser, User};
use quire_kernel::session::{PgSessionStore, session_layer};
use quire_kernel::validation::validate_account;
use quire_kernel::{AppState, Config, db, routes};

#[derive(Debug, Parser)]
#[command(name = "quire", version, about = "A small blog engine")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP server (the default).
    Serve,

    /// Manage user accounts.
    #[command(subcommand)]
    User(UserCommand),
}

#[derive(Debug, Subcommand)]
enum UserCommand {
    /// Create a user account.
    Create(CreateUserArgs),
}

#[derive(Debug, Args)]
struct CreateUserArgs {
    #[arg(long)]
    email: String,

    #[arg(long)]
    first_name: String,

    #[arg(long)]
    last_name: String,

    #[arg(long)]
    password: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    init_tracing();

    let cli = Cli::parse();
    let config = Config::from_env().context("failed to load configuration")?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::User(UserCommand::Create(args)) => create_user(&config, args).await,
    }
}

async fn serve(config: Config) -> Result<()> {
    info!(port = config.port, "Starting Quire");

    let state = AppState::new(&config)
        .await
        .context("failed to initialize application state")?;

    let store = PgSessionStore::new(state.db().clone());
    store.clone().spawn_cleanup();

    // Middleware layers (last added = first executed in request flow):
    // TraceLayer → compression → session → routes
    let app = routes::build_router(state)
        .layer(session_layer(store, &config))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("failed to bind to address")?;

    info!(%addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}

async fn create_user(config: &Config, args: CreateUserArgs) -> Result<()> {
    let errors = validate_account(
        &args.first_name,
        &args.last_name,
        &args.email,
        Some(&args.password),
    );
    if !errors.is_empty() {
        let messages: Vec<String> = errors
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        bail!("invalid user: {}", messages.join("; "));
    }

    let pool = db::create_pool(config).await?;
    db::run_migrations(&pool).await?;

    if User::count_by_email(&pool, &args.email, None).await? > 0 {
        bail!("a user with email {} already exists", args.email.trim());
    }

    let user = User::create(
        &pool,
        CreateUser {
            first_name: args.first_name,
            last_name: args.last_name,
            email: args.email.trim().to_lowercase(),
            password: args.password,
        },
    )
    .await?;

    info!(user_id = %user.id, email = %user.email, "user created");
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug,sqlx=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
