use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use campdesk::config::{ServerConfig, default_roles, load_roles};
use campdesk::policy::AccessPolicy;
use campdesk::server::{AppState, create_router};
use campdesk::store::{SqliteStore, Store};

#[derive(Parser)]
#[command(name = "campdesk")]
#[command(about = "Roster and curriculum service for camp programs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Administrative commands
    Admin {
        #[command(subcommand)]
        command: AdminCommands,
    },

    /// Start the server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(long, short, default_value = "8080")]
        port: u16,

        /// Data directory holding the database
        #[arg(long, default_value = "./data")]
        data_dir: String,

        /// Seconds a camp directory snapshot is served before reloading
        #[arg(long, default_value = "60")]
        camp_cache_ttl_secs: u64,
    },
}

#[derive(Subcommand)]
enum AdminCommands {
    /// Initialize the database and seed role permissions
    Init {
        /// Data directory holding the database
        #[arg(long, default_value = "./data")]
        data_dir: String,

        /// TOML file mapping each role to its permitted endpoints
        #[arg(long)]
        permissions: Option<PathBuf>,
    },

    /// List the seeded roles and their endpoints
    Roles {
        /// Data directory holding the database
        #[arg(long, default_value = "./data")]
        data_dir: String,
    },
}

fn open_store(data_dir: &str) -> anyhow::Result<SqliteStore> {
    let config = ServerConfig {
        data_dir: data_dir.into(),
        ..ServerConfig::default()
    };
    let db_path = config.db_path();
    if !db_path.exists() {
        bail!("Server not initialized. Run 'campdesk admin init' first to create the database.");
    }
    Ok(SqliteStore::new(&db_path)?)
}

fn run_init(data_dir: String, permissions: Option<PathBuf>) -> anyhow::Result<()> {
    let config = ServerConfig {
        data_dir: data_dir.into(),
        ..ServerConfig::default()
    };
    fs::create_dir_all(&config.data_dir)?;

    let roles = match &permissions {
        Some(path) => load_roles(path)?,
        None => default_roles(),
    };

    let db_path = config.db_path();
    let store = SqliteStore::new(&db_path)?;
    store.initialize()?;

    if !store.list_roles()?.is_empty() {
        bail!("Server already initialized. Database exists at: {}", db_path.display());
    }

    store.seed_roles(&roles)?;

    println!();
    println!("Initialized database at {}", db_path.display());
    for role in &roles {
        let endpoints: Vec<&str> = role.permissible_endpoints.keys().map(String::as_str).collect();
        println!("  {}: {}", role.name, endpoints.join(", "));
    }
    println!();
    println!("The first user to sign in receives every built-in role.");
    println!();

    Ok(())
}

fn run_roles(data_dir: String) -> anyhow::Result<()> {
    let store = open_store(&data_dir)?;
    for role in store.list_roles()? {
        println!("{}", role.name);
        for (path, title) in &role.permissible_endpoints {
            println!("  {path}  {title}");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("campdesk=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Admin { command } => match command {
            AdminCommands::Init {
                data_dir,
                permissions,
            } => {
                run_init(data_dir, permissions)?;
            }
            AdminCommands::Roles { data_dir } => {
                run_roles(data_dir)?;
            }
        },
        Commands::Serve {
            host,
            port,
            data_dir,
            camp_cache_ttl_secs,
        } => {
            let config = ServerConfig {
                host,
                port,
                data_dir: data_dir.into(),
                camp_cache_ttl: Duration::from_secs(camp_cache_ttl_secs),
            };

            if !config.db_path().exists() {
                bail!("Server not initialized. Run 'campdesk admin init' first to create the database.");
            }

            let store = SqliteStore::new(config.db_path())?;
            store.initialize()?;

            let policy = AccessPolicy::load(&store)?;
            if policy.is_empty() {
                bail!("No role permissions found. Run 'campdesk admin init' first to seed them.");
            }

            let state = Arc::new(AppState::new(Arc::new(store), policy, config.camp_cache_ttl));

            let app = create_router(state);
            let addr = config.socket_addr()?;

            info!("Starting server on {}", addr);

            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}
