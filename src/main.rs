//! Storemap CLI - Command-line interface for the store directory

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use storemap::config::{self, StoremapConfig};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;

#[derive(Parser)]
#[command(name = "storemap")]
#[command(version)]
#[command(about = "Store directory - slugged catalog with search, geo, tag and rating queries")]
#[command(long_about = r#"
Storemap keeps a directory of stores in a local SQLite database, enabling:
  • Unique, human-readable slugs
  • Full-text search over names and descriptions
  • Nearby queries around a coordinate
  • Tag browsing and a top-rated leaderboard
  • Per-user favorites ("hearts")

Example usage:
  storemap init
  storemap add-store --name "Cafe Deluxe" --address "1 Strand" --lng -0.128 --lat 51.508 --author alice
  storemap search "espresso"
  storemap near --lat 51.508 --lng -0.128
  storemap serve --port 3000
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print machine-readable JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    /// Path to the config file (defaults to ./storemap.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Path to the database file (overrides the config)
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config and create the database
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },

    /// Add a store
    AddStore {
        #[arg(long)]
        name: String,

        #[arg(long)]
        address: String,

        /// Longitude in degrees
        #[arg(long, allow_negative_numbers = true)]
        lng: f64,

        /// Latitude in degrees
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,

        /// Id of the user creating the store
        #[arg(long)]
        author: String,

        #[arg(long)]
        description: Option<String>,

        /// Tag to attach (repeatable)
        #[arg(short, long = "tag")]
        tags: Vec<String>,

        /// Photo filename
        #[arg(long)]
        photo: Option<String>,
    },

    /// Update a store you own
    UpdateStore {
        /// Store id
        #[arg(long)]
        id: i64,

        /// Id of the user making the change
        #[arg(long)]
        user: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        description: Option<String>,

        /// Replace the tags (repeatable)
        #[arg(short, long = "tag")]
        tags: Option<Vec<String>>,

        #[arg(long, requires = "lng")]
        address: Option<String>,

        #[arg(long, allow_negative_numbers = true, requires = "lat")]
        lng: Option<f64>,

        #[arg(long, allow_negative_numbers = true, requires = "address")]
        lat: Option<f64>,

        #[arg(long)]
        photo: Option<String>,
    },

    /// Show a store and its reviews
    Show {
        /// Store slug
        slug: String,
    },

    /// List stores, newest first
    List {
        #[arg(short, long, default_value = "1")]
        page: u32,
    },

    /// Search stores by name and description
    Search {
        /// Search query
        query: String,

        /// Maximum number of results
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Find stores near a coordinate
    Near {
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,

        #[arg(long, allow_negative_numbers = true)]
        lng: f64,

        /// Maximum distance in meters
        #[arg(long)]
        max_distance: Option<f64>,

        /// Maximum number of results
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// List tags with their store counts, or the stores carrying one tag
    Tags {
        tag: Option<String>,
    },

    /// Show the top-rated stores
    Top {
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Toggle a store in a user's hearts
    Heart {
        #[arg(long)]
        user: String,

        /// Store id
        #[arg(long)]
        store: i64,
    },

    /// List a user's hearted stores
    Hearts {
        #[arg(long)]
        user: String,
    },

    /// Register or rename a user
    AddUser {
        #[arg(long)]
        id: String,

        #[arg(long)]
        name: String,

        #[arg(long)]
        email: Option<String>,
    },

    /// Record a review
    AddReview {
        /// Store id
        #[arg(long)]
        store: i64,

        #[arg(long)]
        user: String,

        /// Rating from 1 to 5
        #[arg(long)]
        rating: i64,

        #[arg(long)]
        text: String,
    },

    /// Import stores from a JSON array
    Import {
        /// Path to the JSON file
        file: PathBuf,
    },

    /// Show statistics about the catalog
    Stats,

    /// Serve the JSON API
    Serve {
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

impl OutputMode {
    pub fn is_human(self) -> bool {
        self == OutputMode::Human
    }
}

#[derive(Serialize)]
struct Envelope<'a, T: Serialize> {
    ok: bool,
    command: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Print a command's result as a JSON envelope
pub fn emit_success<T: Serialize>(output_mode: OutputMode, command: &str, data: T) -> anyhow::Result<()> {
    if output_mode == OutputMode::Json {
        let envelope = Envelope { ok: true, command, data: Some(data), error: None };
        println!("{}", serde_json::to_string_pretty(&envelope)?);
    }
    Ok(())
}

fn emit_failure(output_mode: OutputMode, command: &str, err: &anyhow::Error) {
    match output_mode {
        OutputMode::Human => storemap::ui::error(&format!("{:#}", err)),
        OutputMode::Json => {
            let envelope: Envelope<'_, ()> = Envelope {
                ok: false,
                command,
                data: None,
                error: Some(format!("{:#}", err)),
            };
            match serde_json::to_string_pretty(&envelope) {
                Ok(text) => println!("{}", text),
                Err(_) => eprintln!("{:#}", err),
            }
        }
    }
}

/// Resolved settings shared by every command
pub struct Context {
    pub output_mode: OutputMode,
    pub config: StoremapConfig,
    pub config_path: PathBuf,
    pub database_path: PathBuf,
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Init { .. } => "init",
            Commands::AddStore { .. } => "add-store",
            Commands::UpdateStore { .. } => "update-store",
            Commands::Show { .. } => "show",
            Commands::List { .. } => "list",
            Commands::Search { .. } => "search",
            Commands::Near { .. } => "near",
            Commands::Tags { .. } => "tags",
            Commands::Top { .. } => "top",
            Commands::Heart { .. } => "heart",
            Commands::Hearts { .. } => "hearts",
            Commands::AddUser { .. } => "add-user",
            Commands::AddReview { .. } => "add-review",
            Commands::Import { .. } => "import",
            Commands::Stats => "stats",
            Commands::Serve { .. } => "serve",
        }
    }
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging; logs go to stderr so --json output stays parseable
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let output_mode = if cli.json { OutputMode::Json } else { OutputMode::Human };
    let command_name = cli.command.name();

    if let Err(err) = run(cli, output_mode) {
        emit_failure(output_mode, command_name, &err);
        std::process::exit(1);
    }
}

fn run(cli: Cli, output_mode: OutputMode) -> anyhow::Result<()> {
    let config_path = cli.config.clone().unwrap_or_else(config::default_config_path);
    let config = config::load_config(Some(&config_path))?.unwrap_or_default();
    let database_path = cli.database.clone().unwrap_or_else(|| config.database_path());
    tracing::debug!("Using config {:?}, database {:?}", config_path, database_path);

    let ctx = Context {
        output_mode,
        config,
        config_path,
        database_path,
    };

    match cli.command {
        Commands::Init { force } => commands::run_init(&ctx, force),
        Commands::AddStore { name, address, lng, lat, author, description, tags, photo } => {
            commands::run_add_store(&ctx, commands::StoreArgs {
                name,
                address,
                lng,
                lat,
                author,
                description,
                tags,
                photo,
            })
        }
        Commands::UpdateStore { id, user, name, description, tags, address, lng, lat, photo } => {
            let location = match (address, lng, lat) {
                (Some(address), Some(lng), Some(lat)) => Some((address, lng, lat)),
                _ => None,
            };
            commands::run_update_store(&ctx, id, &user, commands::PatchArgs {
                name,
                description,
                tags,
                location,
                photo,
            })
        }
        Commands::Show { slug } => commands::run_show(&ctx, &slug),
        Commands::List { page } => commands::run_list(&ctx, page),
        Commands::Search { query, limit } => commands::run_search(&ctx, &query, limit),
        Commands::Near { lat, lng, max_distance, limit } => commands::run_near(&ctx, lat, lng, max_distance, limit),
        Commands::Tags { tag } => commands::run_tags(&ctx, tag.as_deref()),
        Commands::Top { limit } => commands::run_top(&ctx, limit),
        Commands::Heart { user, store } => commands::run_heart(&ctx, &user, store),
        Commands::Hearts { user } => commands::run_hearts(&ctx, &user),
        Commands::AddUser { id, name, email } => commands::run_add_user(&ctx, id, name, email),
        Commands::AddReview { store, user, rating, text } => commands::run_add_review(&ctx, store, user, rating, text),
        Commands::Import { file } => commands::run_import(&ctx, &file),
        Commands::Stats => commands::run_stats(&ctx),
        Commands::Serve { port } => commands::run_serve(ctx, port),
    }
}
