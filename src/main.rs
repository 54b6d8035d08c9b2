use clap::{Parser, Subcommand};
use colored::Colorize;
use eyre::{Context, Result};
use std::path::PathBuf;
use taskbot::{Config, DEFAULT_PAGE_SIZE, Dispatcher, TaskStore};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "taskbot")]
#[command(about = "taskbot - per-user to-do lists backed by SQLite")]
#[command(version = env!("GIT_DESCRIBE"))]
struct Cli {
    /// Path to a YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Path to the SQLite database (overrides the config file)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database and schema if missing
    Init,

    /// Add a task
    Add {
        #[arg(short, long)]
        user: i64,
        #[arg(required = true)]
        description: Vec<String>,
    },

    /// List tasks
    List {
        #[arg(short, long)]
        user: i64,
        #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
        limit: u32,
        #[arg(long, default_value_t = 0)]
        offset: u32,
        /// Print tasks as JSON
        #[arg(long)]
        json: bool,
    },

    /// Mark a task as done
    Done {
        #[arg(short, long)]
        user: i64,
        id: i64,
    },

    /// Mark a task as pending again
    Undo {
        #[arg(short, long)]
        user: i64,
        id: i64,
    },

    /// Delete a task
    Delete {
        #[arg(short, long)]
        user: i64,
        id: i64,
    },

    /// Read chat commands from stdin and print the bot's replies
    Chat {
        #[arg(short, long)]
        user: i64,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "taskbot=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup tracing
    init_tracing(cli.verbose);

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(db) = cli.db {
        config.db_path = db;
    }

    let store = TaskStore::open(&config.db_path)
        .await
        .with_context(|| format!("Failed to open task store at {}", config.db_path.display()))?;

    match cli.command {
        Commands::Init => {
            println!("{} {}", "Initialized".green(), store.db_path().display());
        }
        Commands::Add { user, description } => {
            let task = store.add_task(user, &description.join(" ")).await?;
            println!("{} {}", "Added".green(), task);
        }
        Commands::List {
            user,
            limit,
            offset,
            json,
        } => {
            let tasks = store.get_tasks(user, limit, offset).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&tasks)?);
            } else if tasks.is_empty() {
                println!("{}", "No tasks".dimmed());
            } else {
                for task in tasks {
                    if task.done {
                        println!("{}", task.to_string().dimmed());
                    } else {
                        println!("{}", task);
                    }
                }
            }
        }
        Commands::Done { user, id } => report(id, "marked as done", store.update_status(user, id, true).await?),
        Commands::Undo { user, id } => report(id, "marked as pending", store.update_status(user, id, false).await?),
        Commands::Delete { user, id } => report(id, "deleted", store.delete_task(user, id).await?),
        Commands::Chat { user } => chat(Dispatcher::new(store, &config), user).await?,
    }

    Ok(())
}

fn report(id: i64, action: &str, found: bool) {
    if found {
        println!("{} Task {} {}", "OK".green(), id, action);
    } else {
        println!("{} Task {} not found", "Error:".red(), id);
    }
}

async fn chat(dispatcher: Dispatcher, user: i64) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        if let Some(reply) = dispatcher.handle(user, &line).await {
            println!("{}", reply);
        }
    }

    Ok(())
}
