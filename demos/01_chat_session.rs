//! Demo 01: Chat Session
//!
//! Feeds a scripted conversation through the command dispatcher, showing
//! compact id reuse and owner-scoped commands.
//!
//! Run with: cargo run --example 01_chat_session

use eyre::Result;
use taskbot::{Config, Dispatcher, TaskStore};

#[tokio::main]
async fn main() -> Result<()> {
    let temp_dir = tempfile::tempdir()?;
    let config = Config {
        db_path: temp_dir.path().join("tasks.db"),
        add_cooldown_secs: 0,
        ..Config::default()
    };

    println!("taskbot Chat Session Demo");
    println!("=========================\n");

    let store = TaskStore::open(&config.db_path).await?;
    let bot = Dispatcher::new(store, &config);

    let script: &[(i64, &str)] = &[
        (5, "!add Buy milk"),
        (5, "!add Walk dog"),
        (5, "!delete 1"),
        (5, "!add Call mom"),
        (5, "!list"),
        (7, "!done 2"),
        (5, "!done 2"),
        (5, "!list"),
        (5, "!done two"),
        (5, "!help"),
    ];

    for (user, text) in script {
        println!("user {}> {}", user, text);
        if let Some(reply) = bot.handle(*user, text).await {
            println!("{}\n", reply);
        }
    }

    Ok(())
}
