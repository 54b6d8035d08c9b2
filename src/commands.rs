// Chat command parsing and dispatch onto the task store

use crate::config::Config;
use crate::error::StoreError;
use crate::store::TaskStore;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const NO_TASKS: &str = "You have no tasks!";
const INVALID_ID: &str = "Error: task ID must be a whole number.";
const STORAGE_FAILURE: &str = "Error: something went wrong, please try again later.";

/// A parsed chat command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Add(String),
    /// 1-based page number
    List(u32),
    Done(i64),
    Undo(i64),
    Delete(i64),
    Help,
}

/// Why a prefixed message could not be turned into a [`Command`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    MissingDescription,
    MissingId(&'static str),
    InvalidId,
    InvalidPage,
    Unknown(String),
}

impl Command {
    /// Parse `text` as a command
    ///
    /// Returns `None` when the message does not start with `prefix`, so
    /// ordinary chat is ignored.
    pub fn parse(text: &str, prefix: &str) -> Option<Result<Self, ParseError>> {
        let body = text.trim().strip_prefix(prefix)?;
        let (verb, rest) = match body.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (body, ""),
        };

        let command = match verb.to_lowercase().as_str() {
            "add" => {
                if rest.is_empty() {
                    Err(ParseError::MissingDescription)
                } else {
                    Ok(Command::Add(rest.to_string()))
                }
            }
            "list" => {
                if rest.is_empty() {
                    Ok(Command::List(1))
                } else {
                    match rest.parse::<u32>() {
                        Ok(page) if page > 0 => Ok(Command::List(page)),
                        _ => Err(ParseError::InvalidPage),
                    }
                }
            }
            "done" => parse_id(rest, "done").map(Command::Done),
            "undo" => parse_id(rest, "undo").map(Command::Undo),
            "delete" => parse_id(rest, "delete").map(Command::Delete),
            "help" => Ok(Command::Help),
            other => Err(ParseError::Unknown(other.to_string())),
        };

        Some(command)
    }
}

/// Task ids are plain digit strings; signs and whitespace are rejected
fn parse_id(arg: &str, verb: &'static str) -> Result<i64, ParseError> {
    if arg.is_empty() {
        return Err(ParseError::MissingId(verb));
    }
    if !arg.chars().all(|c| c.is_ascii_digit()) {
        return Err(ParseError::InvalidId);
    }
    arg.parse().map_err(|_| ParseError::InvalidId)
}

/// Per-user rate limit: one use per `period`
#[derive(Debug)]
pub struct Cooldown {
    period: Duration,
    last_used: Mutex<HashMap<i64, Instant>>,
}

impl Cooldown {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            last_used: Mutex::new(HashMap::new()),
        }
    }

    /// Record a use at `now`, or return the time left if the user is still cooling down
    pub fn check_at(&self, user_id: i64, now: Instant) -> Result<(), Duration> {
        if self.period.is_zero() {
            return Ok(());
        }

        let mut last_used = self.last_used.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(&last) = last_used.get(&user_id) {
            let elapsed = now.saturating_duration_since(last);
            if elapsed < self.period {
                return Err(self.period - elapsed);
            }
        }

        last_used.insert(user_id, now);
        Ok(())
    }

    pub fn check(&self, user_id: i64) -> Result<(), Duration> {
        self.check_at(user_id, Instant::now())
    }
}

/// Maps chat messages to task store calls and renders the replies
#[derive(Debug)]
pub struct Dispatcher {
    store: TaskStore,
    prefix: String,
    page_size: u32,
    add_cooldown: Cooldown,
}

impl Dispatcher {
    pub fn new(store: TaskStore, config: &Config) -> Self {
        Self {
            store,
            prefix: config.prefix.clone(),
            page_size: config.page_size.max(1),
            add_cooldown: Cooldown::new(config.add_cooldown()),
        }
    }

    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    /// Handle one chat message from `user_id`
    ///
    /// Returns the reply to send, or `None` when the message is not a command.
    pub async fn handle(&self, user_id: i64, text: &str) -> Option<String> {
        let reply = match Command::parse(text, &self.prefix)? {
            Ok(command) => self.execute(user_id, command).await,
            Err(e) => {
                debug!(user_id, error = ?e, "Rejected command");
                self.parse_error_reply(e)
            }
        };
        Some(reply)
    }

    /// Run a parsed command and render the reply
    pub async fn execute(&self, user_id: i64, command: Command) -> String {
        debug!(user_id, ?command, "Executing command");
        match command {
            Command::Add(description) => self.add(user_id, &description).await,
            Command::List(page) => self.list(user_id, page).await,
            Command::Done(id) => match self.store.update_status(user_id, id, true).await {
                Ok(true) => format!("Task {} marked as done!", id),
                Ok(false) => not_found(id),
                Err(e) => storage_failure(e),
            },
            Command::Undo(id) => match self.store.update_status(user_id, id, false).await {
                Ok(true) => format!("Task {} marked as pending.", id),
                Ok(false) => not_found(id),
                Err(e) => storage_failure(e),
            },
            Command::Delete(id) => match self.store.delete_task(user_id, id).await {
                Ok(true) => format!("Task {} deleted!", id),
                Ok(false) => not_found(id),
                Err(e) => storage_failure(e),
            },
            Command::Help => self.help(),
        }
    }

    async fn add(&self, user_id: i64, description: &str) -> String {
        if let Err(remaining) = self.add_cooldown.check(user_id) {
            let secs = remaining.as_secs_f64().ceil().max(1.0) as u64;
            return format!("Slow down! Try again in {}s.", secs);
        }

        match self.store.add_task(user_id, description).await {
            Ok(task) => format!("Task added: {} (#{})", task.description, task.id),
            Err(StoreError::Validation(_)) => self.parse_error_reply(ParseError::MissingDescription),
            Err(e) => storage_failure(e),
        }
    }

    async fn list(&self, user_id: i64, page: u32) -> String {
        let page = page.max(1);
        let offset = (page - 1).saturating_mul(self.page_size);
        let tasks = match self.store.get_tasks(user_id, self.page_size, offset).await {
            Ok(tasks) => tasks,
            Err(e) => return storage_failure(e),
        };

        if tasks.is_empty() {
            return if page == 1 {
                NO_TASKS.to_string()
            } else {
                format!("No tasks on page {}.", page)
            };
        }

        let mut reply = tasks.iter().map(|t| t.to_string()).collect::<Vec<_>>().join("\n");

        match self.store.count_tasks(user_id).await {
            Ok(total) => {
                let pages = total.div_ceil(u64::from(self.page_size));
                if pages > 1 {
                    reply.push_str(&format!("\nPage {}/{}", page, pages));
                }
            }
            Err(e) => warn!(user_id, error = %e, "Could not count tasks for page footer"),
        }

        reply
    }

    fn help(&self) -> String {
        let p = &self.prefix;
        format!(
            "**Available commands:**\n\
             `{p}add <description>` - add a new task.\n\
             `{p}list [page]` - show your tasks.\n\
             `{p}done <id>` - mark a task as done.\n\
             `{p}undo <id>` - mark a task as pending again.\n\
             `{p}delete <id>` - delete a task.\n\
             `{p}help` - show this list."
        )
    }

    fn parse_error_reply(&self, err: ParseError) -> String {
        let p = &self.prefix;
        match err {
            ParseError::MissingDescription => format!("Usage: `{p}add <description>`"),
            ParseError::MissingId(verb) => format!("Usage: `{p}{verb} <id>`"),
            ParseError::InvalidId => INVALID_ID.to_string(),
            ParseError::InvalidPage => "Error: page must be a positive whole number.".to_string(),
            ParseError::Unknown(verb) => format!("Unknown command `{p}{verb}`. Try `{p}help`."),
        }
    }
}

fn not_found(id: i64) -> String {
    format!("Error: task {} not found.", id)
}

fn storage_failure(err: StoreError) -> String {
    debug!(error = %err, "Replying with generic failure");
    STORAGE_FAILURE.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn dispatcher(temp: &TempDir, cooldown_secs: u64) -> Dispatcher {
        let config = Config {
            db_path: temp.path().join("tasks.db"),
            page_size: 2,
            add_cooldown_secs: cooldown_secs,
            prefix: "!".to_string(),
        };
        let store = TaskStore::open(&config.db_path).await.unwrap();
        Dispatcher::new(store, &config)
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            Command::parse("!add  Buy milk ", "!"),
            Some(Ok(Command::Add("Buy milk".to_string())))
        );
        assert_eq!(Command::parse("!list", "!"), Some(Ok(Command::List(1))));
        assert_eq!(Command::parse("!list 3", "!"), Some(Ok(Command::List(3))));
        assert_eq!(Command::parse("!DONE 4", "!"), Some(Ok(Command::Done(4))));
        assert_eq!(Command::parse("!undo 4", "!"), Some(Ok(Command::Undo(4))));
        assert_eq!(Command::parse("!delete 12", "!"), Some(Ok(Command::Delete(12))));
        assert_eq!(Command::parse("!help", "!"), Some(Ok(Command::Help)));
        assert_eq!(Command::parse("/help", "/"), Some(Ok(Command::Help)));
    }

    #[test]
    fn test_parse_ignores_plain_chat() {
        assert_eq!(Command::parse("hello there", "!"), None);
        assert_eq!(Command::parse("", "!"), None);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(Command::parse("!add", "!"), Some(Err(ParseError::MissingDescription)));
        assert_eq!(Command::parse("!done", "!"), Some(Err(ParseError::MissingId("done"))));
        assert_eq!(Command::parse("!done abc", "!"), Some(Err(ParseError::InvalidId)));
        assert_eq!(Command::parse("!delete -1", "!"), Some(Err(ParseError::InvalidId)));
        assert_eq!(
            Command::parse("!delete 99999999999999999999", "!"),
            Some(Err(ParseError::InvalidId))
        );
        assert_eq!(Command::parse("!list 0", "!"), Some(Err(ParseError::InvalidPage)));
        assert_eq!(
            Command::parse("!frobnicate", "!"),
            Some(Err(ParseError::Unknown("frobnicate".to_string())))
        );
    }

    #[test]
    fn test_cooldown() {
        let cooldown = Cooldown::new(Duration::from_secs(5));
        let start = Instant::now();

        assert!(cooldown.check_at(1, start).is_ok());
        let remaining = cooldown.check_at(1, start + Duration::from_secs(2)).unwrap_err();
        assert_eq!(remaining, Duration::from_secs(3));

        // Other users are unaffected
        assert!(cooldown.check_at(2, start + Duration::from_secs(2)).is_ok());

        assert!(cooldown.check_at(1, start + Duration::from_secs(5)).is_ok());
    }

    #[test]
    fn test_zero_cooldown_never_blocks() {
        let cooldown = Cooldown::new(Duration::ZERO);
        let now = Instant::now();
        assert!(cooldown.check_at(1, now).is_ok());
        assert!(cooldown.check_at(1, now).is_ok());
    }

    #[tokio::test]
    async fn test_add_list_done_delete_flow() {
        let temp = TempDir::new().unwrap();
        let bot = dispatcher(&temp, 0).await;

        assert_eq!(bot.handle(1, "!add Buy milk").await.unwrap(), "Task added: Buy milk (#1)");
        assert_eq!(bot.handle(1, "!add Walk dog").await.unwrap(), "Task added: Walk dog (#2)");
        assert_eq!(bot.handle(1, "!done 2").await.unwrap(), "Task 2 marked as done!");
        assert_eq!(bot.handle(1, "!list").await.unwrap(), "1: Buy milk (✗)\n2: Walk dog (✓)");

        assert_eq!(bot.handle(1, "!delete 1").await.unwrap(), "Task 1 deleted!");
        assert_eq!(bot.handle(1, "!add Call mom").await.unwrap(), "Task added: Call mom (#1)");
        assert_eq!(bot.handle(1, "!undo 2").await.unwrap(), "Task 2 marked as pending.");
        assert_eq!(bot.handle(1, "!list").await.unwrap(), "1: Call mom (✗)\n2: Walk dog (✗)");
    }

    #[tokio::test]
    async fn test_other_users_tasks_are_not_found() {
        let temp = TempDir::new().unwrap();
        let bot = dispatcher(&temp, 0).await;

        bot.handle(7, "!add Private").await.unwrap();
        assert_eq!(bot.handle(5, "!done 1").await.unwrap(), "Error: task 1 not found.");
        assert_eq!(bot.handle(5, "!delete 1").await.unwrap(), "Error: task 1 not found.");
        assert_eq!(bot.handle(5, "!list").await.unwrap(), NO_TASKS);
        assert_eq!(bot.handle(7, "!list").await.unwrap(), "1: Private (✗)");
    }

    #[tokio::test]
    async fn test_list_pages() {
        let temp = TempDir::new().unwrap();
        let bot = dispatcher(&temp, 0).await;

        for desc in ["a", "b", "c"] {
            bot.handle(1, &format!("!add {}", desc)).await.unwrap();
        }

        assert_eq!(bot.handle(1, "!list").await.unwrap(), "1: a (✗)\n2: b (✗)\nPage 1/2");
        assert_eq!(bot.handle(1, "!list 2").await.unwrap(), "3: c (✗)\nPage 2/2");
        assert_eq!(bot.handle(1, "!list 3").await.unwrap(), "No tasks on page 3.");
    }

    #[tokio::test]
    async fn test_add_cooldown_blocks_second_add() {
        let temp = TempDir::new().unwrap();
        let bot = dispatcher(&temp, 60).await;

        assert!(bot.handle(1, "!add first").await.unwrap().starts_with("Task added"));
        assert!(bot.handle(1, "!add second").await.unwrap().starts_with("Slow down!"));
        assert!(bot.handle(2, "!add other user").await.unwrap().starts_with("Task added"));

        assert_eq!(bot.store().count_tasks(1).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_invalid_input_replies() {
        let temp = TempDir::new().unwrap();
        let bot = dispatcher(&temp, 0).await;

        assert_eq!(bot.handle(1, "!done two").await.unwrap(), INVALID_ID);
        assert_eq!(bot.handle(1, "!add").await.unwrap(), "Usage: `!add <description>`");
        assert!(bot.handle(1, "!nope").await.unwrap().contains("`!help`"));
        assert!(bot.handle(1, "!help").await.unwrap().contains("`!delete <id>`"));
        assert_eq!(bot.handle(1, "just chatting").await, None);
    }

    #[tokio::test]
    async fn test_storage_fault_gives_generic_reply() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("file");
        std::fs::write(&blocker, "x").unwrap();

        let config = Config {
            db_path: blocker.join("tasks.db"),
            add_cooldown_secs: 0,
            ..Config::default()
        };
        let bot = Dispatcher::new(TaskStore::new(&config.db_path), &config);

        assert_eq!(bot.handle(1, "!add Buy milk").await.unwrap(), STORAGE_FAILURE);
        assert_eq!(bot.handle(1, "!list").await.unwrap(), STORAGE_FAILURE);
        assert_eq!(bot.handle(1, "!done 1").await.unwrap(), STORAGE_FAILURE);
    }
}
