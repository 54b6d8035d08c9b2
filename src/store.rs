// Task store: per-user to-do items in a single SQLite table

use crate::error::{StoreError, StoreResult};
use crate::models::Task;
use rusqlite::{Connection, TransactionBehavior};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument};

/// Page size used when the caller does not ask for one
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// How long a connection waits on a locked database before failing
const BUSY_TIMEOUT: Duration = Duration::from_millis(5_000);

/// Smallest positive id with no row, or 1 for an empty table.
///
/// The first branch covers a freed id 1; every other gap sits right after
/// some live id, so `MIN(id + 1)` over ids whose successor is free finds it.
const NEXT_ID_SQL: &str = r#"
    SELECT CASE
        WHEN NOT EXISTS (SELECT 1 FROM tasks WHERE id = 1) THEN 1
        ELSE (
            SELECT MIN(t1.id + 1)
            FROM tasks t1
            WHERE t1.id > 0
              AND NOT EXISTS (SELECT 1 FROM tasks t2 WHERE t2.id = t1.id + 1)
        )
    END
"#;

/// Persistent store of per-user tasks with compact id reuse
///
/// Every operation opens its own connection on the blocking pool and drops
/// it before returning. Cloning is cheap; clones share the writer lock used
/// to serialize id allocation.
#[derive(Debug, Clone)]
pub struct TaskStore {
    db_path: PathBuf,
    alloc_lock: Arc<Mutex<()>>,
}

impl TaskStore {
    /// Create a handle for the database at `db_path` without touching disk
    ///
    /// Call [`TaskStore::initialize`] (or use [`TaskStore::open`]) before the
    /// first operation.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
            alloc_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Create a handle and make sure the schema exists
    pub async fn open<P: AsRef<Path>>(db_path: P) -> StoreResult<Self> {
        let store = Self::new(db_path);
        store.initialize().await?;
        Ok(store)
    }

    /// Path of the SQLite database file
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    // ========================================================================
    // Connection lifecycle
    // ========================================================================

    fn connect(db_path: &Path) -> StoreResult<Connection> {
        let conn = Connection::open(db_path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let _mode: String = conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        Ok(conn)
    }

    /// Run `f` against a fresh connection on the blocking pool
    ///
    /// The connection is closed when `f` returns, on success and on error.
    async fn with_connection<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut Connection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = Self::connect(&db_path)?;
            f(&mut conn)
        })
        .await?
    }

    // ========================================================================
    // Schema
    // ========================================================================

    /// Create the tasks table and its index if they do not exist
    ///
    /// Safe to call on every start.
    #[instrument(skip(self), fields(db = %self.db_path.display()))]
    pub async fn initialize(&self) -> StoreResult<()> {
        match self.create_schema().await {
            Ok(()) => {
                info!("Task store initialized");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Failed to initialize task store");
                Err(e)
            }
        }
    }

    async fn create_schema(&self) -> StoreResult<()> {
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || -> StoreResult<()> {
            if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            Ok(())
        })
        .await??;

        self.with_connection(|conn| {
            debug!("Creating database schema");
            conn.execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS tasks (
                    id INTEGER PRIMARY KEY,
                    user_id INTEGER NOT NULL,
                    description TEXT NOT NULL,
                    status BOOLEAN NOT NULL DEFAULT 0
                );

                CREATE INDEX IF NOT EXISTS idx_tasks_user_id ON tasks(user_id);
                "#,
            )?;
            Ok(())
        })
        .await
    }

    // ========================================================================
    // Task API
    // ========================================================================

    /// Add a pending task for `user_id` under the smallest free id
    ///
    /// Id selection and insert share one immediate transaction, and adds
    /// through this handle (or its clones) are serialized, so concurrent
    /// callers never race for the same id. Nothing is written on failure.
    #[instrument(skip(self, description))]
    pub async fn add_task(&self, user_id: i64, description: &str) -> StoreResult<Task> {
        if description.trim().is_empty() {
            debug!("Rejecting empty task description");
            return Err(StoreError::Validation("task description cannot be empty".to_string()));
        }
        let description = description.to_string();

        let _guard = self.alloc_lock.lock().await;
        self.with_connection(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let id: i64 = tx.query_row(NEXT_ID_SQL, [], |row| row.get(0))?;
            tx.execute(
                "INSERT INTO tasks (id, user_id, description, status) VALUES (?1, ?2, ?3, 0)",
                rusqlite::params![id, user_id, &description],
            )?;

            tx.commit()?;
            debug!(id, "Task inserted");

            Ok(Task {
                id,
                user_id,
                description,
                done: false,
            })
        })
        .await
        .inspect_err(|e| error!(error = %e, "Failed to add task"))
    }

    /// List up to `limit` of the user's tasks after skipping `offset`, ordered by id
    #[instrument(skip(self))]
    pub async fn get_tasks(&self, user_id: i64, limit: u32, offset: u32) -> StoreResult<Vec<Task>> {
        self.with_connection(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, description, status FROM tasks
                 WHERE user_id = ?1
                 ORDER BY id
                 LIMIT ?2 OFFSET ?3",
            )?;

            let rows = stmt.query_map(rusqlite::params![user_id, limit, offset], Task::from_row)?;

            let mut tasks = Vec::new();
            for row in rows {
                tasks.push(row?);
            }
            Ok(tasks)
        })
        .await
        .inspect_err(|e| error!(error = %e, "Failed to list tasks"))
    }

    /// Number of tasks owned by `user_id`
    #[instrument(skip(self))]
    pub async fn count_tasks(&self, user_id: i64) -> StoreResult<u64> {
        self.with_connection(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM tasks WHERE user_id = ?1",
                [user_id],
                |row| row.get(0),
            )?;
            Ok(count.max(0) as u64)
        })
        .await
        .inspect_err(|e| error!(error = %e, "Failed to count tasks"))
    }

    /// Set the done flag on `task_id` if `user_id` owns it
    ///
    /// Returns `Ok(false)` without writing when the pair matches no row,
    /// including when the id belongs to someone else.
    #[instrument(skip(self))]
    pub async fn update_status(&self, user_id: i64, task_id: i64, done: bool) -> StoreResult<bool> {
        self.with_connection(move |conn| {
            let changed = conn.execute(
                "UPDATE tasks SET status = ?1 WHERE id = ?2 AND user_id = ?3",
                rusqlite::params![done, task_id, user_id],
            )?;
            Ok(changed > 0)
        })
        .await
        .inspect(|found| debug!(found, "Status update finished"))
        .inspect_err(|e| error!(error = %e, "Failed to update task status"))
    }

    /// Delete `task_id` if `user_id` owns it, freeing the id for reuse
    #[instrument(skip(self))]
    pub async fn delete_task(&self, user_id: i64, task_id: i64) -> StoreResult<bool> {
        self.with_connection(move |conn| {
            let deleted = conn.execute(
                "DELETE FROM tasks WHERE id = ?1 AND user_id = ?2",
                rusqlite::params![task_id, user_id],
            )?;
            Ok(deleted > 0)
        })
        .await
        .inspect(|found| debug!(found, "Delete finished"))
        .inspect_err(|e| error!(error = %e, "Failed to delete task"))
    }
}
