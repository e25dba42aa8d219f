use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use rusqlite::{Connection, OptionalExtension, params};
use tokio::sync::Semaphore;

use crate::config::{DEFAULT_WELCOME_MESSAGE, MAX_SEARCH_LENGTH, WELCOME_SETTING_KEY};
use crate::roles::{Role, RoleFilter};

const DB_OPERATION_TIMEOUT: Duration = Duration::from_secs(5);

/// One user row as the admin UI needs it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRow {
    pub id: i64,
    pub full_name: String,
    pub username: Option<String>,
    pub role: Option<Role>,
}

/// Per-role counts plus the overall total, gathered in a single pass.
#[derive(Debug, Clone, Default)]
pub struct RoleStats {
    counts: Vec<(Role, i64)>,
    pub total: i64,
}

impl RoleStats {
    pub fn count_for(&self, role: Role) -> i64 {
        self.counts
            .iter()
            .find(|(r, _)| *r == role)
            .map(|(_, n)| *n)
            .unwrap_or(0)
    }
}

/// Creates tables, indexes and the default welcome message. Safe to run on
/// every startup.
pub fn init_database(db_path: &Path) -> anyhow::Result<()> {
    let conn = Connection::open(db_path)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY,
            username TEXT,
            full_name TEXT,
            role TEXT DEFAULT NULL,
            created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
            last_seen TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT,
            updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS broadcast_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            admin_id INTEGER,
            role_filter TEXT,
            message TEXT,
            recipients_count INTEGER,
            created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute("CREATE INDEX IF NOT EXISTS idx_users_role ON users(role)", [])?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_users_full_name ON users(full_name)",
        [],
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO settings (key, value) VALUES (?1, ?2)",
        params![WELCOME_SETTING_KEY, DEFAULT_WELCOME_MESSAGE],
    )?;

    Ok(())
}

/// Small async wrapper over rusqlite: caps concurrent connections and runs
/// every closure on the blocking pool under a timeout. Conflicting writes
/// are serialized by SQLite itself via the busy timeout.
pub struct DatabasePool {
    db_path: PathBuf,
    semaphore: Arc<Semaphore>,
}

impl DatabasePool {
    pub fn new(db_path: PathBuf, max_connections: usize) -> Self {
        Self {
            db_path,
            semaphore: Arc::new(Semaphore::new(max_connections)),
        }
    }

    pub async fn execute_with_timeout<T, F>(&self, f: F) -> anyhow::Result<T>
    where
        F: FnOnce(&mut Connection) -> rusqlite::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let _permit = self.semaphore.clone().acquire_owned().await?;
        let db_path = self.db_path.clone();

        let task = tokio::task::spawn_blocking(move || -> rusqlite::Result<T> {
            let mut conn = Connection::open(db_path)?;
            conn.busy_timeout(DB_OPERATION_TIMEOUT)?;
            f(&mut conn)
        });

        match tokio::time::timeout(DB_OPERATION_TIMEOUT, task).await {
            Ok(joined) => Ok(joined??),
            Err(_) => Err(anyhow::anyhow!("database operation timed out")),
        }
    }

    /// Inserts the user on first contact, refreshes identity fields and
    /// `last_seen` on every later one. `created_at` never changes.
    pub async fn upsert_user(
        &self,
        user_id: i64,
        username: Option<String>,
        full_name: String,
    ) -> anyhow::Result<()> {
        self.execute_with_timeout(move |conn| {
            conn.execute(
                "INSERT INTO users (id, username, full_name, last_seen)
                 VALUES (?1, ?2, ?3, strftime('%Y-%m-%d %H:%M:%f', 'now'))
                 ON CONFLICT(id) DO UPDATE SET
                     username = excluded.username,
                     full_name = excluded.full_name,
                     last_seen = excluded.last_seen",
                params![user_id, username, full_name],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn set_role(&self, user_id: i64, role: Option<Role>) -> anyhow::Result<()> {
        self.execute_with_timeout(move |conn| {
            conn.execute(
                "UPDATE users SET role = ?1 WHERE id = ?2",
                params![role.map(|r| r.code()), user_id],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn list_users(
        &self,
        offset: i64,
        limit: i64,
        filter: RoleFilter,
    ) -> anyhow::Result<Vec<UserRow>> {
        self.execute_with_timeout(move |conn| {
            let mut rows = Vec::new();
            match filter {
                RoleFilter::Only(role) => {
                    let mut stmt = conn.prepare(
                        "SELECT id, full_name, username, role FROM users WHERE role = ?1
                         ORDER BY last_seen DESC LIMIT ?2 OFFSET ?3",
                    )?;
                    let iter = stmt.query_map(params![role.code(), limit, offset], row_to_user)?;
                    for user in iter {
                        rows.push(user?);
                    }
                }
                RoleFilter::All => {
                    let mut stmt = conn.prepare(
                        "SELECT id, full_name, username, role FROM users
                         ORDER BY last_seen DESC LIMIT ?1 OFFSET ?2",
                    )?;
                    let iter = stmt.query_map(params![limit, offset], row_to_user)?;
                    for user in iter {
                        rows.push(user?);
                    }
                }
            }
            Ok(rows)
        })
        .await
    }

    pub async fn count_users(&self, filter: RoleFilter) -> anyhow::Result<i64> {
        self.execute_with_timeout(move |conn| match filter {
            RoleFilter::Only(role) => conn.query_row(
                "SELECT COUNT(*) FROM users WHERE role = ?1",
                [role.code()],
                |row| row.get(0),
            ),
            RoleFilter::All => conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0)),
        })
        .await
    }

    /// Numeric queries are exact id lookups; anything else is a substring
    /// match against name or username. Input is trimmed and length-capped
    /// before it reaches SQL.
    pub async fn search_users(&self, query: &str) -> anyhow::Result<Vec<UserRow>> {
        let query: String = query.trim().chars().take(MAX_SEARCH_LENGTH).collect();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        self.execute_with_timeout(move |conn| {
            let mut rows = Vec::new();
            if query.chars().all(|c| c.is_ascii_digit()) {
                let id: i64 = query.parse().unwrap_or(-1);
                let mut stmt = conn
                    .prepare("SELECT id, full_name, username, role FROM users WHERE id = ?1")?;
                let iter = stmt.query_map([id], row_to_user)?;
                for user in iter {
                    rows.push(user?);
                }
            } else {
                let pattern = format!("%{}%", query);
                let mut stmt = conn.prepare(
                    "SELECT id, full_name, username, role FROM users
                     WHERE full_name LIKE ?1 OR username LIKE ?1 LIMIT 20",
                )?;
                let iter = stmt.query_map([pattern], row_to_user)?;
                for user in iter {
                    rows.push(user?);
                }
            }
            Ok(rows)
        })
        .await
    }

    pub async fn role_stats(&self) -> anyhow::Result<RoleStats> {
        self.execute_with_timeout(|conn| {
            let mut stats = RoleStats::default();
            let mut stmt = conn.prepare("SELECT role, COUNT(*) FROM users GROUP BY role")?;
            let iter = stmt.query_map([], |row| {
                Ok((row.get::<_, Option<String>>(0)?, row.get::<_, i64>(1)?))
            })?;
            for group in iter {
                let (role_code, count) = group?;
                stats.total += count;
                if let Some(role) = role_code.as_deref().and_then(Role::from_code) {
                    stats.counts.push((role, count));
                }
            }
            Ok(stats)
        })
        .await
    }

    pub async fn get_setting(&self, key: &str) -> anyhow::Result<Option<String>> {
        let key = key.to_string();
        self.execute_with_timeout(move |conn| {
            conn.query_row("SELECT value FROM settings WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()
        })
        .await
    }

    pub async fn set_setting(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let key = key.to_string();
        let value = value.to_string();
        self.execute_with_timeout(move |conn| {
            conn.execute(
                "INSERT INTO settings (key, value, updated_at)
                 VALUES (?1, ?2, datetime('now'))
                 ON CONFLICT(key) DO UPDATE SET
                     value = excluded.value,
                     updated_at = excluded.updated_at",
                params![key, value],
            )?;
            Ok(())
        })
        .await
    }

    /// Unpaginated on purpose: a broadcast must reach every match.
    pub async fn list_broadcast_targets(&self, filter: RoleFilter) -> anyhow::Result<Vec<i64>> {
        self.execute_with_timeout(move |conn| {
            let mut ids = Vec::new();
            match filter {
                RoleFilter::Only(role) => {
                    let mut stmt = conn.prepare("SELECT id FROM users WHERE role = ?1")?;
                    let iter = stmt.query_map([role.code()], |row| row.get::<_, i64>(0))?;
                    for id in iter {
                        ids.push(id?);
                    }
                }
                RoleFilter::All => {
                    let mut stmt = conn.prepare("SELECT id FROM users")?;
                    let iter = stmt.query_map([], |row| row.get::<_, i64>(0))?;
                    for id in iter {
                        ids.push(id?);
                    }
                }
            }
            Ok(ids)
        })
        .await
    }

    pub async fn record_broadcast(
        &self,
        admin_id: i64,
        filter: RoleFilter,
        message: String,
        recipients_count: i64,
    ) -> anyhow::Result<()> {
        self.execute_with_timeout(move |conn| {
            conn.execute(
                "INSERT INTO broadcast_history (admin_id, role_filter, message, recipients_count)
                 VALUES (?1, ?2, ?3, ?4)",
                params![admin_id, filter.code(), message, recipients_count],
            )?;
            Ok(())
        })
        .await
    }
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        full_name: row.get(1)?,
        username: row.get(2)?,
        role: row
            .get::<_, Option<String>>(3)?
            .as_deref()
            .and_then(Role::from_code),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_pool(dir: &TempDir) -> DatabasePool {
        let path = dir.path().join("test.db");
        init_database(&path).expect("init_database failed");
        DatabasePool::new(path, 3)
    }

    #[tokio::test]
    async fn test_default_welcome_seeded() {
        let dir = TempDir::new().unwrap();
        let pool = test_pool(&dir);

        let welcome = pool.get_setting(WELCOME_SETTING_KEY).await.unwrap();
        assert_eq!(welcome.as_deref(), Some(DEFAULT_WELCOME_MESSAGE));
    }

    #[tokio::test]
    async fn test_init_does_not_clobber_edited_welcome() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.db");
        init_database(&path).unwrap();
        let pool = DatabasePool::new(path.clone(), 3);

        pool.set_setting(WELCOME_SETTING_KEY, "Hello again").await.unwrap();
        init_database(&path).unwrap();

        let welcome = pool.get_setting(WELCOME_SETTING_KEY).await.unwrap();
        assert_eq!(welcome.as_deref(), Some("Hello again"));
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent_on_identity() {
        let dir = TempDir::new().unwrap();
        let pool = test_pool(&dir);

        pool.upsert_user(7, Some("alice".into()), "Alice".into()).await.unwrap();
        let created: String = pool
            .execute_with_timeout(|conn| {
                conn.query_row("SELECT created_at FROM users WHERE id = 7", [], |r| r.get(0))
            })
            .await
            .unwrap();

        pool.upsert_user(7, Some("alice".into()), "Alice".into()).await.unwrap();

        let (count, created_again, name): (i64, String, String) = pool
            .execute_with_timeout(|conn| {
                let count = conn.query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))?;
                conn.query_row(
                    "SELECT created_at, full_name FROM users WHERE id = 7",
                    [],
                    |r| Ok((count, r.get(0)?, r.get(1)?)),
                )
            })
            .await
            .unwrap();

        assert_eq!(count, 1);
        assert_eq!(created_again, created);
        assert_eq!(name, "Alice");
    }

    #[tokio::test]
    async fn test_set_role_then_filtered_list_contains_user_once() {
        let dir = TempDir::new().unwrap();
        let pool = test_pool(&dir);

        for (id, name) in [(1, "Ann"), (2, "Bob"), (3, "Cat")] {
            pool.upsert_user(id, None, name.into()).await.unwrap();
        }

        for role in Role::ALL {
            pool.set_role(2, Some(role)).await.unwrap();
            let listed = pool
                .list_users(0, 10, RoleFilter::Only(role))
                .await
                .unwrap();
            assert_eq!(listed.iter().filter(|u| u.id == 2).count(), 1);
            assert_eq!(pool.count_users(RoleFilter::Only(role)).await.unwrap(), 1);
        }

        pool.set_role(2, None).await.unwrap();
        for role in Role::ALL {
            assert_eq!(pool.count_users(RoleFilter::Only(role)).await.unwrap(), 0);
        }
        assert_eq!(pool.count_users(RoleFilter::All).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_search_by_id_and_by_name() {
        let dir = TempDir::new().unwrap();
        let pool = test_pool(&dir);

        pool.upsert_user(100, Some("anna_k".into()), "Anna Kovalenko".into()).await.unwrap();
        pool.upsert_user(200, None, "Borys Shevchenko".into()).await.unwrap();

        let by_id = pool.search_users("200").await.unwrap();
        assert_eq!(by_id.len(), 1);
        assert_eq!(by_id[0].id, 200);

        let by_name = pool.search_users("  anna ").await.unwrap();
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].id, 100);

        let by_username = pool.search_users("anna_k").await.unwrap();
        assert_eq!(by_username.len(), 1);

        assert!(pool.search_users("   ").await.unwrap().is_empty());
        assert!(pool.search_users("nobody").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_role_stats_single_pass_totals() {
        let dir = TempDir::new().unwrap();
        let pool = test_pool(&dir);

        for id in 1..=5 {
            pool.upsert_user(id, None, format!("User {}", id)).await.unwrap();
        }
        pool.set_role(1, Some(Role::Student)).await.unwrap();
        pool.set_role(2, Some(Role::Student)).await.unwrap();
        pool.set_role(3, Some(Role::Parent)).await.unwrap();

        let stats = pool.role_stats().await.unwrap();
        assert_eq!(stats.total, 5);
        assert_eq!(stats.count_for(Role::Student), 2);
        assert_eq!(stats.count_for(Role::Parent), 1);
        assert_eq!(stats.count_for(Role::Lecturer), 0);
    }

    #[tokio::test]
    async fn test_broadcast_targets_match_count() {
        let dir = TempDir::new().unwrap();
        let pool = test_pool(&dir);

        for id in 1..=4 {
            pool.upsert_user(id, None, format!("User {}", id)).await.unwrap();
        }
        pool.set_role(1, Some(Role::Student)).await.unwrap();
        pool.set_role(4, Some(Role::Student)).await.unwrap();

        let all = pool.list_broadcast_targets(RoleFilter::All).await.unwrap();
        assert_eq!(all.len() as i64, pool.count_users(RoleFilter::All).await.unwrap());

        let students = pool
            .list_broadcast_targets(RoleFilter::Only(Role::Student))
            .await
            .unwrap();
        assert_eq!(students.len(), 2);

        pool.record_broadcast(9, RoleFilter::Only(Role::Student), "Exam tomorrow".into(), 2)
            .await
            .unwrap();
        let (recipients, message): (i64, String) = pool
            .execute_with_timeout(|conn| {
                conn.query_row(
                    "SELECT recipients_count, message FROM broadcast_history",
                    [],
                    |r| Ok((r.get(0)?, r.get(1)?)),
                )
            })
            .await
            .unwrap();
        assert_eq!(recipients, 2);
        assert_eq!(message, "Exam tomorrow");
    }
}
