//! SQLite-backed bookmark store.

use super::models::{Bookmark, BookmarkField, BookmarkId, PostRef, Projection};
use super::schema::BOOKMARK_VERSIONED_SCHEMAS;
use super::trait_def::BookmarkStore;
use crate::server::metrics::record_db_query;
use crate::sqlite_persistence::BASE_DB_VERSION;
use crate::status::{OperationError, OperationResult, OperationStatus, Outcome};
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{
    params, params_from_iter, Connection, OptionalExtension, Row, TransactionBehavior,
};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, error, info};

const SELECT_BOOKMARK: &str =
    "SELECT id, owner_id, created_at, updated_at, deleted_at FROM bookmark";

#[derive(Clone)]
pub struct SqliteBookmarkStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteBookmarkStore {
    pub fn new<T: AsRef<Path>>(db_path: T) -> Result<Self> {
        let conn = if db_path.as_ref().exists() {
            Connection::open_with_flags(
                &db_path,
                rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                    | rusqlite::OpenFlags::SQLITE_OPEN_URI
                    | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )
            .with_context(|| {
                format!(
                    "Failed to open bookmark database {}",
                    db_path.as_ref().display()
                )
            })?
        } else {
            let conn = Connection::open(&db_path).with_context(|| {
                format!(
                    "Failed to create bookmark database {}",
                    db_path.as_ref().display()
                )
            })?;
            BOOKMARK_VERSIONED_SCHEMAS
                .last()
                .context("No bookmark schema defined")?
                .create(&conn)?;
            conn
        };
        Self::from_connection(conn)
    }

    /// Store backed by a private in-memory database, mostly useful for tests.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        BOOKMARK_VERSIONED_SCHEMAS
            .last()
            .context("No bookmark schema defined")?
            .create(&conn)?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", true)
            .context("Failed to enable foreign keys")?;

        let db_version = conn
            .query_row("PRAGMA user_version;", [], |row| row.get::<usize, i64>(0))
            .context("Failed to read database version")?
            - BASE_DB_VERSION as i64;

        if db_version < 0 {
            bail!(
                "Database version {} is too old, does not contain base db version {}",
                db_version,
                BASE_DB_VERSION
            );
        }
        let version = db_version as usize;

        if version >= BOOKMARK_VERSIONED_SCHEMAS.len() {
            bail!("Database version {} is too new", version);
        }
        BOOKMARK_VERSIONED_SCHEMAS[version].validate(&conn)?;

        Self::migrate_if_needed(&conn, version)?;

        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM bookmark WHERE deleted_at IS NULL",
            [],
            |r| r.get(0),
        )?;
        info!("Bookmark store ready with {} live bookmarks", count);

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn migrate_if_needed(conn: &Connection, version: usize) -> Result<()> {
        let latest_version = BOOKMARK_VERSIONED_SCHEMAS.len() - 1;
        if version >= latest_version {
            return Ok(());
        }

        let tx = conn.unchecked_transaction()?;
        let mut current_version = version;
        for schema in BOOKMARK_VERSIONED_SCHEMAS.iter().skip(version + 1) {
            if let Some(migration_fn) = schema.migration {
                info!(
                    "Migrating bookmark db from version {} to {}",
                    current_version, schema.version
                );
                migration_fn(&tx)?;
            }
            current_version = schema.version;
        }
        tx.pragma_update(None, "user_version", BASE_DB_VERSION + current_version)?;
        tx.commit()?;

        BOOKMARK_VERSIONED_SCHEMAS[latest_version].validate(conn)?;
        Ok(())
    }
}

fn to_millis(time: DateTime<Utc>) -> i64 {
    time.timestamp_millis()
}

fn from_millis(millis: Option<i64>) -> Option<DateTime<Utc>> {
    millis.and_then(DateTime::from_timestamp_millis)
}

/// SQLite reads a negative OFFSET as 0, so counts past `i64::MAX` saturate instead of wrapping.
fn to_sql_count(count: usize) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

fn store_error(status: OperationStatus, operation: &str, err: rusqlite::Error) -> OperationError {
    error!("Bookmark store {} failed: {}", operation, err);
    OperationError::new(status, format!("{} failed: {}", operation, err))
}

fn row_to_bookmark(row: &Row) -> rusqlite::Result<Bookmark> {
    let id: String = row.get(0)?;
    Ok(Bookmark {
        id: BookmarkId::parse_or_nil(&id),
        owner_id: row.get(1)?,
        posts: None,
        created_at: from_millis(row.get(2)?),
        updated_at: from_millis(row.get(3)?),
        deleted_at: from_millis(row.get(4)?),
    })
}

fn load_posts(conn: &Connection, bookmark_id: &BookmarkId) -> rusqlite::Result<Vec<PostRef>> {
    let mut stmt = conn.prepare(
        "SELECT post_id FROM bookmark_post WHERE bookmark_id = ?1 ORDER BY position",
    )?;
    let posts = stmt
        .query_map(params![bookmark_id.to_string()], |row| {
            Ok(PostRef::new(row.get::<_, String>(0)?))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(posts)
}

fn apply_projection(
    conn: &Connection,
    mut bookmark: Bookmark,
    projection: &Projection,
) -> rusqlite::Result<Bookmark> {
    if projection.includes(BookmarkField::Posts) {
        bookmark.posts = Some(load_posts(conn, &bookmark.id)?);
    }
    if !projection.includes(BookmarkField::CreatedAt) {
        bookmark.created_at = None;
    }
    if !projection.includes(BookmarkField::UpdatedAt) {
        bookmark.updated_at = None;
    }
    if !projection.includes(BookmarkField::DeletedAt) {
        bookmark.deleted_at = None;
    }
    Ok(bookmark)
}

fn find_one(
    conn: &Connection,
    filter: &str,
    value: &str,
    projection: &Projection,
) -> rusqlite::Result<Option<Bookmark>> {
    let bookmark = conn
        .query_row(
            &format!("{} WHERE {} = ?1 AND deleted_at IS NULL", SELECT_BOOKMARK, filter),
            params![value],
            row_to_bookmark,
        )
        .optional()?;
    bookmark
        .map(|bookmark| apply_projection(conn, bookmark, projection))
        .transpose()
}

fn insert_posts(conn: &Connection, bookmark_id: &str, posts: &[PostRef]) -> rusqlite::Result<()> {
    let mut stmt = conn.prepare(
        "INSERT OR IGNORE INTO bookmark_post (bookmark_id, post_id, position) VALUES (?1, ?2, ?3)",
    )?;
    for (position, post) in posts.iter().enumerate() {
        stmt.execute(params![bookmark_id, post.id, position as i64])?;
    }
    Ok(())
}

fn live_bookmark_id(conn: &Connection, owner_id: &str) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "SELECT id FROM bookmark WHERE owner_id = ?1 AND deleted_at IS NULL",
        params![owner_id],
        |row| row.get(0),
    )
    .optional()
}

/// Returns `None` when the owner has no live bookmark.
fn union_posts(
    conn: &mut Connection,
    owner_id: &str,
    post_ids: &[String],
    now: i64,
) -> rusqlite::Result<Option<usize>> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let Some(bookmark_id) = live_bookmark_id(&tx, owner_id)? else {
        return Ok(None);
    };

    let mut inserted = 0;
    {
        let mut stmt = tx.prepare(
            "INSERT OR IGNORE INTO bookmark_post (bookmark_id, post_id, position)
             SELECT ?1, ?2, COALESCE(MAX(position), -1) + 1
             FROM bookmark_post WHERE bookmark_id = ?1",
        )?;
        for post_id in post_ids {
            inserted += stmt.execute(params![bookmark_id, post_id])?;
        }
    }
    tx.execute(
        "UPDATE bookmark SET updated_at = ?1 WHERE id = ?2",
        params![now, bookmark_id],
    )?;
    tx.commit()?;
    Ok(Some(inserted))
}

/// Returns `None` when the owner has no live bookmark.
fn subtract_posts(
    conn: &mut Connection,
    owner_id: &str,
    post_ids: &[String],
    now: i64,
) -> rusqlite::Result<Option<usize>> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let Some(bookmark_id) = live_bookmark_id(&tx, owner_id)? else {
        return Ok(None);
    };

    let removed = if post_ids.is_empty() {
        0
    } else {
        let placeholders = (0..post_ids.len())
            .map(|i| format!("?{}", i + 2))
            .collect::<Vec<_>>()
            .join(", ");
        tx.execute(
            &format!(
                "DELETE FROM bookmark_post WHERE bookmark_id = ?1 AND post_id IN ({})",
                placeholders
            ),
            params_from_iter(
                std::iter::once(bookmark_id.as_str()).chain(post_ids.iter().map(String::as_str)),
            ),
        )?
    };
    tx.execute(
        "UPDATE bookmark SET updated_at = ?1 WHERE id = ?2",
        params![now, bookmark_id],
    )?;
    tx.commit()?;
    Ok(Some(removed))
}

impl BookmarkStore for SqliteBookmarkStore {
    fn fetch(
        &self,
        projection: &Projection,
        limit: usize,
        skip: usize,
    ) -> OperationResult<Vec<Bookmark>> {
        let start = Instant::now();
        let conn = self.conn.lock().unwrap();

        let result = (|| -> rusqlite::Result<Vec<Bookmark>> {
            let mut stmt = conn.prepare(&format!(
                "{} WHERE deleted_at IS NULL ORDER BY created_at, id LIMIT ?1 OFFSET ?2",
                SELECT_BOOKMARK
            ))?;
            let rows = stmt
                .query_map(params![to_sql_count(limit), to_sql_count(skip)], row_to_bookmark)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows.into_iter()
                .map(|bookmark| apply_projection(&conn, bookmark, projection))
                .collect()
        })();
        record_db_query("fetch", start.elapsed());

        result
            .map(|bookmarks| Outcome::new(bookmarks, OperationStatus::Success))
            .map_err(|e| store_error(OperationStatus::FetchFailed, "fetch", e))
    }

    fn fetch_by_id(&self, id: &BookmarkId, projection: &Projection) -> OperationResult<Bookmark> {
        if id.is_nil() {
            return Err(OperationError::new(
                OperationStatus::NotExist,
                "invalid bookmark id",
            ));
        }

        let start = Instant::now();
        let conn = self.conn.lock().unwrap();
        let result = find_one(&conn, "id", &id.to_string(), projection);
        record_db_query("fetch_by_id", start.elapsed());

        match result {
            Ok(Some(bookmark)) => Ok(Outcome::new(bookmark, OperationStatus::Success)),
            Ok(None) => Err(OperationError::new(
                OperationStatus::NotExist,
                format!("bookmark {} does not exist", id),
            )),
            Err(e) => Err(store_error(OperationStatus::FetchFailed, "fetch_by_id", e)),
        }
    }

    fn fetch_by_owner(
        &self,
        owner_id: &str,
        projection: &Projection,
    ) -> OperationResult<Bookmark> {
        let start = Instant::now();
        let conn = self.conn.lock().unwrap();
        let result = find_one(&conn, "owner_id", owner_id, projection);
        record_db_query("fetch_by_owner", start.elapsed());

        match result {
            Ok(Some(bookmark)) => Ok(Outcome::new(bookmark, OperationStatus::Success)),
            Ok(None) => Err(OperationError::new(
                OperationStatus::NotExist,
                format!("owner {} has no bookmark", owner_id),
            )),
            Err(e) => Err(store_error(
                OperationStatus::FetchFailed,
                "fetch_by_owner",
                e,
            )),
        }
    }

    fn create(&self, bookmark: &Bookmark) -> OperationResult<BookmarkId> {
        if bookmark.id.is_nil() {
            return Err(OperationError::new(
                OperationStatus::CreateFailed,
                "cannot create a bookmark with the nil id",
            ));
        }
        if bookmark.owner_id.is_empty() {
            return Err(OperationError::new(
                OperationStatus::CreateFailed,
                "cannot create a bookmark without owner",
            ));
        }

        let start = Instant::now();
        let mut conn = self.conn.lock().unwrap();
        let now = Utc::now();
        let id = bookmark.id.to_string();

        let result = (|| -> rusqlite::Result<()> {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO bookmark (id, owner_id, created_at, updated_at, deleted_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    id,
                    bookmark.owner_id,
                    to_millis(bookmark.created_at.unwrap_or(now)),
                    to_millis(bookmark.updated_at.unwrap_or(now)),
                    bookmark.deleted_at.map(to_millis),
                ],
            )?;
            insert_posts(&tx, &id, bookmark.posts.as_deref().unwrap_or_default())?;
            tx.commit()
        })();
        record_db_query("create", start.elapsed());

        match result {
            Ok(()) => {
                debug!("Created bookmark {} for {}", id, bookmark.owner_id);
                Ok(Outcome::new(bookmark.id, OperationStatus::CreateSuccess))
            }
            Err(e) if is_unique_violation(&e) => Err(OperationError::new(
                OperationStatus::Duplicate,
                format!("owner {} already has a bookmark", bookmark.owner_id),
            )),
            Err(e) => Err(store_error(OperationStatus::CreateFailed, "create", e)),
        }
    }

    fn update(&self, bookmark: &Bookmark, id: &BookmarkId) -> OperationResult<()> {
        let start = Instant::now();
        let mut conn = self.conn.lock().unwrap();
        let key = id.to_string();
        let updated_at = to_millis(bookmark.updated_at.unwrap_or_else(Utc::now));

        let result = (|| -> rusqlite::Result<usize> {
            let tx = conn.transaction()?;
            let matched = tx.execute(
                "UPDATE bookmark
                 SET owner_id = ?1, created_at = COALESCE(?2, created_at), updated_at = ?3,
                     deleted_at = ?4
                 WHERE id = ?5",
                params![
                    bookmark.owner_id,
                    bookmark.created_at.map(to_millis),
                    updated_at,
                    bookmark.deleted_at.map(to_millis),
                    key,
                ],
            )?;
            if matched != 1 {
                return Ok(matched);
            }
            tx.execute(
                "DELETE FROM bookmark_post WHERE bookmark_id = ?1",
                params![key],
            )?;
            insert_posts(&tx, &key, bookmark.posts.as_deref().unwrap_or_default())?;
            tx.commit()?;
            Ok(matched)
        })();
        record_db_query("update", start.elapsed());

        match result {
            Ok(1) => Ok(Outcome::status(OperationStatus::UpdateSuccess)),
            Ok(matched) => Err(OperationError::new(
                OperationStatus::UpdateFailed,
                format!("update of bookmark {} matched {} documents", id, matched),
            )),
            Err(e) => Err(store_error(OperationStatus::UpdateFailed, "update", e)),
        }
    }

    fn add_posts(&self, owner_id: &str, post_ids: &[String]) -> OperationResult<()> {
        let start = Instant::now();
        let mut conn = self.conn.lock().unwrap();
        let result = union_posts(&mut conn, owner_id, post_ids, to_millis(Utc::now()));
        record_db_query("add_posts", start.elapsed());

        match result {
            Ok(Some(inserted)) => {
                debug!(
                    "Added {} of {} posts to the bookmark of {}",
                    inserted,
                    post_ids.len(),
                    owner_id
                );
                Ok(Outcome::status(OperationStatus::PostSuccess))
            }
            Ok(None) => Err(OperationError::new(
                OperationStatus::NotExist,
                format!("owner {} has no bookmark", owner_id),
            )),
            Err(e) => Err(store_error(OperationStatus::PostFailed, "add_posts", e)),
        }
    }

    fn revoke_posts(&self, owner_id: &str, post_ids: &[String]) -> OperationResult<()> {
        let start = Instant::now();
        let mut conn = self.conn.lock().unwrap();
        let result = subtract_posts(&mut conn, owner_id, post_ids, to_millis(Utc::now()));
        record_db_query("revoke_posts", start.elapsed());

        match result {
            Ok(Some(removed)) => {
                debug!(
                    "Removed {} of {} posts from the bookmark of {}",
                    removed,
                    post_ids.len(),
                    owner_id
                );
                Ok(Outcome::status(OperationStatus::DeletePostSuccess))
            }
            Ok(None) => Err(OperationError::new(
                OperationStatus::NotExist,
                format!("owner {} has no bookmark", owner_id),
            )),
            Err(e) => Err(store_error(
                OperationStatus::DeletePostFailed,
                "revoke_posts",
                e,
            )),
        }
    }

    fn delete(&self, id: &BookmarkId) -> OperationResult<()> {
        if id.is_nil() {
            return Err(OperationError::new(
                OperationStatus::NotExist,
                "invalid bookmark id",
            ));
        }

        let start = Instant::now();
        let mut conn = self.conn.lock().unwrap();
        let key = id.to_string();

        let result = (|| -> rusqlite::Result<usize> {
            let tx = conn.transaction()?;
            tx.execute(
                "DELETE FROM bookmark_post WHERE bookmark_id = ?1",
                params![key],
            )?;
            let deleted = tx.execute("DELETE FROM bookmark WHERE id = ?1", params![key])?;
            tx.commit()?;
            Ok(deleted)
        })();
        record_db_query("delete", start.elapsed());

        match result {
            Ok(0) => Err(OperationError::new(
                OperationStatus::NotExist,
                format!("bookmark {} does not exist", id),
            )),
            Ok(_) => Ok(Outcome::status(OperationStatus::DeleteSuccess)),
            Err(e) => Err(store_error(OperationStatus::DeleteFailed, "delete", e)),
        }
    }
}
