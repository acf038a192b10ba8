//! SQLite schema definitions for the bookmark database.

use crate::sqlite_column;
use crate::sqlite_persistence::{
    Column, ForeignKey, ForeignKeyOnChange, SqlType, Table, UniqueIndex, VersionedSchema,
};
use anyhow::Result;
use rusqlite::Connection;

/// Timestamps are unix milliseconds.
const BOOKMARK_TABLE: Table = Table {
    name: "bookmark",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("owner_id", &SqlType::Text, non_null = true),
        sqlite_column!("created_at", &SqlType::Integer, non_null = true),
        sqlite_column!("updated_at", &SqlType::Integer, non_null = true),
        sqlite_column!("deleted_at", &SqlType::Integer),
    ],
    indices: &[],
    unique_indices: &[UniqueIndex {
        name: "idx_bookmark_live_owner",
        columns: &["owner_id"],
        predicate: Some("deleted_at IS NULL"),
    }],
    unique_constraints: &[],
};

const BOOKMARK_ID_FOREIGN_KEY: ForeignKey = ForeignKey {
    foreign_table: "bookmark",
    foreign_column: "id",
    on_delete: ForeignKeyOnChange::Cascade,
};

const BOOKMARK_POST_TABLE_V_0: Table = Table {
    name: "bookmark_post",
    columns: &[
        sqlite_column!(
            "bookmark_id",
            &SqlType::Text,
            non_null = true,
            foreign_key = Some(&BOOKMARK_ID_FOREIGN_KEY)
        ),
        sqlite_column!("post_id", &SqlType::Text, non_null = true),
        sqlite_column!("position", &SqlType::Integer, non_null = true),
    ],
    indices: &[],
    unique_indices: &[],
    unique_constraints: &[&["bookmark_id", "post_id"]],
};

/// V1 indexes post ids so bookmarks can later be looked up by the posts they reference.
const BOOKMARK_POST_TABLE_V_1: Table = Table {
    name: "bookmark_post",
    columns: &[
        sqlite_column!(
            "bookmark_id",
            &SqlType::Text,
            non_null = true,
            foreign_key = Some(&BOOKMARK_ID_FOREIGN_KEY)
        ),
        sqlite_column!("post_id", &SqlType::Text, non_null = true),
        sqlite_column!("position", &SqlType::Integer, non_null = true),
    ],
    indices: &[("idx_bookmark_post_post_id", "post_id")],
    unique_indices: &[],
    unique_constraints: &[&["bookmark_id", "post_id"]],
};

fn migrate_v0_to_v1(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_bookmark_post_post_id ON bookmark_post(post_id)",
        [],
    )?;
    Ok(())
}

pub const BOOKMARK_VERSIONED_SCHEMAS: &[VersionedSchema] = &[
    VersionedSchema {
        version: 0,
        tables: &[BOOKMARK_TABLE, BOOKMARK_POST_TABLE_V_0],
        migration: None,
    },
    VersionedSchema {
        version: 1,
        tables: &[BOOKMARK_TABLE, BOOKMARK_POST_TABLE_V_1],
        migration: Some(migrate_v0_to_v1),
    },
];
