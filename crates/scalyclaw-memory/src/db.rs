use std::sync::Once;

use rusqlite::Connection;
use tracing::warn;

static REGISTER_VEC: Once = Once::new();

/// Registers `sqlite-vec` as an auto-extension so every connection opened
/// after this call (including in-memory ones used by tests) gets `vec0`
/// for free. Must run before the first `Connection::open`.
fn register_vec_extension() {
    REGISTER_VEC.call_once(|| unsafe {
        rusqlite::ffi::sqlite3_auto_extension(Some(std::mem::transmute(
            sqlite_vec::sqlite3_vec_init as *const (),
        )));
    });
}

/// Opens (or creates) the database file with the teacher's pragmas and runs
/// every `CREATE TABLE IF NOT EXISTS`. Safe to call on every startup.
pub fn open(path: &str) -> rusqlite::Result<Connection> {
    register_vec_extension();
    let conn = Connection::open(path)?;
    conn.pragma_update(None, "busy_timeout", 5000)?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    init_db(&conn)?;
    Ok(conn)
}

/// Initialise schema. Idempotent.
pub fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    create_messages_table(conn)?;
    create_usage_logs_table(conn)?;
    create_memories_tables(conn)?;
    Ok(())
}

fn create_messages_table(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS messages (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            channel     TEXT NOT NULL,
            role        TEXT NOT NULL,
            content     TEXT NOT NULL,
            metadata    TEXT,
            blocked     INTEGER NOT NULL DEFAULT 0,
            scheduled_source INTEGER NOT NULL DEFAULT 0,
            created_at  TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_messages_channel
            ON messages(channel, created_at);",
    )
}

fn create_usage_logs_table(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS usage_logs (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            timestamp       TEXT NOT NULL,
            model           TEXT NOT NULL,
            provider        TEXT NOT NULL,
            input_tokens    INTEGER NOT NULL,
            output_tokens   INTEGER NOT NULL,
            call_type       TEXT NOT NULL,
            agent_id        TEXT,
            channel_id      TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_usage_timestamp_model
            ON usage_logs(timestamp, model);",
    )
}

fn create_memories_tables(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS memories (
            id          TEXT PRIMARY KEY,
            subject     TEXT NOT NULL,
            content     TEXT NOT NULL,
            memory_type TEXT,
            embedding   BLOB,
            expires_at  TEXT,
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS memory_tags (
            memory_id   TEXT NOT NULL REFERENCES memories(id) ON DELETE CASCADE,
            tag         TEXT NOT NULL,
            PRIMARY KEY (memory_id, tag)
        );
        CREATE INDEX IF NOT EXISTS idx_memory_tags_tag ON memory_tags(tag);
        CREATE VIRTUAL TABLE IF NOT EXISTS memories_fts
            USING fts5(subject, content, tags, content='', content_rowid='rowid');",
    )?;
    // rowid-based FTS external content needs a stable integer rowid; memories
    // uses a TEXT primary key, so memories_fts is kept in sync manually via
    // the implicit sqlite rowid rather than a content_rowid reference to id.
    Ok(())
}

/// Creates the `vec0` virtual table over memory ids. Returns `true` on
/// success. A missing/unloadable extension is not fatal — callers fall
/// back to FTS-only search (spec.md §4.2 "when the vector extension
/// loads").
pub fn try_load_vector_index(conn: &Connection, embedding_dim: usize) -> bool {
    let result = conn.execute_batch(&format!(
        "CREATE VIRTUAL TABLE IF NOT EXISTS memories_vec
            USING vec0(memory_id TEXT PRIMARY KEY, embedding FLOAT[{embedding_dim}]);"
    ));

    match result {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "vector index unavailable, falling back to FTS-only memory search");
            false
        }
    }
}
