use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub const LATEST_VERSION: i64 = 1;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (users, posts, votes)");
        conn.execute_batch(
            "
            BEGIN;

            CREATE TABLE users (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                email       TEXT NOT NULL UNIQUE,
                password    TEXT NOT NULL,
                name        TEXT NOT NULL,
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE posts (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                title       TEXT NOT NULL,
                content     TEXT NOT NULL,
                published   INTEGER NOT NULL DEFAULT 1,
                rating      INTEGER,
                created_at  TEXT NOT NULL DEFAULT (datetime('now')),
                owner_id    INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE
            );

            CREATE INDEX idx_posts_owner ON posts(owner_id);

            -- One row per (user, post): the primary key is what rejects a racing duplicate like.
            CREATE TABLE votes (
                user_id     INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                post_id     INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
                PRIMARY KEY (user_id, post_id)
            );

            CREATE INDEX idx_votes_post ON votes(post_id);

            INSERT INTO schema_version (version) VALUES (1);

            COMMIT;
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
