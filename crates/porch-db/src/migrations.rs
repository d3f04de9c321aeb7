use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          TEXT PRIMARY KEY,
            name        TEXT NOT NULL,
            city        TEXT,
            area        TEXT,
            created_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_users_name ON users(name);

        -- The two halves of every follow edge, written separately
        CREATE TABLE IF NOT EXISTS following (
            user_id     TEXT NOT NULL REFERENCES users(id),
            target_id   TEXT NOT NULL REFERENCES users(id),
            created_at  TEXT NOT NULL,
            PRIMARY KEY (user_id, target_id)
        );

        CREATE TABLE IF NOT EXISTS followers (
            user_id     TEXT NOT NULL REFERENCES users(id),
            follower_id TEXT NOT NULL REFERENCES users(id),
            created_at  TEXT NOT NULL,
            PRIMARY KEY (user_id, follower_id)
        );

        CREATE TABLE IF NOT EXISTS posts (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            author_id   TEXT NOT NULL REFERENCES users(id),
            text        TEXT NOT NULL DEFAULT '',
            media_url   TEXT,
            deleted_at  TEXT,
            created_at  TEXT NOT NULL,
            updated_at  TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_posts_author
            ON posts(author_id, id);

        CREATE TABLE IF NOT EXISTS post_likes (
            post_id     INTEGER NOT NULL REFERENCES posts(id),
            user_id     TEXT NOT NULL,
            created_at  TEXT NOT NULL,
            PRIMARY KEY (post_id, user_id)
        );

        CREATE TABLE IF NOT EXISTS post_comments (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            post_id     INTEGER NOT NULL REFERENCES posts(id),
            author_id   TEXT NOT NULL,
            text        TEXT NOT NULL,
            created_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_comments_post
            ON post_comments(post_id, id);

        -- pair_lo/pair_hi hold the sorted participant ids so a thread is one index range
        CREATE TABLE IF NOT EXISTS messages (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            sender_id       TEXT NOT NULL,
            recipient_id    TEXT NOT NULL,
            pair_lo         TEXT NOT NULL,
            pair_hi         TEXT NOT NULL,
            text            TEXT NOT NULL,
            nonce           TEXT,
            created_at      TEXT NOT NULL,
            read_at         TEXT,
            UNIQUE(sender_id, recipient_id, nonce)
        );

        CREATE INDEX IF NOT EXISTS idx_messages_pair
            ON messages(pair_lo, pair_hi, id);

        CREATE TABLE IF NOT EXISTS notifications (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            recipient_id    TEXT NOT NULL,
            kind            TEXT NOT NULL,
            actor_id        TEXT NOT NULL,
            entity_id       INTEGER,
            read            INTEGER NOT NULL DEFAULT 0,
            created_at      TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_notifications_recipient
            ON notifications(recipient_id, id);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
