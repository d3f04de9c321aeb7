use std::collections::{HashMap, HashSet};

use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use uuid::Uuid;

use porch_social::conversation::pair_key;
use porch_social::store::{
    AppendOutcome, DanglingEdge, EdgeSide, Edges, GraphStore, MessageStore, NotificationStore,
    PostStore, StoreResult, UserStore,
};
use porch_types::models::{
    Comment, Message, NewNotification, Notification, Post, User, UserSummary,
};

use crate::Database;
use crate::models::{
    CommentRow, MessageRow, NotificationRow, PostRow, UserRow, now, parse_ts, parse_uuid,
};

const USER_COLUMNS: &str = "id, name, city, area, created_at";
const POST_COLUMNS: &str = "id, author_id, text, media_url, deleted_at, created_at, updated_at";
const MESSAGE_COLUMNS: &str = "id, sender_id, recipient_id, text, nonce, created_at, read_at";
const NOTIFICATION_COLUMNS: &str = "id, recipient_id, kind, actor_id, entity_id, read, created_at";

// -- Users --

impl UserStore for Database {
    fn get_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let row = self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
                [id.to_string()],
                map_user,
            )
            .optional()
        })?;
        Ok(row.map(UserRow::into_user))
    }

    fn upsert_user(&self, user: &User) -> StoreResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, name, city, area, created_at) VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name, city = excluded.city, area = excluded.area",
                params![
                    user.id.to_string(),
                    user.name,
                    user.city,
                    user.area,
                    user.created_at.to_rfc3339()
                ],
            )?;
            Ok(())
        })
    }

    fn list_users(&self, limit: usize) -> StoreResult<Vec<UserSummary>> {
        let rows = self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM users ORDER BY name, id LIMIT ?1",
                USER_COLUMNS
            ))?;
            let rows = stmt
                .query_map([limit as i64], map_user)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })?;
        Ok(rows.into_iter().map(UserRow::into_summary).collect())
    }

    fn get_summaries(&self, ids: &[Uuid]) -> StoreResult<Vec<UserSummary>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        let rows = self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM users WHERE id IN ({}) ORDER BY name, id",
                USER_COLUMNS,
                placeholders(1, ids.len())
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(ids.iter().map(|id| id.to_string())), map_user)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })?;
        Ok(rows.into_iter().map(UserRow::into_summary).collect())
    }
}

// -- Follow edges --

/// (table, column holding the other user) for one side of an edge.
fn edge_table(side: EdgeSide) -> (&'static str, &'static str) {
    match side {
        EdgeSide::Following => ("following", "target_id"),
        EdgeSide::Followers => ("followers", "follower_id"),
    }
}

impl GraphStore for Database {
    fn get_edges(&self, user_id: Uuid) -> StoreResult<Option<Edges>> {
        let id = user_id.to_string();
        self.with_conn(|conn| {
            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1)",
                [&id],
                |row| row.get(0),
            )?;
            if !exists {
                return Ok(None);
            }

            let following = query_ids(conn, "SELECT target_id FROM following WHERE user_id = ?1", &id)?;
            let followers = query_ids(conn, "SELECT follower_id FROM followers WHERE user_id = ?1", &id)?;
            Ok(Some(Edges {
                following,
                followers,
            }))
        })
    }

    fn add_edge(&self, side: EdgeSide, owner: Uuid, other: Uuid) -> StoreResult<bool> {
        let (table, column) = edge_table(side);
        self.with_conn(|conn| {
            let inserted = conn.execute(
                &format!(
                    "INSERT OR IGNORE INTO {} (user_id, {}, created_at) VALUES (?1, ?2, ?3)",
                    table, column
                ),
                params![owner.to_string(), other.to_string(), now()],
            )?;
            Ok(inserted > 0)
        })
    }

    fn remove_edge(&self, side: EdgeSide, owner: Uuid, other: Uuid) -> StoreResult<bool> {
        let (table, column) = edge_table(side);
        self.with_conn(|conn| {
            let deleted = conn.execute(
                &format!("DELETE FROM {} WHERE user_id = ?1 AND {} = ?2", table, column),
                params![owner.to_string(), other.to_string()],
            )?;
            Ok(deleted > 0)
        })
    }

    fn dangling_edges(&self) -> StoreResult<Vec<DanglingEdge>> {
        self.with_conn(|conn| {
            let mut dangling = query_dangling(
                conn,
                EdgeSide::Following,
                "SELECT f.user_id, f.target_id FROM following f
                 LEFT JOIN followers r ON r.user_id = f.target_id AND r.follower_id = f.user_id
                 WHERE r.user_id IS NULL",
            )?;
            dangling.extend(query_dangling(
                conn,
                EdgeSide::Followers,
                "SELECT r.user_id, r.follower_id FROM followers r
                 LEFT JOIN following f ON f.user_id = r.follower_id AND f.target_id = r.user_id
                 WHERE f.user_id IS NULL",
            )?);
            Ok(dangling)
        })
    }
}

// -- Posts --

impl PostStore for Database {
    fn insert_post(&self, author_id: Uuid, text: &str, media_url: Option<&str>) -> StoreResult<Post> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO posts (author_id, text, media_url, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![author_id.to_string(), text, media_url, now()],
            )?;
            let id = conn.last_insert_rowid();
            load_post(conn, id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)
        })
    }

    fn get_post(&self, id: i64) -> StoreResult<Option<Post>> {
        self.with_conn(|conn| load_post(conn, id))
    }

    fn update_post(
        &self,
        id: i64,
        text: Option<&str>,
        media_url: Option<&str>,
    ) -> StoreResult<Option<Post>> {
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE posts SET text = COALESCE(?2, text), media_url = COALESCE(?3, media_url),
                    updated_at = ?4
                 WHERE id = ?1",
                params![id, text, media_url, now()],
            )?;
            if updated == 0 {
                return Ok(None);
            }
            load_post(conn, id)
        })
    }

    fn soft_delete_post(&self, id: i64) -> StoreResult<bool> {
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE posts SET deleted_at = ?2 WHERE id = ?1 AND deleted_at IS NULL",
                params![id, now()],
            )?;
            Ok(updated > 0)
        })
    }

    fn toggle_like(&self, post_id: i64, user_id: Uuid) -> StoreResult<Option<(bool, usize)>> {
        let uid = user_id.to_string();
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            if !post_exists(&tx, post_id)? {
                return Ok(None);
            }

            let removed = tx.execute(
                "DELETE FROM post_likes WHERE post_id = ?1 AND user_id = ?2",
                params![post_id, uid],
            )?;
            let liked = removed == 0;
            if liked {
                tx.execute(
                    "INSERT INTO post_likes (post_id, user_id, created_at) VALUES (?1, ?2, ?3)",
                    params![post_id, uid, now()],
                )?;
            }
            let count: i64 = tx.query_row(
                "SELECT COUNT(*) FROM post_likes WHERE post_id = ?1",
                [post_id],
                |row| row.get(0),
            )?;
            tx.commit()?;

            Ok(Some((liked, count as usize)))
        })
    }

    fn add_comment(&self, post_id: i64, author_id: Uuid, text: &str) -> StoreResult<Option<Comment>> {
        self.with_conn(|conn| {
            if !post_exists(conn, post_id)? {
                return Ok(None);
            }
            let created_at = now();
            conn.execute(
                "INSERT INTO post_comments (post_id, author_id, text, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![post_id, author_id.to_string(), text, created_at],
            )?;
            let row = CommentRow {
                id: conn.last_insert_rowid(),
                post_id,
                author_id: author_id.to_string(),
                text: text.to_string(),
                created_at,
            };
            Ok(Some(row.into_comment()))
        })
    }

    fn query_by_authors_before_id(
        &self,
        authors: &HashSet<Uuid>,
        cursor: Option<i64>,
        limit: usize,
    ) -> StoreResult<Vec<Post>> {
        if authors.is_empty() || limit == 0 {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let mut values: Vec<Value> = authors.iter().map(|a| Value::Text(a.to_string())).collect();
            let mut sql = format!(
                "SELECT {} FROM posts WHERE deleted_at IS NULL AND author_id IN ({})",
                POST_COLUMNS,
                placeholders(1, values.len())
            );
            if let Some(cursor) = cursor {
                values.push(Value::Integer(cursor));
                sql.push_str(&format!(" AND id < ?{}", values.len()));
            }
            values.push(Value::Integer(limit as i64));
            sql.push_str(&format!(" ORDER BY id DESC LIMIT ?{}", values.len()));

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(values.iter()), map_post)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            hydrate_posts(conn, rows)
        })
    }
}

// -- Messages --

impl MessageStore for Database {
    fn append_message(
        &self,
        sender_id: Uuid,
        recipient_id: Uuid,
        text: &str,
        nonce: Option<&str>,
    ) -> StoreResult<AppendOutcome> {
        let sender = sender_id.to_string();
        let (lo, hi) = pair_key(sender_id, recipient_id);
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            if let Some(nonce) = nonce {
                let existing = tx
                    .query_row(
                        &format!(
                            "SELECT {} FROM messages
                             WHERE sender_id = ?1 AND recipient_id = ?2 AND nonce = ?3",
                            MESSAGE_COLUMNS
                        ),
                        params![sender, recipient_id.to_string(), nonce],
                        map_message,
                    )
                    .optional()?;
                if let Some(row) = existing {
                    return Ok(AppendOutcome::Duplicate(row.into_message()));
                }
            }

            let created_at = now();
            tx.execute(
                "INSERT INTO messages (sender_id, recipient_id, pair_lo, pair_hi, text, nonce, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    sender,
                    recipient_id.to_string(),
                    lo.to_string(),
                    hi.to_string(),
                    text,
                    nonce,
                    created_at
                ],
            )?;
            let row = MessageRow {
                id: tx.last_insert_rowid(),
                sender_id: sender.clone(),
                recipient_id: recipient_id.to_string(),
                text: text.to_string(),
                nonce: nonce.map(str::to_string),
                created_at,
                read_at: None,
            };
            tx.commit()?;

            Ok(AppendOutcome::Created(row.into_message()))
        })
    }

    fn thread(&self, a: Uuid, b: Uuid, after: Option<i64>) -> StoreResult<Vec<Message>> {
        let (lo, hi) = pair_key(a, b);
        let rows = self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM messages
                 WHERE pair_lo = ?1 AND pair_hi = ?2 AND id > ?3
                 ORDER BY id ASC",
                MESSAGE_COLUMNS
            ))?;
            let rows = stmt
                .query_map(
                    params![lo.to_string(), hi.to_string(), after.unwrap_or(0)],
                    map_message,
                )?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })?;
        Ok(rows.into_iter().map(MessageRow::into_message).collect())
    }

    fn mark_thread_read(&self, reader: Uuid, peer: Uuid) -> StoreResult<usize> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE messages SET read_at = ?3
                 WHERE sender_id = ?1 AND recipient_id = ?2 AND read_at IS NULL",
                params![peer.to_string(), reader.to_string(), now()],
            )
        })
    }
}

// -- Notifications --

impl NotificationStore for Database {
    fn insert_notification(&self, n: &NewNotification) -> StoreResult<Notification> {
        self.with_conn(|conn| {
            let created_at = now();
            conn.execute(
                "INSERT INTO notifications (recipient_id, kind, actor_id, entity_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    n.recipient_id.to_string(),
                    n.kind.as_str(),
                    n.actor_id.to_string(),
                    n.entity_id,
                    created_at
                ],
            )?;
            Ok(Notification {
                id: conn.last_insert_rowid(),
                recipient_id: n.recipient_id,
                kind: n.kind,
                actor_id: n.actor_id,
                entity_id: n.entity_id,
                read: false,
                created_at: parse_ts(&created_at, "notification created_at"),
            })
        })
    }

    fn list_by_recipient(&self, recipient: Uuid, limit: usize) -> StoreResult<Vec<Notification>> {
        let rows = self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM notifications WHERE recipient_id = ?1 ORDER BY id DESC LIMIT ?2",
                NOTIFICATION_COLUMNS
            ))?;
            let rows = stmt
                .query_map(params![recipient.to_string(), limit as i64], |row| {
                    Ok(NotificationRow {
                        id: row.get(0)?,
                        recipient_id: row.get(1)?,
                        kind: row.get(2)?,
                        actor_id: row.get(3)?,
                        entity_id: row.get(4)?,
                        read: row.get(5)?,
                        created_at: row.get(6)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })?;
        Ok(rows
            .into_iter()
            .filter_map(NotificationRow::into_notification)
            .collect())
    }

    fn mark_all_read(&self, recipient: Uuid) -> StoreResult<usize> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE notifications SET read = 1 WHERE recipient_id = ?1 AND read = 0",
                [recipient.to_string()],
            )
        })
    }
}

// -- Helpers --

/// "?start, ?start+1, ..." for `count` parameters.
fn placeholders(start: usize, count: usize) -> String {
    (start..start + count)
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ")
}

fn map_user(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        name: row.get(1)?,
        city: row.get(2)?,
        area: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn map_post(row: &Row<'_>) -> rusqlite::Result<PostRow> {
    Ok(PostRow {
        id: row.get(0)?,
        author_id: row.get(1)?,
        text: row.get(2)?,
        media_url: row.get(3)?,
        deleted_at: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn map_message(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        sender_id: row.get(1)?,
        recipient_id: row.get(2)?,
        text: row.get(3)?,
        nonce: row.get(4)?,
        created_at: row.get(5)?,
        read_at: row.get(6)?,
    })
}

fn query_ids(conn: &Connection, sql: &str, id: &str) -> rusqlite::Result<HashSet<Uuid>> {
    let mut stmt = conn.prepare(sql)?;
    let ids = stmt
        .query_map([id], |row| row.get::<_, String>(0))?
        .map(|raw| raw.map(|raw| parse_uuid(&raw, "edge user id")))
        .collect();
    ids
}

fn query_dangling(conn: &Connection, side: EdgeSide, sql: &str) -> rusqlite::Result<Vec<DanglingEdge>> {
    let mut stmt = conn.prepare(sql)?;
    let edges = stmt
        .query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?
        .map(|pair| {
            pair.map(|(owner, other)| DanglingEdge {
                side,
                owner: parse_uuid(&owner, "edge owner"),
                other: parse_uuid(&other, "edge other"),
            })
        })
        .collect();
    edges
}

fn post_exists(conn: &Connection, post_id: i64) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM posts WHERE id = ?1)",
        [post_id],
        |row| row.get(0),
    )
}

fn load_post(conn: &Connection, id: i64) -> rusqlite::Result<Option<Post>> {
    let row = conn
        .query_row(
            &format!("SELECT {} FROM posts WHERE id = ?1", POST_COLUMNS),
            [id],
            map_post,
        )
        .optional()?;
    match row {
        Some(row) => Ok(hydrate_posts(conn, vec![row])?.pop()),
        None => Ok(None),
    }
}

/// Attach likes and comments to a page of posts with two batch queries.
fn hydrate_posts(conn: &Connection, rows: Vec<PostRow>) -> rusqlite::Result<Vec<Post>> {
    if rows.is_empty() {
        return Ok(vec![]);
    }
    let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
    let marks = placeholders(1, ids.len());

    let mut likes: HashMap<i64, Vec<Uuid>> = HashMap::new();
    {
        let mut stmt = conn.prepare(&format!(
            "SELECT post_id, user_id FROM post_likes WHERE post_id IN ({}) ORDER BY created_at",
            marks
        ))?;
        let pairs = stmt.query_map(params_from_iter(ids.iter()), |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
        })?;
        for pair in pairs {
            let (post_id, user_id) = pair?;
            likes
                .entry(post_id)
                .or_default()
                .push(parse_uuid(&user_id, "like user_id"));
        }
    }

    let mut comments: HashMap<i64, Vec<Comment>> = HashMap::new();
    {
        let mut stmt = conn.prepare(&format!(
            "SELECT id, post_id, author_id, text, created_at FROM post_comments
             WHERE post_id IN ({}) ORDER BY id",
            marks
        ))?;
        let rows = stmt.query_map(params_from_iter(ids.iter()), |row| {
            Ok(CommentRow {
                id: row.get(0)?,
                post_id: row.get(1)?,
                author_id: row.get(2)?,
                text: row.get(3)?,
                created_at: row.get(4)?,
            })
        })?;
        for row in rows {
            let comment = row?.into_comment();
            comments.entry(comment.post_id).or_default().push(comment);
        }
    }

    Ok(rows
        .into_iter()
        .map(|row| {
            let id = row.id;
            row.into_post(
                likes.remove(&id).unwrap_or_default(),
                comments.remove(&id).unwrap_or_default(),
            )
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use porch_types::models::NotificationKind;

    fn user(db: &Database, name: &str) -> Uuid {
        let user = User {
            id: Uuid::new_v4(),
            name: name.to_string(),
            city: Some("Leeds".into()),
            area: None,
            created_at: Utc::now(),
        };
        db.upsert_user(&user).unwrap();
        user.id
    }

    #[test]
    fn edges_are_written_per_side() {
        let db = Database::open_in_memory().unwrap();
        let a = user(&db, "a");
        let b = user(&db, "b");

        assert!(db.get_edges(Uuid::new_v4()).unwrap().is_none());
        assert_eq!(db.get_edges(a).unwrap(), Some(Edges::default()));

        assert!(db.add_edge(EdgeSide::Following, a, b).unwrap());
        assert!(!db.add_edge(EdgeSide::Following, a, b).unwrap());
        let dangling = db.dangling_edges().unwrap();
        assert_eq!(
            dangling,
            vec![DanglingEdge {
                side: EdgeSide::Following,
                owner: a,
                other: b
            }]
        );

        assert!(db.add_edge(EdgeSide::Followers, b, a).unwrap());
        assert!(db.dangling_edges().unwrap().is_empty());
        assert!(db.get_edges(a).unwrap().unwrap().following.contains(&b));
        assert!(db.get_edges(b).unwrap().unwrap().followers.contains(&a));

        assert!(db.remove_edge(EdgeSide::Followers, b, a).unwrap());
        assert!(!db.remove_edge(EdgeSide::Followers, b, a).unwrap());
        assert_eq!(db.dangling_edges().unwrap().len(), 1);
    }

    #[test]
    fn upsert_keeps_identity_and_edges() {
        let db = Database::open_in_memory().unwrap();
        let a = user(&db, "a");
        let b = user(&db, "b");
        db.add_edge(EdgeSide::Following, a, b).unwrap();

        let mut renamed = db.get_user(a).unwrap().unwrap();
        renamed.name = "Ada".into();
        db.upsert_user(&renamed).unwrap();

        assert_eq!(db.get_user(a).unwrap().unwrap().name, "Ada");
        assert!(db.get_edges(a).unwrap().unwrap().following.contains(&b));
        let names: Vec<String> = db.list_users(10).unwrap().into_iter().map(|u| u.name).collect();
        assert_eq!(names, ["Ada", "b"]);
    }

    #[test]
    fn author_query_respects_cursor_and_soft_delete() {
        let db = Database::open_in_memory().unwrap();
        let a = user(&db, "a");
        let b = user(&db, "b");
        let c = user(&db, "c");

        let mut ids = Vec::new();
        for (i, author) in [a, b, c, a, b, c].into_iter().enumerate() {
            ids.push(db.insert_post(author, &format!("post {}", i), None).unwrap().id);
        }
        db.soft_delete_post(ids[3]).unwrap();

        let authors: HashSet<Uuid> = [a, b].into_iter().collect();
        let page = db.query_by_authors_before_id(&authors, None, 10).unwrap();
        let got: Vec<i64> = page.iter().map(|p| p.id).collect();
        assert_eq!(got, vec![ids[4], ids[1], ids[0]]);

        let page = db.query_by_authors_before_id(&authors, Some(ids[4]), 1).unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, ids[1]);

        assert!(db.query_by_authors_before_id(&HashSet::new(), None, 10).unwrap().is_empty());
    }

    #[test]
    fn likes_and_comments_are_embedded() {
        let db = Database::open_in_memory().unwrap();
        let a = user(&db, "a");
        let b = user(&db, "b");
        let post = db.insert_post(a, "free sofa", Some("https://cdn/sofa.jpg")).unwrap();

        assert_eq!(db.toggle_like(post.id, b).unwrap(), Some((true, 1)));
        db.add_comment(post.id, b, "still there?").unwrap().unwrap();

        let loaded = db.get_post(post.id).unwrap().unwrap();
        assert_eq!(loaded.likes, vec![b]);
        assert_eq!(loaded.comments.len(), 1);
        assert_eq!(loaded.media_url.as_deref(), Some("https://cdn/sofa.jpg"));

        assert_eq!(db.toggle_like(post.id, b).unwrap(), Some((false, 0)));
        assert_eq!(db.toggle_like(9_999, b).unwrap(), None);
        assert!(db.add_comment(9_999, b, "hi").unwrap().is_none());

        let edited = db.update_post(post.id, Some("sold"), None).unwrap().unwrap();
        assert_eq!(edited.text, "sold");
        assert_eq!(edited.media_url.as_deref(), Some("https://cdn/sofa.jpg"));
    }

    #[test]
    fn threads_are_symmetric_and_nonce_is_unique_per_conversation() {
        let db = Database::open_in_memory().unwrap();
        let a = user(&db, "a");
        let b = user(&db, "b");

        let first = match db.append_message(a, b, "hi", Some("k1")).unwrap() {
            AppendOutcome::Created(m) => m,
            other => panic!("expected new message, got {:?}", other),
        };
        assert!(matches!(
            db.append_message(a, b, "hi", Some("k1")).unwrap(),
            AppendOutcome::Duplicate(ref m) if m.id == first.id
        ));
        // Same nonce from the other sender is a different message
        assert!(matches!(
            db.append_message(b, a, "hey", Some("k1")).unwrap(),
            AppendOutcome::Created(_)
        ));
        db.append_message(a, b, "no nonce", None).unwrap();
        db.append_message(a, b, "no nonce either", None).unwrap();

        // Same nonce to another recipient is a different message
        let c = user(&db, "c");
        match db.append_message(a, c, "for c", Some("k1")).unwrap() {
            AppendOutcome::Created(m) => assert_eq!(m.recipient_id, c),
            other => panic!("expected new message, got {:?}", other),
        }
        assert_eq!(db.thread(a, c, None).unwrap().len(), 1);

        let ab = db.thread(a, b, None).unwrap();
        assert_eq!(ab, db.thread(b, a, None).unwrap());
        assert_eq!(ab.len(), 4);
        assert_eq!(db.thread(a, b, Some(first.id)).unwrap().len(), 3);

        assert_eq!(db.mark_thread_read(b, a).unwrap(), 3);
        assert_eq!(db.mark_thread_read(b, a).unwrap(), 0);
    }

    #[test]
    fn notifications_newest_first() {
        let db = Database::open_in_memory().unwrap();
        let me = Uuid::new_v4();
        let them = Uuid::new_v4();
        for kind in [NotificationKind::Follow, NotificationKind::Like] {
            db.insert_notification(&NewNotification {
                recipient_id: me,
                kind,
                actor_id: them,
                entity_id: None,
            })
            .unwrap();
        }

        let rows = db.list_by_recipient(me, 10).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].kind, NotificationKind::Like);
        assert_eq!(db.mark_all_read(me).unwrap(), 2);
        assert!(db.list_by_recipient(me, 10).unwrap().iter().all(|n| n.read));
    }

    #[test]
    fn data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("porch.db");
        let id = {
            let db = Database::open(&path).unwrap();
            user(&db, "persisted")
        };

        let db = Database::open(&path).unwrap();
        assert_eq!(db.get_user(id).unwrap().unwrap().name, "persisted");
    }
}
