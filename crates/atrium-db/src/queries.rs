use crate::Database;
use crate::models::{MessageRow, NewMessageRow, UserRow};
use anyhow::Result;
use rusqlite::{Connection, Row};

const MESSAGE_COLUMNS: &str = "id, user_id, room_id, file_url, kind, content, created_at";

impl Database {
    // -- Users --

    /// Insert a user, or rename it if the id is already taken.
    pub fn create_user(&self, id: i64, username: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, username) VALUES (?1, ?2)
                 ON CONFLICT(id) DO UPDATE SET username = excluded.username",
                rusqlite::params![id, username],
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_id(conn, id))
    }

    // -- Messages --

    /// Insert a message and read it back with its generated id and timestamp.
    pub fn insert_message(&self, msg: &NewMessageRow<'_>) -> Result<MessageRow> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (user_id, room_id, file_url, kind, content)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![msg.user_id, msg.room_id, msg.file_url, msg.kind, msg.content],
            )?;
            let id = conn.last_insert_rowid();
            query_message(conn, id)?
                .ok_or_else(|| anyhow::anyhow!("Message {} vanished after insert", id))
        })
    }

    pub fn get_message(&self, id: i64) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| query_message(conn, id))
    }

    /// Returns true if a row was deleted.
    pub fn delete_message(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute("DELETE FROM messages WHERE id = ?1", [id])?;
            Ok(n > 0)
        })
    }

    /// Messages in a room whose content contains `text`, oldest first.
    /// `instr` is a plain case-sensitive substring test, so `%` and `_` in
    /// the query match only themselves.
    pub fn search_messages(&self, room_id: i64, text: &str) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages
                 WHERE room_id = ?1 AND instr(content, ?2) > 0
                 ORDER BY id"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params![room_id, text], message_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// The newest `limit` messages of a room, returned oldest first.
    pub fn get_room_messages(&self, room_id: i64, limit: u32) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {MESSAGE_COLUMNS} FROM (
                     SELECT {MESSAGE_COLUMNS} FROM messages
                     WHERE room_id = ?1
                     ORDER BY id DESC
                     LIMIT ?2
                 ) ORDER BY id"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params![room_id, limit], message_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn query_user_by_id(conn: &Connection, id: i64) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare("SELECT id, username, created_at FROM users WHERE id = ?1")?;

    let row = stmt
        .query_row([id], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                username: row.get(1)?,
                created_at: row.get(2)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn query_message(conn: &Connection, id: i64) -> Result<Option<MessageRow>> {
    let sql = format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1");
    let mut stmt = conn.prepare(&sql)?;
    let row = stmt.query_row([id], message_from_row).optional()?;
    Ok(row)
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        room_id: row.get(2)?,
        file_url: row.get(3)?,
        kind: row.get(4)?,
        content: row.get(5)?,
        created_at: row.get(6)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db_with_user() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.create_user(1, "alice").unwrap();
        db
    }

    fn text(room_id: i64, content: &str) -> NewMessageRow<'_> {
        NewMessageRow {
            user_id: 1,
            room_id,
            file_url: None,
            kind: "text",
            content,
        }
    }

    #[test]
    fn user_lookup() {
        let db = db_with_user();
        let user = db.get_user_by_id(1).unwrap().unwrap();
        assert_eq!(user.username, "alice");
        assert!(db.get_user_by_id(2).unwrap().is_none());

        db.create_user(1, "alice2").unwrap();
        assert_eq!(db.get_user_by_id(1).unwrap().unwrap().username, "alice2");
    }

    #[test]
    fn insert_assigns_increasing_ids() {
        let db = db_with_user();
        let first = db
            .insert_message(&NewMessageRow {
                user_id: 1,
                room_id: 5,
                file_url: Some("http://x/files/a"),
                kind: "file",
                content: "a.png",
            })
            .unwrap();
        let second = db.insert_message(&text(5, "hello")).unwrap();

        assert!(second.id > first.id);
        assert_eq!(first.file_url.as_deref(), Some("http://x/files/a"));
        assert_eq!(first.kind, "file");
        assert!(!first.created_at.is_empty());

        let fetched = db.get_message(first.id).unwrap().unwrap();
        assert_eq!(fetched.content, "a.png");
        assert_eq!(fetched.room_id, 5);
    }

    #[test]
    fn insert_requires_existing_user() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.insert_message(&text(1, "orphan")).is_err());
    }

    #[test]
    fn delete_reports_whether_a_row_went_away() {
        let db = db_with_user();
        let msg = db.insert_message(&text(1, "bye")).unwrap();

        assert!(db.delete_message(msg.id).unwrap());
        assert!(!db.delete_message(msg.id).unwrap());
        assert!(db.get_message(msg.id).unwrap().is_none());
    }

    #[test]
    fn search_is_scoped_to_room_and_case_sensitive() {
        let db = db_with_user();
        db.insert_message(&text(1, "deploy at noon")).unwrap();
        db.insert_message(&text(1, "Deploy tomorrow")).unwrap();
        db.insert_message(&text(2, "deploy elsewhere")).unwrap();

        let hits = db.search_messages(1, "deploy").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].content, "deploy at noon");

        assert_eq!(db.search_messages(1, "").unwrap().len(), 2);
    }

    #[test]
    fn search_treats_like_wildcards_literally() {
        let db = db_with_user();
        db.insert_message(&text(1, "100% done")).unwrap();
        db.insert_message(&text(1, "nothing here")).unwrap();
        db.insert_message(&text(1, "snake_case")).unwrap();

        let pct = db.search_messages(1, "%").unwrap();
        assert_eq!(pct.len(), 1);
        assert_eq!(pct[0].content, "100% done");

        let underscore = db.search_messages(1, "_").unwrap();
        assert_eq!(underscore.len(), 1);
        assert_eq!(underscore[0].content, "snake_case");
    }

    #[test]
    fn room_messages_keep_newest_in_chronological_order() {
        let db = db_with_user();
        for i in 0..5 {
            db.insert_message(&text(3, &format!("m{}", i))).unwrap();
        }
        db.insert_message(&text(4, "other room")).unwrap();

        let rows = db.get_room_messages(3, 3).unwrap();
        let contents: Vec<_> = rows.iter().map(|r| r.content.as_str()).collect();
        assert_eq!(contents, ["m2", "m3", "m4"]);
    }
}
