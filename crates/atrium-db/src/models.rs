/// Database row types. These map directly to SQLite rows and stay free of
/// the API models so the DB layer has no dependency on the HTTP surface.

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct MessageRow {
    pub id: i64,
    pub user_id: i64,
    pub room_id: i64,
    pub file_url: Option<String>,
    pub kind: String,
    pub content: String,
    pub created_at: String,
}

/// Column values for a message insert. The id and timestamp come from SQLite.
#[derive(Debug, Clone)]
pub struct NewMessageRow<'a> {
    pub user_id: i64,
    pub room_id: i64,
    pub file_url: Option<&'a str>,
    pub kind: &'a str,
    pub content: &'a str,
}
