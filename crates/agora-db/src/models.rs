/// Database row types. These map directly to SQLite rows and are kept
/// separate from the agora-types API models so the store has no wire concerns.

pub struct UserRow {
    pub id: i64,
    pub email: String,
    pub password: String,
    pub name: String,
    pub created_at: String,
}

/// A post's owner as returned alongside the post (no password column).
pub struct OwnerRow {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub created_at: String,
}

pub struct PostRow {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub published: bool,
    pub rating: Option<i64>,
    pub created_at: String,
    pub owner: OwnerRow,
}

pub struct PostWithVotesRow {
    pub post: PostRow,
    pub votes: i64,
}

// -- Inputs --

pub struct NewUser<'a> {
    pub email: &'a str,
    pub password_hash: &'a str,
    pub name: &'a str,
}

/// The complete set of columns a client may write on a post.
pub struct PostFields<'a> {
    pub title: &'a str,
    pub content: &'a str,
    pub published: bool,
    pub rating: Option<i64>,
}

pub struct PostFilter<'a> {
    pub limit: u32,
    pub skip: u32,
    /// Case-sensitive substring of the title; empty matches everything.
    pub search: &'a str,
}

// -- Outcomes --

pub enum CreateUserOutcome {
    Created(UserRow),
    EmailTaken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastOutcome {
    Cast,
    AlreadyVoted,
    PostMissing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetractOutcome {
    Retracted,
    NotVoted,
    PostMissing,
}
