use crate::Database;
use crate::models::{
    CastOutcome, CreateUserOutcome, NewUser, OwnerRow, PostFields, PostFilter, PostRow,
    PostWithVotesRow, RetractOutcome, UserRow,
};
use anyhow::Result;
use rusqlite::{Connection, ErrorCode, Row, ffi};
use tracing::info;

const POST_COLUMNS: &str = "p.id, p.title, p.content, p.published, p.rating, p.created_at,
     u.id, u.email, u.name, u.created_at";

impl Database {
    // -- Users --

    pub fn create_user(&self, new: &NewUser<'_>) -> Result<CreateUserOutcome> {
        self.with_conn_mut(|conn| {
            let inserted = conn.execute(
                "INSERT INTO users (email, password, name) VALUES (?1, ?2, ?3)",
                (new.email, new.password_hash, new.name),
            );

            match inserted {
                Ok(_) => {}
                Err(e) if constraint_of(&e) == Some(Constraint::Unique) => {
                    return Ok(CreateUserOutcome::EmailTaken);
                }
                Err(e) => return Err(e.into()),
            }

            let id = conn.last_insert_rowid();
            let row = query_user_by_id(conn, id)?
                .ok_or_else(|| anyhow::anyhow!("User {} vanished after insert", id))?;
            Ok(CreateUserOutcome::Created(row))
        })
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_id(conn, id))
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, email, password, name, created_at FROM users WHERE email = ?1",
                [email],
                map_user,
            )
            .optional()
        })
    }

    pub fn list_users(&self) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT id, email, password, name, created_at FROM users ORDER BY id")?;
            let rows = stmt
                .query_map([], map_user)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Deletes the user; posts and votes go with it through `ON DELETE CASCADE`.
    pub fn delete_user(&self, id: i64) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let deleted = conn.execute("DELETE FROM users WHERE id = ?1", [id])?;
            Ok(deleted > 0)
        })
    }

    // -- Posts --

    pub fn create_post(&self, owner_id: i64, fields: &PostFields<'_>) -> Result<PostRow> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO posts (title, content, published, rating, owner_id)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    fields.title,
                    fields.content,
                    fields.published,
                    fields.rating,
                    owner_id
                ],
            )?;
            let id = conn.last_insert_rowid();
            query_post(conn, id)?.ok_or_else(|| anyhow::anyhow!("Post {} vanished after insert", id))
        })
    }

    /// Post with owner and vote count, read in a single statement.
    pub fn get_post(&self, id: i64) -> Result<Option<PostWithVotesRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {POST_COLUMNS}, COUNT(v.post_id)
                 FROM posts p
                 JOIN users u ON u.id = p.owner_id
                 LEFT JOIN votes v ON v.post_id = p.id
                 WHERE p.id = ?1
                 GROUP BY p.id"
            );
            conn.query_row(&sql, [id], map_post_with_votes).optional()
        })
    }

    pub fn list_posts(&self, filter: &PostFilter<'_>) -> Result<Vec<PostWithVotesRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {POST_COLUMNS}, COUNT(v.post_id)
                 FROM posts p
                 JOIN users u ON u.id = p.owner_id
                 LEFT JOIN votes v ON v.post_id = p.id
                 WHERE instr(p.title, ?1) > 0
                 GROUP BY p.id
                 ORDER BY p.id
                 LIMIT ?2 OFFSET ?3"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(
                    rusqlite::params![filter.search, filter.limit, filter.skip],
                    map_post_with_votes,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_post_owner(&self, id: i64) -> Result<Option<i64>> {
        self.with_conn(|conn| {
            conn.query_row("SELECT owner_id FROM posts WHERE id = ?1", [id], |row| {
                row.get(0)
            })
            .optional()
        })
    }

    /// Replaces the writable fields of a post still owned by `owner_id`.
    /// Returns `None` when no such post exists any more.
    pub fn update_post(
        &self,
        id: i64,
        owner_id: i64,
        fields: &PostFields<'_>,
    ) -> Result<Option<PostRow>> {
        self.with_conn_mut(|conn| {
            let updated = conn.execute(
                "UPDATE posts SET title = ?1, content = ?2, published = ?3, rating = ?4
                 WHERE id = ?5 AND owner_id = ?6",
                rusqlite::params![
                    fields.title,
                    fields.content,
                    fields.published,
                    fields.rating,
                    id,
                    owner_id
                ],
            )?;
            if updated == 0 {
                return Ok(None);
            }
            query_post(conn, id)
        })
    }

    /// Deletes a post still owned by `owner_id`; its votes cascade.
    pub fn delete_post(&self, id: i64, owner_id: i64) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let deleted = conn.execute(
                "DELETE FROM posts WHERE id = ?1 AND owner_id = ?2",
                [id, owner_id],
            )?;
            Ok(deleted > 0)
        })
    }

    // -- Votes --

    /// Unvoted -> Voted. The composite primary key on `votes` is what rejects a
    /// second like, so two racing casts cannot both succeed.
    pub fn cast_vote(&self, user_id: i64, post_id: i64) -> Result<CastOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.unchecked_transaction()?;

            if !post_exists(&tx, post_id)? {
                return Ok(CastOutcome::PostMissing);
            }

            let inserted = tx.execute(
                "INSERT INTO votes (user_id, post_id) VALUES (?1, ?2)",
                [user_id, post_id],
            );

            let outcome = match inserted {
                Ok(_) => CastOutcome::Cast,
                Err(e) => match constraint_of(&e) {
                    Some(Constraint::Unique) => CastOutcome::AlreadyVoted,
                    Some(Constraint::ForeignKey) => CastOutcome::PostMissing,
                    None => return Err(e.into()),
                },
            };

            tx.commit()?;
            if outcome == CastOutcome::Cast {
                info!(user_id, post_id, "Vote cast");
            }
            Ok(outcome)
        })
    }

    /// Voted -> Unvoted.
    pub fn retract_vote(&self, user_id: i64, post_id: i64) -> Result<RetractOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.unchecked_transaction()?;

            if !post_exists(&tx, post_id)? {
                return Ok(RetractOutcome::PostMissing);
            }

            let deleted = tx.execute(
                "DELETE FROM votes WHERE user_id = ?1 AND post_id = ?2",
                [user_id, post_id],
            )?;
            tx.commit()?;

            if deleted == 0 {
                return Ok(RetractOutcome::NotVoted);
            }
            info!(user_id, post_id, "Vote retracted");
            Ok(RetractOutcome::Retracted)
        })
    }

    pub fn count_votes(&self, post_id: i64) -> Result<i64> {
        self.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*) FROM votes WHERE post_id = ?1",
                [post_id],
                |row| row.get(0),
            )?)
        })
    }

    pub fn has_voted(&self, user_id: i64, post_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM votes WHERE user_id = ?1 AND post_id = ?2)",
                [user_id, post_id],
                |row| row.get(0),
            )?)
        })
    }
}

fn query_user_by_id(conn: &Connection, id: i64) -> Result<Option<UserRow>> {
    conn.query_row(
        "SELECT id, email, password, name, created_at FROM users WHERE id = ?1",
        [id],
        map_user,
    )
    .optional()
}

fn query_post(conn: &Connection, id: i64) -> Result<Option<PostRow>> {
    let sql = format!(
        "SELECT {POST_COLUMNS}
         FROM posts p
         JOIN users u ON u.id = p.owner_id
         WHERE p.id = ?1"
    );
    conn.query_row(&sql, [id], map_post).optional()
}

fn post_exists(conn: &Connection, id: i64) -> Result<bool> {
    Ok(conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM posts WHERE id = ?1)",
        [id],
        |row| row.get(0),
    )?)
}

fn map_user(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        email: row.get(1)?,
        password: row.get(2)?,
        name: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn map_post(row: &Row<'_>) -> rusqlite::Result<PostRow> {
    Ok(PostRow {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        published: row.get(3)?,
        rating: row.get(4)?,
        created_at: row.get(5)?,
        owner: OwnerRow {
            id: row.get(6)?,
            email: row.get(7)?,
            name: row.get(8)?,
            created_at: row.get(9)?,
        },
    })
}

fn map_post_with_votes(row: &Row<'_>) -> rusqlite::Result<PostWithVotesRow> {
    Ok(PostWithVotesRow {
        post: map_post(row)?,
        votes: row.get(10)?,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Constraint {
    Unique,
    ForeignKey,
}

/// Classify a constraint violation so callers can turn it into a domain outcome.
fn constraint_of(err: &rusqlite::Error) -> Option<Constraint> {
    match err {
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation => {
            match e.extended_code {
                ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                    Some(Constraint::Unique)
                }
                ffi::SQLITE_CONSTRAINT_FOREIGNKEY => Some(Constraint::ForeignKey),
                _ => None,
            }
        }
        _ => None,
    }
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
    use crate::test_support::open_temp;

    fn user(db: &Database, email: &str) -> i64 {
        match db
            .create_user(&NewUser {
                email,
                password_hash: "$argon2id$fake",
                name: "someone",
            })
            .unwrap()
        {
            CreateUserOutcome::Created(row) => row.id,
            CreateUserOutcome::EmailTaken => panic!("email {email} already taken"),
        }
    }

    fn post(db: &Database, owner_id: i64, title: &str) -> i64 {
        db.create_post(
            owner_id,
            &PostFields {
                title,
                content: "body",
                published: true,
                rating: None,
            },
        )
        .unwrap()
        .id
    }

    #[test]
    fn duplicate_email_is_reported_not_raised() {
        let (db, _dir) = open_temp();
        user(&db, "alice@example.com");
        let again = db
            .create_user(&NewUser {
                email: "alice@example.com",
                password_hash: "x",
                name: "other",
            })
            .unwrap();
        assert!(matches!(again, CreateUserOutcome::EmailTaken));
        assert_eq!(db.list_users().unwrap().len(), 1);
    }

    #[test]
    fn post_carries_owner_and_defaults() {
        let (db, _dir) = open_temp();
        let alice = user(&db, "alice@example.com");
        let row = db
            .create_post(
                alice,
                &PostFields {
                    title: "hello",
                    content: "world",
                    published: true,
                    rating: Some(4),
                },
            )
            .unwrap();
        assert_eq!(row.owner.id, alice);
        assert_eq!(row.owner.email, "alice@example.com");
        assert!(row.published);
        assert_eq!(row.rating, Some(4));

        let fetched = db.get_post(row.id).unwrap().unwrap();
        assert_eq!(fetched.votes, 0);
        assert_eq!(fetched.post.title, "hello");
    }

    #[test]
    fn second_cast_conflicts_and_leaves_one_row() {
        let (db, _dir) = open_temp();
        let alice = user(&db, "alice@example.com");
        let bob = user(&db, "bob@example.com");
        let p = post(&db, alice, "first");

        assert_eq!(db.cast_vote(bob, p).unwrap(), CastOutcome::Cast);
        assert_eq!(db.cast_vote(bob, p).unwrap(), CastOutcome::AlreadyVoted);
        assert_eq!(db.count_votes(p).unwrap(), 1);
        assert!(db.has_voted(bob, p).unwrap());
    }

    #[test]
    fn retract_without_vote_is_not_voted() {
        let (db, _dir) = open_temp();
        let alice = user(&db, "alice@example.com");
        let p = post(&db, alice, "first");

        assert_eq!(db.retract_vote(alice, p).unwrap(), RetractOutcome::NotVoted);
        assert_eq!(db.count_votes(p).unwrap(), 0);
    }

    #[test]
    fn vote_toggles_back_to_unvoted() {
        let (db, _dir) = open_temp();
        let alice = user(&db, "alice@example.com");
        let p = post(&db, alice, "first");

        assert_eq!(db.cast_vote(alice, p).unwrap(), CastOutcome::Cast);
        assert_eq!(db.retract_vote(alice, p).unwrap(), RetractOutcome::Retracted);
        assert!(!db.has_voted(alice, p).unwrap());
        assert_eq!(db.cast_vote(alice, p).unwrap(), CastOutcome::Cast);
    }

    #[test]
    fn votes_on_missing_post() {
        let (db, _dir) = open_temp();
        let alice = user(&db, "alice@example.com");
        assert_eq!(db.cast_vote(alice, 999).unwrap(), CastOutcome::PostMissing);
        assert_eq!(db.retract_vote(alice, 999).unwrap(), RetractOutcome::PostMissing);
    }

    #[test]
    fn list_filters_by_title_and_pages() {
        let (db, _dir) = open_temp();
        let alice = user(&db, "alice@example.com");
        let bob = user(&db, "bob@example.com");
        let rust = post(&db, alice, "Learning Rust");
        post(&db, alice, "Cooking");
        post(&db, alice, "Rust again");
        db.cast_vote(bob, rust).unwrap();
        db.cast_vote(alice, rust).unwrap();

        let all = db
            .list_posts(&PostFilter {
                limit: 10,
                skip: 0,
                search: "",
            })
            .unwrap();
        assert_eq!(all.len(), 3);

        let rusty = db
            .list_posts(&PostFilter {
                limit: 10,
                skip: 0,
                search: "Rust",
            })
            .unwrap();
        assert_eq!(rusty.len(), 2);
        assert_eq!(rusty[0].post.id, rust);
        assert_eq!(rusty[0].votes, 2);

        // case-sensitive
        let lower = db
            .list_posts(&PostFilter {
                limit: 10,
                skip: 0,
                search: "rust",
            })
            .unwrap();
        assert!(lower.is_empty());

        let paged = db
            .list_posts(&PostFilter {
                limit: 1,
                skip: 1,
                search: "",
            })
            .unwrap();
        assert_eq!(paged.len(), 1);
        assert_eq!(paged[0].post.title, "Cooking");
    }

    #[test]
    fn update_and_delete_are_scoped_to_owner() {
        let (db, _dir) = open_temp();
        let alice = user(&db, "alice@example.com");
        let bob = user(&db, "bob@example.com");
        let p = post(&db, alice, "mine");

        let fields = PostFields {
            title: "edited",
            content: "new body",
            published: false,
            rating: Some(1),
        };
        assert!(db.update_post(p, bob, &fields).unwrap().is_none());
        assert!(!db.delete_post(p, bob).unwrap());

        let updated = db.update_post(p, alice, &fields).unwrap().unwrap();
        assert_eq!(updated.title, "edited");
        assert!(!updated.published);
        assert_eq!(db.get_post_owner(p).unwrap(), Some(alice));

        assert!(db.delete_post(p, alice).unwrap());
        assert!(db.get_post(p).unwrap().is_none());
        assert_eq!(db.get_post_owner(p).unwrap(), None);
    }

    #[test]
    fn deleting_post_removes_its_votes() {
        let (db, _dir) = open_temp();
        let alice = user(&db, "alice@example.com");
        let bob = user(&db, "bob@example.com");
        let p = post(&db, alice, "short lived");
        db.cast_vote(bob, p).unwrap();

        assert!(db.delete_post(p, alice).unwrap());
        assert_eq!(db.count_votes(p).unwrap(), 0);
    }

    #[test]
    fn deleting_user_cascades_to_posts_and_votes() {
        let (db, _dir) = open_temp();
        let alice = user(&db, "alice@example.com");
        let bob = user(&db, "bob@example.com");
        let alice_post = post(&db, alice, "alice's");
        let bob_post = post(&db, bob, "bob's");
        db.cast_vote(bob, alice_post).unwrap();
        db.cast_vote(alice, bob_post).unwrap();
        db.cast_vote(bob, bob_post).unwrap();

        assert!(db.delete_user(alice).unwrap());

        assert!(db.get_user_by_id(alice).unwrap().is_none());
        assert!(db.get_post(alice_post).unwrap().is_none());
        assert_eq!(db.count_votes(alice_post).unwrap(), 0);
        assert!(!db.has_voted(alice, bob_post).unwrap());
        assert_eq!(db.get_post(bob_post).unwrap().unwrap().votes, 1);
    }

    #[test]
    fn lookup_by_email() {
        let (db, _dir) = open_temp();
        let id = user(&db, "carol@example.com");
        let row = db.get_user_by_email("carol@example.com").unwrap().unwrap();
        assert_eq!(row.id, id);
        assert!(db.get_user_by_email("nobody@example.com").unwrap().is_none());
    }
}
