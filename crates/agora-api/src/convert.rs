//! Row-to-wire mapping. Each response lists its fields explicitly so nothing
//! from a row (the password hash in particular) leaks by accident.

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::warn;

use agora_db::models::{OwnerRow, PostRow, PostWithVotesRow, UserRow};
use agora_types::api::{PostResponse, PostWithVotesResponse, UserResponse};

/// SQLite's `datetime('now')` yields "YYYY-MM-DD HH:MM:SS" in UTC with no offset.
pub fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc()))
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}': {}", raw, e);
            DateTime::default()
        })
}

pub fn user_response(row: &UserRow) -> UserResponse {
    UserResponse {
        id: row.id,
        email: row.email.clone(),
        name: row.name.clone(),
        created_at: parse_timestamp(&row.created_at),
    }
}

fn owner_response(row: OwnerRow) -> UserResponse {
    UserResponse {
        id: row.id,
        email: row.email,
        name: row.name,
        created_at: parse_timestamp(&row.created_at),
    }
}

pub fn post_response(row: PostRow) -> PostResponse {
    PostResponse {
        id: row.id,
        title: row.title,
        content: row.content,
        published: row.published,
        rating: row.rating,
        created_at: parse_timestamp(&row.created_at),
        owner_id: row.owner.id,
        owner: owner_response(row.owner),
    }
}

pub fn post_with_votes_response(row: PostWithVotesRow) -> PostWithVotesResponse {
    PostWithVotesResponse {
        post: post_response(row.post),
        votes: row.votes,
    }
}
