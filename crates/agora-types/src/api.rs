use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// -- JWT Claims --

/// Claims carried inside an access token.
///
/// `sub` is optional on the way in so that a correctly signed token without a
/// subject can be told apart from one that fails to decode at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<i64>,
    pub iat: usize,
    pub exp: usize,
}

// -- Users --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
}

/// Public view of a user. Never carries the password hash.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserResponse {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

impl TokenResponse {
    pub fn bearer(access_token: String) -> Self {
        Self {
            access_token,
            token_type: "bearer".to_string(),
        }
    }
}

// -- Posts --

fn default_published() -> bool {
    true
}

/// Writable post fields, used for both create and full replacement on edit.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PostRequest {
    pub title: String,
    pub content: String,
    #[serde(default = "default_published")]
    pub published: bool,
    #[serde(default)]
    pub rating: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PostResponse {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub published: bool,
    pub rating: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub owner_id: i64,
    pub owner: UserResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PostWithVotesResponse {
    pub post: PostResponse,
    pub votes: i64,
}

// -- Votes --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VoteRequest {
    pub post_id: i64,
    pub dir: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_request_defaults() {
        let req: PostRequest =
            serde_json::from_str(r#"{"title": "t", "content": "c"}"#).unwrap();
        assert!(req.published);
        assert_eq!(req.rating, None);
    }

    #[test]
    fn post_request_rejects_unknown_fields() {
        let res = serde_json::from_str::<PostRequest>(
            r#"{"title": "t", "content": "c", "owner_id": 7}"#,
        );
        assert!(res.is_err());
    }

    #[test]
    fn claims_without_subject_decode() {
        let claims: Claims = serde_json::from_str(r#"{"iat": 1, "exp": 2}"#).unwrap();
        assert!(claims.sub.is_none());
    }
}
