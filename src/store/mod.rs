//! Content store contract - everything the feed and web layers read or write.
//!
//! Relations are explicit queries here rather than object traversal, so the
//! feed logic never depends on how a backend joins or orders its rows.

pub mod sqlite;

use async_trait::async_trait;
use thiserror::Error;

use crate::db::models::{Comment, CommentView, Group, Post, PostView, User};

pub use sqlite::SqliteContentStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("SQL error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),
}

/// Which posts a query selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostFilter {
    All,
    Group(i64),
    Author(i64),
    /// Posts by every author the given user follows.
    FollowedBy(i64),
}

#[derive(Debug, Clone)]
pub struct NewPost {
    pub text: String,
    pub author_id: i64,
    pub group_id: Option<i64>,
    pub image_ref: Option<String>,
}

/// Editable post fields. `created_at` and the author never change.
#[derive(Debug, Clone)]
pub struct PostChanges {
    pub text: String,
    pub group_id: Option<i64>,
    pub image_ref: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewGroup {
    pub title: String,
    pub slug: String,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub post_id: i64,
    pub author_id: i64,
    pub text: String,
}

#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn create_user(&self, username: &str) -> Result<User, StoreError>;

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    async fn create_group(&self, group: NewGroup) -> Result<Group, StoreError>;

    async fn find_group_by_slug(&self, slug: &str) -> Result<Option<Group>, StoreError>;

    async fn list_groups(&self) -> Result<Vec<Group>, StoreError>;

    /// Remove a group. Posts that referenced it survive with no group.
    async fn delete_group(&self, id: i64) -> Result<(), StoreError>;

    /// Posts matching `filter`, newest first, joined with author and group.
    async fn find_posts(&self, filter: PostFilter) -> Result<Vec<PostView>, StoreError>;

    async fn count_posts(&self, filter: PostFilter) -> Result<u64, StoreError>;

    async fn get_post(&self, id: i64) -> Result<PostView, StoreError>;

    async fn create_post(&self, post: NewPost) -> Result<Post, StoreError>;

    async fn update_post(&self, id: i64, changes: PostChanges) -> Result<Post, StoreError>;

    /// Delete a post together with its comments.
    async fn delete_post(&self, id: i64) -> Result<(), StoreError>;

    /// Comments on a post, oldest first.
    async fn find_comments(&self, post_id: i64) -> Result<Vec<CommentView>, StoreError>;

    async fn create_comment(&self, comment: NewComment) -> Result<Comment, StoreError>;

    /// Record a follow edge. Returns false when it already existed.
    async fn follow(&self, user_id: i64, author_id: i64) -> Result<bool, StoreError>;

    /// Remove a follow edge. Returns false when there was none.
    async fn unfollow(&self, user_id: i64, author_id: i64) -> Result<bool, StoreError>;

    async fn is_following(&self, user_id: i64, author_id: i64) -> Result<bool, StoreError>;

    async fn count_following(&self, user_id: i64) -> Result<u64, StoreError>;

    async fn count_followers(&self, author_id: i64) -> Result<u64, StoreError>;
}
