//! Feed selection: which posts a feed shows, in which order.
//!
//! Whatever order or duplication a store hands back, feeds come out sorted
//! newest first (ties by higher id) with each post exactly once.

use std::cmp::Reverse;
use std::collections::HashSet;

use crate::db::models::{Group, PostView, User};
use crate::store::{ContentStore, PostFilter};

use super::FeedError;

pub async fn all_posts(store: &dyn ContentStore) -> Result<Vec<PostView>, FeedError> {
    let posts = store.find_posts(PostFilter::All).await?;
    Ok(normalize(posts))
}

pub async fn posts_by_group(
    store: &dyn ContentStore,
    slug: &str,
) -> Result<(Group, Vec<PostView>), FeedError> {
    let group = store
        .find_group_by_slug(slug)
        .await?
        .ok_or_else(|| FeedError::GroupNotFound(slug.to_string()))?;
    let posts = store.find_posts(PostFilter::Group(group.id)).await?;
    Ok((group, normalize(posts)))
}

pub async fn posts_by_author(
    store: &dyn ContentStore,
    username: &str,
) -> Result<(User, Vec<PostView>), FeedError> {
    let author = store
        .find_user_by_username(username)
        .await?
        .ok_or_else(|| FeedError::AuthorNotFound(username.to_string()))?;
    let posts = store.find_posts(PostFilter::Author(author.id)).await?;
    Ok((author, normalize(posts)))
}

/// Posts by every author `requester_id` follows. Following nobody is an
/// empty feed, not an error.
pub async fn followed_feed(
    store: &dyn ContentStore,
    requester_id: i64,
) -> Result<Vec<PostView>, FeedError> {
    let posts = store.find_posts(PostFilter::FollowedBy(requester_id)).await?;
    Ok(normalize(posts))
}

fn normalize(mut posts: Vec<PostView>) -> Vec<PostView> {
    posts.sort_by_key(|p| Reverse((p.created_at, p.id)));
    let mut seen = HashSet::with_capacity(posts.len());
    posts.retain(|p| seen.insert(p.id));
    posts
}
