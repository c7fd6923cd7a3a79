use askama::Template;
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::Router;

use crate::auth::{require_authenticated, Identity};
use crate::error::{AppError, AppResult};
use crate::feed::{FeedKind, FeedSubject, Page};
use crate::routes::cards::{cards, PostCard};
use crate::routes::home::{Html, PageQuery};
use crate::routes::profile_path;
use crate::state::AppState;

#[derive(Template)]
#[template(path = "pages/profile.html")]
pub struct ProfileTemplate {
    pub viewer: Option<String>,
    pub author: String,
    pub page: Page<PostCard>,
    pub base_path: String,
    pub followers: u64,
    pub following_count: u64,
    /// Signed in and looking at someone else's profile.
    pub can_follow: bool,
    pub following: bool,
}

#[derive(Template)]
#[template(path = "pages/follow.html")]
pub struct FollowTemplate {
    pub viewer: Option<String>,
    pub page: Page<PostCard>,
    pub base_path: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/follow", get(follow_index))
        .route("/profile/{username}", get(profile))
        .route("/profile/{username}/follow", post(profile_follow))
        .route("/profile/{username}/unfollow", post(profile_unfollow))
}

pub async fn profile(
    State(state): State<AppState>,
    identity: Identity,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
) -> AppResult<Html<ProfileTemplate>> {
    let feed = state
        .feed
        .render_feed(&FeedKind::Author(username.clone()), query.number())
        .await?;

    let FeedSubject::Author(author) = feed.subject else {
        return Err(AppError::Internal("author feed without an author".into()));
    };

    let followers = state.store.count_followers(author.id).await?;
    let following_count = state.store.count_following(author.id).await?;

    let (can_follow, following) = match identity.user() {
        Some(viewer) if viewer.id != author.id => {
            (true, state.store.is_following(viewer.id, author.id).await?)
        }
        _ => (false, false),
    };

    Ok(Html(ProfileTemplate {
        viewer: identity.user().map(|u| u.username.clone()),
        base_path: profile_path(&author.username),
        author: author.username,
        page: cards(feed.page),
        followers,
        following_count,
        can_follow,
        following,
    }))
}

/// Posts from every author the signed-in user follows.
pub async fn follow_index(
    State(state): State<AppState>,
    identity: Identity,
    Query(query): Query<PageQuery>,
) -> AppResult<Html<FollowTemplate>> {
    let user = require_authenticated(identity)?;
    let feed = state
        .feed
        .render_feed(&FeedKind::Followed(user.id), query.number())
        .await?;

    Ok(Html(FollowTemplate {
        viewer: Some(user.username),
        page: cards(feed.page),
        base_path: "/follow".to_string(),
    }))
}

pub async fn profile_follow(
    State(state): State<AppState>,
    identity: Identity,
    Path(username): Path<String>,
) -> AppResult<Response> {
    let user = require_authenticated(identity)?;
    let author = state
        .store
        .find_user_by_username(&username)
        .await?
        .ok_or(AppError::NotFound)?;

    // Following yourself is refused here rather than by the store.
    if author.id == user.id {
        return Ok(Redirect::to("/").into_response());
    }

    if state.store.follow(user.id, author.id).await? {
        tracing::info!(follower = %user.username, author = %author.username, "Followed author");
    }
    Ok(Redirect::to("/follow").into_response())
}

pub async fn profile_unfollow(
    State(state): State<AppState>,
    identity: Identity,
    Path(username): Path<String>,
) -> AppResult<Response> {
    let user = require_authenticated(identity)?;
    let author = state
        .store
        .find_user_by_username(&username)
        .await?
        .ok_or(AppError::NotFound)?;

    if state.store.unfollow(user.id, author.id).await? {
        tracing::info!(follower = %user.username, author = %author.username, "Unfollowed author");
    }
    Ok(Redirect::to("/").into_response())
}
