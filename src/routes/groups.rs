use askama::Template;
use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::Router;

use crate::auth::Identity;
use crate::db::models::Group;
use crate::error::{AppError, AppResult};
use crate::feed::{FeedKind, FeedSubject, Page};
use crate::routes::cards::{cards, PostCard};
use crate::routes::home::{Html, PageQuery};
use crate::state::AppState;

#[derive(Template)]
#[template(path = "pages/group_list.html")]
pub struct GroupListTemplate {
    pub viewer: Option<String>,
    pub group: Group,
    pub page: Page<PostCard>,
    pub base_path: String,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/group/{slug}", get(group_posts))
}

pub async fn group_posts(
    State(state): State<AppState>,
    identity: Identity,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> AppResult<Html<GroupListTemplate>> {
    let feed = state
        .feed
        .render_feed(&FeedKind::Group(slug.clone()), query.number())
        .await?;

    let FeedSubject::Group(group) = feed.subject else {
        return Err(AppError::Internal("group feed without a group".into()));
    };

    Ok(Html(GroupListTemplate {
        viewer: identity.user().map(|u| u.username.clone()),
        group,
        page: cards(feed.page),
        base_path: format!("/group/{}", urlencoding::encode(&slug)),
    }))
}
