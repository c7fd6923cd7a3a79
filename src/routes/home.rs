use askama::Template;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::Router;
use bytes::Bytes;
use serde::Deserialize;

use crate::auth::{require_authenticated, Identity};
use crate::error::{AppError, AppResult};
use crate::feed::{index_cache_key, FeedKind, Page, PageNumber};
use crate::routes::cards::{cards, PostCard};
use crate::state::AppState;

#[derive(Template)]
#[template(path = "pages/index.html")]
pub struct IndexTemplate {
    pub page: Page<PostCard>,
    pub base_path: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/cache/clear", post(clear_cache))
}

/// `?page=` query shared by every paginated page.
#[derive(Deserialize, Default)]
pub struct PageQuery {
    pub page: Option<String>,
}

impl PageQuery {
    pub fn number(&self) -> PageNumber {
        PageNumber::parse(self.page.as_deref())
    }
}

/// Wrapper to render askama templates as axum responses
pub struct Html<T: Template>(pub T);

impl<T: Template> IntoResponse for Html<T> {
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(body) => html_response(body.into()),
            Err(e) => {
                tracing::error!("Template render error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Template error").into_response()
            }
        }
    }
}

fn html_response(body: Bytes) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        body,
    )
        .into_response()
}

/// All-posts feed. Rendered pages are cached and served as-is until the
/// TTL runs out or someone clears the cache.
pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> AppResult<Response> {
    let number = state.feed.resolve_index_page(query.number()).await?;
    let key = index_cache_key(number);

    if let Some(body) = state.feed.cache().get(&key).await {
        tracing::debug!(key = %key, "Page cache hit");
        return Ok(html_response(body));
    }

    let feed = state
        .feed
        .render_feed(&FeedKind::All, PageNumber::Requested(number as i64))
        .await?;
    // Posts may have changed since the count; file under the page rendered.
    let key = index_cache_key(feed.page.number);
    let body = IndexTemplate {
        page: cards(feed.page),
        base_path: "/".to_string(),
    }
    .render()
    .map_err(|e| AppError::Internal(format!("render index: {e}")))?;

    let body = Bytes::from(body);
    state.feed.cache().put_default(key, body.clone()).await;
    Ok(html_response(body))
}

/// Operator action: drop every cached feed page now.
pub async fn clear_cache(State(state): State<AppState>, identity: Identity) -> AppResult<Response> {
    let user = require_authenticated(identity)?;
    tracing::info!(user = %user.username, "Feed cache cleared on request");
    state.feed.invalidate_feed_cache().await;
    Ok(Redirect::to("/").into_response())
}
