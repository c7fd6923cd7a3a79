use askama::Template;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use serde::Deserialize;

use crate::auth::{require_authenticated, Identity};
use crate::db::models::{Group, PostView};
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::routes::cards::{CommentCard, PostCard};
use crate::routes::home::Html;
use crate::routes::profile_path;
use crate::state::AppState;
use crate::store::{NewComment, NewPost, PostChanges, PostFilter};

const MAX_POST_CHARS: usize = 10_000;
const MAX_COMMENT_CHARS: usize = 2_000;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/create", get(create_form).post(create_post))
        .route("/posts/{id}", get(post_detail))
        .route("/posts/{id}/edit", get(edit_form).post(edit_post))
        .route("/posts/{id}/delete", post(delete_post))
        .route("/posts/{id}/comment", post(add_comment))
}

// --- Templates ---

#[derive(Template)]
#[template(path = "pages/post_detail.html")]
pub struct PostDetailTemplate {
    pub viewer: Option<String>,
    pub title: String,
    pub post: PostCard,
    pub comments: Vec<CommentCard>,
    pub author_post_count: u64,
    pub can_edit: bool,
}

pub struct GroupOption {
    pub id: i64,
    pub title: String,
    pub selected: bool,
}

#[derive(Template)]
#[template(path = "pages/create_post.html")]
pub struct PostFormTemplate {
    pub viewer: Option<String>,
    pub is_edit: bool,
    pub action: String,
    pub text: String,
    pub image_ref: String,
    pub groups: Vec<GroupOption>,
    pub error: Option<String>,
}

// --- Forms ---

#[derive(Deserialize, Default)]
pub struct PostForm {
    #[serde(default)]
    pub text: String,
    pub group: Option<String>,
    pub image_ref: Option<String>,
}

#[derive(Deserialize)]
pub struct CommentForm {
    #[serde(default)]
    pub text: String,
}

/// Post fields that passed validation.
struct ValidPost {
    text: String,
    group_id: Option<i64>,
    image_ref: Option<String>,
}

impl PostForm {
    fn selected_group(&self) -> Option<i64> {
        self.group
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .and_then(|s| s.parse().ok())
    }

    fn validate(&self, groups: &[Group]) -> Result<ValidPost, String> {
        let text = self.text.trim().to_string();
        if text.is_empty() {
            return Err("Post text cannot be empty".into());
        }
        if text.chars().count() > MAX_POST_CHARS {
            return Err(format!(
                "Post text must be {MAX_POST_CHARS} characters or less"
            ));
        }

        let raw_group = self.group.as_deref().map(str::trim).unwrap_or("");
        let group_id = if raw_group.is_empty() {
            None
        } else {
            let id = self
                .selected_group()
                .filter(|id| groups.iter().any(|g| g.id == *id))
                .ok_or_else(|| "Select a valid group".to_string())?;
            Some(id)
        };

        let image_ref = self
            .image_ref
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        Ok(ValidPost {
            text,
            group_id,
            image_ref,
        })
    }
}

fn group_options(groups: &[Group], selected: Option<i64>) -> Vec<GroupOption> {
    groups
        .iter()
        .map(|g| GroupOption {
            id: g.id,
            title: g.title.clone(),
            selected: Some(g.id) == selected,
        })
        .collect()
}

fn invalid_form(template: PostFormTemplate) -> Response {
    (StatusCode::BAD_REQUEST, Html(template)).into_response()
}

// --- Handlers ---

pub async fn post_detail(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<i64>,
) -> AppResult<Html<PostDetailTemplate>> {
    let post = state.store.get_post(id).await?;
    let comments = state.store.find_comments(id).await?;
    let author_post_count = state
        .store
        .count_posts(PostFilter::Author(post.author_id))
        .await?;
    let can_edit = identity
        .user()
        .is_some_and(|viewer| viewer.id == post.author_id);

    Ok(Html(PostDetailTemplate {
        viewer: identity.user().map(|u| u.username.clone()),
        title: post.excerpt(),
        post: post.into(),
        comments: comments.into_iter().map(CommentCard::from).collect(),
        author_post_count,
        can_edit,
    }))
}

pub async fn create_form(
    State(state): State<AppState>,
    identity: Identity,
) -> AppResult<Html<PostFormTemplate>> {
    let user = require_authenticated(identity)?;
    let groups = state.store.list_groups().await?;

    Ok(Html(PostFormTemplate {
        viewer: Some(user.username),
        is_edit: false,
        action: "/create".to_string(),
        text: String::new(),
        image_ref: String::new(),
        groups: group_options(&groups, None),
        error: None,
    }))
}

pub async fn create_post(
    State(state): State<AppState>,
    identity: Identity,
    Form(form): Form<PostForm>,
) -> AppResult<Response> {
    let user = require_authenticated(identity)?;
    let groups = state.store.list_groups().await?;

    let valid = match form.validate(&groups) {
        Ok(valid) => valid,
        Err(message) => {
            return Ok(invalid_form(PostFormTemplate {
                viewer: Some(user.username),
                is_edit: false,
                action: "/create".to_string(),
                groups: group_options(&groups, form.selected_group()),
                text: form.text,
                image_ref: form.image_ref.unwrap_or_default(),
                error: Some(message),
            }))
        }
    };

    state
        .store
        .create_post(NewPost {
            text: valid.text,
            author_id: user.id,
            group_id: valid.group_id,
            image_ref: valid.image_ref,
        })
        .await?;

    Ok(Redirect::to(&profile_path(&user.username)).into_response())
}

/// Loads a post for a mutation. Someone other than its author gets `Err`
/// with a redirect back to the post instead.
async fn owned_post(
    state: &AppState,
    user: &CurrentUser,
    id: i64,
) -> AppResult<Result<PostView, Response>> {
    let post = state.store.get_post(id).await?;
    if post.author_id != user.id {
        tracing::warn!(post_id = id, user = %user.username, "Non-author tried to modify post");
        return Ok(Err(Redirect::to(&format!("/posts/{id}")).into_response()));
    }
    Ok(Ok(post))
}

pub async fn edit_form(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<i64>,
) -> AppResult<Response> {
    let user = require_authenticated(identity)?;
    let post = match owned_post(&state, &user, id).await? {
        Ok(post) => post,
        Err(redirect) => return Ok(redirect),
    };
    let groups = state.store.list_groups().await?;

    Ok(Html(PostFormTemplate {
        viewer: Some(user.username),
        is_edit: true,
        action: format!("/posts/{id}/edit"),
        groups: group_options(&groups, post.group_id()),
        text: post.text,
        image_ref: post.image_ref.unwrap_or_default(),
        error: None,
    })
    .into_response())
}

pub async fn edit_post(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<i64>,
    Form(form): Form<PostForm>,
) -> AppResult<Response> {
    let user = require_authenticated(identity)?;
    if let Err(redirect) = owned_post(&state, &user, id).await? {
        return Ok(redirect);
    }
    let groups = state.store.list_groups().await?;

    let valid = match form.validate(&groups) {
        Ok(valid) => valid,
        Err(message) => {
            return Ok(invalid_form(PostFormTemplate {
                viewer: Some(user.username),
                is_edit: true,
                action: format!("/posts/{id}/edit"),
                groups: group_options(&groups, form.selected_group()),
                text: form.text,
                image_ref: form.image_ref.unwrap_or_default(),
                error: Some(message),
            }))
        }
    };

    state
        .store
        .update_post(
            id,
            PostChanges {
                text: valid.text,
                group_id: valid.group_id,
                image_ref: valid.image_ref,
            },
        )
        .await?;
    tracing::info!(post_id = id, "Edited post");

    Ok(Redirect::to(&format!("/posts/{id}")).into_response())
}

pub async fn delete_post(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<i64>,
) -> AppResult<Response> {
    let user = require_authenticated(identity)?;
    if let Err(redirect) = owned_post(&state, &user, id).await? {
        return Ok(redirect);
    }

    state.store.delete_post(id).await?;
    Ok(Redirect::to(&profile_path(&user.username)).into_response())
}

pub async fn add_comment(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<i64>,
    Form(form): Form<CommentForm>,
) -> AppResult<Response> {
    let user = require_authenticated(identity)?;
    // Comments only attach to posts that exist.
    state.store.get_post(id).await?;

    let text = form.text.trim().to_string();
    if text.is_empty() {
        return Err(AppError::BadRequest("Comment cannot be empty".into()));
    }
    if text.chars().count() > MAX_COMMENT_CHARS {
        return Err(AppError::BadRequest(format!(
            "Comment must be {MAX_COMMENT_CHARS} characters or less"
        )));
    }

    state
        .store
        .create_comment(NewComment {
            post_id: id,
            author_id: user.id,
            text,
        })
        .await?;
    tracing::info!(post_id = id, user = %user.username, "Added comment");

    Ok(Redirect::to(&format!("/posts/{id}")).into_response())
}
