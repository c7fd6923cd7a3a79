pub mod cards;
pub mod groups;
pub mod home;
pub mod posts;
pub mod profile;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Path of a user's profile page. Usernames are opaque, so they are
/// percent-encoded into the path.
pub fn profile_path(username: &str) -> String {
    format!("/profile/{}", urlencoding::encode(username))
}

/// Every page of the site, with request tracing.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(home::router())
        .merge(groups::router())
        .merge(posts::router())
        .merge(profile::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
