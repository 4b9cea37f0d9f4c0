//! HTTP route handlers.

pub mod admin;
pub mod admin_media;
pub mod admin_menu;
pub mod admin_page;
pub mod admin_post;
pub mod admin_settings;
pub mod admin_tag;
pub mod admin_user;
pub mod auth;
pub mod favicon;
pub mod front;
pub mod health;
pub mod helpers;
pub mod highlight;
pub mod media;

use axum::Router;

use crate::middleware::require_auth;
use crate::state::AppState;

/// Assemble every route. Admin routes sit behind the login gate.
///
/// The session layer is added by the caller, outside this router.
pub fn build_router(state: AppState) -> Router {
    let admin = Router::new()
        .merge(admin::router())
        .merge(admin_post::router())
        .merge(admin_page::router())
        .merge(admin_tag::router())
        .merge(admin_menu::router())
        .merge(admin_user::router())
        .merge(admin_media::router())
        .merge(admin_settings::router())
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            require_auth,
        ));

    Router::new()
        .merge(front::router())
        .merge(auth::router())
        .merge(media::router())
        .merge(highlight::router())
        .merge(favicon::router())
        .merge(health::router())
        .merge(admin)
        .with_state(state)
}
