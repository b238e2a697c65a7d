use std::sync::Arc;

use axum::{middleware, routing::get, Extension, Router};

use crate::api::rest::{error::render_errors, handlers};
use crate::config::UsersConfig;
use crate::domain::service::Service;
use crate::errors::ErrorCatalog;

/// Mount the `/v1/users` endpoints on `router`.
///
/// The error middleware wraps only these routes; it needs the catalog
/// that turns attached handler errors into response bodies.
pub fn register_routes(
    router: Router,
    service: Arc<Service>,
    config: UsersConfig,
    catalog: Arc<ErrorCatalog>,
) -> Router {
    let users = Router::new()
        .route(
            "/v1/users",
            get(handlers::list_users).post(handlers::create_user),
        )
        .route(
            "/v1/users/{user_id}",
            get(handlers::fetch_user_by_id).put(handlers::update_user),
        )
        .layer(middleware::from_fn_with_state(catalog, render_errors))
        .layer(Extension(Arc::new(config)))
        .layer(Extension(service));

    router.merge(users)
}
