use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query,
    },
    Extension, Json,
};
use tracing::{info, instrument};
use validator::Validate;

use crate::api::rest::dto::{
    ApiResponse, CreateUserReq, ListUsersQuery, UpdateUserReq, UserDto,
};
use crate::api::rest::error::HandlerError;
use crate::config::UsersConfig;
use crate::contract::model::UserPatch;
use crate::domain::service::Service;
use crate::errors::ErrorCode;

type ApiResult<T> = Result<Json<ApiResponse<T>>, HandlerError>;

/// Create a new user
#[instrument(name = "users.api.create_user", skip_all)]
pub async fn create_user(
    Extension(svc): Extension<Arc<Service>>,
    body: Result<Json<CreateUserReq>, JsonRejection>,
) -> ApiResult<UserDto> {
    let Json(mut req) = body?;
    req.mobile = req.mobile.trim().to_owned();
    req.validate()?;

    if svc.fetch_by_mobile(&req.mobile).await?.is_some() {
        info!(mobile = %req.mobile, "user already exists with this mobile");
        return Err(HandlerError::new(ErrorCode::UserAlreadyExists));
    }

    let user = svc.create_user(req.into()).await?;
    info!(user_id = user.id, "user created");
    Ok(Json(ApiResponse::ok(user.into())))
}

/// Get a specific user by ID
#[instrument(name = "users.api.fetch_user", skip_all)]
pub async fn fetch_user_by_id(
    Extension(svc): Extension<Arc<Service>>,
    id: Result<Path<i32>, PathRejection>,
) -> ApiResult<UserDto> {
    let Path(id) = id?;
    let user = svc
        .fetch_by_id(id)
        .await?
        .ok_or_else(|| HandlerError::new(ErrorCode::UserNotFound).with_detail(id))?;
    Ok(Json(ApiResponse::ok(user.into())))
}

/// List users with optional filters and pagination
#[instrument(name = "users.api.list_users", skip_all)]
pub async fn list_users(
    Extension(svc): Extension<Arc<Service>>,
    Extension(cfg): Extension<Arc<UsersConfig>>,
    query: Result<Query<ListUsersQuery>, QueryRejection>,
) -> ApiResult<Vec<UserDto>> {
    let Query(query) = query?;
    query.validate()?;
    let filter = query
        .into_filter(cfg.default_page_size)
        .map_err(HandlerError::invalid)?;

    let (users, meta) = svc.fetch_all(&filter).await?;
    let users = users.into_iter().map(UserDto::from).collect();
    Ok(Json(ApiResponse::ok(users).with_meta(meta.map(Into::into))))
}

/// Update an existing user; only supplied fields change
#[instrument(name = "users.api.update_user", skip_all)]
pub async fn update_user(
    Extension(svc): Extension<Arc<Service>>,
    id: Result<Path<i32>, PathRejection>,
    body: Result<Json<UpdateUserReq>, JsonRejection>,
) -> ApiResult<UserDto> {
    let Path(id) = id?;
    let Json(req) = body?;
    let patch = UserPatch::from(req);

    let current = svc
        .fetch_by_id(id)
        .await?
        .ok_or_else(|| HandlerError::new(ErrorCode::UserNotFound).with_detail(id))?;

    if let Some(mobile) = patch.mobile.as_deref().filter(|m| *m != current.mobile) {
        if svc.fetch_by_mobile(mobile).await?.is_some() {
            info!(user_id = id, mobile, "mobile belongs to another user");
            return Err(HandlerError::new(ErrorCode::UserAlreadyExists));
        }
    }

    // Row deleted between the lookup and the write
    let user = svc
        .update_user(id, patch)
        .await?
        .ok_or_else(|| HandlerError::new(ErrorCode::UserNotFound).with_detail(id))?;
    info!(user_id = user.id, "user updated");
    Ok(Json(ApiResponse::ok(user.into())))
}
