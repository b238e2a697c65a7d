//! Integration tests for the users module.
//!
//! Key points:
//! - Each test runs on a fresh in-memory SQLite DB with the real migration applied.
//! - The REST layer is exercised through the real route registration and error middleware.

use std::sync::Arc;

use anyhow::Result;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use sea_orm::DatabaseConnection;
use sea_orm_migration::MigratorTrait;
use serde_json::{json, Value};
use tower::ServiceExt;

use users::{
    api::rest::routes::register_routes,
    config::UsersConfig,
    contract::model::{NewUser, PageLimit, UserListFilter, UserPatch},
    domain::repo::{RepoError, UsersRepository},
    domain::service::Service,
    errors::ErrorCatalog,
    infra::storage::{InMemoryUsersRepository, Migrator, SeaOrmUsersRepository},
};

async fn create_test_db() -> DatabaseConnection {
    let handle = db::DbHandle::connect("sqlite::memory:", db::ConnectOpts::default())
        .await
        .expect("Failed to connect to test database");
    let conn = handle.sea();
    Migrator::up(&conn, None)
        .await
        .expect("Failed to run migrations");
    conn
}

async fn create_test_service() -> Arc<Service> {
    let repo = SeaOrmUsersRepository::new(create_test_db().await);
    Arc::new(Service::new(Arc::new(repo)))
}

fn router_for(service: Arc<Service>, config: UsersConfig) -> Router {
    register_routes(
        Router::new(),
        service,
        config,
        Arc::new(ErrorCatalog::standard()),
    )
}

async fn create_test_router() -> Router {
    router_for(create_test_service().await, UsersConfig::default())
}

async fn send(router: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(v) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };
    let res = router
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = res.status();
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn post_user(router: &Router, body: Value) -> (StatusCode, Value) {
    send(router, Method::POST, "/v1/users", Some(body)).await
}

fn assert_error(status: StatusCode, body: &Value, want: StatusCode, code: &str, message: &str) {
    assert_eq!(status, want, "body: {body}");
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], code);
    assert_eq!(body["message"], message);
}

async fn seed(router: &Router, users: &[(&str, &str, &str)]) -> Vec<i64> {
    let mut ids = Vec::new();
    for (mobile, first, last) in users {
        let (status, body) = post_user(
            router,
            json!({"mobile": mobile, "first_name": first, "last_name": last, "dob": "1990-01-01"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "seed failed: {body}");
        ids.push(body["data"]["id"].as_i64().unwrap());
    }
    ids
}

fn ids_of(body: &Value) -> Vec<i64> {
    body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["id"].as_i64().unwrap())
        .collect()
}

#[tokio::test]
async fn create_then_repeat_is_rejected() {
    let router = create_test_router().await;

    let (status, body) = post_user(
        &router,
        json!({"mobile": "9999999999", "dob": "1990-01-01", "first_name": "Ada"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["mobile"], "9999999999");
    assert_eq!(body["data"]["dob"], "1990-01-01");
    assert_eq!(body["data"]["first_name"], "Ada");
    let id = body["data"]["id"].as_i64().unwrap();
    assert!(id > 0);

    let (status, body) = post_user(
        &router,
        json!({"mobile": "9999999999", "dob": "2000-02-02", "first_name": "Eve"}),
    )
    .await;
    assert_error(
        status,
        &body,
        StatusCode::UNPROCESSABLE_ENTITY,
        "3",
        "User already exists",
    );

    let (status, body) = send(&router, Method::GET, &format!("/v1/users/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["first_name"], "Ada");
    assert_eq!(body["data"]["dob"], "1990-01-01");
}

#[tokio::test]
async fn create_validates_the_body() {
    let router = create_test_router().await;

    for body in [
        json!({"dob": "1990-01-01"}),
        json!({"mobile": "   ", "dob": "1990-01-01"}),
        json!({"mobile": "123"}),
        json!({"mobile": "123", "dob": "not-a-date"}),
    ] {
        let (status, res) = post_user(&router, body.clone()).await;
        assert_error(
            status,
            &res,
            StatusCode::UNPROCESSABLE_ENTITY,
            "2",
            "Request not valid",
        );
    }

    let res = router
        .clone()
        .oneshot(
            Request::post("/v1/users")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn metadata_is_stored_verbatim() {
    let router = create_test_router().await;
    let metadata = json!({"tier": "gold", "tags": ["a", "b"], "score": 4.5});

    let (status, body) = post_user(
        &router,
        json!({"mobile": "777", "dob": "1985-05-05", "metadata": metadata}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let id = body["data"]["id"].as_i64().unwrap();

    let (_, body) = send(&router, Method::GET, &format!("/v1/users/{id}"), None).await;
    assert_eq!(body["data"]["metadata"], metadata);
}

#[tokio::test]
async fn fetch_unknown_or_malformed_id() {
    let router = create_test_router().await;

    let (status, body) = send(&router, Method::GET, "/v1/users/4242", None).await;
    assert_error(status, &body, StatusCode::NOT_FOUND, "4", "User not found");

    let (status, body) = send(&router, Method::GET, "/v1/users/abc", None).await;
    assert_error(
        status,
        &body,
        StatusCode::UNPROCESSABLE_ENTITY,
        "2",
        "Request not valid",
    );
}

#[tokio::test]
async fn list_pages_newest_first() {
    let router = create_test_router().await;
    let ids = seed(
        &router,
        &[
            ("101", "A", "One"),
            ("102", "B", "Two"),
            ("103", "C", "Three"),
            ("104", "D", "Four"),
            ("105", "E", "Five"),
        ],
    )
    .await;

    let (status, body) = send(&router, Method::GET, "/v1/users?limit=2&page=1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids_of(&body), vec![ids[4], ids[3]]);
    assert_eq!(body["meta"]["current_page"], 1);
    assert_eq!(body["meta"]["total_pages"], 3);
    assert_eq!(body["meta"]["total_data_count"], 5);

    let (_, body) = send(&router, Method::GET, "/v1/users?limit=2&page=3", None).await;
    assert_eq!(ids_of(&body), vec![ids[0]]);

    let (_, body) = send(&router, Method::GET, "/v1/users?limit=2&page=9", None).await;
    assert!(ids_of(&body).is_empty());
    assert_eq!(body["meta"]["total_data_count"], 5);

    let (status, body) = send(&router, Method::GET, "/v1/users?limit=-1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids_of(&body).len(), 5);
    assert!(body.get("meta").is_none(), "unbounded list has no meta: {body}");
}

#[tokio::test]
async fn list_uses_configured_default_page_size() {
    let router = router_for(
        create_test_service().await,
        UsersConfig {
            default_page_size: 2,
        },
    );
    seed(&router, &[("1", "a", "a"), ("2", "b", "b"), ("3", "c", "c")]).await;

    let (_, body) = send(&router, Method::GET, "/v1/users", None).await;
    assert_eq!(ids_of(&body).len(), 2);
    assert_eq!(body["meta"]["total_pages"], 2);
}

#[tokio::test]
async fn list_rejects_invalid_query() {
    let router = create_test_router().await;
    for uri in [
        "/v1/users?page=0",
        "/v1/users?limit=0",
        "/v1/users?limit=-7",
        "/v1/users?page=abc",
    ] {
        let (status, body) = send(&router, Method::GET, uri, None).await;
        assert_error(
            status,
            &body,
            StatusCode::UNPROCESSABLE_ENTITY,
            "2",
            "Request not valid",
        );
    }
}

#[tokio::test]
async fn list_rejects_page_whose_offset_overflows() {
    let router = create_test_router().await;
    seed(&router, &[("401", "a", "a")]).await;

    let (status, body) = send(
        &router,
        Method::GET,
        "/v1/users?page=18446744073709551615&limit=2",
        None,
    )
    .await;
    assert_error(
        status,
        &body,
        StatusCode::UNPROCESSABLE_ENTITY,
        "2",
        "Request not valid",
    );

    // Unbounded lists ignore the page
    let (status, body) = send(
        &router,
        Method::GET,
        "/v1/users?page=18446744073709551615&limit=-1",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "body: {body}");
    assert_eq!(ids_of(&body).len(), 1);
}

#[tokio::test]
async fn name_filter_is_case_insensitive_and_tokenized() {
    let router = create_test_router().await;
    let ids = seed(
        &router,
        &[
            ("201", "John", "Smith"),
            ("202", "johnny", "Cash"),
            ("203", "Mary", "Smith"),
            ("204", "Ann", "Johnson"),
        ],
    )
    .await;

    let (_, body) = send(&router, Method::GET, "/v1/users?name=John&limit=-1", None).await;
    assert_eq!(ids_of(&body), vec![ids[1], ids[0]]);

    let (_, body) = send(
        &router,
        Method::GET,
        "/v1/users?name=John%20Smith&limit=-1",
        None,
    )
    .await;
    assert_eq!(ids_of(&body), vec![ids[0]]);

    let (_, body) = send(&router, Method::GET, "/v1/users?name=&mobile=&limit=-1", None).await;
    assert_eq!(ids_of(&body).len(), 4);
}

#[tokio::test]
async fn name_filter_folds_case_of_accented_letters() {
    let router = create_test_router().await;
    let ids = seed(&router, &[("301", "Émile", "Zola"), ("302", "Emma", "Stone")]).await;

    let (status, body) = send(&router, Method::GET, "/v1/users?name=%C3%89MILE&limit=-1", None).await;
    assert_eq!(status, StatusCode::OK, "body: {body}");
    assert_eq!(ids_of(&body), vec![ids[0]]);

    let (_, body) = send(&router, Method::GET, "/v1/users?name=emma%20STONE&limit=-1", None).await;
    assert_eq!(ids_of(&body), vec![ids[1]]);
}

#[tokio::test]
async fn filter_wildcards_match_literally() {
    let router = create_test_router().await;
    let ids = seed(
        &router,
        &[
            ("555_1", "a", "a"),
            ("55501", "b", "b"),
            ("12%34", "c", "c"),
        ],
    )
    .await;

    let (_, body) = send(&router, Method::GET, "/v1/users?mobile=5_1&limit=-1", None).await;
    assert_eq!(ids_of(&body), vec![ids[0]]);

    let (_, body) = send(&router, Method::GET, "/v1/users?mobile=%25&limit=-1", None).await;
    assert_eq!(ids_of(&body), vec![ids[2]]);

    let (_, body) = send(&router, Method::GET, "/v1/users?mobile=555&limit=-1", None).await;
    assert_eq!(ids_of(&body), vec![ids[1], ids[0]]);
}

#[tokio::test]
async fn update_mobile_only_touches_mobile() {
    let router = create_test_router().await;
    let (_, created) = post_user(
        &router,
        json!({
            "mobile": "300",
            "first_name": "Grace",
            "last_name": "Hopper",
            "profile_picture": "https://img/g.png",
            "dob": "1906-12-09",
            "metadata": {"rank": "admiral"}
        }),
    )
    .await;
    let before = &created["data"];
    let id = before["id"].as_i64().unwrap();

    let (status, body) = send(
        &router,
        Method::PUT,
        &format!("/v1/users/{id}"),
        Some(json!({"mobile": "301", "first_name": ""})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let after = &body["data"];
    assert_eq!(after["mobile"], "301");
    for field in [
        "id",
        "first_name",
        "last_name",
        "profile_picture",
        "dob",
        "metadata",
        "created_at",
    ] {
        assert_eq!(after[field], before[field], "{field} changed");
    }
    let parse = |v: &Value| {
        chrono::DateTime::parse_from_rfc3339(v.as_str().unwrap()).unwrap()
    };
    assert!(parse(&after["updated_at"]) >= parse(&before["updated_at"]));

    let (_, fetched) = send(&router, Method::GET, &format!("/v1/users/{id}"), None).await;
    assert_eq!(fetched["data"]["mobile"], "301");
}

#[tokio::test]
async fn update_conflicts_and_missing_rows() {
    let router = create_test_router().await;
    let ids = seed(&router, &[("400", "a", "a"), ("401", "b", "b")]).await;

    let (status, body) = send(
        &router,
        Method::PUT,
        &format!("/v1/users/{}", ids[1]),
        Some(json!({"mobile": "400"})),
    )
    .await;
    assert_error(
        status,
        &body,
        StatusCode::UNPROCESSABLE_ENTITY,
        "3",
        "User already exists",
    );

    // Re-sending the current mobile is not a conflict
    let (status, _) = send(
        &router,
        Method::PUT,
        &format!("/v1/users/{}", ids[1]),
        Some(json!({"mobile": "401", "last_name": "B"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &router,
        Method::PUT,
        "/v1/users/999",
        Some(json!({"first_name": "ghost"})),
    )
    .await;
    assert_error(status, &body, StatusCode::NOT_FOUND, "4", "User not found");

    let (status, body) = send(
        &router,
        Method::PUT,
        &format!("/v1/users/{}", ids[0]),
        Some(json!({"dob": "31-12-1999"})),
    )
    .await;
    assert_error(
        status,
        &body,
        StatusCode::UNPROCESSABLE_ENTITY,
        "2",
        "Request not valid",
    );
}

#[tokio::test]
async fn in_memory_repository_behind_the_router() {
    let service = Arc::new(Service::new(Arc::new(InMemoryUsersRepository::new())));
    let router = router_for(service, UsersConfig::default());
    let ids = seed(&router, &[("501", "John", "Smith"), ("502", "Jane", "Doe")]).await;

    let (status, body) = post_user(&router, json!({"mobile": "501", "dob": "1990-01-01"})).await;
    assert_error(
        status,
        &body,
        StatusCode::UNPROCESSABLE_ENTITY,
        "3",
        "User already exists",
    );

    let (_, body) = send(&router, Method::GET, "/v1/users?limit=1&page=1", None).await;
    assert_eq!(ids_of(&body), vec![ids[1]]);
    assert_eq!(body["meta"]["total_pages"], 2);

    let (_, body) = send(&router, Method::GET, "/v1/users?name=john&limit=-1", None).await;
    assert_eq!(ids_of(&body), vec![ids[0]]);

    let (status, body) = send(
        &router,
        Method::PUT,
        &format!("/v1/users/{}", ids[0]),
        Some(json!({"mobile": "502"})),
    )
    .await;
    assert_error(
        status,
        &body,
        StatusCode::UNPROCESSABLE_ENTITY,
        "3",
        "User already exists",
    );

    let (status, body) = send(&router, Method::GET, "/v1/users/999", None).await;
    assert_error(status, &body, StatusCode::NOT_FOUND, "4", "User not found");
}

#[tokio::test]
async fn unique_index_backs_the_repository() -> Result<()> {
    let repo = SeaOrmUsersRepository::new(create_test_db().await);
    let new_user = |mobile: &str| NewUser {
        first_name: Some("Linus".into()),
        last_name: None,
        mobile: mobile.into(),
        profile_picture: None,
        dob: None,
        metadata: None,
    };

    let first = repo.create_user(new_user("600")).await?;
    let second = repo.create_user(new_user("601")).await?;

    let err = repo.create_user(new_user("600")).await.unwrap_err();
    assert!(matches!(err, RepoError::DuplicateMobile { ref mobile } if mobile == "600"));

    let patch = UserPatch {
        mobile: Some("600".into()),
        ..UserPatch::default()
    };
    let err = repo.update_user(second.id, patch).await.unwrap_err();
    assert!(matches!(err, RepoError::DuplicateMobile { .. }));

    assert_eq!(repo.fetch_by_mobile("600").await?.map(|u| u.id), Some(first.id));
    assert!(repo.fetch_by_mobile("60").await?.is_none());
    assert!(repo.update_user(9999, UserPatch::default()).await?.is_none());

    let filter = UserListFilter {
        limit: PageLimit::Bounded(1),
        ..UserListFilter::default()
    };
    let (rows, meta) = repo.fetch_all(&filter).await?;
    assert_eq!(rows[0].id, second.id);
    assert_eq!(meta.map(|m| m.total_pages), Some(2));
    Ok(())
}

/// Repository whose every call fails, to drive the 500 path.
struct BrokenRepo;

#[async_trait::async_trait]
impl UsersRepository for BrokenRepo {
    async fn create_user(&self, _: NewUser) -> Result<users::model::User, RepoError> {
        Err(broken())
    }
    async fn update_user(
        &self,
        _: i32,
        _: UserPatch,
    ) -> Result<Option<users::model::User>, RepoError> {
        Err(broken())
    }
    async fn fetch_by_id(&self, _: i32) -> Result<Option<users::model::User>, RepoError> {
        Err(broken())
    }
    async fn fetch_by_mobile(&self, _: &str) -> Result<Option<users::model::User>, RepoError> {
        Err(broken())
    }
    async fn fetch_all(
        &self,
        _: &UserListFilter,
    ) -> Result<(Vec<users::model::User>, Option<users::model::Pagination>), RepoError> {
        Err(broken())
    }
}

fn broken() -> RepoError {
    RepoError::Database(sea_orm::DbErr::Custom("connection reset".into()))
}

#[tokio::test]
async fn repository_failures_become_uncaught_exception() {
    let router = router_for(
        Arc::new(Service::new(Arc::new(BrokenRepo))),
        UsersConfig::default(),
    );

    let (status, body) = send(&router, Method::GET, "/v1/users/1", None).await;
    assert_error(
        status,
        &body,
        StatusCode::INTERNAL_SERVER_ERROR,
        "1",
        "Oops! Something went wrong. Please try later",
    );
    assert!(!body.to_string().contains("connection reset"));

    let (status, _) = post_user(&router, json!({"mobile": "1", "dob": "1990-01-01"})).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let (status, _) = send(&router, Method::GET, "/v1/users", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn codes_missing_from_catalog_render_generic_500() {
    let router = register_routes(
        Router::new(),
        create_test_service().await,
        UsersConfig::default(),
        Arc::new(ErrorCatalog::default()),
    );

    let (status, body) = send(&router, Method::GET, "/v1/users/1", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Something went wrong");
}
