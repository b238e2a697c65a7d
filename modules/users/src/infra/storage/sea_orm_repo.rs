//! SeaORM-backed repository implementation for the domain port.
//!
//! This struct is generic over `C: ConnectionTrait`, so you can construct it
//! with a `DatabaseConnection` **or** a transactional connection.

use chrono::Utc;
use sea_orm::sea_query::{Expr, SimpleExpr};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, NotSet, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Select, Set, SqlErr,
};

use crate::contract::model::{NewUser, PageLimit, Pagination, User, UserListFilter, UserPatch};
use crate::domain::repo::{RepoError, UsersRepository};
use crate::infra::storage::entity::{ActiveModel as UserAM, Column, Entity as UserEntity};

const LIKE_ESCAPE: char = '\\';

/// SeaORM repository impl.
/// Holds a connection object; its lifetime/ownership is up to the caller.
pub struct SeaOrmUsersRepository<C>
where
    C: ConnectionTrait + Send + Sync,
{
    conn: C,
}

impl<C> SeaOrmUsersRepository<C>
where
    C: ConnectionTrait + Send + Sync,
{
    pub fn new(conn: C) -> Self {
        Self { conn }
    }
}

/// Escape LIKE metacharacters so user input matches literally.
fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '%' | '_' | LIKE_ESCAPE) {
            out.push(LIKE_ESCAPE);
        }
        out.push(ch);
    }
    out
}

/// `LOWER(col) LIKE LOWER('%needle%') ESCAPE '\'` with the needle escaped.
///
/// Both sides go through the engine's `LOWER`, so case folding is whatever the
/// engine does: full Unicode on PostgreSQL, ASCII only on SQLite.
fn contains_ci(col: Column, needle: &str) -> SimpleExpr {
    let pattern = format!("%{}%", escape_like(needle));
    Expr::cust_with_exprs(
        "LOWER($1) LIKE LOWER($2) ESCAPE $3",
        [
            Expr::col((UserEntity, col)).into(),
            Expr::val(pattern).into(),
            Expr::val(LIKE_ESCAPE.to_string()).into(),
        ],
    )
}

fn filtered_query(filter: &UserListFilter) -> Select<UserEntity> {
    let mut query = UserEntity::find();
    if let Some(mobile) = filter.mobile.as_deref() {
        query = query.filter(contains_ci(Column::Mobile, mobile));
    }
    let (first, last) = filter.name_tokens();
    if let Some(first) = first {
        query = query.filter(contains_ci(Column::FirstName, first));
    }
    if let Some(last) = last {
        query = query.filter(contains_ci(Column::LastName, last));
    }
    query
}

fn classify_write_error(err: DbErr, mobile: Option<&str>) -> RepoError {
    match (err.sql_err(), mobile) {
        (Some(SqlErr::UniqueConstraintViolation(_)), Some(mobile)) => RepoError::DuplicateMobile {
            mobile: mobile.to_owned(),
        },
        _ => RepoError::Database(err),
    }
}

#[async_trait::async_trait]
impl<C> UsersRepository for SeaOrmUsersRepository<C>
where
    C: ConnectionTrait + Send + Sync + 'static,
{
    async fn create_user(&self, new_user: NewUser) -> Result<User, RepoError> {
        let now = Utc::now();
        let mobile = new_user.mobile.clone();
        let m = UserAM {
            id: NotSet,
            first_name: Set(new_user.first_name),
            last_name: Set(new_user.last_name),
            mobile: Set(new_user.mobile),
            profile_picture: Set(new_user.profile_picture),
            dob: Set(new_user.dob),
            created_at: Set(now),
            updated_at: Set(now),
            metadata: Set(new_user.metadata),
        };
        let stored = m
            .insert(&self.conn)
            .await
            .map_err(|e| classify_write_error(e, Some(&mobile)))?;
        Ok(stored.into())
    }

    async fn update_user(&self, id: i32, patch: UserPatch) -> Result<Option<User>, RepoError> {
        let mut m = UserAM {
            id: Set(id),
            updated_at: Set(Utc::now()),
            ..Default::default()
        };
        if let Some(v) = patch.first_name {
            m.first_name = Set(Some(v));
        }
        if let Some(v) = patch.last_name {
            m.last_name = Set(Some(v));
        }
        if let Some(v) = patch.mobile.clone() {
            m.mobile = Set(v);
        }
        if let Some(v) = patch.profile_picture {
            m.profile_picture = Set(Some(v));
        }
        if let Some(v) = patch.dob {
            m.dob = Set(Some(v));
        }
        if let Some(v) = patch.metadata {
            m.metadata = Set(Some(v));
        }

        match m.update(&self.conn).await {
            Ok(updated) => Ok(Some(updated.into())),
            Err(DbErr::RecordNotUpdated) => Ok(None),
            Err(e) => Err(classify_write_error(e, patch.mobile.as_deref())),
        }
    }

    async fn fetch_by_id(&self, id: i32) -> Result<Option<User>, RepoError> {
        let found = UserEntity::find_by_id(id).one(&self.conn).await?;
        Ok(found.map(Into::into))
    }

    async fn fetch_by_mobile(&self, mobile: &str) -> Result<Option<User>, RepoError> {
        let found = UserEntity::find()
            .filter(Column::Mobile.eq(mobile))
            .one(&self.conn)
            .await?;
        Ok(found.map(Into::into))
    }

    async fn fetch_all(
        &self,
        filter: &UserListFilter,
    ) -> Result<(Vec<User>, Option<Pagination>), RepoError> {
        let query = filtered_query(filter);

        let (rows, meta) = match filter.limit {
            PageLimit::Unbounded => {
                let rows = query.order_by_desc(Column::Id).all(&self.conn).await?;
                (rows, None)
            }
            PageLimit::Bounded(limit) => {
                let total = query.clone().count(&self.conn).await?;
                let rows = query
                    .order_by_desc(Column::Id)
                    .limit(limit)
                    .offset(filter.offset(limit))
                    .all(&self.conn)
                    .await?;
                (rows, Some(Pagination::new(filter.page, limit, total)))
            }
        };

        Ok((rows.into_iter().map(Into::into).collect(), meta))
    }
}
