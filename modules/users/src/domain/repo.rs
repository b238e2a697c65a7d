use crate::contract::model::{NewUser, Pagination, User, UserListFilter, UserPatch};
use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    /// The unique index on `mobile` rejected the write.
    #[error("mobile '{mobile}' is already registered")]
    DuplicateMobile { mobile: String },
    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

/// Port for the domain layer: persistence operations the domain needs.
/// Object-safe and async-friendly via `async_trait`.
///
/// Lookups return `Ok(None)` when no row matches.
#[async_trait]
pub trait UsersRepository: Send + Sync {
    /// Insert a user; storage assigns the id and both timestamps.
    async fn create_user(&self, new_user: NewUser) -> Result<User, RepoError>;
    /// Apply the fields present in `patch` and refresh `updated_at`.
    async fn update_user(&self, id: i32, patch: UserPatch) -> Result<Option<User>, RepoError>;
    async fn fetch_by_id(&self, id: i32) -> Result<Option<User>, RepoError>;
    /// Exact match on mobile.
    async fn fetch_by_mobile(&self, mobile: &str) -> Result<Option<User>, RepoError>;
    /// Filtered list ordered by id, newest first. Pagination is `None` for unbounded limits.
    async fn fetch_all(
        &self,
        filter: &UserListFilter,
    ) -> Result<(Vec<User>, Option<Pagination>), RepoError>;
}
