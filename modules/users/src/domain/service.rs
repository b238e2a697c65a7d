use std::sync::Arc;

use tracing::{debug, instrument};

use crate::contract::model::{NewUser, Pagination, User, UserListFilter, UserPatch};
use crate::domain::repo::{RepoError, UsersRepository};

/// Domain service for user records.
/// Depends only on the repository port, not on infra types.
#[derive(Clone)]
pub struct Service {
    repo: Arc<dyn UsersRepository>,
}

impl Service {
    pub fn new(repo: Arc<dyn UsersRepository>) -> Self {
        Self { repo }
    }

    #[instrument(name = "users.service.create_user", skip_all, fields(mobile = %new_user.mobile))]
    pub async fn create_user(&self, new_user: NewUser) -> Result<User, RepoError> {
        let user = self.repo.create_user(new_user).await?;
        debug!(user_id = user.id, "user created");
        Ok(user)
    }

    #[instrument(name = "users.service.update_user", skip(self, patch), fields(user_id = id))]
    pub async fn update_user(&self, id: i32, patch: UserPatch) -> Result<Option<User>, RepoError> {
        self.repo.update_user(id, patch).await
    }

    #[instrument(name = "users.service.fetch_by_id", skip(self), fields(user_id = id))]
    pub async fn fetch_by_id(&self, id: i32) -> Result<Option<User>, RepoError> {
        self.repo.fetch_by_id(id).await
    }

    #[instrument(name = "users.service.fetch_by_mobile", skip(self))]
    pub async fn fetch_by_mobile(&self, mobile: &str) -> Result<Option<User>, RepoError> {
        self.repo.fetch_by_mobile(mobile).await
    }

    #[instrument(name = "users.service.fetch_all", skip(self))]
    pub async fn fetch_all(
        &self,
        filter: &UserListFilter,
    ) -> Result<(Vec<User>, Option<Pagination>), RepoError> {
        let (users, meta) = self.repo.fetch_all(filter).await?;
        debug!(count = users.len(), "listed users");
        Ok((users, meta))
    }
}
