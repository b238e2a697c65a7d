//! In-process repository with the same semantics as the SeaORM adapter.
//! Used by tests that don't need SQL.

use chrono::Utc;
use tokio::sync::Mutex;

use crate::contract::model::{NewUser, PageLimit, Pagination, User, UserListFilter, UserPatch};
use crate::domain::repo::{RepoError, UsersRepository};

#[derive(Default)]
pub struct InMemoryUsersRepository {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    rows: Vec<User>,
    last_id: i32,
}

impl InMemoryUsersRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn contains_ci(haystack: Option<&str>, needle: &str) -> bool {
    haystack.is_some_and(|h| h.to_lowercase().contains(&needle.to_lowercase()))
}

fn passes_filter(user: &User, filter: &UserListFilter) -> bool {
    if let Some(mobile) = filter.mobile.as_deref() {
        if !contains_ci(Some(&user.mobile), mobile) {
            return false;
        }
    }
    let (first, last) = filter.name_tokens();
    first.map_or(true, |f| contains_ci(user.first_name.as_deref(), f))
        && last.map_or(true, |l| contains_ci(user.last_name.as_deref(), l))
}

#[async_trait::async_trait]
impl UsersRepository for InMemoryUsersRepository {
    async fn create_user(&self, new_user: NewUser) -> Result<User, RepoError> {
        let mut state = self.state.lock().await;
        if state.rows.iter().any(|u| u.mobile == new_user.mobile) {
            return Err(RepoError::DuplicateMobile {
                mobile: new_user.mobile,
            });
        }
        state.last_id += 1;
        let now = Utc::now();
        let user = User {
            id: state.last_id,
            first_name: new_user.first_name,
            last_name: new_user.last_name,
            mobile: new_user.mobile,
            profile_picture: new_user.profile_picture,
            dob: new_user.dob,
            created_at: now,
            updated_at: now,
            metadata: new_user.metadata,
        };
        state.rows.push(user.clone());
        Ok(user)
    }

    async fn update_user(&self, id: i32, patch: UserPatch) -> Result<Option<User>, RepoError> {
        let mut state = self.state.lock().await;
        if let Some(mobile) = patch.mobile.as_deref() {
            if state.rows.iter().any(|u| u.id != id && u.mobile == mobile) {
                return Err(RepoError::DuplicateMobile {
                    mobile: mobile.to_owned(),
                });
            }
        }
        let Some(user) = state.rows.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        if let Some(v) = patch.first_name {
            user.first_name = Some(v);
        }
        if let Some(v) = patch.last_name {
            user.last_name = Some(v);
        }
        if let Some(v) = patch.mobile {
            user.mobile = v;
        }
        if let Some(v) = patch.profile_picture {
            user.profile_picture = Some(v);
        }
        if let Some(v) = patch.dob {
            user.dob = Some(v);
        }
        if let Some(v) = patch.metadata {
            user.metadata = Some(v);
        }
        user.updated_at = Utc::now();
        Ok(Some(user.clone()))
    }

    async fn fetch_by_id(&self, id: i32) -> Result<Option<User>, RepoError> {
        let state = self.state.lock().await;
        Ok(state.rows.iter().find(|u| u.id == id).cloned())
    }

    async fn fetch_by_mobile(&self, mobile: &str) -> Result<Option<User>, RepoError> {
        let state = self.state.lock().await;
        Ok(state.rows.iter().find(|u| u.mobile == mobile).cloned())
    }

    async fn fetch_all(
        &self,
        filter: &UserListFilter,
    ) -> Result<(Vec<User>, Option<Pagination>), RepoError> {
        let state = self.state.lock().await;
        let mut hits: Vec<User> = state
            .rows
            .iter()
            .filter(|u| passes_filter(u, filter))
            .cloned()
            .collect();
        hits.sort_by(|a, b| b.id.cmp(&a.id));

        match filter.limit {
            PageLimit::Unbounded => Ok((hits, None)),
            PageLimit::Bounded(limit) => {
                let total = hits.len() as u64;
                let skip = usize::try_from(filter.offset(limit)).unwrap_or(usize::MAX);
                let take = usize::try_from(limit).unwrap_or(usize::MAX);
                let page = hits.into_iter().skip(skip).take(take).collect();
                Ok((page, Some(Pagination::new(filter.page, limit, total))))
            }
        }
    }
}
