use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::contract::model::{NewUser, PageLimit, Pagination, User, UserListFilter, UserPatch};

/// REST DTO for user representation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserDto {
    pub id: i32,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub mobile: String,
    pub profile_picture: Option<String>,
    pub dob: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// REST DTO for creating a new user
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateUserReq {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[serde(default)]
    #[validate(length(min = 1, message = "mobile is required"))]
    pub mobile: String,
    pub profile_picture: Option<String>,
    #[validate(required(message = "dob is required"))]
    pub dob: Option<NaiveDate>,
    pub metadata: Option<serde_json::Value>,
}

/// REST DTO for updating a user (partial)
#[derive(Debug, Clone, Deserialize, Default)]
pub struct UpdateUserReq {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub mobile: Option<String>,
    pub profile_picture: Option<String>,
    pub dob: Option<NaiveDate>,
    pub metadata: Option<serde_json::Value>,
}

/// Query parameters of the list endpoint
#[derive(Debug, Clone, Deserialize, Validate, Default)]
pub struct ListUsersQuery {
    pub mobile: Option<String>,
    pub name: Option<String>,
    #[validate(range(min = 1, message = "page starts at 1"))]
    pub page: Option<u64>,
    /// `-1` lists everything; 0 is rejected by `into_filter`.
    #[validate(range(min = -1, message = "limit must be -1 or at least 1"))]
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaginationDto {
    pub current_page: u64,
    pub total_pages: u64,
    pub total_data_count: u64,
}

/// Success envelope
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<PaginationDto>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
            meta: None,
        }
    }

    pub fn with_meta(mut self, meta: Option<PaginationDto>) -> Self {
        self.meta = meta;
        self
    }
}

/// Error envelope, written only by the error middleware
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub success: bool,
    pub code: String,
    pub message: String,
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.filter(|s| !s.trim().is_empty())
}

impl From<User> for UserDto {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            first_name: user.first_name,
            last_name: user.last_name,
            mobile: user.mobile,
            profile_picture: user.profile_picture,
            dob: user.dob,
            created_at: user.created_at,
            updated_at: user.updated_at,
            metadata: user.metadata,
        }
    }
}

impl From<Pagination> for PaginationDto {
    fn from(p: Pagination) -> Self {
        Self {
            current_page: p.current_page,
            total_pages: p.total_pages,
            total_data_count: p.total_data_count,
        }
    }
}

impl From<CreateUserReq> for NewUser {
    fn from(req: CreateUserReq) -> Self {
        Self {
            first_name: non_empty(req.first_name),
            last_name: non_empty(req.last_name),
            mobile: req.mobile.trim().to_owned(),
            profile_picture: non_empty(req.profile_picture),
            dob: req.dob,
            metadata: req.metadata,
        }
    }
}

/// Blank strings count as "not supplied"; JSON `null` metadata too.
impl From<UpdateUserReq> for UserPatch {
    fn from(req: UpdateUserReq) -> Self {
        Self {
            first_name: non_empty(req.first_name),
            last_name: non_empty(req.last_name),
            mobile: non_empty(req.mobile).map(|m| m.trim().to_owned()),
            profile_picture: non_empty(req.profile_picture),
            dob: req.dob,
            metadata: req.metadata.filter(|m| !m.is_null()),
        }
    }
}

impl ListUsersQuery {
    /// Build the repository filter. Call after `validate()`.
    pub fn into_filter(self, default_page_size: u64) -> Result<UserListFilter, &'static str> {
        let limit = match self.limit {
            None => PageLimit::Bounded(default_page_size),
            Some(-1) => PageLimit::Unbounded,
            Some(n) if n >= 1 => PageLimit::Bounded(n.unsigned_abs()),
            Some(_) => return Err("limit must be -1 or at least 1"),
        };
        let page = self.page.unwrap_or(1);
        // Offsets are bound as signed 64-bit integers
        if let PageLimit::Bounded(n) = limit {
            let offset = page
                .saturating_sub(1)
                .checked_mul(n)
                .filter(|o| i64::try_from(*o).is_ok());
            if offset.is_none() {
                return Err("page is out of range");
            }
        }
        Ok(UserListFilter {
            mobile: non_empty(self.mobile).map(|m| m.trim().to_owned()),
            name: non_empty(self.name),
            page,
            limit,
        })
    }
}
