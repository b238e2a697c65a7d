use chrono::{DateTime, NaiveDate, Utc};

/// A stored user record.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: i32,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub mobile: String,
    pub profile_picture: Option<String>,
    pub dob: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub metadata: Option<serde_json::Value>,
}

/// Data for creating a user. Id and timestamps are assigned by storage.
#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub mobile: String,
    pub profile_picture: Option<String>,
    pub dob: Option<NaiveDate>,
    pub metadata: Option<serde_json::Value>,
}

/// Partial update; `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserPatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub mobile: Option<String>,
    pub profile_picture: Option<String>,
    pub dob: Option<NaiveDate>,
    pub metadata: Option<serde_json::Value>,
}

impl UserPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageLimit {
    /// Every matching row, no paging metadata.
    Unbounded,
    Bounded(u64),
}

/// List query. `mobile` and `name` are case-insensitive substring filters.
#[derive(Debug, Clone, PartialEq)]
pub struct UserListFilter {
    pub mobile: Option<String>,
    pub name: Option<String>,
    /// 1-based.
    pub page: u64,
    pub limit: PageLimit,
}

impl Default for UserListFilter {
    fn default() -> Self {
        Self {
            mobile: None,
            name: None,
            page: 1,
            limit: PageLimit::Bounded(20),
        }
    }
}

impl UserListFilter {
    /// First and last name tokens of the `name` filter.
    ///
    /// One token filters the first name only; further tokens after the second are ignored.
    pub fn name_tokens(&self) -> (Option<&str>, Option<&str>) {
        let mut tokens = self.name.as_deref().unwrap_or_default().split_whitespace();
        (tokens.next(), tokens.next())
    }

    /// Rows to skip for the current page.
    pub fn offset(&self, limit: u64) -> u64 {
        self.page.saturating_sub(1).saturating_mul(limit)
    }
}

/// Paging metadata returned alongside a bounded list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub current_page: u64,
    pub total_pages: u64,
    pub total_data_count: u64,
}

impl Pagination {
    pub fn new(page: u64, limit: u64, total: u64) -> Self {
        Self {
            current_page: page,
            total_pages: if limit == 0 { 0 } else { total.div_ceil(limit) },
            total_data_count: total,
        }
    }
}
