pub mod model;

pub use model::{NewUser, PageLimit, Pagination, User, UserListFilter, UserPatch};
