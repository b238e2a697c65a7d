/// Settings for the users REST surface.
#[derive(Debug, Clone)]
pub struct UsersConfig {
    /// Page size for list requests that omit `limit`.
    pub default_page_size: u64,
}

impl Default for UsersConfig {
    fn default() -> Self {
        Self {
            default_page_size: 20,
        }
    }
}
