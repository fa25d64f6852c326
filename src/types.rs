//! Common types used across the crate.

pub use http::Method as RequestMethod;
pub use http::StatusCode;
pub use http::Uri;

string_enums! {
    /// Represents the `filter_level` parameter in API requests.
    #[derive(Clone, Debug)]
    pub enum FilterLevel {
        None("none"),
        Low("low"),
        Medium("medium");
        Custom(_),
    }
}

impl std::default::Default for FilterLevel {
    fn default() -> Self {
        FilterLevel::None
    }
}

string_enums! {
    /// Represents the `with` parameter for User and Site Streams.
    #[derive(Clone, Debug)]
    pub enum With {
        User("user"),
        Followings("followings");
        Custom(_),
    }
}

/// User-id type used in `follow` parameters and decoded entities.
pub type UserId = u64;

/// Status-id type used in decoded entities.
pub type StatusId = u64;
