//! The `User` entity, i.e. a Twitter account.

use crate::tweet::Status;
use crate::util::parse_datetime;
use chrono::{DateTime, Utc};

entity! {
    /// A Twitter account, as attached to a `Status` or delivered standalone on a user stream.
    pub struct User {
        simple {
            id: u64,
            name: String,
            screen_name: String,
            location: String,
            description: String,
            profile_image_url: String,
            url: String,
            protected: bool,
            followers_count: u64,
            profile_background_color: String,
            profile_text_color: String,
            profile_link_color: String,
            profile_sidebar_fill_color: String,
            profile_sidebar_border_color: String,
            friends_count: u64,
            created_at: String,
            favourites_count: u64,
            utc_offset: i64,
            time_zone: String,
            following: bool,
            notifications: bool,
            statuses_count: u64,
            profile_background_image_url: String,
            profile_background_tile: bool,
            verified: bool,
            geo_enabled: bool,
        }
        complex {}
        boxed { status: Status }
        list {}
    }
}

impl User {
    /// Parses [`User::created_at`] using Twitter's fixed timestamp format, logging and returning
    /// `None` rather than failing if the field is absent or malformed.
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.created_at.as_deref()?;
        match parse_datetime(raw) {
            Ok(dt) => Some(dt),
            Err(err) => {
                tracing::warn!(%raw, %err, "user: failed to parse created_at");
                None
            }
        }
    }
}
