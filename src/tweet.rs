//! The `Status` entity, i.e. a Tweet.

use crate::entities::Entities;
use crate::user::User;
use crate::util::parse_datetime;
use chrono::{DateTime, Utc};
use serde_json::Value;

entity! {
    /// A Tweet, as delivered on a filter/sample/user stream.
    pub struct Status {
        simple {
            created_at: String,
            id: u64,
            text: String,
            source: String,
            truncated: bool,
            in_reply_to_status_id: u64,
            in_reply_to_screen_name: String,
            in_reply_to_user_id: u64,
            favorited: bool,
            user_id: u64,
            geo: Value,
        }
        complex { entities: Entities }
        boxed { retweeted_status: Status, user: User }
        list {}
    }
}

impl Status {
    /// Parses [`Status::created_at`] using Twitter's fixed timestamp format, logging and
    /// returning `None` rather than failing if the field is absent or malformed (datetime
    /// parsing never fails entity decode, only this convenience accessor).
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.created_at.as_deref()?;
        match parse_datetime(raw) {
            Ok(dt) => Some(dt),
            Err(err) => {
                tracing::warn!(%raw, %err, "status: failed to parse created_at");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_flat_fields_and_nested_entities() {
        let v = json!({
            "created_at": "Mon May 01 00:00:00 +0000 2017",
            "id": 123456789,
            "text": "hello, world",
            "truncated": false,
            "user_id": 42,
            "entities": {
                "hashtags": [{"text": "rust", "indices": [7, 12]}],
                "urls": [],
                "user_mentions": [],
                "media": [],
            },
        });
        let status = Status::from_value(&v);
        assert_eq!(status.id, Some(123456789));
        assert_eq!(status.text.as_deref(), Some("hello, world"));
        assert_eq!(status.truncated, Some(false));
        assert_eq!(status.entities.unwrap().hashtags.len(), 1);
        assert!(status.retweeted_status.is_none());
    }

    #[test]
    fn created_at_parses_twitters_fixed_format() {
        let v = json!({"created_at": "Mon May 01 00:00:00 +0000 2017"});
        let status = Status::from_value(&v);
        let dt = status.created_at().unwrap();
        assert_eq!(dt.to_rfc3339(), "2017-05-01T00:00:00+00:00");
    }

    #[test]
    fn created_at_tolerates_garbage() {
        let v = json!({"created_at": "not a date"});
        let status = Status::from_value(&v);
        assert!(status.created_at().is_none());
    }

    #[test]
    fn decodes_retweet_and_author_cycle() {
        let v = json!({
            "id": 2,
            "text": "RT @rustlang: hello",
            "user": {"id": 1, "screen_name": "rustlang"},
            "retweeted_status": {
                "id": 1,
                "text": "hello",
                "user": {"id": 1, "screen_name": "rustlang"},
            },
        });
        let status = Status::from_value(&v);
        let user = status.user.unwrap();
        assert_eq!(user.screen_name.as_deref(), Some("rustlang"));
        let retweet = status.retweeted_status.unwrap();
        assert_eq!(retweet.id, Some(1));
        assert_eq!(retweet.user.unwrap().id, Some(1));
    }
}
