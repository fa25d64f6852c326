//! Tweet entity types: `Entities` and everything it references.

use serde_json::Value;

/// A `[start, end)` character-offset pair locating an entity within a Tweet's text.
///
/// Decoded from a two-element JSON array rather than an object, the one attribute that doesn't
/// fit the simple/complex/list shape used elsewhere. Malformed input (not a two-element array of
/// integers) logs a warning and yields `Indices { start: None, end: None, raw }` rather than
/// failing the surrounding datagram, matching `original_source/twittytwister/streaming.py`'s
/// `Indices.fromDict`, which does the same and swallows the exception.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Indices {
    pub start: Option<u64>,
    pub end: Option<u64>,
    pub raw: Value,
}

impl Indices {
    pub fn from_value(value: &Value) -> Self {
        match value.as_array().map(Vec::as_slice) {
            Some([start, end]) => match (start.as_u64(), end.as_u64()) {
                (Some(start), Some(end)) => Indices { start: Some(start), end: Some(end), raw: value.clone() },
                _ => {
                    tracing::warn!(?value, "malformed indices: elements are not integers");
                    Indices { raw: value.clone(), ..Indices::default() }
                }
            },
            _ => {
                tracing::warn!(?value, "malformed indices: expected a two-element array");
                Indices { raw: value.clone(), ..Indices::default() }
            }
        }
    }
}

entity! {
    /// One of the four sizes Twitter renders a `Media` entity at.
    pub struct Size {
        simple { w: u64, h: u64, resize: String }
        complex {}
        boxed {}
        list {}
    }

    /// The set of available `Size`s for a `Media` entity.
    pub struct Sizes {
        simple {}
        complex { large: Size, medium: Size, small: Size, thumb: Size }
        boxed {}
        list {}
    }

    /// A photo or video attached to a Tweet.
    pub struct Media {
        simple {
            id: u64,
            media_url: String,
            media_url_https: String,
            url: String,
            display_url: String,
            expanded_url: String,
            r#type: String,
        }
        complex { indices: Indices, sizes: Sizes }
        boxed {}
        list {}
    }

    /// A URL entity extracted from a Tweet's text.
    pub struct Url {
        simple { url: String, display_url: String, expanded_url: String }
        complex { indices: Indices }
        boxed {}
        list {}
    }

    /// A user mention extracted from a Tweet's text.
    pub struct UserMention {
        simple { id: u64, screen_name: String, name: String }
        complex { indices: Indices }
        boxed {}
        list {}
    }

    /// A hashtag extracted from a Tweet's text.
    pub struct HashTag {
        simple { text: String }
        complex { indices: Indices }
        boxed {}
        list {}
    }

    /// Structured entities (media, URLs, mentions, hashtags) extracted from a Tweet.
    pub struct Entities {
        simple {}
        complex {}
        boxed {}
        list { media: Media, urls: Url, user_mentions: UserMention, hashtags: HashTag }
    }
}
