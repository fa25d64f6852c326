//! Datagram-to-`Status` decoding.
//!
//! A datagram that fails to parse as JSON, or that parses but isn't a Tweet object (control
//! messages, `friends` lists, deletion notices, etc. all lack a `text` key), is logged and
//! discarded rather than surfaced as an error: only whole-connection failures are errors here.

use crate::tweet::Status;
use bytes::Bytes;

/// Decodes one length-delimited datagram body into a [`Status`], or `None` if it isn't a Tweet.
pub fn decode_datagram(bytes: &Bytes) -> Option<Status> {
    let value: serde_json::Value = match serde_json::from_slice(bytes) {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!(%err, len = bytes.len(), "decode: datagram is not valid JSON, discarding");
            return None;
        }
    };

    if value.get("text").is_none() {
        tracing::debug!("decode: datagram has no `text` key, not a Tweet, discarding");
        return None;
    }

    Some(Status::from_value(&value))
}
