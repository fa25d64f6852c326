//! OAuth 1.0a signing of Streaming API requests.

use crate::types::RequestMethod;
use oauth::{Credentials, HmacSha1};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use url::Url;

/// A token used to log into Twitter.
///
/// Constructed by the caller (credential loading/config is out of scope here) and handed to
/// [`crate::monitor::Monitor::start`] or the one-shot functions in [`crate::opener`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Token<'a> {
    pub consumer_key: Cow<'a, str>,
    pub consumer_secret: Cow<'a, str>,
    pub access_key: Cow<'a, str>,
    pub access_secret: Cow<'a, str>,
}

impl<'a> Token<'a> {
    pub fn new<CK, CS, AK, AS>(consumer_key: CK, consumer_secret: CS, access_key: AK, access_secret: AS) -> Self
    where
        CK: Into<Cow<'a, str>>,
        CS: Into<Cow<'a, str>>,
        AK: Into<Cow<'a, str>>,
        AS: Into<Cow<'a, str>>,
    {
        Token {
            consumer_key: consumer_key.into(),
            consumer_secret: consumer_secret.into(),
            access_key: access_key.into(),
            access_secret: access_secret.into(),
        }
    }

    fn client_credentials(&self) -> Credentials<&str> {
        Credentials::new(self.consumer_key.as_ref(), self.consumer_secret.as_ref())
    }

    fn token_credentials(&self) -> Credentials<&str> {
        Credentials::new(self.access_key.as_ref(), self.access_secret.as_ref())
    }
}

/// Builds the `Authorization: OAuth ...` header value for a request to `url` with `method`,
/// signing `params` (the exact form parameters that will be sent, per OAuth1's signature base
/// string requirements).
pub fn create_authorization_header(token: &Token, method: &RequestMethod, url: &Url, params: &[(String, String)]) -> String {
    let options = oauth::Options::new();
    oauth::Builder::new(token.client_credentials(), HmacSha1)
        .token(token.token_credentials())
        .options(&options)
        .authorization_header(method.as_str(), url.as_str(), params.iter().map(|(k, v)| (k.as_str(), v.as_str())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_new_accepts_owned_and_borrowed() {
        let owned = Token::new("ck".to_string(), "cs".to_string(), "ak".to_string(), "as".to_string());
        assert_eq!(owned.consumer_key, "ck");

        let borrowed = Token::new("ck", "cs", "ak", "as");
        assert_eq!(borrowed.access_secret, "as");
    }
}
