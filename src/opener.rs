//! Opens a connection to a Streaming API endpoint.
//!
//! Same endpoints and request parameters as `twitter-stream`'s own `TwitterStreamBuilder`, and
//! the same split between query-string parameters (GET) and form-encoded body parameters (POST).
//! Dispatch is generalized from its `hyper::Client<C, B>` bound to a plain
//! `tower_service::Service`, so a [`Monitor`][crate::monitor::Monitor] can be driven with any
//! HTTP client the caller provides -- the monitor does not own the transport.

use crate::auth::{self, Token};
use crate::error::{CloseReason, Error};
use crate::monitor::Delegate;
use crate::types::{FilterLevel, RequestMethod, StatusCode, UserId, With};
use http::{Request, Response};
use http_body::Body;
use std::future::poll_fn;
use tower_service::Service;
use url::Url;

const EP_FILTER: &str = "https://stream.twitter.com/1.1/statuses/filter.json";
const EP_SAMPLE: &str = "https://stream.twitter.com/1.1/statuses/sample.json";
const EP_USER: &str = "https://userstream.twitter.com/1.1/user.json";
const EP_SITE: &str = "https://sitestream.twitter.com/1.1/site.json";

/// A request to open a Streaming API connection, with the endpoint's optional parameters.
///
/// Built via [`filter`], [`sample`], [`user`], [`site`], or [`FeedRequest::custom`], then opened
/// with [`FeedRequest::open`].
#[derive(Clone, Debug)]
pub struct FeedRequest {
    method: RequestMethod,
    url: Url,
    stall_warnings: bool,
    filter_level: FilterLevel,
    replies: bool,
    user_agent: Option<String>,
    language: Option<String>,
    follow: Vec<UserId>,
    track: Option<String>,
    locations: Vec<((f64, f64), (f64, f64))>,
    count: Option<i32>,
    with: Option<With>,
}

impl FeedRequest {
    /// Builds a request against an arbitrary endpoint, for API endpoints not named below.
    pub fn custom(method: RequestMethod, url: Url) -> Self {
        FeedRequest {
            method,
            url,
            stall_warnings: false,
            filter_level: FilterLevel::None,
            replies: false,
            user_agent: None,
            language: None,
            follow: Vec::new(),
            track: None,
            locations: Vec::new(),
            count: None,
            with: None,
        }
    }

    /// Set whether to receive messages when in danger of being disconnected.
    pub fn stall_warnings(&mut self, value: bool) -> &mut Self {
        self.stall_warnings = value;
        self
    }

    /// Set the minimum `filter_level` Tweet attribute to receive.
    pub fn filter_level(&mut self, value: FilterLevel) -> &mut Self {
        self.filter_level = value;
        self
    }

    /// Set whether to receive all @replies.
    pub fn replies(&mut self, value: bool) -> &mut Self {
        self.replies = value;
        self
    }

    /// Set a user agent string to send when connecting.
    pub fn user_agent(&mut self, value: impl Into<String>) -> &mut Self {
        self.user_agent = Some(value.into());
        self
    }

    /// Set a comma-separated language identifier list to restrict Tweets to.
    pub fn language(&mut self, value: impl Into<String>) -> &mut Self {
        self.language = Some(value.into());
        self
    }

    /// Set the list of user IDs to restrict Tweets to, for `filter`.
    pub fn follow(&mut self, ids: impl Into<Vec<UserId>>) -> &mut Self {
        self.follow = ids.into();
        self
    }

    /// Set a comma-separated list of phrases to filter Tweets by.
    pub fn track(&mut self, value: impl Into<String>) -> &mut Self {
        self.track = Some(value.into());
        self
    }

    /// Set a list of bounding boxes, each `((lon1, lat1), (lon2, lat2))`, to filter Tweets by.
    pub fn locations(&mut self, value: impl Into<Vec<((f64, f64), (f64, f64))>>) -> &mut Self {
        self.locations = value.into();
        self
    }

    /// The `count` parameter (requires elevated access).
    pub fn count(&mut self, value: i32) -> &mut Self {
        self.count = Some(value);
        self
    }

    /// Set which message types to deliver on a User or Site Stream.
    pub fn with(&mut self, value: With) -> &mut Self {
        self.with = Some(value);
        self
    }

    fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if self.stall_warnings {
            pairs.push(("stall_warnings", "true".to_owned()));
        }
        if self.filter_level != FilterLevel::None {
            pairs.push(("filter_level", self.filter_level.as_ref().to_owned()));
        }
        if let Some(ref lang) = self.language {
            pairs.push(("language", lang.clone()));
        }
        if !self.follow.is_empty() {
            let joined = self.follow.iter().map(u64::to_string).collect::<Vec<_>>().join(",");
            pairs.push(("follow", joined));
        }
        if let Some(ref track) = self.track {
            pairs.push(("track", track.clone()));
        }
        if !self.locations.is_empty() {
            let joined = self
                .locations
                .iter()
                .flat_map(|&((lon1, lat1), (lon2, lat2))| [lon1, lat1, lon2, lat2])
                .map(|n| n.to_string())
                .collect::<Vec<_>>()
                .join(",");
            pairs.push(("locations", joined));
        }
        if let Some(n) = self.count {
            pairs.push(("count", n.to_string()));
        }
        if let Some(ref with) = self.with {
            pairs.push(("with", with.as_ref().to_owned()));
        }
        if self.replies {
            pairs.push(("replies", "all".to_owned()));
        }
        pairs
    }

    fn build_request(&self, token: &Token) -> Result<Request<Vec<u8>>, Error> {
        let pairs = self.query_pairs();
        let owned_pairs: Vec<(String, String)> = pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect();

        let (uri, body) = if self.method == RequestMethod::POST {
            let body = url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(pairs.iter().map(|(k, v)| (*k, v.as_str())))
                .finish();
            (self.url.as_str().to_owned(), body.into_bytes())
        } else {
            let mut url = self.url.clone();
            {
                let mut qp = url.query_pairs_mut();
                for (k, v) in &pairs {
                    qp.append_pair(k, v);
                }
            }
            (url.to_string(), Vec::new())
        };

        let auth_url = Url::parse(&uri).map_err(Error::custom)?;
        let auth_header = auth::create_authorization_header(token, &self.method, &auth_url, &owned_pairs);

        let mut builder = Request::builder()
            .method(self.method.clone())
            .uri(uri)
            .header(http::header::AUTHORIZATION, auth_header)
            .header(http::header::ACCEPT_ENCODING, "gzip,chunked");
        if let Some(ref ua) = self.user_agent {
            builder = builder.header(http::header::USER_AGENT, ua.as_str());
        }
        if self.method == RequestMethod::POST {
            builder = builder.header(http::header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        }

        builder.body(body).map_err(Error::custom)
    }

    /// Sends the request through `client` and returns the raw response once headers have
    /// arrived, having checked that the status is `200 OK`. The caller drives the response
    /// body through [`crate::frame::FrameDecoder`] and [`crate::decode::decode_datagram`], or
    /// calls [`FeedRequest::open_stream`] to have that done automatically.
    pub async fn open<S, ResBody>(&self, token: &Token, client: &mut S) -> Result<Response<ResBody>, Error>
    where
        S: Service<Request<Vec<u8>>, Response = Response<ResBody>>,
        S::Error: std::error::Error + Send + Sync + 'static,
    {
        poll_fn(|cx| client.poll_ready(cx)).await.map_err(Error::transport)?;
        let req = self.build_request(token)?;
        let resp = client.call(req).await.map_err(Error::transport)?;
        if resp.status() != StatusCode::OK {
            return Err(Error::Http(resp.status()));
        }
        Ok(resp)
    }

    /// Opens this request and, once headers have arrived, spawns a task that drives the
    /// response body to completion, delivering each decoded Tweet to `delegate` in wire order --
    /// a single stream with no reconnect-on-failure, for a caller that doesn't need a
    /// [`crate::monitor::Monitor`]. The returned [`OneShotStream`] resolves once that task ends.
    pub async fn open_stream<S, ResBody>(&self, token: &Token<'_>, client: &mut S, delegate: Delegate) -> Result<OneShotStream, Error>
    where
        S: Service<Request<Vec<u8>>, Response = Response<ResBody>>,
        S::Error: std::error::Error + Send + Sync + 'static,
        ResBody: Body<Data = bytes::Bytes> + Send + Unpin + 'static,
        ResBody::Error: std::error::Error + Send + Sync + 'static,
    {
        let resp = self.open(token, client).await?;
        let body = resp.into_body();
        let handle = tokio::spawn(async move {
            crate::protocol::run_body(body, crate::protocol::DEFAULT_INACTIVITY_TIMEOUT, move |status| {
                if std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| delegate(status))).is_err() {
                    tracing::error!("opener: delegate panicked; continuing");
                }
            })
            .await
        });
        Ok(OneShotStream { handle })
    }
}

/// A one-shot stream opened via [`FeedRequest::open_stream`] (or the [`filter_stream`]/
/// [`user_stream`]/[`site_stream`]/[`track_stream`] convenience functions): the connection is
/// already established and its body is being driven to completion by a spawned task. Awaiting
/// [`OneShotStream::closed`] blocks until that task ends.
pub struct OneShotStream {
    handle: tokio::task::JoinHandle<Result<CloseReason, Error>>,
}

impl OneShotStream {
    /// Waits for the stream to end, returning how it closed.
    pub async fn closed(self) -> Result<CloseReason, Error> {
        match self.handle.await {
            Ok(result) => result,
            Err(_) => Err(Error::custom("stream task panicked")),
        }
    }
}

/// A request for `POST statuses/filter` (track/follow/locations-based filtering).
pub fn filter() -> FeedRequest {
    FeedRequest::custom(RequestMethod::POST, Url::parse(EP_FILTER).expect("EP_FILTER is valid"))
}

/// A request for `GET statuses/sample` (the random sample stream).
pub fn sample() -> FeedRequest {
    FeedRequest::custom(RequestMethod::GET, Url::parse(EP_SAMPLE).expect("EP_SAMPLE is valid"))
}

/// A request for `GET user` (User Stream).
pub fn user() -> FeedRequest {
    FeedRequest::custom(RequestMethod::GET, Url::parse(EP_USER).expect("EP_USER is valid"))
}

/// A request for `GET site` (Site Stream).
pub fn site() -> FeedRequest {
    FeedRequest::custom(RequestMethod::GET, Url::parse(EP_SITE).expect("EP_SITE is valid"))
}

/// Shorthand for `filter().track(phrases)`.
pub fn track(phrases: impl Into<String>) -> FeedRequest {
    let mut req = filter();
    req.track(phrases);
    req
}

/// Opens `POST statuses/filter` with `args` and streams decoded Tweets to `delegate`, with no
/// reconnect-on-failure -- for a caller that wants a single stream without a
/// [`crate::monitor::Monitor`].
pub async fn filter_stream<S, ResBody>(
    delegate: Delegate,
    token: &Token<'_>,
    client: &mut S,
    args: FeedRequest,
) -> Result<OneShotStream, Error>
where
    S: Service<Request<Vec<u8>>, Response = Response<ResBody>>,
    S::Error: std::error::Error + Send + Sync + 'static,
    ResBody: Body<Data = bytes::Bytes> + Send + Unpin + 'static,
    ResBody::Error: std::error::Error + Send + Sync + 'static,
{
    args.open_stream(token, client, delegate).await
}

/// Opens `GET user` with `args` and streams decoded Tweets to `delegate`, with no
/// reconnect-on-failure.
pub async fn user_stream<S, ResBody>(delegate: Delegate, token: &Token<'_>, client: &mut S, args: FeedRequest) -> Result<OneShotStream, Error>
where
    S: Service<Request<Vec<u8>>, Response = Response<ResBody>>,
    S::Error: std::error::Error + Send + Sync + 'static,
    ResBody: Body<Data = bytes::Bytes> + Send + Unpin + 'static,
    ResBody::Error: std::error::Error + Send + Sync + 'static,
{
    args.open_stream(token, client, delegate).await
}

/// Opens `GET site` with `args` and streams decoded Tweets to `delegate`, with no
/// reconnect-on-failure.
pub async fn site_stream<S, ResBody>(delegate: Delegate, token: &Token<'_>, client: &mut S, args: FeedRequest) -> Result<OneShotStream, Error>
where
    S: Service<Request<Vec<u8>>, Response = Response<ResBody>>,
    S::Error: std::error::Error + Send + Sync + 'static,
    ResBody: Body<Data = bytes::Bytes> + Send + Unpin + 'static,
    ResBody::Error: std::error::Error + Send + Sync + 'static,
{
    args.open_stream(token, client, delegate).await
}

/// Shorthand for `filter_stream(delegate, token, client, track(keywords))`.
pub async fn track_stream<S, ResBody>(
    delegate: Delegate,
    token: &Token<'_>,
    client: &mut S,
    keywords: impl Into<String>,
) -> Result<OneShotStream, Error>
where
    S: Service<Request<Vec<u8>>, Response = Response<ResBody>>,
    S::Error: std::error::Error + Send + Sync + 'static,
    ResBody: Body<Data = bytes::Bytes> + Send + Unpin + 'static,
    ResBody::Error: std::error::Error + Send + Sync + 'static,
{
    track(keywords).open_stream(token, client, delegate).await
}

#[cfg(feature = "hyper")]
pub mod hyper_client {
    //! A batteries-included default client, built on `hyper`/`hyper-tls`, behind a feature flag.

    use hyper_pkg::client::HttpConnector;
    use hyper_pkg::Client;
    use hyper_tls::HttpsConnector;

    /// An HTTPS-capable `hyper` client suitable for [`super::FeedRequest::open`].
    pub fn default_client() -> Client<HttpsConnector<HttpConnector>, Vec<u8>> {
        Client::builder().build(HttpsConnector::new())
    }
}
