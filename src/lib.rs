/*!
# twitter-stream-monitor

A long-lived, reconnecting client for the Twitter Streaming API.

## Usage

Add `twitter-stream-monitor` to your dependencies:

```toml
[dependencies]
twitter-stream-monitor = "0.1"
```

## Overview

[`Monitor`] owns the lifecycle of a single streaming connection: it opens a request, decodes the
length-delimited, JSON-encoded datagrams Twitter sends, reconnects on transport/HTTP/other
failures with an independent backoff curve per failure category, and hands decoded [`Status`]es
to a delegate, in wire order, for as long as one is configured.

```rust,no_run
# #[tokio::main]
# async fn main() {
use twitter_stream_monitor::{opener, Monitor, Token};
use std::sync::Arc;

let token = Token::new("consumer_key", "consumer_secret", "access_key", "access_secret");
let client = twitter_stream_monitor::opener::hyper_client::default_client();
let monitor = Monitor::spawn(token, client, opener::track("rust,tokio"));

monitor.start(Some(Arc::new(|status| {
    println!("{}", status.text.unwrap_or_default());
})));
# }
```

If you don't want a default transport, build [`Monitor::spawn`] with any type implementing
`tower_service::Service<http::Request<Vec<u8>>>`.
*/

#[macro_use]
mod schema;
#[macro_use]
mod util;

mod auth;
pub mod backoff;
pub mod decode;
pub mod entities;
pub mod error;
pub mod frame;
pub mod monitor;
pub mod opener;
pub mod protocol;
pub mod tweet;
pub mod types;
pub mod user;

pub use auth::Token;
pub use entities::Entities;
pub use error::{Error, UserError};
pub use monitor::{Delegate, Monitor};
pub use tweet::Status;
pub use user::User;
