//! The connection monitor: a state machine owning one stream's lifecycle, reconnecting with
//! domain-specific backoff and mediating between a delegate and the transport.
//!
//! The actor shape -- a cheap `Clone` handle wrapping an `mpsc` sender, backed by one
//! `tokio::spawn`ed task that owns all mutable state -- is the reconnect-loop pattern other
//! Tokio forwarder/receiver services use; `twitter-stream`'s own `TwitterStream` is one-shot and
//! never reconnects, so the loop and its backoff bookkeeping are new here.

use crate::auth::Token;
use crate::backoff::{Backoff, Category};
use crate::error::{CloseReason, Error, UserError};
use crate::opener::FeedRequest;
use crate::protocol::{self, DEFAULT_INACTIVITY_TIMEOUT};
use crate::tweet::Status;
use http::{Request, Response};
use http_body::Body;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep_until, Instant};
use tower_service::Service;

/// Called once per decoded Tweet, in wire order, for as long as a delegate is configured.
/// `Arc` rather than `Box` so the body-reading task can share it without the actor giving it up:
/// the delegate is read, never moved, across transitions.
pub type Delegate = Arc<dyn Fn(Status) + Send + Sync + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Stopped,
    Idle,
    Connecting,
    Connected,
    Disconnecting,
    Disconnected,
    Waiting,
    Aborting,
}

/// What an `aborting`/`disconnecting` detour should resolve to once the in-flight transport
/// settles. These two states are transient and always exit on a transport event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pending {
    Reconnect,
    Stop,
}

enum Command {
    Start(Option<Delegate>),
    Stop,
    SetFilters(FeedRequest),
    Connect { force: bool, resp: oneshot::Sender<Result<(), UserError>> },
    OpenResolved { generation: u64, result: Result<OpenedBody, Error> },
    BodyClosed { generation: u64, result: Result<CloseReason, Error> },
}

/// An opened response, ready to be read as a stream of datagrams.
struct OpenedBody {
    body: Box<dyn Body<Data = bytes::Bytes, Error = Box<dyn std::error::Error + Send + Sync>> + Send + Unpin>,
}

/// A cheap, `Clone`-able handle to a running [`Monitor`] actor.
///
/// All methods other than [`Monitor::connect`] are fire-and-forget: the monitor never blocks the
/// caller, and the actor applies them on its own turn, in the order they were sent.
#[derive(Clone)]
pub struct Monitor {
    tx: mpsc::UnboundedSender<Command>,
}

impl Monitor {
    /// Spawns the actor task and returns a handle to it. The monitor starts `stopped` with no
    /// delegate.
    pub fn spawn<S, ResBody>(token: Token<'static>, client: S, request: FeedRequest) -> Self
    where
        S: Service<Request<Vec<u8>>, Response = Response<ResBody>> + Clone + Send + 'static,
        S::Future: Send + 'static,
        S::Error: std::error::Error + Send + Sync + 'static,
        ResBody: Body<Data = bytes::Bytes> + Send + Unpin + 'static,
        ResBody::Error: std::error::Error + Send + Sync + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let state = MonitorState {
            state: State::Stopped,
            delegate: None,
            request,
            token,
            client,
            backoff: Backoff::new(),
            pending: None,
            stop_tx: None,
            deadline: None,
            generation: 0,
            tx: tx.clone(),
        };
        tokio::spawn(run(state, rx));
        Monitor { tx }
    }

    /// Begin serving, with `delegate` (if any) as the Tweet sink.
    pub fn start(&self, delegate: Option<Delegate>) {
        let _ = self.tx.send(Command::Start(delegate));
    }

    /// End the service; no reconnect follows the resulting close.
    pub fn stop(&self) {
        let _ = self.tx.send(Command::Stop);
    }

    /// Update the request parameters used by the next (re)connect, forcing an immediate
    /// reconnect if currently connected.
    pub fn set_filters(&self, request: FeedRequest) {
        let _ = self.tx.send(Command::SetFilters(request));
    }

    /// User-level request to (re)connect, with `force` forcing a reconnect even if already
    /// connected. Rejected with [`UserError::NotRunning`]/[`UserError::NoDelegate`] per the
    /// rejection policy; these are the only two errors ever surfaced synchronously to a caller.
    pub async fn connect(&self, force: bool) -> Result<(), UserError> {
        let (resp_tx, resp_rx) = oneshot::channel();
        if self.tx.send(Command::Connect { force, resp: resp_tx }).is_err() {
            return Err(UserError::NotRunning);
        }
        resp_rx.await.unwrap_or(Err(UserError::NotRunning))
    }
}

struct MonitorState<S> {
    state: State,
    delegate: Option<Delegate>,
    request: FeedRequest,
    token: Token<'static>,
    client: S,
    backoff: Backoff,
    pending: Option<Pending>,
    stop_tx: Option<oneshot::Sender<()>>,
    deadline: Option<Instant>,
    generation: u64,
    tx: mpsc::UnboundedSender<Command>,
}

async fn run<S, ResBody>(mut st: MonitorState<S>, mut rx: mpsc::UnboundedReceiver<Command>)
where
    S: Service<Request<Vec<u8>>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: std::error::Error + Send + Sync + 'static,
    ResBody: Body<Data = bytes::Bytes> + Send + Unpin + 'static,
    ResBody::Error: std::error::Error + Send + Sync + 'static,
{
    loop {
        let timer_fires = async {
            match st.deadline {
                Some(deadline) if st.state == State::Waiting => sleep_until(deadline).await,
                _ => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            cmd = rx.recv() => {
                match cmd {
                    Some(cmd) => handle_command(&mut st, cmd),
                    None => break, // every `Monitor` handle was dropped
                }
            }
            _ = timer_fires => {
                tracing::debug!("monitor: reconnect timer fired");
                st.deadline = None;
                st.state = State::Connecting;
                spawn_opener(&mut st);
            }
        }
    }
}

fn handle_command<S, ResBody>(st: &mut MonitorState<S>, cmd: Command)
where
    S: Service<Request<Vec<u8>>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: std::error::Error + Send + Sync + 'static,
    ResBody: Body<Data = bytes::Bytes> + Send + Unpin + 'static,
    ResBody::Error: std::error::Error + Send + Sync + 'static,
{
    match cmd {
        Command::Start(delegate) => handle_start(st, delegate),
        Command::Stop => handle_stop(st),
        Command::SetFilters(request) => handle_set_filters(st, request),
        Command::Connect { force, resp } => {
            let result = handle_connect(st, force);
            let _ = resp.send(result);
        }
        Command::OpenResolved { generation, result } => handle_open_resolved(st, generation, result),
        Command::BodyClosed { generation, result } => handle_body_closed(st, generation, result),
    }
}

fn handle_start<S, ResBody>(st: &mut MonitorState<S>, delegate: Option<Delegate>)
where
    S: Service<Request<Vec<u8>>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: std::error::Error + Send + Sync + 'static,
    ResBody: Body<Data = bytes::Bytes> + Send + Unpin + 'static,
    ResBody::Error: std::error::Error + Send + Sync + 'static,
{
    match st.state {
        State::Stopped => {
            st.delegate = delegate;
            if st.delegate.is_some() {
                st.state = State::Connecting;
                spawn_opener(st);
            } else {
                st.state = State::Idle;
            }
        }
        // Already idle: just attach (or clear) the delegate, staying in `idle`. This is the only
        // way to make `idle`'s delegate non-`None`, so a later `connect()` can actually move to
        // `connecting` instead of being rejected with `NoDelegate`.
        State::Idle => st.delegate = delegate,
        _ => tracing::debug!(?st.state, "monitor: start() ignored, already running"),
    }
}

fn handle_stop<S>(st: &mut MonitorState<S>) {
    match st.state {
        State::Stopped => {}
        State::Idle | State::Disconnected => st.state = State::Stopped,
        State::Waiting => {
            st.state = State::Stopped;
            st.deadline = None;
        }
        State::Connecting => {
            st.state = State::Aborting;
            st.pending = Some(Pending::Stop);
        }
        State::Connected => {
            st.state = State::Disconnecting;
            st.pending = Some(Pending::Stop);
            request_transport_stop(st);
        }
        State::Aborting | State::Disconnecting => {
            // Already mid-transition; make sure it lands on `stopped` rather than reconnecting.
            st.pending = Some(Pending::Stop);
        }
    }
}

fn handle_set_filters<S>(st: &mut MonitorState<S>, request: FeedRequest) {
    st.request = request;
    if st.state == State::Connected {
        st.state = State::Disconnecting;
        st.pending = Some(Pending::Reconnect);
        request_transport_stop(st);
    }
}

fn handle_connect<S, ResBody>(st: &mut MonitorState<S>, force: bool) -> Result<(), UserError>
where
    S: Service<Request<Vec<u8>>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: std::error::Error + Send + Sync + 'static,
    ResBody: Body<Data = bytes::Bytes> + Send + Unpin + 'static,
    ResBody::Error: std::error::Error + Send + Sync + 'static,
{
    match st.state {
        State::Stopped => Err(UserError::NotRunning),
        State::Idle => {
            if st.delegate.is_none() {
                Err(UserError::NoDelegate)
            } else {
                st.state = State::Connecting;
                spawn_opener(st);
                Ok(())
            }
        }
        State::Connecting if force => {
            st.state = State::Aborting;
            st.pending = Some(Pending::Reconnect);
            Ok(())
        }
        State::Connected if force => {
            st.state = State::Disconnecting;
            st.pending = Some(Pending::Reconnect);
            request_transport_stop(st);
            Ok(())
        }
        State::Connecting | State::Connected | State::Disconnecting | State::Aborting => Err(UserError::NotRunning),
        State::Waiting => {
            if st.delegate.is_none() {
                return Err(UserError::NoDelegate);
            }
            st.deadline = None;
            st.state = State::Connecting;
            spawn_opener(st);
            Ok(())
        }
        State::Disconnected => {
            if st.delegate.is_none() {
                return Err(UserError::NoDelegate);
            }
            st.state = State::Connecting;
            spawn_opener(st);
            Ok(())
        }
    }
}

fn handle_open_resolved<S, ResBody>(st: &mut MonitorState<S>, generation: u64, result: Result<OpenedBody, Error>)
where
    S: Service<Request<Vec<u8>>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: std::error::Error + Send + Sync + 'static,
    ResBody: Body<Data = bytes::Bytes> + Send + Unpin + 'static,
    ResBody::Error: std::error::Error + Send + Sync + 'static,
{
    if generation != st.generation {
        tracing::debug!(generation, current = st.generation, "monitor: dropping stale opener result");
        return;
    }

    match (st.state, result) {
        (State::Connecting, Ok(opened)) => {
            st.backoff.reset(Category::Transport);
            st.backoff.reset(Category::Http);
            st.state = State::Connected;
            spawn_body_reader(st, opened);
        }
        (State::Aborting, Ok(opened)) => {
            st.state = State::Disconnecting;
            spawn_body_reader(st, opened);
            request_transport_stop(st);
        }
        (State::Connecting, Err(err)) | (State::Aborting, Err(err)) => {
            tracing::warn!(%err, "monitor: opener failed");
            let category = err.category();
            enter_waiting_or_stopped(st, category);
            st.backoff.record_failure(category);
        }
        (other, _) => {
            tracing::debug!(?other, "monitor: opener resolved in an unexpected state, ignoring");
        }
    }
}

fn handle_body_closed<S, ResBody>(st: &mut MonitorState<S>, generation: u64, result: Result<CloseReason, Error>)
where
    S: Service<Request<Vec<u8>>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: std::error::Error + Send + Sync + 'static,
    ResBody: Body<Data = bytes::Bytes> + Send + Unpin + 'static,
    ResBody::Error: std::error::Error + Send + Sync + 'static,
{
    if generation != st.generation {
        tracing::debug!(generation, current = st.generation, "monitor: dropping stale body-closed event");
        return;
    }
    st.stop_tx = None;

    match st.state {
        State::Disconnecting => {
            st.state = State::Disconnected;
            match st.pending.take() {
                Some(Pending::Stop) | None => st.state = State::Stopped,
                Some(Pending::Reconnect) => {
                    let delay = st.backoff.delay(Category::Transport);
                    enter_waiting_with_delay(st, delay);
                }
            }
        }
        State::Connected => match result {
            Ok(_clean_or_data_loss) => {
                let delay = st.backoff.delay(Category::Transport);
                enter_waiting_with_delay(st, delay);
            }
            Err(err) => {
                tracing::warn!(%err, "monitor: transport closed with error");
                let category = err.category();
                enter_waiting_or_stopped(st, category);
                st.backoff.record_failure(category);
            }
        },
        other => {
            tracing::debug!(?other, "monitor: body-closed event in an unexpected state, ignoring");
        }
    }
}

fn enter_waiting_or_stopped<S, ResBody>(st: &mut MonitorState<S>, category: Category)
where
    S: Service<Request<Vec<u8>>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: std::error::Error + Send + Sync + 'static,
    ResBody: Body<Data = bytes::Bytes> + Send + Unpin + 'static,
    ResBody::Error: std::error::Error + Send + Sync + 'static,
{
    if st.pending.take() == Some(Pending::Stop) {
        st.state = State::Stopped;
        return;
    }
    let delay = st.backoff.delay(category);
    enter_waiting_with_delay(st, delay);
}

/// Enters `waiting` with a timer for `delay`, except a zero delay (unreachable with the current
/// backoff curves, whose `initial` is always positive, but kept correct for a disconnected state
/// reconnecting automatically) which invokes the opener immediately instead.
fn enter_waiting_with_delay<S, ResBody>(st: &mut MonitorState<S>, delay: std::time::Duration)
where
    S: Service<Request<Vec<u8>>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: std::error::Error + Send + Sync + 'static,
    ResBody: Body<Data = bytes::Bytes> + Send + Unpin + 'static,
    ResBody::Error: std::error::Error + Send + Sync + 'static,
{
    if delay.is_zero() {
        st.state = State::Connecting;
        spawn_opener(st);
    } else {
        st.state = State::Waiting;
        st.deadline = Some(Instant::now() + delay);
    }
}

fn request_transport_stop<S>(st: &mut MonitorState<S>) {
    if let Some(stop_tx) = st.stop_tx.take() {
        let _ = stop_tx.send(());
    }
}

fn spawn_opener<S, ResBody>(st: &mut MonitorState<S>)
where
    S: Service<Request<Vec<u8>>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: std::error::Error + Send + Sync + 'static,
    ResBody: Body<Data = bytes::Bytes> + Send + Unpin + 'static,
    ResBody::Error: std::error::Error + Send + Sync + 'static,
{
    st.generation += 1;
    let generation = st.generation;
    let mut client = st.client.clone();
    let token = st.token.clone();
    let request = st.request.clone();
    let tx = st.tx.clone();

    tokio::spawn(async move {
        let result = request.open(&token, &mut client).await.map(|resp| {
            let body = resp.into_body();
            OpenedBody { body: Box::new(MapErrBody { inner: body }) }
        });
        let _ = tx.send(Command::OpenResolved { generation, result });
    });
}

fn spawn_body_reader<S>(st: &mut MonitorState<S>, opened: OpenedBody) {
    let generation = st.generation;
    let tx = st.tx.clone();
    let (stop_tx, stop_rx) = oneshot::channel();
    st.stop_tx = Some(stop_tx);
    let delegate = st.delegate.clone();

    tokio::spawn(async move {
        let result = tokio::select! {
            res = protocol::run_body(opened.body, DEFAULT_INACTIVITY_TIMEOUT, move |status| deliver(&delegate, status)) => res,
            _ = stop_rx => Ok(CloseReason::Clean),
        };
        let _ = tx.send(Command::BodyClosed { generation, result });
    });
}

/// Delivers one decoded Tweet to the delegate, if any: silently dropped when absent, and a
/// panicking delegate is caught and logged rather than tearing down the connection.
fn deliver(delegate: &Option<Delegate>, status: Status) {
    let Some(delegate) = delegate else { return };
    if std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| delegate(status))).is_err() {
        tracing::error!("monitor: delegate panicked; continuing");
    }
}

struct MapErrBody<B> {
    inner: B,
}

impl<B> Body for MapErrBody<B>
where
    B: Body<Data = bytes::Bytes> + Unpin,
    B::Error: std::error::Error + Send + Sync + 'static,
{
    type Data = bytes::Bytes;
    type Error = Box<dyn std::error::Error + Send + Sync>;

    fn poll_data(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Result<Self::Data, Self::Error>>> {
        let this = self.get_mut();
        std::pin::Pin::new(&mut this.inner).poll_data(cx).map(|opt| opt.map(|res| res.map_err(|e| Box::new(e) as _)))
    }

    fn poll_trailers(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<Option<http::HeaderMap>, Self::Error>> {
        let this = self.get_mut();
        std::pin::Pin::new(&mut this.inner).poll_trailers(cx).map_err(|e| Box::new(e) as _)
    }
}


/// Drives the real actor loop end to end via [`Monitor`]'s public handle, using a scripted
/// client that returns a queued outcome (success/HTTP error/transport error) on each call. These
/// exercise the concrete reconnect scenarios the state table and backoff curves are meant to
/// produce, as opposed to the unit tests above, which call the handler functions directly.
#[cfg(test)]
mod scenarios {
    use super::*;
    use std::collections::VecDeque;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;
    use std::task::{Context, Poll};

    enum Outcome {
        Ok { closes_immediately: bool },
        /// Connects successfully, then the body errors on its first read -- a transport-level
        /// failure while already `connected`, as opposed to a clean/data-loss close.
        OkThenTransportError,
        Http(u16),
        Transport,
    }

    /// A body that either ends on first poll (simulating a clean/data-loss close), errors on
    /// first poll (simulating a transport read failure), or never produces data at all
    /// (simulating a connection held open until forcibly stopped).
    struct ScriptedBody {
        closes_immediately: bool,
        errors: bool,
    }

    impl Body for ScriptedBody {
        type Data = bytes::Bytes;
        type Error = std::io::Error;

        fn poll_data(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Result<Self::Data, Self::Error>>> {
            if self.errors {
                Poll::Ready(Some(Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset"))))
            } else if self.closes_immediately {
                Poll::Ready(None)
            } else {
                Poll::Pending
            }
        }

        fn poll_trailers(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<Option<http::HeaderMap>, Self::Error>> {
            Poll::Ready(Ok(None))
        }
    }

    #[derive(Clone)]
    struct ScriptedClient {
        outcomes: std::sync::Arc<StdMutex<VecDeque<Outcome>>>,
        calls: std::sync::Arc<AtomicUsize>,
    }

    impl ScriptedClient {
        fn new(outcomes: Vec<Outcome>) -> Self {
            ScriptedClient {
                outcomes: std::sync::Arc::new(StdMutex::new(outcomes.into_iter().collect())),
                calls: std::sync::Arc::new(AtomicUsize::new(0)),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Service<Request<Vec<u8>>> for ScriptedClient {
        type Response = Response<ScriptedBody>;
        type Error = std::io::Error;
        type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, _req: Request<Vec<u8>>) -> Self::Future {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let outcome = self.outcomes.lock().unwrap().pop_front().unwrap_or(Outcome::Transport);
            Box::pin(async move {
                match outcome {
                    Outcome::Ok { closes_immediately } => {
                        Ok(Response::builder().status(200).body(ScriptedBody { closes_immediately, errors: false }).unwrap())
                    }
                    Outcome::OkThenTransportError => {
                        Ok(Response::builder().status(200).body(ScriptedBody { closes_immediately: false, errors: true }).unwrap())
                    }
                    Outcome::Http(code) => Ok(Response::builder()
                        .status(code)
                        .body(ScriptedBody { closes_immediately: true, errors: false })
                        .unwrap()),
                    Outcome::Transport => Err(std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused")),
                }
            })
        }
    }

    fn token() -> Token<'static> {
        Token::new("ck", "cs", "ak", "as")
    }

    fn noop_delegate() -> Delegate {
        std::sync::Arc::new(|_status| {})
    }

    /// Lets every task spawned so far (the actor, opener calls, body readers) run to completion
    /// without needing wall-clock time to pass.
    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn start_without_delegate_stays_idle() {
        let client = ScriptedClient::new(vec![]);
        let monitor = Monitor::spawn(token(), client.clone(), crate::opener::sample());
        monitor.start(None);
        settle().await;
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn attaching_a_delegate_while_idle_then_connecting_reaches_connecting() {
        let client = ScriptedClient::new(vec![Outcome::Ok { closes_immediately: false }]);
        let monitor = Monitor::spawn(token(), client.clone(), crate::opener::sample());

        monitor.start(None);
        settle().await;
        assert_eq!(client.call_count(), 0, "no delegate yet, still idle");

        monitor.start(Some(noop_delegate()));
        settle().await;
        assert_eq!(client.call_count(), 0, "attaching a delegate while idle doesn't connect by itself");

        monitor.connect(false).await.unwrap();
        settle().await;
        assert_eq!(client.call_count(), 1, "connect() now has a delegate to use and reaches connecting");
    }

    #[tokio::test(start_paused = true)]
    async fn start_with_delegate_issues_one_opener_call() {
        let client = ScriptedClient::new(vec![Outcome::Ok { closes_immediately: false }]);
        let monitor = Monitor::spawn(token(), client.clone(), crate::opener::sample());
        monitor.start(Some(noop_delegate()));
        settle().await;
        assert_eq!(client.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn transport_backoff_curve_doubles_and_caps() {
        let outcomes = (0..9).map(|_| Outcome::Transport).collect();
        let client = ScriptedClient::new(outcomes);
        let monitor = Monitor::spawn(token(), client.clone(), crate::opener::sample());
        monitor.start(Some(noop_delegate()));
        settle().await;
        assert_eq!(client.call_count(), 1);

        let delays_ms = [250u64, 500, 1000, 2000, 4000, 8000, 16000, 16000];
        for (i, &delay) in delays_ms.iter().enumerate() {
            tokio::time::advance(std::time::Duration::from_millis(delay)).await;
            settle().await;
            assert_eq!(client.call_count(), i + 2, "after advance #{i}");
        }
        assert_eq!(client.call_count(), 9);
    }

    #[tokio::test(start_paused = true)]
    async fn http_backoff_curve_doubles_and_caps() {
        let outcomes = (0..8).map(|_| Outcome::Http(401)).collect();
        let client = ScriptedClient::new(outcomes);
        let monitor = Monitor::spawn(token(), client.clone(), crate::opener::sample());
        monitor.start(Some(noop_delegate()));
        settle().await;
        assert_eq!(client.call_count(), 1);

        let delays_secs = [10u64, 20, 40, 80, 160, 240, 240];
        for (i, &delay) in delays_secs.iter().enumerate() {
            tokio::time::advance(std::time::Duration::from_secs(delay)).await;
            settle().await;
            assert_eq!(client.call_count(), i + 2, "after advance #{i}");
        }
        assert_eq!(client.call_count(), 8);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_while_waiting_cancels_the_reconnect() {
        let client = ScriptedClient::new(vec![Outcome::Transport, Outcome::Ok { closes_immediately: false }]);
        let monitor = Monitor::spawn(token(), client.clone(), crate::opener::sample());
        monitor.start(Some(noop_delegate()));
        settle().await;
        assert_eq!(client.call_count(), 1);

        monitor.stop();
        settle().await;

        tokio::time::advance(std::time::Duration::from_secs(1)).await;
        settle().await;
        assert_eq!(client.call_count(), 1, "stop() must suppress the scheduled reconnect");

        monitor.start(Some(noop_delegate()));
        settle().await;
        assert_eq!(client.call_count(), 2, "restarting issues exactly one new opener call");
    }

    #[tokio::test(start_paused = true)]
    async fn forced_reconnect_while_connected_waits_for_close_then_reconnects() {
        let client = ScriptedClient::new(vec![
            Outcome::Ok { closes_immediately: false },
            Outcome::Ok { closes_immediately: false },
        ]);
        let monitor = Monitor::spawn(token(), client.clone(), crate::opener::sample());
        monitor.start(Some(noop_delegate()));
        settle().await;
        assert_eq!(client.call_count(), 1);

        monitor.connect(true).await.unwrap();
        settle().await;
        assert_eq!(client.call_count(), 1, "no new opener call until the forced close settles");

        tokio::time::advance(std::time::Duration::from_millis(250)).await;
        settle().await;
        assert_eq!(client.call_count(), 2, "transport category was reset on the prior success");
    }

    #[tokio::test(start_paused = true)]
    async fn successful_reconnect_resets_the_backoff_curve() {
        let client = ScriptedClient::new(vec![
            Outcome::Transport,
            Outcome::Ok { closes_immediately: true },
            Outcome::Transport,
            Outcome::Ok { closes_immediately: false },
        ]);
        let monitor = Monitor::spawn(token(), client.clone(), crate::opener::sample());
        monitor.start(Some(noop_delegate()));
        settle().await;
        assert_eq!(client.call_count(), 1);

        tokio::time::advance(std::time::Duration::from_millis(250)).await;
        settle().await;
        assert_eq!(client.call_count(), 2, "first failure uses the curve's initial 0.25s delay");

        tokio::time::advance(std::time::Duration::from_millis(250)).await;
        settle().await;
        assert_eq!(client.call_count(), 3, "clean close after success reconnects at the reset 0.25s delay, not 0.5s");

        tokio::time::advance(std::time::Duration::from_millis(250)).await;
        settle().await;
        assert_eq!(client.call_count(), 4, "failure after another success again starts from 0.25s");
    }

    #[tokio::test(start_paused = true)]
    async fn body_error_while_connected_uses_the_transport_curve_not_other() {
        let client = ScriptedClient::new(vec![Outcome::OkThenTransportError, Outcome::Ok { closes_immediately: false }]);
        let monitor = Monitor::spawn(token(), client.clone(), crate::opener::sample());
        monitor.start(Some(noop_delegate()));
        settle().await;
        assert_eq!(client.call_count(), 1);

        // A transport-level read failure while `connected` must be categorized the same as a
        // transport-level connect failure (0.25s initial delay), not routed onto the much slower
        // 10s "other" curve the way a decode/JSON failure would be.
        tokio::time::advance(std::time::Duration::from_millis(250)).await;
        settle().await;
        assert_eq!(client.call_count(), 2, "body error while connected reconnects after Transport's initial 0.25s delay");
    }
}
