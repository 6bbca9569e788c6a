//! Live-log connection driver
//!
//! [`LiveLogConnection::connect`] spawns one task that owns the transport and
//! the [`ConnectionMachine`]. The task is the single event loop for the
//! connection: open, frame and close handling run strictly one after another.
//! Everything outside the task talks to it through a [`LiveLogHandle`].

use std::collections::VecDeque;
use std::future;
use std::pin::Pin;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::Sleep;
use uuid::Uuid;

use super::endpoint::ConnectionEndpoint;
use super::machine::{
    ConnectionMachine, ConnectionState, Effect, Event, InboundFrame, RetryPolicy,
};
use super::transport::{Transport, TransportConnection, TransportError};

/// Snapshot of the connection published to observers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    pub remaining_attempts: u32,
}

impl ConnectionStatus {
    fn of(machine: &ConnectionMachine) -> Self {
        Self {
            state: machine.state(),
            remaining_attempts: machine.budget().remaining(),
        }
    }
}

/// Tuning for a live-log connection
#[derive(Debug, Clone, Copy)]
pub struct ConnectionOptions {
    pub policy: RetryPolicy,
    /// Payloads buffered per subscriber before it starts lagging
    pub channel_capacity: usize,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            policy: RetryPolicy::default(),
            channel_capacity: 1024,
        }
    }
}

/// The driver task state; only reachable through [`LiveLogHandle`]
pub struct LiveLogConnection<T: Transport> {
    id: Uuid,
    endpoint: ConnectionEndpoint,
    transport: T,
    machine: ConnectionMachine,
    conn: Option<T::Connection>,
    retry: Option<Pin<Box<Sleep>>>,
    attempts: u64,
    payloads: broadcast::Sender<serde_json::Value>,
    status: watch::Sender<ConnectionStatus>,
    outbound: mpsc::UnboundedReceiver<String>,
}

impl<T: Transport> LiveLogConnection<T> {
    /// Start connecting to `endpoint` in the background
    ///
    /// Returns immediately; success or failure is only observable through the
    /// handle's status and payload streams. Must be called inside a tokio
    /// runtime.
    pub fn connect(
        endpoint: ConnectionEndpoint,
        transport: T,
        options: ConnectionOptions,
    ) -> LiveLogHandle {
        let machine = ConnectionMachine::new(options.policy);
        let (payloads, _) = broadcast::channel(options.channel_capacity.max(1));
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::of(&machine));
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        let driver = LiveLogConnection {
            id: Uuid::new_v4(),
            endpoint: endpoint.clone(),
            transport,
            machine,
            conn: None,
            retry: None,
            attempts: 0,
            payloads: payloads.clone(),
            status: status_tx,
            outbound: outbound_rx,
        };

        tokio::spawn(driver.run());

        LiveLogHandle {
            endpoint,
            payloads,
            status: status_rx,
            outbound: outbound_tx,
        }
    }

    async fn run(mut self) {
        tracing::info!(connection_id = %self.id, endpoint = %self.endpoint, "Starting live-log connection");

        self.dispatch(Event::Connect).await;

        loop {
            let event = tokio::select! {
                frame = next_frame(&mut self.conn) => match frame {
                    Some(Ok(frame)) => Event::Frame(frame),
                    Some(Err(e)) => {
                        tracing::debug!(connection_id = %self.id, error = %e, "Live-log transport error");
                        Event::TransportClosed
                    }
                    None => Event::TransportClosed,
                },
                _ = retry_elapsed(&mut self.retry) => Event::RetryElapsed,
                outbound = self.outbound.recv() => match outbound {
                    Some(text) => Event::Send(text),
                    // Every handle is gone; the owning context was torn down
                    None => break,
                },
            };

            self.dispatch(event).await;
        }

        tracing::debug!(connection_id = %self.id, "Live-log connection dropped by owner");
    }

    /// Feed one event through the machine and carry out the resulting effects
    ///
    /// Effects can produce follow-up events (an open attempt yields opened or
    /// closed), which are handled in order before returning.
    async fn dispatch(&mut self, event: Event) {
        let mut queue = VecDeque::from([event]);

        while let Some(event) = queue.pop_front() {
            if matches!(event, Event::TransportClosed) {
                self.conn = None;
            }

            let before = self.machine;
            let (machine, effects) = before.apply(event);
            self.machine = machine;

            if before != machine {
                self.publish_status(before.state());
            }

            for effect in effects {
                if let Some(follow_up) = self.perform(effect).await {
                    queue.push_back(follow_up);
                }
            }
        }
    }

    async fn perform(&mut self, effect: Effect) -> Option<Event> {
        match effect {
            Effect::OpenTransport => {
                self.attempts += 1;
                tracing::debug!(
                    connection_id = %self.id,
                    attempt = self.attempts,
                    endpoint = %self.endpoint,
                    "Opening live-log transport"
                );

                match self.transport.open(&self.endpoint).await {
                    Ok(conn) => {
                        self.conn = Some(conn);
                        Some(Event::TransportOpened)
                    }
                    Err(e) => {
                        tracing::debug!(connection_id = %self.id, error = %e, "Live-log connect failed");
                        Some(Event::TransportClosed)
                    }
                }
            }
            Effect::SendText(text) => {
                let result = match self.conn.as_mut() {
                    Some(conn) => conn.send_text(&text).await,
                    None => Err(TransportError::Closed),
                };

                match result {
                    Ok(()) => None,
                    Err(e) => {
                        tracing::debug!(connection_id = %self.id, error = %e, "Live-log send failed");
                        Some(Event::TransportClosed)
                    }
                }
            }
            Effect::ScheduleRetry(delay) => {
                self.retry = Some(Box::pin(tokio::time::sleep(delay)));
                None
            }
            Effect::Deliver(payload) => {
                // No receivers is fine: nobody is rendering the log right now
                let _ = self.payloads.send(payload);
                None
            }
        }
    }

    fn publish_status(&self, previous: ConnectionState) {
        let status = ConnectionStatus::of(&self.machine);

        if previous != status.state {
            match status.state {
                ConnectionState::Open => tracing::info!(
                    connection_id = %self.id,
                    endpoint = %self.endpoint,
                    "Live-log connected"
                ),
                ConnectionState::Reconnecting => tracing::info!(
                    connection_id = %self.id,
                    remaining = status.remaining_attempts,
                    delay_ms = self.machine.policy().delay.as_millis() as u64,
                    "Live-log connection lost, retrying"
                ),
                ConnectionState::Failed => tracing::warn!(
                    connection_id = %self.id,
                    attempts = self.attempts,
                    "Live-log retry budget exhausted, giving up"
                ),
                _ => tracing::trace!(
                    connection_id = %self.id,
                    from = %previous,
                    to = %status.state,
                    "Live-log state change"
                ),
            }
        }

        self.status.send_replace(status);
    }
}

async fn next_frame<C: TransportConnection>(
    conn: &mut Option<C>,
) -> Option<Result<InboundFrame, TransportError>> {
    match conn {
        Some(conn) => conn.next_frame().await,
        None => future::pending().await,
    }
}

async fn retry_elapsed(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer.as_mut() {
        Some(sleep) => {
            sleep.as_mut().await;
            *timer = None;
        }
        None => future::pending().await,
    }
}

/// Consumer-side handle to a running live-log connection
///
/// Dropping the last handle stops the connection, including any pending
/// reconnect.
pub struct LiveLogHandle {
    endpoint: ConnectionEndpoint,
    payloads: broadcast::Sender<serde_json::Value>,
    status: watch::Receiver<ConnectionStatus>,
    outbound: mpsc::UnboundedSender<String>,
}

impl LiveLogHandle {
    pub fn endpoint(&self) -> &ConnectionEndpoint {
        &self.endpoint
    }

    /// Receive every payload decoded from now on
    pub fn subscribe(&self) -> broadcast::Receiver<serde_json::Value> {
        self.payloads.subscribe()
    }

    /// Current lifecycle snapshot
    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    /// Observe lifecycle changes
    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    /// Queue a text frame
    ///
    /// Never blocks and never fails: frames requested while the connection is
    /// not open are discarded.
    pub fn send(&self, text: impl Into<String>) {
        let _ = self.outbound.send(text.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::time::Instant;

    type Sent = Arc<Mutex<Vec<String>>>;

    type Inbound = Result<InboundFrame, TransportError>;

    struct FakeConnection {
        inbound: mpsc::UnboundedReceiver<Inbound>,
        sent: Sent,
        reject_sends: bool,
    }

    #[async_trait]
    impl TransportConnection for FakeConnection {
        async fn send_text(&mut self, text: &str) -> Result<(), TransportError> {
            if self.reject_sends {
                return Err(TransportError::Send("broken pipe".to_string()));
            }
            self.sent.lock().unwrap().push(text.to_string());
            Ok(())
        }

        async fn next_frame(&mut self) -> Option<Result<InboundFrame, TransportError>> {
            self.inbound.recv().await
        }
    }

    /// Test side of an accepted fake connection; dropping it closes the socket
    struct Peer {
        frames: mpsc::UnboundedSender<Inbound>,
        sent: Sent,
    }

    impl Peer {
        fn push(&self, text: &str) {
            self.frames
                .send(Ok(InboundFrame::Text(text.to_string())))
                .unwrap();
        }

        /// Make the next read fail as if the socket broke
        fn fail(&self) {
            self.frames
                .send(Err(TransportError::Receive("connection reset".to_string())))
                .unwrap();
        }

        fn sent(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }
    }

    /// Scripted transport: accepts queued connections, refuses once drained
    #[derive(Clone, Default)]
    struct FakeTransport {
        accepts: Arc<Mutex<VecDeque<FakeConnection>>>,
        opens: Arc<Mutex<Vec<Instant>>>,
    }

    impl FakeTransport {
        fn accept_next(&self) -> Peer {
            self.queue_connection(false)
        }

        /// Accept a connection whose writes all fail
        fn accept_with_broken_writes(&self) -> Peer {
            self.queue_connection(true)
        }

        fn queue_connection(&self, reject_sends: bool) -> Peer {
            let (frames, inbound) = mpsc::unbounded_channel();
            let sent = Sent::default();
            self.accepts.lock().unwrap().push_back(FakeConnection {
                inbound,
                sent: Arc::clone(&sent),
                reject_sends,
            });
            Peer { frames, sent }
        }

        fn opens(&self) -> Vec<Instant> {
            self.opens.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        type Connection = FakeConnection;

        async fn open(
            &mut self,
            _endpoint: &ConnectionEndpoint,
        ) -> Result<FakeConnection, TransportError> {
            self.opens.lock().unwrap().push(Instant::now());
            self.accepts
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| TransportError::Connect("refused".to_string()))
        }
    }

    fn endpoint() -> ConnectionEndpoint {
        ConnectionEndpoint::from_origin("http://lift.local:8000").unwrap()
    }

    async fn wait_for_state(handle: &LiveLogHandle, state: ConnectionState) {
        handle
            .watch_status()
            .wait_for(|s| s.state == state)
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_sends_single_handshake() {
        let transport = FakeTransport::default();
        let peer = transport.accept_next();

        let handle =
            LiveLogConnection::connect(endpoint(), transport.clone(), ConnectionOptions::default());
        wait_for_state(&handle, ConnectionState::Open).await;

        assert_eq!(peer.sent(), vec!["init"]);
        assert_eq!(handle.status().remaining_attempts, 5);
        assert_eq!(transport.opens().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_retries_after_fixed_delay() {
        let transport = FakeTransport::default();
        let peer = transport.accept_next();

        let handle =
            LiveLogConnection::connect(endpoint(), transport.clone(), ConnectionOptions::default());
        wait_for_state(&handle, ConnectionState::Open).await;

        let second = transport.accept_next();
        let closed_at = Instant::now();
        drop(peer);

        wait_for_state(&handle, ConnectionState::Reconnecting).await;
        assert_eq!(handle.status().remaining_attempts, 4);
        assert_eq!(transport.opens().len(), 1);

        wait_for_state(&handle, ConnectionState::Open).await;
        let opens = transport.opens();
        assert_eq!(opens.len(), 2);
        let waited = opens[1] - closed_at;
        assert!(waited >= Duration::from_millis(3000));
        assert!(waited < Duration::from_millis(3100));

        assert_eq!(second.sent(), vec!["init"]);
        assert_eq!(handle.status().remaining_attempts, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_receive_error_retries_like_close() {
        let transport = FakeTransport::default();
        let peer = transport.accept_next();

        let handle =
            LiveLogConnection::connect(endpoint(), transport.clone(), ConnectionOptions::default());
        wait_for_state(&handle, ConnectionState::Open).await;

        let second = transport.accept_next();
        let failed_at = Instant::now();
        peer.fail();

        wait_for_state(&handle, ConnectionState::Reconnecting).await;
        assert_eq!(handle.status().remaining_attempts, 4);
        assert_eq!(transport.opens().len(), 1);

        wait_for_state(&handle, ConnectionState::Open).await;
        let opens = transport.opens();
        assert_eq!(opens.len(), 2);
        let waited = opens[1] - failed_at;
        assert!(waited >= Duration::from_millis(3000));
        assert!(waited < Duration::from_millis(3100));
        assert_eq!(second.sent(), vec!["init"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_handshake_send_consumes_budget() {
        let transport = FakeTransport::default();
        let peer = transport.accept_with_broken_writes();

        let handle =
            LiveLogConnection::connect(endpoint(), transport.clone(), ConnectionOptions::default());
        wait_for_state(&handle, ConnectionState::Reconnecting).await;

        assert_eq!(handle.status().remaining_attempts, 4);
        assert!(peer.sent().is_empty());
        assert_eq!(transport.opens().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_five_failures_reach_failed_without_sixth_attempt() {
        let transport = FakeTransport::default();

        let handle =
            LiveLogConnection::connect(endpoint(), transport.clone(), ConnectionOptions::default());
        wait_for_state(&handle, ConnectionState::Failed).await;

        let opens = transport.opens();
        assert_eq!(opens.len(), 5);
        for pair in opens.windows(2) {
            let gap = pair[1] - pair[0];
            assert!(gap >= Duration::from_millis(3000));
            assert!(gap < Duration::from_millis(3100));
        }
        assert_eq!(handle.status().remaining_attempts, 0);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(transport.opens().len(), 5);
        assert_eq!(handle.status().state, ConnectionState::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_payloads_forwarded_and_malformed_dropped() {
        let transport = FakeTransport::default();
        let peer = transport.accept_next();

        let handle =
            LiveLogConnection::connect(endpoint(), transport.clone(), ConnectionOptions::default());
        let mut first = handle.subscribe();
        let mut second = handle.subscribe();
        wait_for_state(&handle, ConnectionState::Open).await;

        peer.push("robot 2 offline");
        peer.push(r#"{"message":"elevator 1 arrived","floor":3}"#);

        let expected = serde_json::json!({"message": "elevator 1 arrived", "floor": 3});
        assert_eq!(first.recv().await.unwrap(), expected);
        assert_eq!(second.recv().await.unwrap(), expected);
        assert!(first.try_recv().is_err());
        assert_eq!(handle.status().state, ConnectionState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_only_reaches_open_transport() {
        let transport = FakeTransport::default();
        let peer = transport.accept_next();

        let handle =
            LiveLogConnection::connect(endpoint(), transport.clone(), ConnectionOptions::default());
        wait_for_state(&handle, ConnectionState::Open).await;

        handle.send("status");
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(peer.sent(), vec!["init", "status"]);

        let sent = Arc::clone(&peer.sent);
        drop(peer);
        wait_for_state(&handle, ConnectionState::Reconnecting).await;
        handle.send("lost");
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(handle.status().state, ConnectionState::Reconnecting);
        assert_eq!(*sent.lock().unwrap(), vec!["init", "status"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_handle_stops_reconnects() {
        let transport = FakeTransport::default();
        let peer = transport.accept_next();

        let handle =
            LiveLogConnection::connect(endpoint(), transport.clone(), ConnectionOptions::default());
        wait_for_state(&handle, ConnectionState::Open).await;

        drop(peer);
        wait_for_state(&handle, ConnectionState::Reconnecting).await;
        drop(handle);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(transport.opens().len(), 1);
    }
}
