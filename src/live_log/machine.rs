//! Connection lifecycle state machine
//!
//! All reconnection logic lives here as a pure transition function:
//! [`ConnectionMachine::apply`] takes the current machine and one [`Event`] and
//! returns the next machine plus the [`Effect`]s the driver must perform. No I/O,
//! no timers, no channels, so every path can be exercised without a network.
//!
//! ```text
//! Closed ──Connect──▶ Connecting ──TransportOpened──▶ Open
//!                        ▲   │                          │
//!            RetryElapsed│   └────TransportClosed───────┤
//!                        │                              ▼
//!                  Reconnecting ◀──budget left── (consume one unit)
//!                                                       │
//!                                     budget exhausted──▶ Failed
//! ```

use std::fmt;
use std::time::Duration;

/// Literal text frame sent once on every successful open
pub const HANDSHAKE_TOKEN: &str = "init";

/// Default number of connection attempts per outage
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default wait between attempts
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(3000);

/// Lifecycle state of the live-log connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Never connected
    Closed,
    /// A transport attempt is in flight
    Connecting,
    /// Handshake sent, frames are being delivered
    Open,
    /// Waiting out the retry delay before the next attempt
    Reconnecting,
    /// Retry budget exhausted; terminal for this process
    Failed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Closed => write!(f, "closed"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Open => write!(f, "open"),
            ConnectionState::Reconnecting => write!(f, "reconnecting"),
            ConnectionState::Failed => write!(f, "failed"),
        }
    }
}

/// How hard the connection tries before giving up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts allowed per outage, counting the one that just failed
    pub max_attempts: u32,
    /// Fixed delay between attempts
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

/// Bounded count of remaining connection attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    remaining: u32,
    max: u32,
}

impl RetryBudget {
    /// A budget with every unit available
    pub fn full(max: u32) -> Self {
        Self {
            remaining: max,
            max,
        }
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }

    /// Use up one unit; saturates at zero
    fn consume(&mut self) {
        self.remaining = self.remaining.saturating_sub(1);
    }

    fn reset(&mut self) {
        self.remaining = self.max;
    }
}

/// One frame as received from the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    Text(String),
    Binary(Vec<u8>),
}

impl InboundFrame {
    /// Decode the frame as a JSON document
    pub fn decode(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            InboundFrame::Text(text) => serde_json::from_str(text),
            InboundFrame::Binary(bytes) => serde_json::from_slice(bytes),
        }
    }
}

/// Inputs to the state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Caller asked for a connection
    Connect,
    /// Transport reported successful establishment
    TransportOpened,
    /// Transport closed or errored; both are handled the same way
    TransportClosed,
    /// The retry delay has passed
    RetryElapsed,
    /// An inbound frame arrived
    Frame(InboundFrame),
    /// Application wants to send a text frame
    Send(String),
}

/// Work the driver must perform after a transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Start a new transport attempt against the endpoint
    OpenTransport,
    /// Write a text frame on the open transport
    SendText(String),
    /// Arm a one-shot timer that yields [`Event::RetryElapsed`]
    ScheduleRetry(Duration),
    /// Forward a decoded payload to every subscriber
    Deliver(serde_json::Value),
}

/// The connection lifecycle as a value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionMachine {
    state: ConnectionState,
    budget: RetryBudget,
    policy: RetryPolicy,
}

impl ConnectionMachine {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            state: ConnectionState::Closed,
            budget: RetryBudget::full(policy.max_attempts),
            policy,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn budget(&self) -> RetryBudget {
        self.budget
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Application-level sends are only permitted while open
    pub fn can_send(&self) -> bool {
        self.state == ConnectionState::Open
    }

    /// Compute the next machine and the effects of handling `event`
    ///
    /// Events that make no sense in the current state (a stale open after a
    /// close, a timer firing while connected) leave the machine untouched and
    /// produce no effects.
    pub fn apply(self, event: Event) -> (Self, Vec<Effect>) {
        let mut next = self;

        let effects = match (self.state, event) {
            (ConnectionState::Closed | ConnectionState::Failed, Event::Connect) => {
                next.state = ConnectionState::Connecting;
                vec![Effect::OpenTransport]
            }
            (ConnectionState::Connecting, Event::TransportOpened) => {
                next.state = ConnectionState::Open;
                next.budget.reset();
                vec![Effect::SendText(HANDSHAKE_TOKEN.to_string())]
            }
            (ConnectionState::Connecting | ConnectionState::Open, Event::TransportClosed) => {
                next.budget.consume();
                if next.budget.is_exhausted() {
                    next.state = ConnectionState::Failed;
                    Vec::new()
                } else {
                    next.state = ConnectionState::Reconnecting;
                    vec![Effect::ScheduleRetry(self.policy.delay)]
                }
            }
            (ConnectionState::Reconnecting, Event::RetryElapsed) => {
                next.state = ConnectionState::Connecting;
                vec![Effect::OpenTransport]
            }
            (ConnectionState::Open, Event::Frame(frame)) => match frame.decode() {
                Ok(payload) => vec![Effect::Deliver(payload)],
                Err(_) => Vec::new(),
            },
            (ConnectionState::Open, Event::Send(text)) => vec![Effect::SendText(text)],
            _ => Vec::new(),
        };

        (next, effects)
    }
}

impl Default for ConnectionMachine {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}
