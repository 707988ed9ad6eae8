//! Connection settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{
    frame::MessageKind,
    transport::{CLOSE_NORMAL, DEFAULT_MAX_FRAME_LENGTH},
};

const DEFAULT_DISCONNECT_TIMEOUT_MS: u64 = 1_000;
const MIN_TIMEOUT_MS: u64 = 1;
const MAX_TIMEOUT_MS: u64 = 86_400_000;

fn clamp_timeout(ms: u64) -> u64 { ms.clamp(MIN_TIMEOUT_MS, MAX_TIMEOUT_MS) }

/// Settings for one [`Connection`](super::Connection).
///
/// Missing fields take their defaults when deserialised.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use callwire::connection::ConnectionConfig;
///
/// let config = ConnectionConfig::new("127.0.0.1:9000")
///     .disconnect_timeout_ms(0)
///     .call_timeout_ms(Some(5_000));
/// assert_eq!(config.disconnect_timeout(), Duration::from_millis(1));
/// assert_eq!(config.call_timeout(), Some(Duration::from_secs(5)));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    address: String,
    protocols: Vec<String>,
    disconnect_timeout_ms: u64,
    close_code: u16,
    close_reason: String,
    call_timeout_ms: Option<u64>,
    sequence_min: u32,
    sequence_max: u32,
    reply_kind: MessageKind,
    reply_on_decode_error: bool,
    max_frame_length: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            address: String::new(),
            protocols: vec!["buffer".to_owned()],
            disconnect_timeout_ms: DEFAULT_DISCONNECT_TIMEOUT_MS,
            close_code: CLOSE_NORMAL,
            close_reason: String::new(),
            call_timeout_ms: None,
            sequence_min: 1,
            sequence_max: u32::MAX,
            reply_kind: MessageKind::default(),
            reply_on_decode_error: false,
            max_frame_length: DEFAULT_MAX_FRAME_LENGTH,
        }
    }
}

impl ConnectionConfig {
    /// Default settings for a peer at `address`.
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Self::default()
        }
    }

    /// Peer address handed to the transport.
    #[must_use]
    pub fn address(&self) -> &str { &self.address }

    /// Sub-protocols requested when connecting.
    #[must_use]
    pub fn protocols(&self) -> &[String] { &self.protocols }

    /// Replace the requested sub-protocols.
    #[must_use]
    pub fn with_protocols<I, S>(mut self, protocols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.protocols = protocols.into_iter().map(Into::into).collect();
        self
    }

    /// How long `disconnect` waits for the transport's close event before
    /// forcing the connection closed. Clamped to 1 ms ..= 24 h.
    #[must_use]
    pub fn disconnect_timeout_ms(mut self, ms: u64) -> Self {
        self.disconnect_timeout_ms = clamp_timeout(ms);
        self
    }

    /// Effective disconnect timeout.
    #[must_use]
    pub fn disconnect_timeout(&self) -> Duration {
        Duration::from_millis(clamp_timeout(self.disconnect_timeout_ms))
    }

    /// Status code and reason sent when closing.
    #[must_use]
    pub fn close_with(mut self, code: u16, reason: impl Into<String>) -> Self {
        self.close_code = code;
        self.close_reason = reason.into();
        self
    }

    /// Close status code.
    #[must_use]
    pub const fn close_code(&self) -> u16 { self.close_code }

    /// Close reason.
    #[must_use]
    pub fn close_reason(&self) -> &str { &self.close_reason }

    /// Bound how long an outbound call waits for its reply. `None` waits
    /// indefinitely.
    #[must_use]
    pub fn call_timeout_ms(mut self, ms: Option<u64>) -> Self {
        self.call_timeout_ms = ms.map(clamp_timeout);
        self
    }

    /// Effective call timeout.
    #[must_use]
    pub fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout_ms
            .map(|ms| Duration::from_millis(clamp_timeout(ms)))
    }

    /// Range of sequence ids stamped on outbound frames.
    #[must_use]
    pub fn sequence_range(mut self, min: u32, max: u32) -> Self {
        self.sequence_min = min;
        self.sequence_max = max;
        self
    }

    /// Lower and upper sequence id bounds.
    #[must_use]
    pub const fn sequence_bounds(&self) -> (u32, u32) { (self.sequence_min, self.sequence_max) }

    /// Message kind stamped on multiplexed api replies.
    #[must_use]
    pub fn with_reply_kind(mut self, kind: MessageKind) -> Self {
        self.reply_kind = kind;
        self
    }

    /// Message kind of multiplexed api replies.
    #[must_use]
    pub const fn reply_kind(&self) -> MessageKind { self.reply_kind }

    /// Answer api requests whose payload fails to decode with a
    /// `BAD_REQUEST` error instead of dropping them.
    #[must_use]
    pub fn reply_on_decode_error(mut self, enabled: bool) -> Self {
        self.reply_on_decode_error = enabled;
        self
    }

    /// Whether undecodable api requests are answered.
    #[must_use]
    pub const fn replies_on_decode_error(&self) -> bool { self.reply_on_decode_error }

    /// Message length limit for transports that enforce one.
    #[must_use]
    pub fn max_frame_length(mut self, len: usize) -> Self {
        self.max_frame_length = len;
        self
    }

    /// Configured message length limit.
    #[must_use]
    pub const fn frame_length_limit(&self) -> usize { self.max_frame_length }
}
