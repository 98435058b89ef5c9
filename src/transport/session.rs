//! Request/reply session over one connection.
//!
//! A [`Session`] owns a framed connection and the sequence counter. Each
//! [`Session::request`] takes an exclusive lock over both for the whole round
//! trip: the request is numbered, framed and written, then exactly one reply
//! frame is read and must carry the same sequence id. At most one frame is
//! ever in flight, so replies are observed in request order by construction.
//!
//! Any fatal error (framing, sequencing, truncated reply, I/O, timeout)
//! closes the session; later calls fail with `SessionClosed`. There are no
//! retries and no reconnects at this layer.

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio_util::codec::Framed;
use tracing::{debug, trace, warn};
#[cfg(unix)]
use tracing::instrument;

#[cfg(unix)]
use crate::config::EndpointConfig;
#[cfg(unix)]
use std::path::Path;
#[cfg(unix)]
use tokio::net::UnixStream;

use crate::config::TransportConfig;
use crate::core::codec::WireCodec;
use crate::core::packet::Packet;
use crate::core::reply::ReplyCursor;
use crate::error::{ProtocolError, Result};
use crate::utils::metrics::{MetricsSnapshot, SessionMetrics, Timer};
use crate::utils::timeout::with_optional_timeout;

struct Connection<S> {
    framed: Framed<S, WireCodec>,
    next_sequence_id: u64,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Write `packet`, then read exactly one frame back.
    ///
    /// The request is counted as soon as it has been written, whatever
    /// becomes of the reply.
    async fn round_trip(&mut self, packet: Packet, metrics: &SessionMetrics) -> Result<Packet> {
        let sent_len = packet.encoded_len() as u64;
        self.framed.send(packet).await?;
        metrics.request_sent(sent_len);
        match self.framed.next().await {
            Some(reply) => reply,
            None => Err(ProtocolError::ConnectionClosed),
        }
    }
}

/// One connection to a backend service.
pub struct Session<S> {
    conn: Mutex<Option<Connection<S>>>,
    response_timeout: Option<Duration>,
    metrics: SessionMetrics,
}

#[cfg(unix)]
impl Session<UnixStream> {
    /// Connect to the service listening on the Unix socket at `path`.
    #[instrument(skip(path), fields(endpoint = %path.as_ref().display()))]
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let stream = super::local::connect(path.as_ref()).await?;
        Ok(Self::new(stream))
    }

    /// Connect using an endpoint and transport configuration.
    #[instrument(skip_all, fields(endpoint = %endpoint.socket_path.display()))]
    pub async fn open_with_config(
        endpoint: &EndpointConfig,
        transport: &TransportConfig,
    ) -> Result<Self> {
        let stream = with_optional_timeout(
            Some(endpoint.connect_timeout),
            super::local::connect(&endpoint.socket_path),
        )
        .await?;
        Ok(Self::with_config(stream, transport))
    }
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap an already connected stream with default transport settings.
    pub fn new(stream: S) -> Self {
        Self::with_config(stream, &TransportConfig::default())
    }

    pub fn with_config(stream: S, config: &TransportConfig) -> Self {
        Self {
            conn: Mutex::new(Some(Connection {
                framed: Framed::new(stream, WireCodec::new(config.max_payload_size)),
                next_sequence_id: 0,
            })),
            response_timeout: config.response_timeout,
            metrics: SessionMetrics::new(),
        }
    }

    /// Send `payload` and wait for its reply payload.
    ///
    /// Callers sharing a session are serialized here; the lock is held
    /// until the reply has been read or the session has failed. A payload
    /// over the configured limit is refused before a sequence id is taken
    /// and leaves the session open.
    pub async fn request(&self, payload: impl Into<Bytes>) -> Result<Bytes> {
        self.exchange("request", payload.into(), Ok).await
    }

    /// Send `payload` and decode its reply with `parse`.
    ///
    /// The reply must be consumed entirely. A reply that cannot be decoded
    /// means the peer speaks something else, so the session is discarded
    /// before any other caller can use it.
    pub async fn call<T, F>(
        &self,
        op: &'static str,
        payload: impl Into<Bytes>,
        parse: F,
    ) -> Result<T>
    where
        F: FnOnce(&mut ReplyCursor) -> Result<T>,
    {
        self.exchange(op, payload.into(), |reply| {
            let mut reply = ReplyCursor::new(reply);
            let out = parse(&mut reply)?;
            reply.finish(op)?;
            Ok(out)
        })
        .await
    }

    /// One round trip with `decode` applied to the reply payload, all under
    /// the connection lock.
    async fn exchange<T, F>(&self, op: &'static str, payload: Bytes, decode: F) -> Result<T>
    where
        F: FnOnce(Bytes) -> Result<T>,
    {
        let _timer = Timer::start("request");
        let mut guard = self.conn.lock().await;
        let Some(conn) = guard.as_mut() else {
            return Err(ProtocolError::SessionClosed);
        };

        let max = conn.framed.codec().max_payload_size();
        if payload.len() > max {
            self.metrics.failure();
            return Err(ProtocolError::PayloadTooLarge {
                len: payload.len(),
                max,
            });
        }

        let id = conn.next_sequence_id;
        conn.next_sequence_id += 1;

        trace!(sequence_id = id, len = payload.len(), "Sending request");
        let packet = Packet::new(id, payload);

        let result = match with_optional_timeout(
            self.response_timeout,
            conn.round_trip(packet, &self.metrics),
        )
        .await
        {
            Ok(reply) if reply.sequence_id == id => {
                self.metrics.reply_received(reply.encoded_len() as u64);
                decode(reply.payload).inspect_err(|e| {
                    if e.is_fatal() {
                        warn!(op, error = %e, "Undecodable reply");
                    }
                })
            }
            Ok(reply) => {
                warn!(
                    expected = id,
                    got = reply.sequence_id,
                    "Reply does not answer the outstanding request"
                );
                Err(ProtocolError::SequenceMismatch {
                    expected: id,
                    got: reply.sequence_id,
                })
            }
            Err(e) => Err(e),
        };

        if let Err(e) = &result {
            self.metrics.failure();
            if e.is_fatal() {
                debug!(sequence_id = id, error = %e, "Discarding session");
                *guard = None;
            }
        }
        result
    }

    /// Release the connection.
    ///
    /// Closing an already closed session changes nothing and reports
    /// `SessionClosed`.
    pub async fn close(&self) -> Result<()> {
        let Some(conn) = self.conn.lock().await.take() else {
            return Err(ProtocolError::SessionClosed);
        };
        let mut stream = conn.framed.into_inner();
        if let Err(e) = stream.shutdown().await {
            debug!(error = %e, "Error shutting down connection");
        }
        debug!(requests = conn.next_sequence_id, "Session closed");
        self.metrics.log_metrics();
        Ok(())
    }

    pub async fn is_closed(&self) -> bool {
        self.conn.lock().await.is_none()
    }

    /// Sequence id the next request will carry.
    pub async fn next_sequence_id(&self) -> Result<u64> {
        self.conn
            .lock()
            .await
            .as_ref()
            .map(|c| c.next_sequence_id)
            .ok_or(ProtocolError::SessionClosed)
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}
