//! Notify channel task
//!
//! Connect, switch the socket into push mode, then read until the studio
//! goes away. Every disconnect is followed by a fixed reconnect delay and a
//! framer reset, so a half-received packet never leaks into the next
//! connection. A realtime write that stalls on a peer which has stopped
//! reading breaks the connection the same way a socket error does.

use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::protocol::constants::{METER_WORD, NOTIFY_WORD};
use crate::protocol::{EventDecoder, PacketFramer};
use crate::publish::EventPublisher;
use crate::stats::{NotifyCounters, NotifyStats};
use crate::studio::StudioConfig;

use super::config::NotifyConfig;

/// Write half of the current connection
#[derive(Debug)]
struct LiveWriter {
    socket: OwnedWriteHalf,
    /// Cancelled when a write fails, so the reader drops the connection
    broken: CancellationToken,
}

#[derive(Debug)]
struct ChannelInner {
    studio: String,
    host: String,
    port: u16,
    config: NotifyConfig,
    writer: Mutex<Option<LiveWriter>>,
    counters: NotifyCounters,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

/// Long-lived push-mode connection to one studio
///
/// Cheap to clone; clones share the socket and the reader task.
#[derive(Debug, Clone)]
pub struct NotifyChannel {
    inner: Arc<ChannelInner>,
}

impl NotifyChannel {
    /// Start the channel's connect/read/reconnect task
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(studio: &StudioConfig, config: NotifyConfig, publisher: EventPublisher) -> Self {
        let inner = Arc::new(ChannelInner {
            studio: studio.name.clone(),
            host: studio.host.clone(),
            port: studio.port,
            config,
            writer: Mutex::new(None),
            counters: NotifyCounters::new(),
            cancel: CancellationToken::new(),
            task: Mutex::new(None),
        });

        let handle = tokio::spawn(run(Arc::clone(&inner), publisher));
        if let Ok(mut task) = inner.task.try_lock() {
            *task = Some(handle);
        }

        Self { inner }
    }

    /// Studio this channel listens to
    pub fn studio(&self) -> &str {
        &self.inner.studio
    }

    /// Whether the socket is currently connected
    pub fn is_connected(&self) -> bool {
        self.inner.counters.is_connected()
    }

    /// Point-in-time channel statistics
    pub fn stats(&self) -> NotifyStats {
        self.inner.counters.snapshot()
    }

    /// Write commands straight to the push-mode socket
    ///
    /// No response is read. While the channel is down the write is dropped
    /// and `Ok(false)` is returned; `Ok(true)` means the bytes were handed to
    /// the socket. A write that fails or stalls past the write timeout is
    /// dropped too, and the connection is rebuilt.
    pub async fn send_realtime<C: AsRef<str>>(&self, commands: &[C]) -> Result<bool> {
        let inner = &self.inner;

        let mut payload = String::new();
        for command in commands {
            let command = command.as_ref();
            if command.contains(['\n', '\r']) {
                return Err(Error::ProtocolMisuse(command.to_string()));
            }
            payload.push_str(command);
            payload.push('\n');
        }
        if payload.is_empty() {
            return Ok(false);
        }

        let mut writer = inner.writer.lock().await;
        let Some(live) = writer.as_mut() else {
            inner.counters.write_dropped();
            tracing::debug!(studio = %inner.studio, "Realtime write dropped, channel down");
            return Ok(false);
        };

        let timeout = inner.config.write_timeout;
        let failure = match tokio::time::timeout(timeout, live.socket.write_all(payload.as_bytes())).await {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(_) => Some(format!("write stalled for {:?}", timeout)),
        };

        if let Some(reason) = failure {
            if let Some(live) = writer.take() {
                live.broken.cancel();
            }
            inner.counters.write_dropped();
            tracing::warn!(studio = %inner.studio, reason = %reason, "Realtime write failed, dropping connection");
            return Ok(false);
        }

        tracing::trace!(studio = %inner.studio, bytes = payload.len(), "Realtime write");
        Ok(true)
    }

    /// Close the socket and stop reconnecting
    pub async fn shutdown(&self) {
        let inner = &self.inner;
        if inner.cancel.is_cancelled() {
            return;
        }
        inner.cancel.cancel();

        if let Some(mut live) = inner.writer.lock().await.take() {
            let _ = live.socket.shutdown().await;
        }

        let handle = inner.task.lock().await.take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }

        tracing::info!(studio = %inner.studio, "Notify channel shut down");
    }
}

async fn run(inner: Arc<ChannelInner>, publisher: EventPublisher) {
    let decoder = EventDecoder::new(inner.studio.clone());
    let mut framer = PacketFramer::with_capacity(inner.config.read_buffer_size);

    loop {
        match inner.connect().await {
            Ok(stream) => match inner.pump(stream, &mut framer, &decoder, &publisher).await {
                Ok(()) => {}
                Err(e) => {
                    tracing::warn!(studio = %inner.studio, error = %e, "Notify channel lost");
                }
            },
            Err(e) => {
                tracing::warn!(studio = %inner.studio, error = %e, "Notify channel connect failed");
            }
        }

        inner.writer.lock().await.take();
        inner.counters.set_connected(false);

        if inner.cancel.is_cancelled() {
            break;
        }

        tracing::info!(
            studio = %inner.studio,
            delay_ms = inner.config.reconnect_delay.as_millis() as u64,
            "Notify channel reconnect scheduled"
        );

        tokio::select! {
            _ = inner.cancel.cancelled() => break,
            _ = tokio::time::sleep(inner.config.reconnect_delay) => {}
        }
    }

    tracing::debug!(studio = %inner.studio, "Notify task finished");
}

impl ChannelInner {
    async fn connect(&self) -> Result<TcpStream> {
        let addr = format!("{}:{}", self.host, self.port);

        let stream = tokio::select! {
            _ = self.cancel.cancelled() => return Err(Error::ConnectionClosed),
            result = tokio::time::timeout(self.config.connect_timeout, TcpStream::connect(&addr)) => {
                match result {
                    Ok(Ok(stream)) => stream,
                    Ok(Err(source)) => return Err(Error::Connect { addr, source }),
                    Err(_) => {
                        return Err(Error::Connect {
                            addr,
                            source: std::io::ErrorKind::TimedOut.into(),
                        })
                    }
                }
            }
        };
        stream.set_nodelay(true)?;
        Ok(stream)
    }

    /// Drive one connection until it closes or the channel is cancelled
    async fn pump(
        &self,
        stream: TcpStream,
        framer: &mut PacketFramer,
        decoder: &EventDecoder,
        publisher: &EventPublisher,
    ) -> Result<()> {
        let (mut reader, mut writer) = stream.into_split();

        let mode = format!("{}\n{}\n", NOTIFY_WORD, METER_WORD);
        writer.write_all(mode.as_bytes()).await?;

        framer.reset();
        let broken = CancellationToken::new();
        *self.writer.lock().await = Some(LiveWriter {
            socket: writer,
            broken: broken.clone(),
        });
        self.counters.set_connected(true);
        tracing::info!(studio = %self.studio, host = %self.host, port = self.port, "Notify channel connected");

        self.read_loop(&mut reader, framer, &broken, decoder, publisher).await
    }

    async fn read_loop(
        &self,
        reader: &mut OwnedReadHalf,
        framer: &mut PacketFramer,
        broken: &CancellationToken,
        decoder: &EventDecoder,
        publisher: &EventPublisher,
    ) -> Result<()> {
        let mut buf = vec![0u8; self.config.read_buffer_size];

        loop {
            let n = tokio::select! {
                _ = self.cancel.cancelled() => return Ok(()),
                _ = broken.cancelled() => return Err(Error::NotifyChannelDown(self.studio.clone())),
                result = reader.read(&mut buf) => result?,
            };
            if n == 0 {
                return Err(Error::ConnectionClosed);
            }

            self.counters.add_bytes(n);
            tracing::trace!(studio = %self.studio, bytes = n, "Notify bytes received");

            for packet in framer.feed(&buf[..n]) {
                match decoder.decode(&packet) {
                    Ok(Some(event)) => {
                        self.counters.packet_decoded();
                        publisher.publish_event(&event).await;
                    }
                    Ok(None) => {
                        tracing::debug!(studio = %self.studio, kind = packet.kind, "Notify packet ignored");
                    }
                    Err(e) => {
                        self.counters.packet_dropped();
                        tracing::warn!(studio = %self.studio, error = %e, "Dropping notify packet");
                    }
                }
            }
        }
    }
}
