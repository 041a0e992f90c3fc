//! Pooled command session
//!
//! One persistent command connection plus the bookkeeping for its single
//! in-flight exchange. The command protocol has no request ids, so a session
//! never has more than one exchange outstanding; callers that need a
//! sequence of commands to observe the same session pass them as a batch.

use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::error::{Error, Result};
use crate::pool::Slot;
use crate::protocol::constants::is_reserved_command;
use crate::protocol::ResponseBuffer;

use super::state::SessionState;

/// A single persistent command connection
#[derive(Debug)]
pub struct PooledSession<S = TcpStream> {
    id: u64,
    stream: S,
    responses: ResponseBuffer,
    state: SessionState,
    response_timeout: Duration,
    created_at: Instant,
    last_used: Instant,
    /// Pool slot this session occupies
    pub(crate) slot: Option<Slot>,
}

impl PooledSession<TcpStream> {
    /// Open a command connection to `host:port`
    pub async fn connect(
        id: u64,
        host: &str,
        port: u16,
        connect_timeout: Duration,
        response_timeout: Duration,
    ) -> Result<Self> {
        let addr = format!("{}:{}", host, port);
        tracing::debug!(session_id = id, addr = %addr, "Opening command session");

        let stream = match tokio::time::timeout(connect_timeout, TcpStream::connect(&addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => return Err(Error::Connect { addr, source }),
            Err(_) => {
                return Err(Error::Connect {
                    addr,
                    source: std::io::ErrorKind::TimedOut.into(),
                })
            }
        };
        stream.set_nodelay(true)?;

        Ok(Self::new(id, stream, response_timeout))
    }
}

impl<S> PooledSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap an already-connected stream
    pub fn new(id: u64, stream: S, response_timeout: Duration) -> Self {
        let now = Instant::now();

        Self {
            id,
            stream,
            responses: ResponseBuffer::with_capacity(4096),
            state: SessionState::Idle,
            response_timeout,
            created_at: now,
            last_used: now,
            slot: None,
        }
    }

    /// Session id, unique within its pool
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Time since the last completed exchange
    pub fn idle_for(&self) -> Duration {
        self.last_used.elapsed()
    }

    /// Time since the connection was opened
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Mark the session for destruction
    pub fn invalidate(&mut self) {
        self.state.invalidate();
    }

    /// Send one command and return its response
    pub async fn send_command(&mut self, command: &str) -> Result<String> {
        self.send_commands(&[command]).await
    }

    /// Send a batch of commands in one write and return the last response
    ///
    /// Every command is newline-terminated and written together, then one
    /// response per command is read in order. Reserved push-mode words are
    /// refused before anything touches the socket.
    pub async fn send_commands<C: AsRef<str>>(&mut self, commands: &[C]) -> Result<String> {
        if !self.state.can_send() {
            return Err(match self.state {
                SessionState::AwaitingResponse => Error::SessionBusy(self.id),
                _ => Error::SessionInvalid(self.id),
            });
        }

        let mut payload = String::new();
        for command in commands {
            let command = command.as_ref();
            if is_reserved_command(command) || command.contains(['\n', '\r']) {
                tracing::warn!(session_id = self.id, command, "Refusing command on pooled session");
                return Err(Error::ProtocolMisuse(command.to_string()));
            }
            payload.push_str(command);
            payload.push('\n');
        }

        if commands.is_empty() {
            return Ok(String::new());
        }

        if !self.state.begin_exchange() {
            return Err(Error::SessionBusy(self.id));
        }

        tracing::debug!(session_id = self.id, count = commands.len(), "Sending commands");

        match self.exchange(payload.as_bytes(), commands.len(), self.response_timeout).await {
            Ok(response) => {
                self.state.complete_exchange();
                self.last_used = Instant::now();
                Ok(response)
            }
            Err(e) => {
                tracing::debug!(session_id = self.id, error = %e, "Command exchange failed");
                self.state.invalidate();
                Err(e)
            }
        }
    }

    /// Liveness check: a blank line must produce a sentinel within `timeout`
    pub async fn validate(&mut self, timeout: Duration) -> Result<()> {
        if !self.state.begin_exchange() {
            return Err(Error::ValidationFailure);
        }

        match self.exchange(b"\n", 1, timeout).await {
            Ok(_) => {
                self.state.complete_exchange();
                Ok(())
            }
            Err(e) => {
                tracing::debug!(session_id = self.id, error = %e, "Session validation failed");
                self.state.invalidate();
                Err(Error::ValidationFailure)
            }
        }
    }

    /// Close the underlying socket
    pub async fn close(&mut self) {
        self.state.invalidate();
        if let Err(e) = self.stream.shutdown().await {
            tracing::trace!(session_id = self.id, error = %e, "Shutdown error ignored");
        }
    }

    async fn exchange(&mut self, payload: &[u8], responses: usize, timeout: Duration) -> Result<String> {
        self.stream.write_all(payload).await?;
        self.stream.flush().await?;

        let mut last = String::new();
        for _ in 0..responses {
            last = match tokio::time::timeout(timeout, self.read_response()).await {
                Ok(result) => result?,
                Err(_) => return Err(Error::ResponseTimeout(timeout)),
            };
        }
        Ok(last)
    }

    async fn read_response(&mut self) -> Result<String> {
        loop {
            if let Some(response) = self.responses.take_response() {
                return Ok(response);
            }

            let buf = self.responses.buffer_mut();
            buf.reserve(4096);
            let n = self.stream.read_buf(buf).await?;
            if n == 0 {
                return Err(Error::ConnectionClosed);
            }
        }
    }
}
