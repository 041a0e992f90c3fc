//! Fake studio server for tests
//!
//! Speaks just enough of the command protocol to exercise pools, notify
//! channels and the gateway over real sockets:
//!
//! - a blank line gets an empty response (`\nars>`)
//! - `hang` gets no response at all
//! - any other line gets `ok <line>\nars>`
//! - `notify` / `vu` switch the connection to push mode; later lines on that
//!   connection are recorded as realtime commands and never answered

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

struct Pusher {
    writer: Arc<Mutex<OwnedWriteHalf>>,
    cancel: CancellationToken,
}

#[derive(Default)]
pub(crate) struct FakeState {
    ignore_blank: AtomicBool,
    connections: AtomicUsize,
    commands: StdMutex<Vec<String>>,
    realtime: StdMutex<Vec<String>>,
    mode_words: StdMutex<Vec<String>>,
    pushers: Mutex<Vec<Pusher>>,
}

impl FakeState {
    /// Stop answering blank lines, so validation fails
    pub(crate) fn ignore_blank_lines(&self, ignore: bool) {
        self.ignore_blank.store(ignore, Ordering::SeqCst);
    }

    pub(crate) fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    pub(crate) fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    pub(crate) fn realtime(&self) -> Vec<String> {
        self.realtime.lock().unwrap().clone()
    }

    pub(crate) fn mode_words(&self) -> Vec<String> {
        self.mode_words.lock().unwrap().clone()
    }

    pub(crate) async fn push_connections(&self) -> usize {
        self.pushers.lock().await.len()
    }
}

pub(crate) struct FakeStudio {
    port: u16,
    state: Arc<FakeState>,
    shutdown: CancellationToken,
}

impl FakeStudio {
    pub(crate) async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let state = Arc::new(FakeState::default());
        let shutdown = CancellationToken::new();

        {
            let state = Arc::clone(&state);
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                loop {
                    let stream = tokio::select! {
                        _ = shutdown.cancelled() => break,
                        accepted = listener.accept() => match accepted {
                            Ok((stream, _)) => stream,
                            Err(_) => break,
                        },
                    };
                    state.connections.fetch_add(1, Ordering::SeqCst);
                    tokio::spawn(handle(stream, Arc::clone(&state), shutdown.child_token()));
                }
            });
        }

        Self {
            port,
            state,
            shutdown,
        }
    }

    pub(crate) fn port(&self) -> u16 {
        self.port
    }

    pub(crate) fn state(&self) -> &FakeState {
        &self.state
    }

    /// Write raw bytes to every push-mode connection
    pub(crate) async fn push(&self, bytes: &[u8]) {
        let pushers = self.state.pushers.lock().await;
        for pusher in pushers.iter() {
            let mut writer = pusher.writer.lock().await;
            let _ = writer.write_all(bytes).await;
            let _ = writer.flush().await;
        }
    }

    /// Close every push-mode connection from the server side
    pub(crate) async fn drop_push_connections(&self) {
        let pushers: Vec<Pusher> = self.state.pushers.lock().await.drain(..).collect();
        for pusher in pushers {
            pusher.cancel.cancel();
            let _ = pusher.writer.lock().await.shutdown().await;
        }
    }
}

impl Drop for FakeStudio {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn handle(stream: TcpStream, state: Arc<FakeState>, cancel: CancellationToken) {
    let (reader, writer) = stream.into_split();
    let writer = Arc::new(Mutex::new(writer));
    let mut lines = BufReader::new(reader).lines();
    let mut push_mode = false;

    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => break,
            line = lines.next_line() => match line {
                Ok(Some(line)) => line,
                _ => break,
            },
        };

        let word = line.trim();
        if word == "notify" || word == "vu" {
            state.mode_words.lock().unwrap().push(word.to_string());
            if !push_mode {
                push_mode = true;
                state.pushers.lock().await.push(Pusher {
                    writer: Arc::clone(&writer),
                    cancel: cancel.clone(),
                });
            }
            continue;
        }

        if push_mode {
            state.realtime.lock().unwrap().push(line);
            continue;
        }

        let reply = if word.is_empty() {
            if state.ignore_blank.load(Ordering::SeqCst) {
                continue;
            }
            "\nars>".to_string()
        } else if word == "hang" {
            continue;
        } else {
            state.commands.lock().unwrap().push(line.clone());
            format!("ok {}\nars>", line)
        };

        let mut writer = writer.lock().await;
        if writer.write_all(reply.as_bytes()).await.is_err() {
            break;
        }
    }
}

/// A local port with nothing listening on it
pub(crate) async fn unused_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

/// Poll `check` until it holds, panicking after about two seconds
pub(crate) async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..100 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not reached");
}
