//! TCP control server
//!
//! This module implements the server that listens for incoming control
//! connections and feeds their request lines to the dispatcher. One
//! connection is served at a time: each is drained to completion before
//! the next accept.
//!
//! Request bytes are decoded leniently (invalid UTF-8 becomes U+FFFD) and
//! lines longer than [`MAX_REQUEST_LEN`] are answered with an error line and
//! skipped; neither ends the connection.

use crate::control::{
    error_line, write_line, CommandDispatcher, CommandError, Request, ServerState,
    MAX_REQUEST_LEN,
};
use crate::error::{DeckError, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tracing::{debug, error, info, warn};

/// Pause after a failed accept before trying again
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Control server owning the listening socket
pub struct ControlServer {
    /// Listening socket
    listener: TcpListener,
    /// Command dispatcher
    dispatcher: Arc<CommandDispatcher>,
    /// Run flag and shutdown notification
    state: Arc<ServerState>,
    /// Unattended mode: the caller exits the process once the server stops
    headless: bool,
}

impl ControlServer {
    /// Bind the control socket
    pub async fn bind<A: ToSocketAddrs>(
        addr: A,
        dispatcher: Arc<CommandDispatcher>,
        state: Arc<ServerState>,
    ) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| DeckError::Server(format!("Failed to bind control socket: {}", e)))?;

        Ok(Self {
            listener,
            dispatcher,
            state,
            headless: false,
        })
    }

    /// Mark the server as running unattended
    ///
    /// [`start`](Self::start) still returns normally; the owner is expected
    /// to finish its own cleanup and then exit the process.
    pub fn headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Whether the server runs unattended
    pub fn is_headless(&self) -> bool {
        self.headless
    }

    /// Address the control socket is bound to
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Shared session state
    pub fn state(&self) -> Arc<ServerState> {
        self.state.clone()
    }

    /// Serve connections until shutdown is requested
    ///
    /// The listener is closed when this returns, so later connection
    /// attempts are refused.
    pub async fn start(self) -> Result<()> {
        let Self {
            listener,
            dispatcher,
            state,
            headless,
        } = self;

        info!("Control server listening on {}", listener.local_addr()?);

        while state.is_running() {
            let accepted = tokio::select! {
                accepted = listener.accept() => accepted,
                _ = state.shutdown_requested() => break,
            };

            match accepted {
                Ok((stream, peer)) => {
                    info!("Client connected from {}", peer);
                    if let Err(e) = handle_connection(stream, &dispatcher).await {
                        error!("Connection handler error for {}: {}", peer, e);
                    }
                    info!("Client {} disconnected", peer);
                }
                Err(e) if !state.is_running() => {
                    debug!("Accept interrupted by shutdown: {}", e);
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            }
        }

        drop(listener);
        state.mark_stopped();
        info!("Control server stopped{}", if headless { " (headless)" } else { "" });

        Ok(())
    }
}

/// One request line read from a client
enum ReadOutcome {
    /// A complete (or final, unterminated) line
    Line(String),
    /// A line over [`MAX_REQUEST_LEN`]; its bytes were discarded
    TooLong,
    /// The peer closed the connection
    Closed,
}

/// Read one request line, never buffering more than [`MAX_REQUEST_LEN`] + 1 bytes
async fn read_request<R>(reader: &mut R, buf: &mut Vec<u8>) -> std::io::Result<ReadOutcome>
where
    R: AsyncBufRead + Unpin,
{
    let limit = MAX_REQUEST_LEN as u64 + 1;

    buf.clear();
    if (&mut *reader).take(limit).read_until(b'\n', buf).await? == 0 {
        return Ok(ReadOutcome::Closed);
    }

    if buf.last() == Some(&b'\n') || buf.len() <= MAX_REQUEST_LEN {
        return Ok(ReadOutcome::Line(String::from_utf8_lossy(buf).into_owned()));
    }

    // Drop the rest of the oversized line
    loop {
        buf.clear();
        let read = (&mut *reader).take(limit).read_until(b'\n', buf).await?;
        if read == 0 || buf.last() == Some(&b'\n') {
            break;
        }
    }

    Ok(ReadOutcome::TooLong)
}

/// Handle a single client connection
async fn handle_connection(stream: TcpStream, dispatcher: &CommandDispatcher) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        let written = match read_request(&mut reader, &mut buf).await {
            Ok(ReadOutcome::Closed) => {
                debug!("Client closed the connection");
                break;
            }
            Ok(ReadOutcome::TooLong) => {
                warn!("Rejected request over {} bytes", MAX_REQUEST_LEN);
                let line = error_line(&CommandError::RequestTooLong(MAX_REQUEST_LEN));
                write_line(&mut writer, &line).await
            }
            Ok(ReadOutcome::Line(line)) => {
                let Some(request) = Request::parse(&line) else {
                    continue;
                };

                debug!("Received request: {:?}", request);
                dispatcher.execute(&request, &mut writer).await
            }
            Err(e) => {
                error!("Failed to read from socket: {}", e);
                break;
            }
        };

        written.map_err(|e| DeckError::Server(format!("Failed to write response: {}", e)))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockStudioBackend;
    use crate::catalog::{Catalog, MemoryProvider};
    use crate::control::MacroTable;
    use tokio::io::AsyncWriteExt;

    fn dispatcher() -> Arc<CommandDispatcher> {
        Arc::new(CommandDispatcher::new(MacroTable::new()))
    }

    /// Send `request`, half-close, and collect everything the server writes back
    async fn exchange(dispatcher: Arc<CommandDispatcher>, request: &[u8]) -> String {
        let state = Arc::new(ServerState::new());
        let server = ControlServer::bind("127.0.0.1:0", dispatcher, state.clone())
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();
        let task = tokio::spawn(server.start());

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(request).await.unwrap();
        stream.shutdown().await.unwrap();

        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();

        state.request_shutdown();
        task.await.unwrap().unwrap();
        response
    }

    #[tokio::test]
    async fn test_bind_ephemeral_port() {
        let state = Arc::new(ServerState::new());
        let server = ControlServer::bind("127.0.0.1:0", dispatcher(), state.clone())
            .await
            .unwrap();

        assert_ne!(server.local_addr().unwrap().port(), 0);
        assert!(Arc::ptr_eq(&server.state(), &state));
    }

    #[tokio::test]
    async fn test_bind_conflict_is_an_error() {
        let state = Arc::new(ServerState::new());
        let first = ControlServer::bind("127.0.0.1:0", dispatcher(), state.clone())
            .await
            .unwrap();
        let addr = first.local_addr().unwrap();

        let second = ControlServer::bind(addr, dispatcher(), state).await;
        assert!(matches!(second, Err(DeckError::Server(_))));
    }

    #[tokio::test]
    async fn test_shutdown_before_start() {
        let state = Arc::new(ServerState::new());
        let server = ControlServer::bind("127.0.0.1:0", dispatcher(), state.clone())
            .await
            .unwrap();

        state.request_shutdown();
        server.start().await.unwrap();
        assert!(!state.is_running());
    }

    #[tokio::test]
    async fn test_blank_lines_ignored() {
        let response = exchange(dispatcher(), b"\n\r\n   \nGreen\n").await;
        assert_eq!(response, "Command not found (Green)\n");
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_decoded_lossily() {
        let mut backend = MockStudioBackend::new();
        backend.expect_trigger_transition().times(1).returning(|| Ok(()));
        let catalog = Arc::new(Catalog::new(Arc::new(MemoryProvider::new(Vec::new()))));
        let dispatcher = Arc::new(CommandDispatcher::with_defaults(
            Arc::new(backend),
            catalog,
            MacroTable::new(),
        ));

        let response = exchange(dispatcher, b"Caf\xe9\nTransition\n").await;
        assert_eq!(
            response,
            "Command not found (Caf\u{FFFD})\nTransition executed.\n"
        );
    }

    #[tokio::test]
    async fn test_oversized_line_is_rejected_and_skipped() {
        let mut request = vec![b'A'; MAX_REQUEST_LEN * 3];
        request.extend_from_slice(b"\nGreen\n");

        let response = exchange(dispatcher(), &request).await;
        assert_eq!(
            response,
            format!(
                "Error: Request exceeds {} bytes\nCommand not found (Green)\n",
                MAX_REQUEST_LEN
            )
        );
    }

    #[tokio::test]
    async fn test_line_at_limit_is_accepted() {
        let mut request = vec![b'A'; MAX_REQUEST_LEN];
        request.push(b'\n');

        let response = exchange(dispatcher(), &request).await;
        assert_eq!(response, format!("Command not found ({})\n", "A".repeat(MAX_REQUEST_LEN)));
    }

    #[tokio::test]
    async fn test_unterminated_final_line_is_served() {
        let response = exchange(dispatcher(), b"Green").await;
        assert_eq!(response, "Command not found (Green)\n");
    }

    #[tokio::test]
    async fn test_headless_start_returns_after_shutdown() {
        let state = Arc::new(ServerState::new());
        let server = ControlServer::bind("127.0.0.1:0", dispatcher(), state.clone())
            .await
            .unwrap()
            .headless(true);
        assert!(server.is_headless());

        let task = tokio::spawn(server.start());
        state.request_shutdown();

        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("headless server did not return")
            .unwrap()
            .unwrap();
        assert!(!state.is_running());
    }
}
