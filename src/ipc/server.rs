//! Async Unix socket IPC server for controlling a running relay.

use crate::error::{RelayError, Result};
use crate::ipc::protocol::{Command, Response};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Notify;

/// Handler trait for processing IPC commands.
#[async_trait::async_trait]
pub trait CommandHandler: Send + Sync {
    /// Handle a command and return a response.
    async fn handle(&self, command: Command) -> Response;
}

#[async_trait::async_trait]
impl<H: CommandHandler + ?Sized> CommandHandler for Arc<H> {
    async fn handle(&self, command: Command) -> Response {
        (**self).handle(command).await
    }
}

/// IPC server for control commands over a Unix socket.
pub struct IpcServer {
    socket_path: PathBuf,
    shutdown: Arc<Notify>,
}

impl IpcServer {
    pub fn new(socket_path: PathBuf) -> Self {
        Self {
            socket_path,
            shutdown: Arc::new(Notify::new()),
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Get the default socket path based on XDG_RUNTIME_DIR or fallback.
    pub fn default_socket_path() -> PathBuf {
        if let Ok(xdg_runtime) = std::env::var("XDG_RUNTIME_DIR") {
            PathBuf::from(xdg_runtime).join("voxrelay.sock")
        } else {
            let uid = unsafe { libc::getuid() };
            PathBuf::from(format!("/tmp/voxrelay-{}.sock", uid))
        }
    }

    /// Handle that makes `start` return once notified.
    pub fn shutdown_handle(&self) -> Arc<Notify> {
        self.shutdown.clone()
    }

    /// Binds the socket and serves connections until shutdown is requested.
    ///
    /// The socket file is removed on return.
    pub async fn start<H>(&self, handler: H) -> Result<()>
    where
        H: CommandHandler + 'static,
    {
        // Stale socket from a previous run
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path).map_err(|e| RelayError::IpcSocket {
                message: format!("Failed to remove existing socket: {}", e),
            })?;
        }

        let listener = UnixListener::bind(&self.socket_path).map_err(|e| RelayError::IpcSocket {
            message: format!("Failed to bind to socket: {}", e),
        })?;
        tracing::info!(socket = %self.socket_path.display(), "control socket listening");

        let handler = Arc::new(handler);
        let result = loop {
            tokio::select! {
                _ = self.shutdown.notified() => break Ok(()),
                accepted = listener.accept() => match accepted {
                    Ok((stream, _)) => {
                        let handler = Arc::clone(&handler);
                        tokio::spawn(async move {
                            if let Err(e) = handle_client(stream, handler).await {
                                tracing::warn!(error = %e, "control client failed");
                            }
                        });
                    }
                    Err(e) => {
                        break Err(RelayError::IpcConnection {
                            message: format!("Failed to accept connection: {}", e),
                        });
                    }
                },
            }
        };

        self.remove_socket();
        result
    }

    /// Requests shutdown; `start` returns and removes the socket.
    pub fn stop(&self) {
        self.shutdown.notify_one();
    }

    fn remove_socket(&self) {
        if self.socket_path.exists()
            && let Err(e) = std::fs::remove_file(&self.socket_path)
        {
            tracing::warn!(socket = %self.socket_path.display(), error = %e, "failed to remove socket");
        }
    }
}

/// Handle a single client connection: one command line in, one response line out.
async fn handle_client<H>(stream: UnixStream, handler: Arc<H>) -> Result<()>
where
    H: CommandHandler,
{
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    reader
        .read_line(&mut line)
        .await
        .map_err(|e| RelayError::IpcConnection {
            message: format!("Failed to read from client: {}", e),
        })?;

    let response = match Command::from_json(line.trim()) {
        Ok(command) => {
            tracing::debug!(?command, "control command");
            handler.handle(command).await
        }
        Err(e) => Response::error(format!("Failed to parse command: {}", e)),
    };

    let response_json = response.to_json().map_err(|e| RelayError::IpcProtocol {
        message: format!("Failed to serialize response: {}", e),
    })?;

    writer
        .write_all(format!("{}\n", response_json).as_bytes())
        .await
        .map_err(|e| RelayError::IpcConnection {
            message: format!("Failed to write to client: {}", e),
        })?;

    writer
        .flush()
        .await
        .map_err(|e| RelayError::IpcConnection {
            message: format!("Failed to flush writer: {}", e),
        })?;

    Ok(())
}
