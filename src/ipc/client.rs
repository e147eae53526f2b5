//! IPC client for sending commands to a running relay.

use crate::error::{RelayError, Result};
use crate::ipc::protocol::{Command, Response};
use std::path::Path;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

/// Send a command to the relay via its Unix socket.
///
/// # Errors
/// Returns `RelayError::IpcConnection` if the relay is unreachable and
/// `RelayError::IpcProtocol` if the exchange cannot be (de)serialized.
pub async fn send_command(socket_path: &Path, command: Command) -> Result<Response> {
    let stream = UnixStream::connect(socket_path)
        .await
        .map_err(|e| RelayError::IpcConnection {
            message: format!("Failed to connect to relay: {}", e),
        })?;

    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    let command_json = command.to_json().map_err(|e| RelayError::IpcProtocol {
        message: format!("Failed to serialize command: {}", e),
    })?;

    writer
        .write_all(format!("{}\n", command_json).as_bytes())
        .await
        .map_err(|e| RelayError::IpcConnection {
            message: format!("Failed to write command: {}", e),
        })?;

    writer
        .flush()
        .await
        .map_err(|e| RelayError::IpcConnection {
            message: format!("Failed to flush writer: {}", e),
        })?;

    let mut response_line = String::new();
    reader
        .read_line(&mut response_line)
        .await
        .map_err(|e| RelayError::IpcConnection {
            message: format!("Failed to read response: {}", e),
        })?;

    Response::from_json(response_line.trim()).map_err(|e| RelayError::IpcProtocol {
        message: format!("Failed to deserialize response: {}", e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ipc::server::{CommandHandler, IpcServer};
    use tempfile::TempDir;

    struct FixedHandler;

    #[async_trait::async_trait]
    impl CommandHandler for FixedHandler {
        async fn handle(&self, command: Command) -> Response {
            match command {
                Command::Set { key, .. } if key == "bogus" => Response::error("key not supported"),
                Command::Set { key, value } => Response::ok(format!("{key} = {value}")),
                _ => Response::ok("done"),
            }
        }
    }

    async fn start_server(socket_path: &Path) {
        let server = IpcServer::new(socket_path.to_path_buf());
        tokio::spawn(async move { server.start(FixedHandler).await });
        for _ in 0..100 {
            if socket_path.exists() {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn test_send_command_set() {
        let temp_dir = TempDir::new().unwrap();
        let socket_path = temp_dir.path().join("test.sock");
        start_server(&socket_path).await;

        let response = send_command(
            &socket_path,
            Command::Set {
                key: "tts_voice".to_string(),
                value: "nova".to_string(),
            },
        )
        .await
        .unwrap();
        assert_eq!(response, Response::ok("tts_voice = nova"));

        let response = send_command(
            &socket_path,
            Command::Set {
                key: "bogus".to_string(),
                value: "1".to_string(),
            },
        )
        .await
        .unwrap();
        assert_eq!(response, Response::error("key not supported"));
    }

    #[tokio::test]
    async fn test_multiple_sequential_commands() {
        let temp_dir = TempDir::new().unwrap();
        let socket_path = temp_dir.path().join("test.sock");
        start_server(&socket_path).await;

        for cmd in [Command::Start, Command::Status, Command::Stop, Command::Help] {
            let response = send_command(&socket_path, cmd).await.unwrap();
            assert_eq!(response, Response::ok("done"));
        }
    }

    #[tokio::test]
    async fn test_send_command_connection_failed() {
        let temp_dir = TempDir::new().unwrap();
        let socket_path = temp_dir.path().join("nonexistent.sock");

        let err = send_command(&socket_path, Command::Status)
            .await
            .unwrap_err();
        match err {
            RelayError::IpcConnection { message } => {
                assert!(message.contains("Failed to connect to relay"));
            }
            other => panic!("Expected IpcConnection error, got: {:?}", other),
        }
    }
}
