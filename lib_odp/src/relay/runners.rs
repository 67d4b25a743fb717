//! # Command Runners
//!
//! The two ways an action touches the host: spawning a program directly from
//! an argument vector, and asking the local Docker daemon to start or stop a
//! container through its unix control socket.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tokio::process::Command;

/// Default Docker Engine control socket.
pub const DOCKER_SOCKET_PATH: &str = "/var/run/docker.sock";

/// Upper bound on a container start/stop round trip. `docker stop` waits up
/// to 10 seconds for the container before killing it.
const DOCKER_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Empty argument vector")]
    EmptyCommand,

    #[error("Failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Docker socket {path} unavailable: {source}")]
    DockerSocket {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Docker request timed out after {0:?}")]
    DockerTimeout(Duration),

    #[error("Unreadable Docker response: {0}")]
    DockerResponse(String),

    #[error("No such container: {0}")]
    ContainerNotFound(String),

    #[error("Docker API error (HTTP {status}): {message}")]
    DockerApi { status: u16, message: String },
}

/// Runs a program without a shell and reports its exit code.
#[async_trait]
pub trait ShellRunner: Send + Sync {
    async fn run(&self, argv: &[String]) -> Result<i32, RunnerError>;
}

/// Starts and stops containers.
#[async_trait]
pub trait ContainerControl: Send + Sync {
    async fn start(&self, id: &str) -> Result<(), RunnerError>;
    async fn stop(&self, id: &str) -> Result<(), RunnerError>;
}

/// Spawns `argv[0]` with `argv[1..]` via `tokio::process`.
#[derive(Debug, Default, Clone)]
pub struct ProcessRunner;

#[async_trait]
impl ShellRunner for ProcessRunner {
    async fn run(&self, argv: &[String]) -> Result<i32, RunnerError> {
        let (program, args) = argv.split_first().ok_or(RunnerError::EmptyCommand)?;

        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| RunnerError::Spawn {
                program: program.clone(),
                source: e,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stdout.trim().is_empty() {
            log::debug!("[{}] stdout: {}", program, stdout.trim());
        }
        if !stderr.trim().is_empty() {
            log::debug!("[{}] stderr: {}", program, stderr.trim());
        }

        // Killed by a signal: no code, report as failure.
        Ok(output.status.code().unwrap_or(-1))
    }
}

/// Docker Engine API client speaking HTTP/1.1 over the unix socket.
#[derive(Debug, Clone)]
pub struct DockerSocket {
    path: PathBuf,
}

impl Default for DockerSocket {
    fn default() -> Self {
        Self::new(DOCKER_SOCKET_PATH)
    }
}

impl DockerSocket {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn container_action(&self, id: &str, action: &str) -> Result<(), RunnerError> {
        let path = format!("/containers/{}/{}", id, action);
        let exchange = self.post(&path);
        let (status, body) = tokio::time::timeout(DOCKER_TIMEOUT, exchange)
            .await
            .map_err(|_| RunnerError::DockerTimeout(DOCKER_TIMEOUT))??;

        match status {
            204 => Ok(()),
            304 => {
                log::info!("Container {} needed no {} (already in that state)", id, action);
                Ok(())
            }
            404 => Err(RunnerError::ContainerNotFound(id.to_string())),
            status => Err(RunnerError::DockerApi {
                status,
                message: error_message(&body),
            }),
        }
    }

    /// Sends a bodiless POST and returns the status code and raw body.
    async fn post(&self, path: &str) -> Result<(u16, String), RunnerError> {
        let socket_err = |e| RunnerError::DockerSocket {
            path: self.path.clone(),
            source: e,
        };

        let mut stream = UnixStream::connect(&self.path).await.map_err(socket_err)?;
        let request = format!(
            "POST {} HTTP/1.1\r\nHost: docker\r\nUser-Agent: odp\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
            path
        );
        stream.write_all(request.as_bytes()).await.map_err(socket_err)?;

        let mut raw = Vec::new();
        stream.read_to_end(&mut raw).await.map_err(socket_err)?;
        let text = String::from_utf8_lossy(&raw);

        parse_response(&text)
    }
}

/// Splits an HTTP/1.1 response into status code and body.
fn parse_response(text: &str) -> Result<(u16, String), RunnerError> {
    let status_line = text
        .lines()
        .next()
        .ok_or_else(|| RunnerError::DockerResponse("empty response".to_string()))?;
    let status = status_line
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse::<u16>().ok())
        .ok_or_else(|| RunnerError::DockerResponse(status_line.to_string()))?;
    let body = text
        .split_once("\r\n\r\n")
        .map(|(_, body)| body.to_string())
        .unwrap_or_default();
    Ok((status, body))
}

// Docker error bodies are `{"message": "..."}`, possibly chunk-encoded.
fn error_message(body: &str) -> String {
    let json = match (body.find('{'), body.rfind('}')) {
        (Some(start), Some(end)) if start < end => &body[start..=end],
        _ => return body.trim().to_string(),
    };
    serde_json::from_str::<serde_json::Value>(json)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

#[async_trait]
impl ContainerControl for DockerSocket {
    async fn start(&self, id: &str) -> Result<(), RunnerError> {
        self.container_action(id, "start").await
    }

    async fn stop(&self, id: &str) -> Result<(), RunnerError> {
        self.container_action(id, "stop").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::net::UnixListener;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_process_runner_reports_exit_codes() {
        let runner = ProcessRunner;
        assert_eq!(runner.run(&argv(&["true"])).await.unwrap(), 0);
        assert_eq!(runner.run(&argv(&["sh", "-c", "exit 3"])).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_process_runner_spawn_failure() {
        let err = ProcessRunner
            .run(&argv(&["/no/such/binary-odp"]))
            .await
            .unwrap_err();
        assert!(matches!(err, RunnerError::Spawn { .. }));
        assert!(matches!(ProcessRunner.run(&[]).await, Err(RunnerError::EmptyCommand)));
    }

    /// One-shot Docker daemon stand-in; returns the request line it saw.
    async fn fake_docker(response: &'static str) -> (tempfile::TempDir, PathBuf, tokio::task::JoinHandle<String>) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docker.sock");
        let listener = UnixListener::bind(&path).unwrap();

        let handle = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut reader = BufReader::new(stream);
            let mut request_line = String::new();
            reader.read_line(&mut request_line).await.unwrap();
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).await.unwrap();
                if line == "\r\n" || line.is_empty() {
                    break;
                }
            }
            let mut stream = reader.into_inner();
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.unwrap();
            request_line.trim_end().to_string()
        });

        (dir, path, handle)
    }

    #[tokio::test]
    async fn test_docker_start_posts_to_container() {
        let (_dir, path, handle) = fake_docker("HTTP/1.1 204 No Content\r\n\r\n").await;

        DockerSocket::new(&path).start("web1").await.unwrap();
        assert_eq!(handle.await.unwrap(), "POST /containers/web1/start HTTP/1.1");
    }

    #[tokio::test]
    async fn test_docker_already_stopped_is_success() {
        let (_dir, path, handle) = fake_docker("HTTP/1.1 304 Not Modified\r\n\r\n").await;

        DockerSocket::new(&path).stop("web1").await.unwrap();
        assert_eq!(handle.await.unwrap(), "POST /containers/web1/stop HTTP/1.1");
    }

    #[tokio::test]
    async fn test_docker_missing_container() {
        let (_dir, path, handle) = fake_docker(
            "HTTP/1.1 404 Not Found\r\nContent-Type: application/json\r\n\r\n{\"message\":\"No such container: nope\"}",
        )
        .await;

        let err = DockerSocket::new(&path).start("nope").await.unwrap_err();
        handle.await.unwrap();
        assert!(matches!(err, RunnerError::ContainerNotFound(ref id) if id == "nope"));
    }

    #[tokio::test]
    async fn test_docker_socket_missing() {
        let err = DockerSocket::new("/no/such/docker.sock").start("web1").await.unwrap_err();
        assert!(matches!(err, RunnerError::DockerSocket { .. }));
    }

    #[test]
    fn test_error_message_from_chunked_body() {
        let body = "2c\r\n{\"message\":\"cannot stop container: web1\"}\r\n0\r\n\r\n";
        assert_eq!(error_message(body), "cannot stop container: web1");
        assert_eq!(error_message("plain text"), "plain text");
    }
}
