// Copyright 2025 Lablup Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The remote session: one lazily-connected SSH transport per host, with a
//! lazily-created SFTP sub-channel layered on top.
//!
//! The SFTP sub-channel performs its own handshake over the transport, so it
//! is created at most once per session and reused across all transfers;
//! command execution opens a fresh short-lived channel per call. Teardown
//! releases SFTP first, then the transport, and a closed session stays
//! closed.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use russh::client::Handle;
use russh::ChannelMsg;
use russh_sftp::client::SftpSession;
use russh_sftp::protocol::OpenFlags;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::auth::{authenticate, AuthConfig};
use super::error::SessionError;
use super::handler::ClientHandler;
use crate::config::DEFAULT_COMMAND_TIMEOUT_SECS;
use crate::node::Node;

/// Streaming copy buffer; sized for SFTP round-trip efficiency.
const TRANSFER_BUFFER_SIZE: usize = 65536;

/// Initial capacity for captured command output.
const CMD_BUFFER_SIZE: usize = 8192;

/// Result of one remote command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecResult {
    pub command: String,
    /// Combined stdout and stderr, in arrival order.
    pub output: Vec<u8>,
    /// The remote exit status (`$?`).
    pub exit_code: u32,
}

impl ExecResult {
    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }

    pub fn output_string(&self) -> String {
        String::from_utf8_lossy(&self.output).to_string()
    }
}

impl fmt::Display for ExecResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ExecResult(command: {:?}, exit_code: {})",
            self.command, self.exit_code
        )
    }
}

/// Direction of a file transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferKind {
    Upload,
    Download,
}

impl fmt::Display for TransferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferKind::Upload => write!(f, "upload"),
            TransferKind::Download => write!(f, "download"),
        }
    }
}

/// Result of one completed file transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferResult {
    pub kind: TransferKind,
    pub local: PathBuf,
    pub remote: String,
    pub bytes: u64,
}

impl fmt::Display for TransferResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TransferResult(kind: {}, local: {:?}, remote: {:?}, bytes: {})",
            self.kind, self.local, self.remote, self.bytes
        )
    }
}

enum SessionState {
    Disconnected,
    Connected {
        transport: Handle<ClientHandler>,
        /// Created on first transfer, then reused. Never exists before the
        /// transport does.
        sftp: Option<SftpSession>,
    },
    Closed,
}

/// A reusable session to a single host.
///
/// Created disconnected; [`connect`] is idempotent while the session is
/// alive, and after [`close`] the session is finished for good — callers
/// provision each host with a fresh session.
///
/// [`connect`]: RemoteSession::connect
/// [`close`]: RemoteSession::close
pub struct RemoteSession {
    node: Node,
    auth: AuthConfig,
    command_timeout: Option<Duration>,
    state: SessionState,
}

impl RemoteSession {
    pub fn new(node: Node, auth: AuthConfig) -> Self {
        Self {
            node,
            auth,
            command_timeout: Some(Duration::from_secs(DEFAULT_COMMAND_TIMEOUT_SECS)),
            state: SessionState::Disconnected,
        }
    }

    /// Bound each exec/transfer by `timeout`; `None` removes the bound.
    pub fn with_command_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.state, SessionState::Connected { .. })
    }

    /// Whether the SFTP sub-channel has been established.
    pub fn is_transfer_ready(&self) -> bool {
        matches!(
            self.state,
            SessionState::Connected { sftp: Some(_), .. }
        )
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, SessionState::Closed)
    }

    /// Establish the transport and authenticate.
    ///
    /// Calling this on an already-connected session is a no-op; a closed
    /// session cannot reconnect and reports [`SessionError::NotConnected`].
    pub async fn connect(&mut self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Connected { .. } => {
                tracing::debug!("{}: already connected", self.node);
                return Ok(());
            }
            SessionState::Closed => return Err(SessionError::NotConnected),
            SessionState::Disconnected => {}
        }

        let resolved = self.auth.resolve()?;
        let addr = self.node.address();
        tracing::debug!("connecting to {} as {}", addr, resolved.user);

        let config = Arc::new(russh::client::Config::default());
        let dial = async {
            // TCP first so an unreachable host is reported as such; only a
            // live stream reaches the SSH handshake.
            let socket_addrs = tokio::net::lookup_host(&addr).await.map_err(|e| {
                SessionError::HostUnreachable {
                    addr: addr.clone(),
                    source: e,
                }
            })?;
            let mut stream_res = Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "could not resolve to any addresses",
            ));
            for socket_addr in socket_addrs {
                match tokio::net::TcpStream::connect(socket_addr).await {
                    Ok(stream) => {
                        stream_res = Ok(stream);
                        break;
                    }
                    Err(e) => stream_res = Err(e),
                }
            }
            let stream = stream_res.map_err(|e| SessionError::HostUnreachable {
                addr: addr.clone(),
                source: e,
            })?;

            let handler = ClientHandler::new(self.node.host.clone());
            russh::client::connect_stream(config, stream, handler)
                .await
                .map_err(|e| match e {
                    SessionError::Ssh(source) => SessionError::Handshake {
                        addr: addr.clone(),
                        source,
                    },
                    other => other,
                })
        };

        let mut handle =
            match tokio::time::timeout(resolved.connect_timeout, dial).await {
                Ok(res) => res?,
                Err(_) => {
                    return Err(SessionError::ConnectTimeout {
                        addr,
                        seconds: resolved.connect_timeout.as_secs(),
                    })
                }
            };

        authenticate(&mut handle, &resolved.user, &resolved.method, &addr).await?;
        tracing::debug!("{}: connected and authenticated", self.node);

        self.state = SessionState::Connected {
            transport: handle,
            sftp: None,
        };
        Ok(())
    }

    /// Run a command on a fresh channel, capturing combined stdout/stderr
    /// and the remote exit status.
    ///
    /// A non-zero exit is a normal [`ExecResult`]; only channel-level
    /// failures are errors, and those carry whatever output was captured.
    pub async fn exec(&mut self, command: &str) -> Result<ExecResult, SessionError> {
        let SessionState::Connected { transport, .. } = &self.state else {
            return Err(SessionError::NotConnected);
        };
        tracing::debug!("{}: exec {:?}", self.node, command);

        let exec_channel = |e| SessionError::ExecChannel {
            command: command.to_string(),
            output: Vec::new(),
            source: e,
        };
        let mut channel = transport.channel_open_session().await.map_err(exec_channel)?;
        channel.exec(true, command).await.map_err(exec_channel)?;

        let mut output = Vec::with_capacity(CMD_BUFFER_SIZE);
        let mut exit_code = None;
        let deadline = self
            .command_timeout
            .map(|t| tokio::time::Instant::now() + t);

        loop {
            let msg = match deadline {
                Some(deadline) => {
                    match tokio::time::timeout_at(deadline, channel.wait()).await {
                        Ok(msg) => msg,
                        Err(_) => {
                            return Err(SessionError::ExecTimeout {
                                command: command.to_string(),
                                output,
                                seconds: self
                                    .command_timeout
                                    .map(|t| t.as_secs())
                                    .unwrap_or_default(),
                            })
                        }
                    }
                }
                None => channel.wait().await,
            };
            let Some(msg) = msg else { break };
            match msg {
                ChannelMsg::Data { ref data } => output.extend_from_slice(data),
                // ext 1 is stderr; interleave it so the capture reads like
                // the command ran in a terminal.
                ChannelMsg::ExtendedData { ref data, ext: 1 } => {
                    output.extend_from_slice(data)
                }
                // The exit status can arrive before the last data message,
                // so keep draining until the channel ends.
                ChannelMsg::ExitStatus { exit_status } => exit_code = Some(exit_status),
                _ => {}
            }
        }

        match exit_code {
            Some(exit_code) => Ok(ExecResult {
                command: command.to_string(),
                output,
                exit_code,
            }),
            None => Err(SessionError::NoExitStatus {
                command: command.to_string(),
                output,
            }),
        }
    }

    /// Upload a local file to `remote`, creating or truncating it.
    pub async fn upload(
        &mut self,
        local: &Path,
        remote: &str,
    ) -> Result<TransferResult, SessionError> {
        tracing::debug!("{}: upload {:?} -> {}", self.node, local, remote);
        let timeout = self.command_timeout;
        let sftp = self.transfer_channel().await?;

        let mut src = tokio::fs::File::open(local)
            .await
            .map_err(|e| SessionError::LocalFile {
                path: local.to_path_buf(),
                source: e,
            })?;
        let mut dst = sftp
            .open_with_flags(
                remote,
                OpenFlags::CREATE | OpenFlags::TRUNCATE | OpenFlags::WRITE,
            )
            .await
            .map_err(|e| SessionError::RemoteFile {
                path: remote.to_string(),
                source: e,
            })?;

        let bytes = copy_counted(
            &mut src,
            &mut dst,
            timeout,
            TransferKind::Upload,
            local,
            remote,
        )
        .await?;

        Ok(TransferResult {
            kind: TransferKind::Upload,
            local: local.to_path_buf(),
            remote: remote.to_string(),
            bytes,
        })
    }

    /// Download `remote` to a local file, creating or truncating it.
    pub async fn download(
        &mut self,
        remote: &str,
        local: &Path,
    ) -> Result<TransferResult, SessionError> {
        tracing::debug!("{}: download {} -> {:?}", self.node, remote, local);
        let timeout = self.command_timeout;
        let sftp = self.transfer_channel().await?;

        let mut src = sftp
            .open_with_flags(remote, OpenFlags::READ)
            .await
            .map_err(|e| SessionError::RemoteFile {
                path: remote.to_string(),
                source: e,
            })?;
        let mut dst = tokio::fs::File::create(local)
            .await
            .map_err(|e| SessionError::LocalFile {
                path: local.to_path_buf(),
                source: e,
            })?;

        let bytes = copy_counted(
            &mut src,
            &mut dst,
            timeout,
            TransferKind::Download,
            local,
            remote,
        )
        .await?;

        Ok(TransferResult {
            kind: TransferKind::Download,
            local: local.to_path_buf(),
            remote: remote.to_string(),
            bytes,
        })
    }

    /// Get the SFTP sub-channel, establishing it on first use.
    async fn transfer_channel(&mut self) -> Result<&SftpSession, SessionError> {
        let SessionState::Connected { transport, sftp } = &mut self.state else {
            return Err(SessionError::NotConnected);
        };
        match sftp {
            Some(session) => Ok(session),
            None => {
                tracing::debug!("{}: establishing sftp sub-channel", self.node);
                let channel = transport.channel_open_session().await?;
                channel.request_subsystem(true, "sftp").await?;
                let session = SftpSession::new(channel.into_stream()).await?;
                Ok(sftp.insert(session))
            }
        }
    }

    /// Release the SFTP sub-channel, then the transport, in that order.
    ///
    /// Safe to call repeatedly and on a never-connected session; failures
    /// during teardown are logged, not surfaced.
    pub async fn close(&mut self) {
        match std::mem::replace(&mut self.state, SessionState::Closed) {
            SessionState::Connected { transport, sftp } => {
                if let Some(sftp) = sftp {
                    if let Err(e) = sftp.close().await {
                        tracing::debug!("{}: sftp teardown: {}", self.node, e);
                    }
                }
                if let Err(e) = transport
                    .disconnect(russh::Disconnect::ByApplication, "", "")
                    .await
                {
                    tracing::debug!("{}: transport teardown: {}", self.node, e);
                }
            }
            SessionState::Disconnected | SessionState::Closed => {}
        }
    }
}

/// Streaming copy that counts bytes so a mid-copy failure can report how far
/// it got.
async fn copy_counted<R, W>(
    src: &mut R,
    dst: &mut W,
    timeout: Option<Duration>,
    kind: TransferKind,
    local: &Path,
    remote: &str,
) -> Result<u64, SessionError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let transfer_err = |bytes: u64, source: std::io::Error| SessionError::Transfer {
        kind,
        local: local.to_path_buf(),
        remote: remote.to_string(),
        bytes,
        source,
    };
    let deadline = timeout.map(|t| tokio::time::Instant::now() + t);
    let timed_out = |bytes: u64| {
        transfer_err(
            bytes,
            std::io::Error::new(std::io::ErrorKind::TimedOut, "transfer timed out"),
        )
    };

    let mut buf = vec![0u8; TRANSFER_BUFFER_SIZE];
    let mut bytes: u64 = 0;
    loop {
        let read = match deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, src.read(&mut buf))
                .await
                .map_err(|_| timed_out(bytes))?,
            None => src.read(&mut buf).await,
        }
        .map_err(|e| transfer_err(bytes, e))?;
        if read == 0 {
            break;
        }
        let write = async {
            dst.write_all(&buf[..read]).await?;
            Ok::<_, std::io::Error>(())
        };
        match deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, write)
                .await
                .map_err(|_| timed_out(bytes))?,
            None => write.await,
        }
        .map_err(|e| transfer_err(bytes, e))?;
        bytes += read as u64;
    }
    let flush = async {
        dst.flush().await?;
        dst.shutdown().await?;
        Ok::<_, std::io::Error>(())
    };
    flush.await.map_err(|e| transfer_err(bytes, e))?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_copy_counted_moves_everything() {
        let data = vec![7u8; 200_000];
        let mut src = std::io::Cursor::new(data.clone());
        let mut dst = Vec::new();
        let bytes = copy_counted(
            &mut src,
            &mut dst,
            None,
            TransferKind::Upload,
            Path::new("/tmp/a"),
            "/opt/a",
        )
        .await
        .unwrap();
        assert_eq!(bytes, 200_000);
        assert_eq!(dst, data);
    }

    #[tokio::test]
    async fn test_copy_counted_reports_partial_bytes() {
        // A reader that yields one buffer then fails.
        struct FailingReader {
            chunk: Option<Vec<u8>>,
        }
        impl AsyncRead for FailingReader {
            fn poll_read(
                mut self: std::pin::Pin<&mut Self>,
                _cx: &mut std::task::Context<'_>,
                buf: &mut tokio::io::ReadBuf<'_>,
            ) -> std::task::Poll<std::io::Result<()>> {
                match self.chunk.take() {
                    Some(chunk) => {
                        buf.put_slice(&chunk);
                        std::task::Poll::Ready(Ok(()))
                    }
                    None => std::task::Poll::Ready(Err(std::io::Error::new(
                        std::io::ErrorKind::BrokenPipe,
                        "source went away",
                    ))),
                }
            }
        }

        let mut src = FailingReader {
            chunk: Some(vec![1u8; 1024]),
        };
        let mut dst = Vec::new();
        let err = copy_counted(
            &mut src,
            &mut dst,
            None,
            TransferKind::Download,
            Path::new("/tmp/a"),
            "/opt/a",
        )
        .await
        .unwrap_err();
        assert_eq!(err.transferred_bytes(), Some(1024));
    }

    #[test]
    fn test_exec_result_display() {
        let result = ExecResult {
            command: "uname -a".to_string(),
            output: b"Linux\n".to_vec(),
            exit_code: 0,
        };
        assert!(result.is_success());
        assert_eq!(result.output_string(), "Linux\n");
        assert_eq!(
            result.to_string(),
            "ExecResult(command: \"uname -a\", exit_code: 0)"
        );
    }
}
