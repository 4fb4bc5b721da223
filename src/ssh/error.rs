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

//! Error types for the remote session.
//!
//! Connection failures keep host-unreachable distinct from
//! credential-rejected so the per-host report can name the actual cause, and
//! the exec/transfer variants carry whatever partial output or byte count was
//! produced before the failure.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use super::session::TransferKind;

#[derive(Debug, Error)]
pub enum SessionError {
    /// The private-key file could not be read
    #[error("failed to read key file {path:?}: {source}")]
    CredentialRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The private-key file is not a parseable private key
    #[error("failed to parse key file {path:?}: {source}")]
    CredentialParse {
        path: PathBuf,
        #[source]
        source: russh::keys::Error,
    },

    /// DNS resolution or TCP connection failure
    #[error("cannot reach {addr}: {source}")]
    HostUnreachable {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// The transport did not come up within the configured timeout
    #[error("connection to {addr} timed out after {seconds}s")]
    ConnectTimeout { addr: String, seconds: u64 },

    /// SSH protocol-level failure during connection setup
    #[error("ssh handshake with {addr} failed: {source}")]
    Handshake {
        addr: String,
        #[source]
        source: russh::Error,
    },

    /// The server rejected the password
    #[error("password authentication rejected for {user}@{addr}")]
    PasswordRejected { user: String, addr: String },

    /// The server rejected the private key
    #[error("key authentication rejected for {user}@{addr}")]
    KeyRejected { user: String, addr: String },

    /// Operation attempted on a session that is not connected
    #[error("session is not connected")]
    NotConnected,

    /// The command channel itself failed, as opposed to the remote command
    /// exiting non-zero
    #[error("command channel failed for {command:?}: {source}")]
    ExecChannel {
        command: String,
        /// Output captured before the channel failed.
        output: Vec<u8>,
        #[source]
        source: russh::Error,
    },

    /// The channel closed without the remote reporting an exit status
    #[error("remote command {command:?} ended without reporting an exit status")]
    NoExitStatus { command: String, output: Vec<u8> },

    /// The remote command did not finish within the configured timeout
    #[error("remote command {command:?} did not finish within {seconds}s")]
    ExecTimeout {
        command: String,
        output: Vec<u8>,
        seconds: u64,
    },

    /// A local file could not be opened or created for a transfer
    #[error("cannot open local file {path:?}: {source}")]
    LocalFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A remote file could not be opened or created over SFTP
    #[error("remote file '{path}' rejected: {source}")]
    RemoteFile {
        path: String,
        #[source]
        source: russh_sftp::client::error::Error,
    },

    /// A streaming copy failed after moving part of the data
    #[error("{kind} of '{remote}' interrupted after {bytes} bytes: {source}")]
    Transfer {
        kind: TransferKind,
        local: PathBuf,
        remote: String,
        /// Bytes moved before the failure; best-effort accounting, not a
        /// resume point.
        bytes: u64,
        #[source]
        source: io::Error,
    },

    /// SSH transport error outside the cases above
    #[error("ssh error: {0}")]
    Ssh(#[from] russh::Error),

    /// SFTP subsystem error outside the cases above
    #[error("sftp error: {0}")]
    Sftp(#[from] russh_sftp::client::error::Error),
}

impl SessionError {
    /// Output captured before an exec failure, when the variant carries any.
    pub fn captured_output(&self) -> Option<&[u8]> {
        match self {
            Self::ExecChannel { output, .. }
            | Self::NoExitStatus { output, .. }
            | Self::ExecTimeout { output, .. } => Some(output),
            _ => None,
        }
    }

    /// Bytes moved before a transfer failure, when the variant carries any.
    pub fn transferred_bytes(&self) -> Option<u64> {
        match self {
            Self::Transfer { bytes, .. } => Some(*bytes),
            _ => None,
        }
    }
}
