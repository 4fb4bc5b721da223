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

//! Provisioning parameters.
//!
//! The remote paths and commands used during provisioning are operational
//! configuration, not session logic: they are derived here from a
//! [`PackageSpec`] and handed to the per-host loop as plain strings.

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};

/// Default SSH port, applied when a host record leaves the port unset (0).
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Default timeout for establishing the SSH transport.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 15;

/// Default timeout for a single remote command or transfer.
///
/// Long enough for an installer run, short enough to detect a hung host.
/// 0 disables the bound entirely.
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 300;

/// Default remote directory the installer archive is placed in.
pub const DEFAULT_REMOTE_DIR: &str = "/opt";

/// Entry-point script expected under the unpacked archive directory.
pub const DEFAULT_ENTRY_SCRIPT: &str = "entry.sh";

/// The installer package and where it lands on the remote side.
#[derive(Debug, Clone)]
pub struct PackageSpec {
    /// Local path of the archive to upload.
    pub archive: PathBuf,
    /// Remote directory the archive is uploaded into and unpacked under.
    pub remote_dir: String,
    /// Path of the entry-point script relative to the unpack directory.
    /// `None` uses [`DEFAULT_ENTRY_SCRIPT`].
    pub entry: Option<String>,
}

impl PackageSpec {
    pub fn new(archive: PathBuf, remote_dir: String, entry: Option<String>) -> Self {
        Self {
            archive,
            remote_dir,
            entry,
        }
    }

    /// File name of the archive, e.g. `telegraf.zip`.
    pub fn archive_name(&self) -> Result<&str> {
        match self.archive.file_name().and_then(|n| n.to_str()) {
            Some(name) => Ok(name),
            None => bail!("package path {:?} has no file name", self.archive),
        }
    }

    /// Archive name without its extension, e.g. `telegraf`. This is the
    /// directory `unzip` produces under the remote dir.
    pub fn archive_stem(&self) -> Result<&str> {
        match self.archive.file_stem().and_then(|s| s.to_str()) {
            Some(stem) => Ok(stem),
            None => bail!("package path {:?} has no file stem", self.archive),
        }
    }

    /// Remote path the archive is uploaded to.
    pub fn remote_archive(&self) -> Result<String> {
        Ok(format!("{}/{}", self.remote_dir, self.archive_name()?))
    }

    /// Remote directory the archive unpacks into.
    pub fn unpack_dir(&self) -> Result<String> {
        Ok(format!("{}/{}", self.remote_dir, self.archive_stem()?))
    }

    /// Shell command that unpacks the uploaded archive in place.
    pub fn unpack_command(&self) -> Result<String> {
        Ok(format!(
            "unzip -o {} -d {}",
            self.remote_archive()?,
            self.remote_dir
        ))
    }

    /// Shell command that marks the unpacked tree executable.
    pub fn chmod_command(&self) -> Result<String> {
        Ok(format!("chmod -R +x {}", self.unpack_dir()?))
    }

    /// Shell command that invokes the entry-point script.
    pub fn entry_command(&self) -> Result<String> {
        let entry = self.entry.as_deref().unwrap_or(DEFAULT_ENTRY_SCRIPT);
        Ok(format!("{}/{}", self.unpack_dir()?, entry))
    }

    pub fn local_archive(&self) -> &Path {
        &self.archive
    }
}
