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

//! Per-host provisioning loop.
//!
//! Hosts are processed strictly sequentially, each with a fresh session:
//! connect, upload the package, unpack it, mark it executable (best-effort),
//! run the entry script. A failure anywhere aborts only that host; the
//! session is closed before the next host starts either way.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use thiserror::Error;

use crate::config::PackageSpec;
use crate::hostlist::{parse_hosts_file, HostEntry};
use crate::ssh::auth::AuthConfig;
use crate::ssh::error::SessionError;
use crate::ssh::session::RemoteSession;

/// Everything one batch run needs; assembled from the CLI.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub hosts_file: PathBuf,
    pub package: PackageSpec,
    /// Key file used for records with an empty credential field.
    pub identity: Option<PathBuf>,
    pub connect_timeout: Duration,
    /// `None` leaves commands and transfers unbounded.
    pub command_timeout: Option<Duration>,
}

/// Why one host's provisioning sequence stopped.
#[derive(Debug, Error)]
pub enum HostFailure {
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A provisioning command ran but reported a non-zero exit.
    #[error("remote command {command:?} exited with status {exit_code}")]
    CommandFailed {
        command: String,
        exit_code: u32,
        output: Vec<u8>,
    },
}

impl HostFailure {
    fn captured_output(&self) -> Option<&[u8]> {
        match self {
            Self::Session(e) => e.captured_output(),
            Self::CommandFailed { output, .. } => Some(output),
        }
    }
}

/// Outcome counts for one batch run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Malformed host-file lines that were skipped.
    pub skipped_lines: usize,
}

impl RunSummary {
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

/// The remote side of the sequence, derived once per run.
struct RemoteSteps {
    archive: String,
    unpack: String,
    chmod: String,
    entry: String,
}

impl RemoteSteps {
    fn derive(package: &PackageSpec) -> Result<Self> {
        Ok(Self {
            archive: package.remote_archive()?,
            unpack: package.unpack_command()?,
            chmod: package.chmod_command()?,
            entry: package.entry_command()?,
        })
    }
}

/// Run the whole batch. The only fatal errors are an unreadable host file
/// and an unusable package path; everything per line or per host is logged
/// and skipped.
pub async fn run(config: &RunConfig) -> Result<RunSummary> {
    let steps = RemoteSteps::derive(&config.package)?;
    let entries = parse_hosts_file(&config.hosts_file)
        .with_context(|| format!("cannot load host list {:?}", config.hosts_file))?;

    println!(
        "\n{} {} {} to {} host record(s) from {:?}",
        "▶".cyan(),
        "Provisioning".cyan().bold(),
        config.package.archive.display().to_string().yellow(),
        entries.len().to_string().yellow(),
        config.hosts_file
    );

    let mut summary = RunSummary::default();
    for (line_no, parsed) in entries {
        let entry = match parsed {
            Ok(entry) => entry,
            Err(e) => {
                summary.skipped_lines += 1;
                tracing::warn!("line {}: {}", line_no, e);
                println!(
                    "{} line {}: {} ({})",
                    "●".yellow(),
                    line_no,
                    "skipped".yellow(),
                    e
                );
                continue;
            }
        };

        summary.attempted += 1;
        let host = entry.node.to_string();
        let mut session = session_for(&entry, config);

        match provision_host(&mut session, config, &steps).await {
            Ok(()) => {
                summary.succeeded += 1;
                println!("{} {}: {}", "●".green(), host.bold(), "provisioned".green());
            }
            Err(e) => {
                summary.failed += 1;
                tracing::warn!("{}: {}", host, e);
                println!("{} {}: {}", "●".red(), host.bold(), "failed".red());
                for line in e.to_string().lines() {
                    println!("    {}", line.dimmed());
                }
                if let Some(output) = e.captured_output() {
                    for line in String::from_utf8_lossy(output).lines() {
                        println!("    {}", line.dimmed());
                    }
                }
            }
        }

        // Success or failure, this host's session never crosses to the next.
        session.close().await;
    }

    println!("{}", format_summary(&summary));
    Ok(summary)
}

fn session_for(entry: &HostEntry, config: &RunConfig) -> RemoteSession {
    let auth = AuthConfig {
        user: Some(entry.node.username.clone()),
        password: entry.password.clone(),
        key_path: config.identity.clone(),
        connect_timeout: Some(config.connect_timeout),
    };
    RemoteSession::new(entry.node.clone(), auth).with_command_timeout(config.command_timeout)
}

/// The fixed provisioning sequence for one host.
async fn provision_host(
    session: &mut RemoteSession,
    config: &RunConfig,
    steps: &RemoteSteps,
) -> Result<(), HostFailure> {
    let host = session.node().to_string();
    session.connect().await?;
    println!("  {} {}", "connected".green(), host.dimmed());

    let transfer = session
        .upload(config.package.local_archive(), &steps.archive)
        .await?;
    println!(
        "  {} {} ({} bytes)",
        "uploaded".green(),
        steps.archive,
        transfer.bytes.to_string().yellow()
    );

    checked_exec(session, &steps.unpack).await?;
    println!("  {} {}", "unpacked".green(), steps.archive);

    // Best-effort: permission bits may already be right, and a chmod failure
    // must not stop the install.
    match session.exec(&steps.chmod).await {
        Ok(r) if r.is_success() => {}
        Ok(r) => tracing::warn!("{}: {:?} exited {}", host, steps.chmod, r.exit_code),
        Err(e) => tracing::warn!("{}: {:?} failed: {}", host, steps.chmod, e),
    }

    checked_exec(session, &steps.entry).await?;
    println!("  {} {}", "installed".green(), steps.entry);
    Ok(())
}

/// Exec that treats a non-zero remote exit as this host's failure.
async fn checked_exec(session: &mut RemoteSession, command: &str) -> Result<(), HostFailure> {
    let result = session.exec(command).await?;
    if result.is_success() {
        Ok(())
    } else {
        Err(HostFailure::CommandFailed {
            command: result.command,
            exit_code: result.exit_code,
            output: result.output,
        })
    }
}

fn format_summary(summary: &RunSummary) -> String {
    let mut line = format!(
        "\n{} {} attempted, {} succeeded, {} failed",
        "Summary:".bold(),
        summary.attempted,
        summary.succeeded.to_string().green(),
        if summary.failed > 0 {
            summary.failed.to_string().red().to_string()
        } else {
            summary.failed.to_string()
        },
    );
    if summary.skipped_lines > 0 {
        line.push_str(&format!(
            ", {} malformed line(s) skipped",
            summary.skipped_lines.to_string().yellow()
        ));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_success_check() {
        let summary = RunSummary {
            attempted: 3,
            succeeded: 3,
            failed: 0,
            skipped_lines: 1,
        };
        assert!(summary.all_succeeded());

        let summary = RunSummary {
            attempted: 3,
            succeeded: 2,
            failed: 1,
            skipped_lines: 0,
        };
        assert!(!summary.all_succeeded());
    }

    #[test]
    fn test_remote_steps_derivation() {
        let package = PackageSpec::new(
            PathBuf::from("/srv/telegraf.zip"),
            "/opt".to_string(),
            None,
        );
        let steps = RemoteSteps::derive(&package).unwrap();
        assert_eq!(steps.archive, "/opt/telegraf.zip");
        assert_eq!(steps.unpack, "unzip -o /opt/telegraf.zip -d /opt");
        assert_eq!(steps.chmod, "chmod -R +x /opt/telegraf");
        assert_eq!(steps.entry, "/opt/telegraf/entry.sh");
    }

    #[test]
    fn test_command_failure_display() {
        let failure = HostFailure::CommandFailed {
            command: "unzip -o /opt/pkg.zip -d /opt".to_string(),
            exit_code: 9,
            output: b"cannot find zipfile".to_vec(),
        };
        assert!(failure.to_string().contains("exited with status 9"));
        assert_eq!(
            failure.captured_output(),
            Some(b"cannot find zipfile".as_slice())
        );
    }
}
