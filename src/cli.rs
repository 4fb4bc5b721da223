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

use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Parser};

use crate::config::{
    PackageSpec, DEFAULT_COMMAND_TIMEOUT_SECS, DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_REMOTE_DIR,
};
use crate::provision::RunConfig;

#[derive(Parser, Debug)]
#[command(
    name = "rollout",
    version,
    about = "Batch remote provisioning over SSH",
    long_about = "Reads a host list (one 'username|credential|address|port' record per line),\n\
                  uploads the installer package to each host over SFTP, unpacks it and runs\n\
                  its entry script. Hosts are processed sequentially; a failing host is\n\
                  reported and the batch moves on."
)]
pub struct Cli {
    /// Host list file, one 'username|credential|address|port' record per line
    pub hosts_file: PathBuf,

    /// Local installer archive (zip) uploaded to each host
    #[arg(short = 'f', long, value_name = "FILE")]
    pub package: PathBuf,

    /// Remote directory the archive is uploaded into and unpacked under
    #[arg(long, value_name = "DIR", default_value = DEFAULT_REMOTE_DIR)]
    pub remote_dir: String,

    /// Entry-point script, relative to the unpacked directory
    #[arg(long, value_name = "PATH")]
    pub entry: Option<String>,

    /// Private key for records with an empty credential field
    #[arg(short = 'i', long, value_name = "FILE")]
    pub identity: Option<PathBuf>,

    /// SSH connection timeout in seconds
    #[arg(
        long,
        value_name = "SECONDS",
        default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub connect_timeout: u64,

    /// Timeout in seconds for each remote command and transfer (0 = no limit)
    #[arg(
        long,
        value_name = "SECONDS",
        default_value_t = DEFAULT_COMMAND_TIMEOUT_SECS
    )]
    pub command_timeout: u64,

    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Fold the parsed arguments into the orchestration config.
    pub fn run_config(&self) -> RunConfig {
        RunConfig {
            hosts_file: self.hosts_file.clone(),
            package: PackageSpec::new(
                self.package.clone(),
                self.remote_dir.clone(),
                self.entry.clone(),
            ),
            identity: self.identity.clone(),
            connect_timeout: Duration::from_secs(self.connect_timeout),
            command_timeout: match self.command_timeout {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
        }
    }
}
