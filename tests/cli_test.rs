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

use clap::Parser;
use rollout::cli::Cli;

#[test]
fn test_minimal_invocation() {
    let cli = Cli::parse_from(["rollout", "hosts.txt", "-f", "/srv/telegraf.zip"]);

    assert_eq!(cli.hosts_file, PathBuf::from("hosts.txt"));
    assert_eq!(cli.package, PathBuf::from("/srv/telegraf.zip"));
    assert_eq!(cli.remote_dir, "/opt");
    assert_eq!(cli.entry, None);
    assert_eq!(cli.connect_timeout, 15);
    assert_eq!(cli.command_timeout, 300);
    assert_eq!(cli.verbose, 0);
}

#[test]
fn test_missing_hosts_file_is_an_error() {
    let result = Cli::try_parse_from(["rollout", "-f", "/srv/telegraf.zip"]);
    assert!(result.is_err());
}

#[test]
fn test_missing_package_is_an_error() {
    let result = Cli::try_parse_from(["rollout", "hosts.txt"]);
    assert!(result.is_err());
}

#[test]
fn test_all_options() {
    let cli = Cli::parse_from([
        "rollout",
        "hosts.txt",
        "-f",
        "agent.zip",
        "--remote-dir",
        "/usr/local/agent",
        "--entry",
        "bin/install.sh",
        "-i",
        "/home/ops/.ssh/deploy_key",
        "--connect-timeout",
        "5",
        "--command-timeout",
        "0",
        "-vv",
    ]);

    assert_eq!(cli.remote_dir, "/usr/local/agent");
    assert_eq!(cli.entry.as_deref(), Some("bin/install.sh"));
    assert_eq!(
        cli.identity,
        Some(PathBuf::from("/home/ops/.ssh/deploy_key"))
    );
    assert_eq!(cli.connect_timeout, 5);
    assert_eq!(cli.command_timeout, 0);
    assert_eq!(cli.verbose, 2);
}

#[test]
fn test_connect_timeout_rejects_zero() {
    let result = Cli::try_parse_from([
        "rollout",
        "hosts.txt",
        "-f",
        "agent.zip",
        "--connect-timeout",
        "0",
    ]);
    assert!(result.is_err());
}

#[test]
fn test_run_config_translation() {
    let cli = Cli::parse_from([
        "rollout",
        "hosts.txt",
        "-f",
        "agent.zip",
        "--command-timeout",
        "0",
    ]);
    let config = cli.run_config();

    assert_eq!(config.connect_timeout, Duration::from_secs(15));
    // 0 means unbounded
    assert_eq!(config.command_timeout, None);
    assert_eq!(config.package.remote_dir, "/opt");
}
