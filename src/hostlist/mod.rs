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

//! Host-list file parsing.
//!
//! One record per line, fields separated by `|` in the fixed order
//! `username|credential|address|port`. The credential field is a password;
//! leaving it empty selects private-key authentication. Blank lines and lines
//! starting with `#` are skipped. A malformed line fails on its own without
//! affecting the rest of the file.

mod error;

pub use error::HostlistError;

use std::path::Path;

use zeroize::Zeroizing;

use crate::node::Node;

/// One parsed host record: the target plus its credential.
#[derive(Debug, Clone)]
pub struct HostEntry {
    pub node: Node,
    /// Password from the credential field; `None` when the field was empty.
    pub password: Option<Zeroizing<String>>,
}

impl HostEntry {
    /// Validates and constructs a record. No network I/O happens here; an
    /// invalid record is rejected before any connection is attempted.
    pub fn new(
        username: String,
        credential: String,
        host: String,
        port: u16,
    ) -> Result<Self, HostlistError> {
        if host.is_empty() {
            return Err(HostlistError::InvalidHostName);
        }
        let password = if credential.is_empty() {
            None
        } else {
            Some(Zeroizing::new(credential))
        };
        Ok(Self {
            node: Node::new(host, port, username),
            password,
        })
    }
}

/// A host-file line paired with its 1-based line number, either parsed or
/// carrying the error that line produced.
pub type ParsedLine = (usize, Result<HostEntry, HostlistError>);

/// Read and parse a host-list file.
///
/// The outer error covers only the file itself being unreadable (a fatal
/// startup condition); everything at line granularity is reported per line.
pub fn parse_hosts_file(path: &Path) -> Result<Vec<ParsedLine>, HostlistError> {
    let content =
        std::fs::read_to_string(path).map_err(|e| HostlistError::FileRead {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
    Ok(parse_hosts(&content))
}

/// Parse host-list content, skipping blank and `#` comment lines.
pub fn parse_hosts(content: &str) -> Vec<ParsedLine> {
    content
        .lines()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .map(|(line_no, line)| (line_no, parse_line(line)))
        .collect()
}

/// Parse a single `username|credential|address|port` record.
pub fn parse_line(line: &str) -> Result<HostEntry, HostlistError> {
    let fields: Vec<&str> = line.split('|').collect();
    if fields.len() != 4 {
        return Err(HostlistError::FieldCount {
            found: fields.len(),
        });
    }

    let port_field = fields[3].trim();
    // Parsed through u32 so 65536..=u32::MAX reports out-of-range rather
    // than a generic parse failure.
    let port = port_field
        .parse::<u32>()
        .ok()
        .and_then(|p| u16::try_from(p).ok())
        .ok_or_else(|| HostlistError::InvalidPort {
            value: port_field.to_string(),
        })?;

    HostEntry::new(
        fields[0].trim().to_string(),
        fields[1].trim().to_string(),
        fields[2].trim().to_string(),
        port,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_record() {
        let entry = parse_line("deploy|s3cret|10.0.0.5|22").unwrap();
        assert_eq!(entry.node.username, "deploy");
        assert_eq!(entry.node.host, "10.0.0.5");
        assert_eq!(entry.node.port, 22);
        assert_eq!(entry.password.as_deref().map(String::as_str), Some("s3cret"));
    }

    #[test]
    fn test_parse_empty_credential_selects_key_auth() {
        let entry = parse_line("deploy||10.0.0.5|22").unwrap();
        assert!(entry.password.is_none());
    }

    #[test]
    fn test_parse_port_zero_is_accepted() {
        let entry = parse_line("deploy|pw|10.0.0.5|0").unwrap();
        assert_eq!(entry.node.port, 0);
        assert_eq!(entry.node.effective_port(), 22);
    }

    #[test]
    fn test_wrong_field_count() {
        assert_eq!(
            parse_line("deploy|10.0.0.5|22").map(|_| ()),
            Err(HostlistError::FieldCount { found: 3 })
        );
        assert_eq!(
            parse_line("a|b|c|d|e").map(|_| ()),
            Err(HostlistError::FieldCount { found: 5 })
        );
    }

    #[test]
    fn test_empty_hostname_is_rejected() {
        assert_eq!(
            parse_line("deploy|pw||22").map(|_| ()),
            Err(HostlistError::InvalidHostName)
        );
    }

    #[test]
    fn test_non_numeric_port_is_rejected() {
        assert_eq!(
            parse_line("deploy|pw|10.0.0.5|ssh").map(|_| ()),
            Err(HostlistError::InvalidPort {
                value: "ssh".to_string()
            })
        );
    }

    #[test]
    fn test_out_of_range_port_is_rejected() {
        assert_eq!(
            parse_line("deploy|pw|10.0.0.5|65536").map(|_| ()),
            Err(HostlistError::InvalidPort {
                value: "65536".to_string()
            })
        );
        assert!(parse_line("deploy|pw|10.0.0.5|65535").is_ok());
    }

    #[test]
    fn test_comments_and_blank_lines_are_skipped() {
        let content = "# staging batch\n\ndeploy|pw|10.0.0.5|22\n   \n# done\n";
        let parsed = parse_hosts(content);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].0, 3);
        assert!(parsed[0].1.is_ok());
    }

    #[test]
    fn test_malformed_line_does_not_poison_the_rest() {
        let content = "a|b|host1|22\nbroken line\nc|d|host2|2222\n";
        let parsed = parse_hosts(content);
        assert_eq!(parsed.len(), 3);
        assert!(parsed[0].1.is_ok());
        assert!(parsed[1].1.is_err());
        assert!(parsed[2].1.is_ok());
    }
}
