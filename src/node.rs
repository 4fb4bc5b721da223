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

use std::fmt;

use crate::config::DEFAULT_SSH_PORT;

/// Identity of a single provisioning target.
///
/// A port of 0 means "unspecified"; the effective port (22) is filled in at
/// connect time, so the record stays a faithful copy of its input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub host: String,
    pub port: u16,
    pub username: String,
}

impl Node {
    pub fn new(host: String, port: u16, username: String) -> Self {
        Self {
            host,
            port,
            username,
        }
    }

    /// The `host:port` dial address with the default port applied.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.effective_port())
    }

    pub fn effective_port(&self) -> u16 {
        if self.port == 0 {
            DEFAULT_SSH_PORT
        } else {
            self.port
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{}:{}",
            self.username,
            self.host,
            self.effective_port()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_with_explicit_port() {
        let node = Node::new("example.com".to_string(), 2222, "admin".to_string());
        assert_eq!(node.address(), "example.com:2222");
    }

    #[test]
    fn test_address_defaults_port() {
        let node = Node::new("example.com".to_string(), 0, "admin".to_string());
        assert_eq!(node.effective_port(), 22);
        assert_eq!(node.address(), "example.com:22");
    }

    #[test]
    fn test_display_format() {
        let node = Node::new("10.0.0.5".to_string(), 22, "deploy".to_string());
        assert_eq!(node.to_string(), "deploy@10.0.0.5:22");
    }
}
