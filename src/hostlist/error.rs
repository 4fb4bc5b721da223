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

//! Error types for host-list parsing and validation.

use thiserror::Error;

/// Errors that can occur while parsing a host-list file.
///
/// Per-line errors never abort the batch; they are reported for the offending
/// line and the remaining lines are processed independently.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HostlistError {
    /// Wrong number of `|`-separated fields on a record line
    #[error("expected 4 '|'-separated fields (username|credential|address|port), found {found}")]
    FieldCount { found: usize },

    /// Empty address field
    #[error("invalid parameters: hostname is empty")]
    InvalidHostName,

    /// Non-numeric or out-of-range port field
    #[error("invalid parameters: port '{value}' must be in range 0 ~ 65535")]
    InvalidPort { value: String },

    /// The host-list file itself could not be read
    #[error("failed to read host file '{path}': {reason}")]
    FileRead { path: String, reason: String },
}
