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

use russh::client::Handler;

use super::error::SessionError;

/// Client-side connection handler.
///
/// Host-key verification is out of scope for this tool: provisioning targets
/// are freshly imaged machines whose keys are not yet known, so the server
/// key is accepted as-is.
#[derive(Debug, Clone)]
pub struct ClientHandler {
    pub host: String,
}

impl ClientHandler {
    pub fn new(host: String) -> Self {
        Self { host }
    }
}

impl Handler for ClientHandler {
    type Error = SessionError;

    async fn check_server_key(
        &mut self,
        _server_public_key: &russh::keys::PublicKey,
    ) -> Result<bool, Self::Error> {
        tracing::trace!("accepting server key for {}", self.host);
        Ok(true)
    }
}
