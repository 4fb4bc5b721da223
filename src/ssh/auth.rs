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

//! Credential resolution.
//!
//! Turns a partial [`AuthConfig`] into a concrete [`AuthMethod`]: an explicit
//! password wins, otherwise the private key file is read and decoded here, up
//! front, so a bad credential fails before any network I/O.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use russh::client::{Handle, Handler};
use russh::keys::PrivateKeyWithHashAlg;
use zeroize::Zeroizing;

use super::error::SessionError;
use crate::config::DEFAULT_CONNECT_TIMEOUT_SECS;

/// Key files probed under `~/.ssh` when no key path is configured.
const DEFAULT_KEY_NAMES: &[&str] = &["id_rsa", "id_ed25519", "id_ecdsa"];

/// A concrete, ready-to-use authentication method.
#[derive(Debug, Clone)]
pub enum AuthMethod {
    Password(Zeroizing<String>),
    /// A private key already decoded from its file.
    Key(Arc<russh::keys::PrivateKey>),
}

/// Partial credential description; unset fields are defaulted on [`resolve`].
///
/// [`resolve`]: AuthConfig::resolve
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    /// Login user; defaults to the invoking OS user.
    pub user: Option<String>,
    /// Password; when absent, key-file authentication is used.
    pub password: Option<Zeroizing<String>>,
    /// Private-key file; defaults to the first conventional key found under
    /// `~/.ssh`.
    pub key_path: Option<PathBuf>,
    /// Transport establishment timeout; defaults to
    /// [`DEFAULT_CONNECT_TIMEOUT_SECS`].
    pub connect_timeout: Option<Duration>,
}

/// Output of [`AuthConfig::resolve`]: everything `connect` needs.
#[derive(Debug, Clone)]
pub struct ResolvedAuth {
    pub user: String,
    pub method: AuthMethod,
    pub connect_timeout: Duration,
}

impl AuthConfig {
    /// Apply defaults and produce an auth method.
    ///
    /// Performs at most one file read (the key file) and no network I/O.
    pub fn resolve(&self) -> Result<ResolvedAuth, SessionError> {
        let user = match self.user.as_deref() {
            Some(u) if !u.is_empty() => u.to_string(),
            _ => current_user(),
        };
        let connect_timeout = self
            .connect_timeout
            .unwrap_or(Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS));

        if let Some(password) = self.password.as_ref().filter(|p| !p.is_empty()) {
            return Ok(ResolvedAuth {
                user,
                method: AuthMethod::Password(password.clone()),
                connect_timeout,
            });
        }

        let key_path = match &self.key_path {
            Some(path) => path.clone(),
            None => default_key_path(),
        };
        let method = load_key(&key_path)?;
        Ok(ResolvedAuth {
            user,
            method,
            connect_timeout,
        })
    }
}

fn load_key(path: &Path) -> Result<AuthMethod, SessionError> {
    tracing::debug!("loading private key from {:?}", path);
    let key_data = std::fs::read_to_string(path)
        .map(Zeroizing::new)
        .map_err(|e| SessionError::CredentialRead {
            path: path.to_path_buf(),
            source: e,
        })?;
    let key = russh::keys::decode_secret_key(&key_data, None).map_err(|e| {
        SessionError::CredentialParse {
            path: path.to_path_buf(),
            source: e,
        }
    })?;
    Ok(AuthMethod::Key(Arc::new(key)))
}

fn current_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "root".to_string())
}

/// First conventional key file that exists, or `~/.ssh/id_rsa` so the
/// resulting read error names the expected location.
fn default_key_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    let ssh_dir = Path::new(&home).join(".ssh");
    for name in DEFAULT_KEY_NAMES {
        let candidate = ssh_dir.join(name);
        if candidate.exists() {
            return candidate;
        }
    }
    ssh_dir.join(DEFAULT_KEY_NAMES[0])
}

/// Run the authentication exchange for an established transport.
pub(crate) async fn authenticate<H: Handler>(
    handle: &mut Handle<H>,
    user: &str,
    method: &AuthMethod,
    addr: &str,
) -> Result<(), SessionError> {
    match method {
        AuthMethod::Password(password) => {
            let auth = handle.authenticate_password(user, &***password).await?;
            if !auth.success() {
                return Err(SessionError::PasswordRejected {
                    user: user.to_string(),
                    addr: addr.to_string(),
                });
            }
        }
        AuthMethod::Key(key) => {
            let auth = handle
                .authenticate_publickey(
                    user,
                    PrivateKeyWithHashAlg::new(
                        key.clone(),
                        handle.best_supported_rsa_hash().await?.flatten(),
                    ),
                )
                .await?;
            if !auth.success() {
                return Err(SessionError::KeyRejected {
                    user: user.to_string(),
                    addr: addr.to_string(),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_resolve_prefers_password() {
        let config = AuthConfig {
            user: Some("deploy".to_string()),
            password: Some(Zeroizing::new("s3cret".to_string())),
            // A bogus key path must not matter when a password is present.
            key_path: Some(PathBuf::from("/nonexistent/key")),
            connect_timeout: None,
        };
        let resolved = config.resolve().unwrap();
        assert_eq!(resolved.user, "deploy");
        assert_eq!(resolved.connect_timeout, Duration::from_secs(15));
        assert!(matches!(resolved.method, AuthMethod::Password(_)));
    }

    #[test]
    fn test_empty_password_falls_back_to_key() {
        let config = AuthConfig {
            password: Some(Zeroizing::new(String::new())),
            key_path: Some(PathBuf::from("/nonexistent/key")),
            ..Default::default()
        };
        let err = config.resolve().unwrap_err();
        assert!(matches!(err, SessionError::CredentialRead { .. }));
    }

    #[test]
    fn test_unreadable_key_file() {
        let config = AuthConfig {
            key_path: Some(PathBuf::from("/nonexistent/key")),
            ..Default::default()
        };
        let err = config.resolve().unwrap_err();
        match err {
            SessionError::CredentialRead { path, .. } => {
                assert_eq!(path, PathBuf::from("/nonexistent/key"));
            }
            other => panic!("expected CredentialRead, got {other:?}"),
        }
    }

    #[test]
    fn test_garbage_key_file_fails_to_parse() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"this is not a private key").unwrap();
        let config = AuthConfig {
            key_path: Some(file.path().to_path_buf()),
            ..Default::default()
        };
        let err = config.resolve().unwrap_err();
        assert!(matches!(err, SessionError::CredentialParse { .. }));
    }

    #[test]
    fn test_default_user_is_nonempty() {
        assert!(!current_user().is_empty());
    }

    #[test]
    fn test_explicit_timeout_is_kept() {
        let config = AuthConfig {
            password: Some(Zeroizing::new("pw".to_string())),
            connect_timeout: Some(Duration::from_secs(3)),
            ..Default::default()
        };
        let resolved = config.resolve().unwrap();
        assert_eq!(resolved.connect_timeout, Duration::from_secs(3));
    }
}
