//! File-backed Credential Store
//!
//! Keeps the persisted credential as a small JSON file so the app can
//! restore its authentication mode on start-up.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use agent_core::{
    error::{AgentError, Result},
    session::{AuthMode, CredentialStore, StoredCredential},
};

use crate::oauth::{OAuthConfig, OAuthCredentialProvider};

/// Credential store persisted to a JSON file
#[derive(Clone, Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `AGENT_CREDENTIALS_PATH`, else `$HOME/.config/agent-runtime/credentials.json`
    pub fn default_path() -> PathBuf {
        if let Ok(path) = std::env::var("AGENT_CREDENTIALS_PATH") {
            return PathBuf::from(path);
        }
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
        Path::new(&home)
            .join(".config")
            .join("agent-runtime")
            .join("credentials.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Result<Option<StoredCredential>> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let credential = serde_json::from_str(&raw).map_err(|e| {
            AgentError::Credential(format!(
                "unreadable credential file {}: {e}",
                self.path.display()
            ))
        })?;
        Ok(Some(credential))
    }

    fn save(&self, credential: &StoredCredential) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(credential)?)?;
        restrict_permissions(&tmp)?;
        std::fs::rename(&tmp, &self.path)?;

        tracing::debug!(path = %self.path.display(), "Credential saved");
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

/// Restore the authentication mode from the persisted credential
///
/// An OAuth credential gets a provider that writes refreshed tokens back to
/// the same store.
pub fn bootstrap_auth_mode(
    store: &Arc<dyn CredentialStore>,
    oauth: &OAuthConfig,
) -> Result<AuthMode> {
    let mode = match store.load()? {
        None => AuthMode::Unauthenticated,
        Some(StoredCredential::ApiKey { key }) => AuthMode::ApiKey(key),
        Some(StoredCredential::OAuth { provider, tokens }) => {
            let provider = OAuthCredentialProvider::new(provider, oauth.clone(), tokens)?
                .with_store(Arc::clone(store));
            AuthMode::OAuth(Arc::new(provider))
        }
    };

    tracing::info!(mode = ?mode.kind(), "Authentication restored");
    Ok(mode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::session::{AuthModeKind, OAuthTokens};
    use chrono::Utc;

    fn store_in(dir: &tempfile::TempDir) -> FileCredentialStore {
        FileCredentialStore::new(dir.path().join("nested").join("credentials.json"))
    }

    #[test]
    fn test_missing_file_loads_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(store_in(&dir).load().unwrap().is_none());
    }

    #[test]
    fn test_save_load_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let credential = StoredCredential::ApiKey { key: "sk-test".into() };
        store.save(&credential).unwrap();
        assert_eq!(store.load().unwrap(), Some(credential));

        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
        store.clear().unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.save(&StoredCredential::ApiKey { key: "sk".into() }).unwrap();

        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_corrupt_file_is_credential_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        std::fs::write(&path, "not json").unwrap();

        let err = FileCredentialStore::new(path).load().unwrap_err();
        assert!(matches!(err, AgentError::Credential(_)));
    }

    #[test]
    fn test_bootstrap_modes() {
        let dir = tempfile::tempdir().unwrap();
        let file = store_in(&dir);
        let store: Arc<dyn CredentialStore> = Arc::new(file.clone());
        let oauth = OAuthConfig::default();

        let mode = bootstrap_auth_mode(&store, &oauth).unwrap();
        assert_eq!(mode.kind(), AuthModeKind::Unauthenticated);

        file.save(&StoredCredential::ApiKey { key: "sk".into() }).unwrap();
        let mode = bootstrap_auth_mode(&store, &oauth).unwrap();
        assert_eq!(mode.kind(), AuthModeKind::ApiKey);

        file.save(&StoredCredential::OAuth {
            provider: "anthropic".into(),
            tokens: OAuthTokens {
                access_token: "a".into(),
                refresh_token: Some("r".into()),
                expires_at: Utc::now(),
            },
        })
        .unwrap();
        let mode = bootstrap_auth_mode(&store, &oauth).unwrap();
        assert_eq!(mode.kind(), AuthModeKind::OAuth("anthropic".into()));
    }
}
