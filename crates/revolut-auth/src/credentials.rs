//! Session persistence
//!
//! A renewable session is worth keeping across process restarts: the refresh
//! token may rotate on every renewal and the authorization code that produced
//! it cannot be exchanged again. [`SessionFile`] keeps one [`StoredSession`] as
//! JSON, written atomically (temp file + rename) with 0600 permissions.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Everything needed to rebuild a [`crate::RenewableSession`].
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSession {
    pub client_id: String,
    /// Signed client assertion.
    pub jwt: String,
    pub refresh_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// Unix milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token_expires: Option<u64>,
}

impl fmt::Debug for StoredSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredSession")
            .field("client_id", &self.client_id)
            .field("jwt", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("access_token", &self.access_token.as_ref().map(|_| "[REDACTED]"))
            .field("access_token_expires", &self.access_token_expires)
            .finish()
    }
}

/// JSON file holding one stored session.
#[derive(Debug, Clone)]
pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored session. A missing file is `Ok(None)`.
    pub async fn load(&self) -> Result<Option<StoredSession>> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no stored session");
                return Ok(None);
            }
            Err(e) => return Err(Error::Io(format!("reading session file: {e}"))),
        };
        let stored: StoredSession = serde_json::from_str(&contents)
            .map_err(|e| Error::CredentialParse(format!("parsing session file: {e}")))?;
        info!(path = %self.path.display(), client_id = %stored.client_id, "loaded stored session");
        Ok(Some(stored))
    }

    /// Replace the stored session.
    pub async fn save(&self, stored: &StoredSession) -> Result<()> {
        write_atomic(&self.path, stored).await
    }
}

async fn write_atomic(path: &Path, stored: &StoredSession) -> Result<()> {
    let json = serde_json::to_string_pretty(stored)
        .map_err(|e| Error::CredentialParse(format!("serializing session: {e}")))?;

    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let tmp_path = dir.join(format!(".session.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Io(format!("writing temp session file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Io(format!("setting session file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Io(format!("renaming temp session file: {e}")))?;

    debug!(path = %path.display(), "persisted session");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored() -> StoredSession {
        StoredSession {
            client_id: "client-123".into(),
            jwt: "signed.jwt.value".into(),
            refresh_token: "oa_sand_rt".into(),
            access_token: Some("oa_sand_at".into()),
            access_token_expires: Some(1_700_000_000_000),
        }
    }

    #[tokio::test]
    async fn missing_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let file = SessionFile::new(dir.path().join("session.json"));
        assert!(file.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let file = SessionFile::new(dir.path().join("session.json"));
        file.save(&stored()).await.unwrap();
        assert_eq!(file.load().await.unwrap(), Some(stored()));
    }

    #[tokio::test]
    async fn save_overwrites_previous_session() {
        let dir = tempfile::tempdir().unwrap();
        let file = SessionFile::new(dir.path().join("session.json"));
        file.save(&stored()).await.unwrap();

        let mut rotated = stored();
        rotated.refresh_token = "oa_sand_rt2".into();
        rotated.access_token = None;
        rotated.access_token_expires = None;
        file.save(&rotated).await.unwrap();

        let loaded = file.load().await.unwrap().unwrap();
        assert_eq!(loaded.refresh_token, "oa_sand_rt2");
        assert!(loaded.access_token.is_none());

        let raw = std::fs::read_to_string(file.path()).unwrap();
        assert!(!raw.contains("access_token_expires"));
    }

    #[tokio::test]
    async fn optional_fields_default_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(
            &path,
            r#"{"client_id":"c","jwt":"j","refresh_token":"oa_prod_rt"}"#,
        )
        .unwrap();

        let loaded = SessionFile::new(&path).load().await.unwrap().unwrap();
        assert_eq!(loaded.refresh_token, "oa_prod_rt");
        assert_eq!(loaded.access_token, None);
        assert_eq!(loaded.access_token_expires, None);
    }

    #[tokio::test]
    async fn corrupt_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = SessionFile::new(&path).load().await.unwrap_err();
        assert!(matches!(err, Error::CredentialParse(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn file_permissions_are_0600() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let file = SessionFile::new(dir.path().join("session.json"));
        file.save(&stored()).await.unwrap();

        let mode = std::fs::metadata(file.path()).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }

    #[test]
    fn debug_hides_tokens() {
        let rendered = format!("{:?}", stored());
        assert!(rendered.contains("client-123"));
        assert!(!rendered.contains("oa_sand_rt"));
        assert!(!rendered.contains("oa_sand_at"));
        assert!(!rendered.contains("signed.jwt.value"));
    }
}
