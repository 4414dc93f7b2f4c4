//! Secure Storage backed by a private JSON file

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bridge_traits::{
    error::{BridgeError, Result},
    storage::SecureStore,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

const APP_DIR: &str = "gateway-console";
const FILE_NAME: &str = "secure_store.json";

/// File-based secure storage implementation
///
/// Keeps every secret in a single JSON object (`key -> base64(value)`) under
/// the user's data directory. Writes go to a sibling temp file which is then
/// renamed over the original, so readers see either the old or the new
/// contents, never a partial write. On Unix the file is created with mode
/// `0600`.
pub struct FileSecureStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileSecureStore {
    /// Create a store at `<data_dir>/gateway-console/secure_store.json`
    pub fn new() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(".local")
                    .join("share")
            })
            .join(APP_DIR);

        Self::with_path(data_dir.join(FILE_NAME))
    }

    /// Create a store backed by an explicit file path
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_map(&self) -> Result<HashMap<String, String>> {
        match fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(HashMap::new()),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                warn!(path = ?self.path, error = %e, "Secure store file is not valid JSON");
                BridgeError::OperationFailed(format!("Corrupted secure store file: {}", e))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(BridgeError::Io(e)),
        }
    }

    async fn write_map(&self, map: &HashMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await.map_err(BridgeError::Io)?;
        }

        let contents = serde_json::to_vec(map).map_err(|e| {
            BridgeError::OperationFailed(format!("Failed to serialize secure store: {}", e))
        })?;

        let tmp_path = self.path.with_extension("json.tmp");
        let mut file = fs::File::create(&tmp_path).await.map_err(BridgeError::Io)?;
        restrict_permissions(&tmp_path).await?;
        file.write_all(&contents).await.map_err(BridgeError::Io)?;
        file.sync_all().await.map_err(BridgeError::Io)?;
        drop(file);

        fs::rename(&tmp_path, &self.path)
            .await
            .map_err(BridgeError::Io)?;

        debug!(path = ?self.path, entries = map.len(), "Persisted secure store");
        Ok(())
    }
}

impl Default for FileSecureStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(unix)]
async fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .await
        .map_err(BridgeError::Io)
}

#[cfg(not(unix))]
async fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

#[async_trait]
impl SecureStore for FileSecureStore {
    async fn set_secret(&self, key: &str, value: &[u8]) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut map = self.read_map().await?;
        map.insert(key.to_string(), STANDARD.encode(value));
        self.write_map(&map).await?;

        debug!(key = key, "Stored secret in file store");
        Ok(())
    }

    async fn get_secret(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let _guard = self.lock.lock().await;
        let map = self.read_map().await?;

        match map.get(key) {
            Some(encoded) => STANDARD.decode(encoded).map(Some).map_err(|e| {
                BridgeError::OperationFailed(format!("Failed to decode secret: {}", e))
            }),
            None => Ok(None),
        }
    }

    async fn delete_secret(&self, key: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut map = self.read_map().await?;

        if map.remove(key).is_some() {
            self.write_map(&map).await?;
            debug!(key = key, "Deleted secret from file store");
        }
        Ok(())
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        let _guard = self.lock.lock().await;
        let mut keys: Vec<String> = self.read_map().await?.into_keys().collect();
        keys.sort();
        Ok(keys)
    }

    async fn clear_all(&self) -> Result<()> {
        let _guard = self.lock.lock().await;
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BridgeError::Io(e)),
        }
    }
}
