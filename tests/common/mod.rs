#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use ftp_kit::{Error, Protocol, RemoteMetadata, Result, TransferBackend, TransferConfig};
use rstest::fixture;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};

/// Everything an in-memory server remembers, shared with the test body.
#[derive(Debug, Default)]
pub struct ServerState {
    pub dirs: BTreeSet<String>,
    pub files: BTreeMap<String, Vec<u8>>,
    pub connected: bool,
    pub connects: usize,
    pub disconnects: usize,
    pub navigations: Vec<String>,
    pub created: Vec<String>,
    pub deleted: Vec<String>,
    pub fail_delete: Option<String>,
}

/// A [`TransferBackend`] that keeps its tree in memory.
#[derive(Clone)]
pub struct MemoryBackend {
    state: Arc<Mutex<ServerState>>,
    cwd: String,
}

pub fn modified_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 11, 15, 10, 30, 0).unwrap()
}

fn join(base: &str, path: &str) -> String {
    if path.starts_with('/') {
        let trimmed = path.trim_end_matches('/');
        if trimmed.is_empty() {
            "/".to_string()
        } else {
            trimmed.to_string()
        }
    } else if base == "/" {
        format!("/{}", path.trim_end_matches('/'))
    } else {
        format!("{}/{}", base, path.trim_end_matches('/'))
    }
}

fn parent(path: &str) -> &str {
    match path.rsplit_once('/') {
        Some(("", _)) => "/",
        Some((dir, _)) => dir,
        None => "/",
    }
}

impl MemoryBackend {
    /// A server whose only directory below `/` is `root`.
    pub fn with_root(root: &str) -> Self {
        let mut state = ServerState::default();
        state.dirs.insert("/".to_string());
        let mut current = String::from("/");
        for segment in root.split('/').filter(|s| !s.is_empty()) {
            current = join(&current, segment);
            state.dirs.insert(current.clone());
        }
        Self {
            state: Arc::new(Mutex::new(state)),
            cwd: "/".to_string(),
        }
    }

    pub fn state(&self) -> MutexGuard<'_, ServerState> {
        self.state.lock().unwrap()
    }

    pub fn put(&self, path: &str, content: &[u8]) {
        let mut state = self.state();
        let mut current = String::from("/");
        for segment in parent(path).split('/').filter(|s| !s.is_empty()) {
            current = join(&current, segment);
            state.dirs.insert(current.clone());
        }
        state.files.insert(path.to_string(), content.to_vec());
    }

    fn require_connected(&self) -> Result<()> {
        if self.state().connected {
            Ok(())
        } else {
            Err(Error::connection("not connected"))
        }
    }
}

impl TransferBackend for MemoryBackend {
    fn connect(&mut self, _config: &TransferConfig) -> Result<()> {
        let mut state = self.state();
        state.connected = true;
        state.connects += 1;
        drop(state);
        self.cwd = "/".to_string();
        Ok(())
    }

    fn disconnect(&mut self) -> Result<()> {
        let mut state = self.state();
        state.connected = false;
        state.disconnects += 1;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.state().connected
    }

    fn list_names(&mut self) -> Result<Vec<String>> {
        self.require_connected()?;
        let state = self.state();
        Ok(state
            .files
            .keys()
            .filter(|path| parent(path) == self.cwd)
            .map(|path| path.rsplit('/').next().unwrap_or_default().to_string())
            .collect())
    }

    fn fetch_bytes(&mut self, name: &str) -> Result<Vec<u8>> {
        self.require_connected()?;
        let path = join(&self.cwd, name);
        self.state()
            .files
            .get(&path)
            .cloned()
            .ok_or_else(|| Error::transfer(format!("550 {}: no such file", path)))
    }

    fn fetch_metadata(&mut self, name: &str) -> Result<RemoteMetadata> {
        let content = self.fetch_bytes(name)?;
        Ok(RemoteMetadata {
            size: content.len() as u64,
            modified: Some(modified_at()),
            accessed: Some(modified_at()),
        })
    }

    fn store(&mut self, name: &str, content: &[u8]) -> Result<()> {
        self.require_connected()?;
        let path = join(&self.cwd, name);
        self.state().files.insert(path, content.to_vec());
        Ok(())
    }

    fn delete(&mut self, name: &str) -> Result<()> {
        self.require_connected()?;
        let path = join(&self.cwd, name);
        let mut state = self.state();
        if state.fail_delete.as_deref() == Some(name) {
            return Err(Error::deletion(format!("550 {}: permission denied", path)));
        }
        state
            .files
            .remove(&path)
            .ok_or_else(|| Error::deletion(format!("550 {}: no such file", path)))?;
        state.deleted.push(name.to_string());
        Ok(())
    }

    fn create_directory(&mut self, segment: &str) -> Result<()> {
        self.require_connected()?;
        let path = join(&self.cwd, segment);
        let mut state = self.state();
        if !state.dirs.insert(path.clone()) {
            return Err(Error::directory(format!("550 {}: file exists", path)));
        }
        state.created.push(path);
        Ok(())
    }

    fn change_directory(&mut self, path: &str) -> Result<()> {
        self.require_connected()?;
        let target = join(&self.cwd, path);
        let mut state = self.state();
        state.navigations.push(path.to_string());
        if state.dirs.contains(&target) {
            drop(state);
            self.cwd = target;
            Ok(())
        } else {
            Err(Error::directory(format!("550 {}: no such directory", target)))
        }
    }
}

pub fn endpoint_config() -> TransferConfig {
    TransferConfig::new(Protocol::Sftp, "files.internal", 22, "svc", "secret", "/srv")
}

/// A memory server rooted at `/srv`.
#[fixture]
pub fn server() -> MemoryBackend {
    MemoryBackend::with_root("/srv")
}
