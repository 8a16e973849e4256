pub mod ftp;
pub mod sftp;

use crate::config::TransferConfig;
use crate::error::{Error, Result};
use crate::file::{split_remote_path, RemoteMetadata, TransferFile};
use std::ops::{Deref, DerefMut};
use tracing::{info, warn};

pub use ftp::FtpBackend;
pub use sftp::SftpBackend;

pub type FtpClient = GenericTransferClient<FtpBackend>;
pub type SftpClient = GenericTransferClient<SftpBackend>;

/// Primitive operations a wire mechanism has to provide.
///
/// Implementations translate their native failures into [`Error`] before
/// returning. Directory operations act on the session's current directory:
/// `create_directory` takes a single segment, `change_directory` accepts
/// either a segment or a full path.
pub trait TransferBackend: Send {
    fn connect(&mut self, config: &TransferConfig) -> Result<()>;
    fn disconnect(&mut self) -> Result<()>;
    fn is_connected(&self) -> bool;
    fn list_names(&mut self) -> Result<Vec<String>>;
    fn fetch_bytes(&mut self, name: &str) -> Result<Vec<u8>>;
    fn fetch_metadata(&mut self, name: &str) -> Result<RemoteMetadata>;
    fn store(&mut self, name: &str, content: &[u8]) -> Result<()>;
    fn delete(&mut self, name: &str) -> Result<()>;
    fn create_directory(&mut self, segment: &str) -> Result<()>;
    fn change_directory(&mut self, path: &str) -> Result<()>;
}

/// Operations offered to callers, identical for every protocol.
pub trait TransferClient: Send {
    /// Uploads a file, creating its directory when it does not exist yet.
    fn upload(&mut self, file: &TransferFile) -> Result<()>;
    /// Uploads files in order, stopping at the first failure.
    fn upload_all(&mut self, files: &[TransferFile]) -> Result<()>;
    /// Downloads `dir/name`. The directory must already exist.
    fn download(&mut self, path: &str) -> Result<TransferFile>;
    /// Downloads every regular file in a directory, in listing order.
    fn download_all(&mut self, path: &str) -> Result<Vec<TransferFile>>;
    fn delete(&mut self, path: &str) -> Result<()>;
    /// Deletes every regular file in a directory, stopping at the first failure.
    fn delete_all(&mut self, path: &str) -> Result<()>;
}

/// Implements [`TransferClient`] on top of any [`TransferBackend`].
///
/// Every public operation opens its own session, and the session is torn
/// down when the operation returns, whether it succeeded or not.
pub struct GenericTransferClient<B: TransferBackend> {
    config: TransferConfig,
    backend: B,
}

impl<B: TransferBackend> GenericTransferClient<B> {
    pub const fn new(config: TransferConfig, backend: B) -> Self {
        Self { config, backend }
    }

    pub const fn config(&self) -> &TransferConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.backend.is_connected()
    }

    /// Opens a session and moves into the endpoint root.
    ///
    /// Fails with a connection error when a session is already open.
    /// Anything that fails after the low-level connect tears the session
    /// down again.
    pub fn connect(&mut self) -> Result<()> {
        self.config.validate()?;
        ensure_idle(&self.backend, &self.config)?;
        if let Err(e) = establish(&mut self.backend, &self.config) {
            teardown(&mut self.backend, &self.config);
            return Err(e);
        }
        Ok(())
    }

    /// Closes the session. Teardown failures are logged, never returned.
    pub fn disconnect(&mut self) {
        teardown(&mut self.backend, &self.config);
    }

    /// Opens a session that disconnects when dropped. The config must
    /// already be validated.
    fn session(&mut self) -> Result<Session<'_, B>> {
        let session = Session {
            backend: &mut self.backend,
            config: &self.config,
        };
        ensure_idle(&*session.backend, session.config)?;
        establish(&mut *session.backend, session.config)?;
        Ok(session)
    }
}

fn ensure_idle<B: TransferBackend>(backend: &B, config: &TransferConfig) -> Result<()> {
    if backend.is_connected() {
        return Err(Error::connection(format!(
            "client is already connected to {}:{}",
            config.host, config.port
        )));
    }
    Ok(())
}

fn establish<B: TransferBackend>(backend: &mut B, config: &TransferConfig) -> Result<()> {
    info!(endpoint = %config.endpoint(), protocol = %config.protocol, "connecting");
    backend.connect(config)?;
    info!(endpoint = %config.endpoint(), "connected");
    backend.change_directory(&config.root)
}

fn teardown<B: TransferBackend>(backend: &mut B, config: &TransferConfig) {
    match backend.disconnect() {
        Ok(()) => info!(endpoint = %config.endpoint(), "disconnected"),
        Err(e) => warn!(endpoint = %config.endpoint(), error = %e, "could not disconnect cleanly"),
    }
}

/// An open session. Dropping it disconnects the backend.
struct Session<'a, B: TransferBackend> {
    backend: &'a mut B,
    config: &'a TransferConfig,
}

impl<B: TransferBackend> Session<'_, B> {
    fn resolve(&self, dir: &str) -> String {
        format!("{}/{}", self.config.root.trim_end_matches('/'), dir.trim_matches('/'))
    }

    /// Moves into a root-relative directory; an empty `dir` means the root,
    /// which is where every session starts.
    fn enter(&mut self, dir: &str) -> Result<()> {
        if dir.trim_matches('/').is_empty() {
            return Ok(());
        }
        let target = self.resolve(dir);
        self.backend.change_directory(&target)
    }

    /// Moves into a root-relative directory, creating missing segments.
    fn ensure_directory(&mut self, dir: &str) -> Result<()> {
        let dir = dir.trim_matches('/');
        if dir.is_empty() {
            return self.backend.change_directory(&self.config.root);
        }
        let target = self.resolve(dir);
        if self.backend.change_directory(&target).is_ok() {
            return Ok(());
        }

        info!(endpoint = %self.config.endpoint(), directory = dir, "creating directory");
        self.backend.change_directory(&self.config.root)?;
        for segment in dir.split('/').filter(|s| !s.is_empty()) {
            if self.backend.change_directory(segment).is_err() {
                self.backend.create_directory(segment).map_err(|e| {
                    Error::directory(format!("could not create directory '{}'", dir)).caused_by(e)
                })?;
                self.backend.change_directory(segment)?;
            }
        }
        Ok(())
    }

    fn store(&mut self, file: &TransferFile) -> Result<()> {
        info!(
            endpoint = %self.config.endpoint(),
            name = file.name(),
            size = file.size(),
            "uploading file"
        );
        self.backend.store(file.name(), file.content())
    }

    fn fetch(&mut self, dir: &str, name: &str) -> Result<TransferFile> {
        let content = self.backend.fetch_bytes(name)?;
        let metadata = self.backend.fetch_metadata(name)?;
        if metadata.size != content.len() as u64 {
            warn!(
                endpoint = %self.config.endpoint(),
                name,
                reported = metadata.size,
                received = content.len(),
                "remote size differs from downloaded content"
            );
        }
        Ok(TransferFile::new(dir, name, content)
            .with_timestamps(metadata.accessed, metadata.modified))
    }
}

impl<B: TransferBackend> Deref for Session<'_, B> {
    type Target = B;

    fn deref(&self) -> &B {
        &*self.backend
    }
}

impl<B: TransferBackend> DerefMut for Session<'_, B> {
    fn deref_mut(&mut self) -> &mut B {
        &mut *self.backend
    }
}

impl<B: TransferBackend> Drop for Session<'_, B> {
    fn drop(&mut self) {
        teardown(&mut *self.backend, self.config);
    }
}

fn check_name(file: &TransferFile) -> Result<()> {
    if file.has_valid_name() {
        Ok(())
    } else {
        Err(Error::transfer(format!("invalid file name '{}'", file.name())))
    }
}

impl<B: TransferBackend> TransferClient for GenericTransferClient<B> {
    fn upload(&mut self, file: &TransferFile) -> Result<()> {
        self.config.validate()?;
        check_name(file)?;
        let mut session = self.session()?;
        session.ensure_directory(file.path())?;
        session.store(file)
    }

    fn upload_all(&mut self, files: &[TransferFile]) -> Result<()> {
        self.config.validate()?;
        for file in files {
            check_name(file)?;
        }
        let mut session = self.session()?;
        let mut previous: Option<&str> = None;
        for file in files {
            let dir = file.path().trim_matches('/');
            if previous != Some(dir) {
                session.ensure_directory(dir)?;
                previous = Some(dir);
            }
            session.store(file)?;
        }
        Ok(())
    }

    fn download(&mut self, path: &str) -> Result<TransferFile> {
        self.config.validate()?;
        let (dir, name) = split_remote_path(path)
            .ok_or_else(|| Error::transfer(format!("'{}' does not name a file", path)))?;
        let mut session = self.session()?;
        session.enter(dir)?;
        session.fetch(dir, name)
    }

    fn download_all(&mut self, path: &str) -> Result<Vec<TransferFile>> {
        self.config.validate()?;
        let dir = path.trim_matches('/');
        let mut session = self.session()?;
        session.enter(dir)?;
        let names = session.list_names()?;
        let mut files = Vec::with_capacity(names.len());
        for name in &names {
            files.push(session.fetch(dir, name)?);
        }
        Ok(files)
    }

    fn delete(&mut self, path: &str) -> Result<()> {
        self.config.validate()?;
        let (dir, name) = split_remote_path(path)
            .ok_or_else(|| Error::deletion(format!("'{}' does not name a file", path)))?;
        let mut session = self.session()?;
        session.enter(dir)?;
        session.delete(name)
    }

    fn delete_all(&mut self, path: &str) -> Result<()> {
        self.config.validate()?;
        let dir = path.trim_matches('/');
        let mut session = self.session()?;
        session.enter(dir)?;
        for name in session.list_names()? {
            session.delete(&name)?;
        }
        Ok(())
    }
}
