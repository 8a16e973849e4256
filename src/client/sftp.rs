use super::TransferBackend;
use crate::config::TransferConfig;
use crate::error::{BoxError, Error, Result};
use crate::file::RemoteMetadata;
use chrono::{DateTime, TimeZone, Utc};
use ssh2::{HashType, Session, Sftp};
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Upper bound on TCP connect, handshake and every blocking SSH call.
const SESSION_TIMEOUT: Duration = Duration::from_secs(10);

struct SftpConnection {
    session: Session,
    sftp: Sftp,
}

/// SFTP over an SSH session authenticated with a password.
///
/// SFTP has no server-side working directory, so the backend keeps one and
/// resolves every name against it.
#[derive(Default)]
pub struct SftpBackend {
    connection: Option<SftpConnection>,
    cwd: PathBuf,
    endpoint: String,
}

impl SftpBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn sftp(&self) -> Result<&Sftp> {
        self.connection
            .as_ref()
            .map(|c| &c.sftp)
            .ok_or_else(|| Error::connection("SFTP client is not connected"))
    }

    fn resolve(&self, name: &str) -> PathBuf {
        self.cwd.join(name)
    }

    fn open(config: &TransferConfig) -> Result<SftpConnection> {
        let addr = format!("{}:{}", config.host, config.port);
        let sockets = addr
            .to_socket_addrs()
            .map_err(|e| Error::connection(format!("invalid address '{}'", addr)).caused_by(e))?;
        let tcp = connect_tcp(&addr, sockets)?;

        let ssh_err = |what: &str, e: ssh2::Error| {
            Error::connection(format!("{} with {} failed", what, addr)).caused_by(e)
        };

        let mut session = Session::new().map_err(|e| ssh_err("SSH session setup", e))?;
        session.set_timeout(SESSION_TIMEOUT.as_millis() as u32);
        session.set_tcp_stream(tcp);
        session.handshake().map_err(|e| ssh_err("SSH handshake", e))?;

        // Host keys are accepted without a known_hosts check.
        if let Some(hash) = session.host_key_hash(HashType::Sha256) {
            let fingerprint: String = hash.iter().map(|b| format!("{:02x}", b)).collect();
            debug!(endpoint = %config.endpoint(), fingerprint = %fingerprint, "accepted host key");
        }

        session
            .userauth_password(&config.username, &config.password)
            .map_err(|e| ssh_err("password authentication", e))?;
        if !session.authenticated() {
            return Err(Error::connection(format!(
                "authentication with {} was not accepted",
                addr
            )));
        }

        let sftp = session.sftp().map_err(|e| ssh_err("opening the SFTP channel", e))?;
        Ok(SftpConnection { session, sftp })
    }
}

/// Tries each resolved address in turn. The error of the last attempt is
/// kept as the cause.
fn connect_tcp(addr: &str, sockets: impl IntoIterator<Item = SocketAddr>) -> Result<TcpStream> {
    let mut last_error = None;
    for socket in sockets {
        match TcpStream::connect_timeout(&socket, SESSION_TIMEOUT) {
            Ok(tcp) => return Ok(tcp),
            Err(e) => {
                debug!(address = %socket, error = %e, "TCP connect attempt failed");
                last_error = Some(e);
            }
        }
    }

    let err = Error::connection(format!("TCP connection to {} failed", addr));
    Err(match last_error {
        Some(e) => err.caused_by(e),
        None => err,
    })
}

/// Writes a whole remote file and closes the handle. A failed close fails
/// the write.
fn write_remote<W: RemoteWrite>(
    remote: &mut W,
    content: &[u8],
) -> std::result::Result<(), BoxError> {
    remote.write_all(content)?;
    remote.finish()
}

trait RemoteWrite: Write {
    fn finish(&mut self) -> std::result::Result<(), BoxError>;
}

impl RemoteWrite for ssh2::File {
    fn finish(&mut self) -> std::result::Result<(), BoxError> {
        self.close().map_err(Into::into)
    }
}

fn timestamp(secs: Option<u64>) -> Option<DateTime<Utc>> {
    secs.and_then(|s| i64::try_from(s).ok())
        .and_then(|s| Utc.timestamp_opt(s, 0).single())
}

impl TransferBackend for SftpBackend {
    fn connect(&mut self, config: &TransferConfig) -> Result<()> {
        self.endpoint = config.endpoint();
        let connection = Self::open(config).map_err(|e| {
            error!(endpoint = %self.endpoint, error = %e, "failed to connect");
            e
        })?;
        self.cwd = match connection.sftp.realpath(Path::new(".")) {
            Ok(home) => home,
            Err(e) => {
                warn!(endpoint = %self.endpoint, error = %e, "could not resolve the login directory");
                PathBuf::from(".")
            }
        };
        self.connection = Some(connection);
        Ok(())
    }

    fn disconnect(&mut self) -> Result<()> {
        self.cwd = PathBuf::new();
        match self.connection.take() {
            Some(SftpConnection { session, sftp }) => {
                drop(sftp);
                session
                    .disconnect(None, "closing session", None)
                    .map_err(|e| Error::connection("could not close the SSH session").caused_by(e))
            }
            None => Ok(()),
        }
    }

    fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    fn list_names(&mut self) -> Result<Vec<String>> {
        info!(endpoint = %self.endpoint, "listing files in current directory");
        let entries = self.sftp()?.readdir(&self.cwd).map_err(|e| {
            error!(endpoint = %self.endpoint, error = %e, "could not list files");
            Error::listing(format!(
                "could not list files in '{}'",
                self.cwd.display()
            ))
            .caused_by(e)
        })?;

        let names: Vec<String> = entries
            .into_iter()
            .filter(|(_, stat)| !stat.is_dir())
            .filter_map(|(path, _)| path.file_name().map(|n| n.to_string_lossy().into_owned()))
            .filter(|name| name != "." && name != "..")
            .collect();
        if names.is_empty() {
            info!(endpoint = %self.endpoint, "[empty directory]");
        }
        for name in &names {
            debug!(endpoint = %self.endpoint, name = %name, "listed");
        }
        Ok(names)
    }

    fn fetch_bytes(&mut self, name: &str) -> Result<Vec<u8>> {
        info!(endpoint = %self.endpoint, name, "downloading file");
        let path = self.resolve(name);
        let fail = |e: BoxError| {
            error!(endpoint = %self.endpoint, name, error = %e, "could not download file");
            Error::transfer(format!("could not download file '{}'", name)).caused_by(e)
        };

        let mut remote = self.sftp()?.open(&path).map_err(|e| fail(e.into()))?;
        let mut content = Vec::new();
        remote.read_to_end(&mut content).map_err(|e| fail(e.into()))?;
        info!(endpoint = %self.endpoint, name, "file downloaded");
        Ok(content)
    }

    fn fetch_metadata(&mut self, name: &str) -> Result<RemoteMetadata> {
        let stat = self.sftp()?.lstat(&self.resolve(name)).map_err(|e| {
            error!(endpoint = %self.endpoint, name, error = %e, "could not read file details");
            Error::transfer(format!("could not read details of file '{}'", name)).caused_by(e)
        })?;
        if stat.is_dir() {
            return Err(Error::transfer(format!("'{}' is not a file", name)));
        }

        Ok(RemoteMetadata {
            size: stat.size.unwrap_or(0),
            modified: timestamp(stat.mtime),
            accessed: timestamp(stat.atime),
        })
    }

    fn store(&mut self, name: &str, content: &[u8]) -> Result<()> {
        let path = self.resolve(name);
        let fail = |e: BoxError| {
            error!(endpoint = %self.endpoint, name, error = %e, "could not upload file");
            Error::transfer(format!("could not upload file as '{}'", name)).caused_by(e)
        };

        let mut remote = self.sftp()?.create(&path).map_err(|e| fail(e.into()))?;
        write_remote(&mut remote, content).map_err(fail)?;
        info!(endpoint = %self.endpoint, name, "file uploaded");
        Ok(())
    }

    fn delete(&mut self, name: &str) -> Result<()> {
        info!(endpoint = %self.endpoint, name, "deleting file");
        self.sftp()?.unlink(&self.resolve(name)).map_err(|e| {
            error!(endpoint = %self.endpoint, name, error = %e, "could not delete file");
            Error::deletion(format!("could not delete file '{}'", name)).caused_by(e)
        })?;
        info!(endpoint = %self.endpoint, name, "file deleted");
        Ok(())
    }

    fn create_directory(&mut self, segment: &str) -> Result<()> {
        info!(endpoint = %self.endpoint, directory = segment, "creating directory");
        self.sftp()?.mkdir(&self.resolve(segment), 0o755).map_err(|e| {
            error!(endpoint = %self.endpoint, directory = segment, error = %e, "could not create directory");
            Error::directory(format!("could not create directory '{}'", segment)).caused_by(e)
        })
    }

    fn change_directory(&mut self, path: &str) -> Result<()> {
        debug!(endpoint = %self.endpoint, directory = path, "changing directory");
        let target = self.resolve(path);
        let sftp = self.sftp()?;
        let stat = sftp.stat(&target).map_err(|e| {
            debug!(endpoint = %self.endpoint, directory = path, error = %e, "could not change directory");
            Error::directory(format!("could not change to directory '{}'", path)).caused_by(e)
        })?;
        if !stat.is_dir() {
            return Err(Error::directory(format!("'{}' is not a directory", path)));
        }
        let resolved = sftp.realpath(&target).unwrap_or(target);
        self.cwd = resolved;
        Ok(())
    }
}
