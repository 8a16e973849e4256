use super::TransferBackend;
use crate::config::TransferConfig;
use crate::error::{Error, Result};
use crate::file::RemoteMetadata;
use chrono::{TimeZone, Utc};
use suppaftp::list::File as ListedFile;
use suppaftp::types::{FileType, FtpError, Mode};
use suppaftp::FtpStream;
use tracing::{debug, error, info};

/// Plain FTP over a passive-mode, binary-type control session.
#[derive(Default)]
pub struct FtpBackend {
    stream: Option<FtpStream>,
    endpoint: String,
}

impl FtpBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn stream(&mut self) -> Result<&mut FtpStream> {
        self.stream
            .as_mut()
            .ok_or_else(|| Error::connection("FTP client is not connected"))
    }

    fn open(config: &TransferConfig) -> std::result::Result<FtpStream, FtpError> {
        let mut ftp = FtpStream::connect((config.host.as_str(), config.port))?;
        ftp.login(config.username.as_str(), config.password.as_str())?;
        ftp.set_mode(Mode::Passive);
        ftp.transfer_type(FileType::Binary)?;
        Ok(ftp)
    }
}

/// Names of the regular files in a `LIST` reply, in Unix or DOS format.
///
/// Summary lines such as `total 12` and the `.`/`..` entries are skipped.
/// Any other line that does not parse fails the whole listing.
fn file_names(lines: &[String]) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for line in lines {
        let line = line.trim_end();
        if line.is_empty() || line.starts_with("total ") {
            continue;
        }
        let file = line.parse::<ListedFile>().map_err(|e| {
            Error::listing(format!("unrecognized listing line '{}'", line)).caused_by(e)
        })?;
        if file.is_directory() || matches!(file.name(), "." | "..") {
            continue;
        }
        names.push(file.name().to_string());
    }
    Ok(names)
}

impl TransferBackend for FtpBackend {
    fn connect(&mut self, config: &TransferConfig) -> Result<()> {
        self.endpoint = config.endpoint();
        match Self::open(config) {
            Ok(ftp) => {
                self.stream = Some(ftp);
                Ok(())
            }
            Err(e) => {
                error!(endpoint = %self.endpoint, error = %e, "failed to connect");
                Err(Error::connection(format!(
                    "could not connect to {}:{}",
                    config.host, config.port
                ))
                .caused_by(e))
            }
        }
    }

    fn disconnect(&mut self) -> Result<()> {
        match self.stream.take() {
            Some(mut ftp) => ftp
                .quit()
                .map_err(|e| Error::connection("could not close the FTP session").caused_by(e)),
            None => Ok(()),
        }
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn list_names(&mut self) -> Result<Vec<String>> {
        info!(endpoint = %self.endpoint, "listing files in current directory");
        let lines = self.stream()?.list(None).map_err(|e| {
            error!(endpoint = %self.endpoint, error = %e, "could not list files");
            Error::listing("could not list files in current directory").caused_by(e)
        })?;

        let names = file_names(&lines).map_err(|e| {
            error!(endpoint = %self.endpoint, error = %e, "could not parse file listing");
            e
        })?;
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
        let buffer = self.stream()?.retr_as_buffer(name).map_err(|e| {
            error!(endpoint = %self.endpoint, name, error = %e, "could not download file");
            Error::transfer(format!("could not download file '{}'", name)).caused_by(e)
        })?;
        info!(endpoint = %self.endpoint, name, "file downloaded");
        Ok(buffer.into_inner())
    }

    fn fetch_metadata(&mut self, name: &str) -> Result<RemoteMetadata> {
        let endpoint = self.endpoint.clone();
        let ftp = self.stream()?;
        let size = ftp.size(name).map_err(|e| {
            error!(endpoint = %endpoint, name, error = %e, "could not read file size");
            Error::transfer(format!("could not read details of file '{}'", name)).caused_by(e)
        })?;

        // MDTM is reported in UTC; not every server supports it.
        let modified = match ftp.mdtm(name) {
            Ok(naive) => Some(Utc.from_utc_datetime(&naive)),
            Err(e) => {
                debug!(endpoint = %endpoint, name, error = %e, "no modification time");
                None
            }
        };

        Ok(RemoteMetadata {
            size: size as u64,
            modified,
            accessed: modified,
        })
    }

    fn store(&mut self, name: &str, content: &[u8]) -> Result<()> {
        let endpoint = self.endpoint.clone();
        self.stream()?
            .put_file(name, &mut &content[..])
            .map_err(|e| {
                error!(endpoint = %endpoint, name, error = %e, "could not upload file");
                Error::transfer(format!("could not upload file as '{}'", name)).caused_by(e)
            })?;
        info!(endpoint = %self.endpoint, name, "file uploaded");
        Ok(())
    }

    fn delete(&mut self, name: &str) -> Result<()> {
        info!(endpoint = %self.endpoint, name, "deleting file");
        let endpoint = self.endpoint.clone();
        self.stream()?.rm(name).map_err(|e| {
            error!(endpoint = %endpoint, name, error = %e, "could not delete file");
            Error::deletion(format!("could not delete file '{}'", name)).caused_by(e)
        })?;
        info!(endpoint = %self.endpoint, name, "file deleted");
        Ok(())
    }

    fn create_directory(&mut self, segment: &str) -> Result<()> {
        info!(endpoint = %self.endpoint, directory = segment, "creating directory");
        let endpoint = self.endpoint.clone();
        self.stream()?.mkdir(segment).map_err(|e| {
            error!(endpoint = %endpoint, directory = segment, error = %e, "could not create directory");
            Error::directory(format!("could not create directory '{}'", segment)).caused_by(e)
        })
    }

    fn change_directory(&mut self, path: &str) -> Result<()> {
        debug!(endpoint = %self.endpoint, directory = path, "changing directory");
        let endpoint = self.endpoint.clone();
        self.stream()?.cwd(path).map_err(|e| {
            debug!(endpoint = %endpoint, directory = path, error = %e, "could not change directory");
            Error::directory(format!("could not change to directory '{}'", path)).caused_by(e)
        })
    }
}
