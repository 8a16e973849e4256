use crate::client::{FtpBackend, GenericTransferClient, SftpBackend, TransferClient};
use crate::config::{Protocol, Settings, TransferConfig};
use crate::error::{Error, Result};
use tracing::debug;

/// Builds clients for the endpoints named in [`Settings`].
pub struct ClientRegistry {
    settings: Settings,
}

impl ClientRegistry {
    pub const fn new(settings: Settings) -> Self {
        Self { settings }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.settings.endpoints.keys().map(String::as_str)
    }

    pub fn config(&self, name: &str) -> Option<&TransferConfig> {
        self.settings.endpoints.get(name)
    }

    /// Returns a new client for `name`. Each call builds an independent
    /// client, so concurrent callers should each ask for their own.
    pub fn get(&self, name: &str) -> Result<Box<dyn TransferClient>> {
        let config = self
            .config(name)
            .ok_or_else(|| Error::configuration(format!("no endpoint named '{}'", name)))?
            .clone();
        Ok(build_client(config))
    }
}

pub fn build_client(config: TransferConfig) -> Box<dyn TransferClient> {
    debug!(endpoint = %config.endpoint(), protocol = %config.protocol, "building client");
    match config.protocol {
        Protocol::Ftp => Box::new(GenericTransferClient::new(config, FtpBackend::new())),
        Protocol::Sftp => Box::new(GenericTransferClient::new(config, SftpBackend::new())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn settings() -> Settings {
        let mut settings = Settings::default();
        settings.endpoints.insert(
            "reports".to_string(),
            TransferConfig::new(Protocol::Sftp, "10.0.0.2", 22, "svc", "secret", "/reports"),
        );
        settings.endpoints.insert(
            "archive".to_string(),
            TransferConfig::new(Protocol::Ftp, "10.0.0.1", 21, "svc", "secret", "/"),
        );
        settings
    }

    #[test]
    fn test_names_are_sorted() {
        let registry = ClientRegistry::new(settings());
        let names: Vec<&str> = registry.names().collect();
        assert_eq!(names, vec!["archive", "reports"]);
    }

    #[test]
    fn test_config_lookup() {
        let registry = ClientRegistry::new(settings());
        assert_eq!(registry.config("reports").unwrap().protocol, Protocol::Sftp);
        assert!(registry.config("missing").is_none());
    }

    #[test]
    fn test_unknown_endpoint_is_configuration_error() {
        let registry = ClientRegistry::new(settings());
        let err = registry.get("missing").err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(registry.get("archive").is_ok());
    }

    #[test]
    fn test_built_client_validates_before_connecting() {
        let mut config = TransferConfig::new(Protocol::Ftp, "", 21, "svc", "secret", "/");
        config.host = String::new();
        let mut client = build_client(config);

        let err = client.delete_all("tmp").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }
}
