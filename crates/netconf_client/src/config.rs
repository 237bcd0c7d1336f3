use netconf_proto::{BASE_1_0, BASE_1_1, DEFAULT_NETCONF_PORT};
use once_cell::sync::Lazy;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(5_000);
const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_millis(30_000);

static DEFAULT_CLIENT_CAPABILITIES: Lazy<Vec<String>> =
    Lazy::new(|| vec![BASE_1_0.to_string(), BASE_1_1.to_string()]);

/// How the SSH layer authenticates.
#[derive(Clone)]
pub enum Auth {
    Password(String),
    /// PEM-encoded private key on disk, optionally passphrase protected.
    KeyFile {
        path: PathBuf,
        passphrase: Option<String>,
    },
}

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Auth::Password(_) => f
                .debug_struct("Password")
                .field("password", &"******")
                .finish(),
            Auth::KeyFile { path, .. } => f
                .debug_struct("KeyFile")
                .field("path", path)
                .field("passphrase", &"******")
                .finish(),
        }
    }
}

/// Options for one NETCONF session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub auth: Auth,
    /// Bounds the TCP probe, SSH negotiation and the hello exchange.
    pub connect_timeout: Duration,
    /// Bounds every RPC after the session is up.
    pub command_timeout: Duration,
    pub known_hosts_file: Option<PathBuf>,
    pub strict_host_key_checking: bool,
    /// Advertised in the client hello. Base 1.0 and 1.1 are always present.
    pub client_capabilities: Vec<String>,
}

impl SessionConfig {
    pub fn new(host: impl Into<String>, username: impl Into<String>, auth: Auth) -> SessionConfig {
        SessionConfig {
            host: host.into(),
            port: DEFAULT_NETCONF_PORT,
            username: username.into(),
            auth,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            known_hosts_file: None,
            strict_host_key_checking: true,
            client_capabilities: DEFAULT_CLIENT_CAPABILITIES.clone(),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn with_known_hosts_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.known_hosts_file = Some(path.into());
        self
    }

    pub fn with_strict_host_key_checking(mut self, strict: bool) -> Self {
        self.strict_host_key_checking = strict;
        self
    }

    /// Adds one capability URI to the hello advertisement.
    pub fn with_capability(mut self, uri: impl Into<String>) -> Self {
        let uri = uri.into();
        if !self.client_capabilities.contains(&uri) {
            self.client_capabilities.push(uri);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_rfc_and_protocol_expectations() {
        let config = SessionConfig::new("device", "admin", Auth::Password("pw".into()));
        assert_eq!(config.port, 830);
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.command_timeout, Duration::from_secs(30));
        assert!(config.strict_host_key_checking);
        assert_eq!(
            config.client_capabilities,
            vec![BASE_1_0.to_string(), BASE_1_1.to_string()]
        );
    }

    #[test]
    fn capability_injection_deduplicates() {
        let config = SessionConfig::new("device", "admin", Auth::Password("pw".into()))
            .with_capability(BASE_1_1)
            .with_capability("urn:ietf:params:netconf:capability:candidate:1.0");
        assert_eq!(config.client_capabilities.len(), 3);
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let password = format!("{:?}", Auth::Password("hunter2".into()));
        assert!(!password.contains("hunter2"));
        let key = format!(
            "{:?}",
            Auth::KeyFile {
                path: "/tmp/id_ed25519".into(),
                passphrase: Some("hunter2".into()),
            }
        );
        assert!(!key.contains("hunter2"));
    }
}
