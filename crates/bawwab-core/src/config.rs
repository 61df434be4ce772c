//! Configuration for Bawwab

use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BawwabConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub gate: GateConfig,

    #[serde(default)]
    pub directory: DirectoryConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub forward: ForwardConfig,

    #[serde(default)]
    pub access: AccessConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl BawwabConfig {
    pub fn from_file(path: &str) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::Invalid(format!("failed to read config {}: {}", path, e)))?;

        toml::from_str(&content)
            .map_err(|e| crate::Error::Invalid(format!("failed to parse config {}: {}", path, e)))
    }

    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("BAWWAB_BIND_ADDRESS") {
            config.server.bind_address = addr;
        }
        if let Ok(port) = std::env::var("BAWWAB_PORT") {
            if let Ok(p) = port.parse() {
                config.server.port = p;
            }
        }
        if let Ok(url) = std::env::var("BAWWAB_DIRECTORY_URL") {
            config.directory.url = url;
        }
        if let Ok(port) = std::env::var("BAWWAB_DIRECTORY_PORT") {
            if let Ok(p) = port.parse() {
                config.directory.port = p;
            }
        }
        if let Ok(v) = std::env::var("BAWWAB_START_TLS") {
            config.directory.start_tls = v == "true";
        }
        if let Ok(v) = std::env::var("BAWWAB_INSECURE_SKIP_VERIFY") {
            config.directory.insecure_skip_verify = v == "true";
        }
        if let Ok(attr) = std::env::var("BAWWAB_ATTRIBUTE") {
            config.directory.attribute = attr;
        }
        if let Ok(dn) = std::env::var("BAWWAB_BASE_DN") {
            config.directory.base_dn = dn;
        }
        if let Ok(filter) = std::env::var("BAWWAB_SEARCH_FILTER") {
            config.directory.search_filter = filter;
        }
        if let Ok(dn) = std::env::var("BAWWAB_BIND_DN") {
            config.directory.bind_dn = dn;
        }
        if let Ok(password) = std::env::var("BAWWAB_BIND_PASSWORD") {
            config.directory.bind_password = password;
        }
        if let Ok(key) = std::env::var("BAWWAB_SESSION_KEY") {
            config.session.key = key;
        }
        if let Ok(v) = std::env::var("BAWWAB_COOKIE_SECURE") {
            config.session.cookie_secure = v == "true";
        }
        if let Ok(users) = std::env::var("BAWWAB_ALLOWED_USERS") {
            config.access.allowed_users = split_list(&users);
        }
        if let Ok(groups) = std::env::var("BAWWAB_ALLOWED_GROUPS") {
            config.access.allowed_groups = split_list(&groups);
        }
        if let Ok(level) = std::env::var("BAWWAB_LOG_LEVEL") {
            config.logging.level = level;
        }

        config
    }

    /// Check configuration consistency before serving traffic.
    ///
    /// A disabled gate passes every request through, so only enabled
    /// configurations are validated.
    pub fn validate(&self) -> crate::Result<()> {
        if !self.gate.enabled {
            return Ok(());
        }

        if !self.directory.url.starts_with("ldap://") && !self.directory.url.starts_with("ldaps://")
        {
            return Err(crate::Error::Invalid(format!(
                "directory url {:?} must use the ldap:// or ldaps:// scheme",
                self.directory.url
            )));
        }
        if self.directory.base_dn.is_empty() {
            return Err(crate::Error::Invalid(
                "directory base_dn is required".into(),
            ));
        }
        if self.directory.attribute.is_empty() {
            return Err(crate::Error::Invalid(
                "directory attribute must not be empty".into(),
            ));
        }
        if self.directory.timeout_seconds == 0 {
            return Err(crate::Error::Invalid(
                "directory timeout_seconds must be greater than zero".into(),
            ));
        }
        if self.session.cookie_name.is_empty() {
            return Err(crate::Error::Invalid(
                "session cookie_name must not be empty".into(),
            ));
        }
        if self.session.timeout_seconds == 0 {
            return Err(crate::Error::Invalid(
                "session timeout_seconds must be greater than zero".into(),
            ));
        }
        if self.forward.username && self.forward.username_header.is_empty() {
            return Err(crate::Error::Invalid(
                "forward username_header must not be empty".into(),
            ));
        }

        Ok(())
    }

    /// Log the effective settings at debug level, redacting secrets.
    pub fn log_settings(&self) {
        debug!(
            "server: bind_address={} port={}",
            self.server.bind_address, self.server.port
        );
        debug!(
            "gate: enabled={} www_authenticate={} realm={:?}",
            self.gate.enabled, self.gate.www_authenticate, self.gate.realm
        );
        debug!(
            "directory: url={} port={} start_tls={} insecure_skip_verify={} certificate_authority={:?} timeout_seconds={}",
            self.directory.url,
            self.directory.port,
            self.directory.start_tls,
            self.directory.insecure_skip_verify,
            self.directory.certificate_authority,
            self.directory.timeout_seconds
        );
        debug!(
            "directory: attribute={} base_dn={:?} search_filter={:?} bind_dn={:?} bind_password={} bind_password_label={:?}",
            self.directory.attribute,
            self.directory.base_dn,
            self.directory.search_filter,
            self.directory.bind_dn,
            redact(&self.directory.bind_password),
            self.directory.bind_password_label
        );
        debug!(
            "session: cookie_name={} cookie_path={:?} cookie_secure={} timeout_seconds={} key={} key_label={:?}",
            self.session.cookie_name,
            self.session.cookie_path,
            self.session.cookie_secure,
            self.session.timeout_seconds,
            redact(&self.session.key),
            self.session.key_label
        );
        debug!(
            "forward: username={} username_header={} authorization={} extra_headers={}",
            self.forward.username,
            self.forward.username_header,
            self.forward.authorization,
            self.forward.extra_headers
        );
        debug!(
            "access: allowed_users={:?} allowed_groups={:?} nested_groups={}",
            self.access.allowed_users, self.access.allowed_groups, self.access.nested_groups
        );
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

fn redact(value: &str) -> &'static str {
    if value.is_empty() {
        "<unset>"
    } else {
        "<redacted>"
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default = "default_gate_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_gate_port(),
        }
    }
}

/// Gate behavior toggles
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    /// Enforce authentication; a disabled gate forwards everything
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Send a WWW-Authenticate challenge with 401 responses
    #[serde(default = "default_true")]
    pub www_authenticate: bool,

    /// Realm advertised in the challenge (empty for a bare challenge)
    #[serde(default)]
    pub realm: String,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            www_authenticate: true,
            realm: String::new(),
        }
    }
}

/// Directory server connection and lookup settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// Directory URL (ldap:// or ldaps://)
    #[serde(default = "default_directory_url")]
    pub url: String,

    /// Directory port; always overrides a port embedded in the URL
    #[serde(default = "default_directory_port")]
    pub port: u16,

    /// Upgrade a plain connection with StartTLS
    #[serde(default)]
    pub start_tls: bool,

    /// Skip TLS certificate verification
    #[serde(default)]
    pub insecure_skip_verify: bool,

    /// Path to a PEM bundle of additional trust anchors
    #[serde(default)]
    pub certificate_authority: String,

    /// Connection timeout in seconds
    #[serde(default = "default_directory_timeout")]
    pub timeout_seconds: u64,

    /// Naming attribute used to build bind DNs (bind mode)
    #[serde(default = "default_attribute")]
    pub attribute: String,

    /// Base DN for bind DNs and user searches
    #[serde(default)]
    pub base_dn: String,

    /// User search filter; {username} and {attribute} placeholders.
    /// A non-empty filter switches the gate into search mode.
    #[serde(default)]
    pub search_filter: String,

    /// Service account DN for search-mode binds
    #[serde(default)]
    pub bind_dn: String,

    /// Service account password
    #[serde(default)]
    pub bind_password: String,

    /// Secret label resolved into bind_password at startup
    #[serde(default)]
    pub bind_password_label: String,
}

impl DirectoryConfig {
    /// Search mode is selected by configuring a search filter.
    pub fn search_mode(&self) -> bool {
        !self.search_filter.is_empty()
    }
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            url: default_directory_url(),
            port: default_directory_port(),
            start_tls: false,
            insecure_skip_verify: false,
            certificate_authority: String::new(),
            timeout_seconds: default_directory_timeout(),
            attribute: default_attribute(),
            base_dn: String::new(),
            search_filter: String::new(),
            bind_dn: String::new(),
            bind_password: String::new(),
            bind_password_label: String::new(),
        }
    }
}

/// Signed session cookie settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,

    /// Cookie path attribute (empty to omit)
    #[serde(default)]
    pub cookie_path: String,

    #[serde(default)]
    pub cookie_secure: bool,

    /// Session lifetime in seconds
    #[serde(default = "default_session_timeout")]
    pub timeout_seconds: u64,

    /// Inline signing key (prefer key_label in production)
    #[serde(default)]
    pub key: String,

    /// Secret label resolved into the signing key at startup
    #[serde(default)]
    pub key_label: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: default_cookie_name(),
            cookie_path: String::new(),
            cookie_secure: false,
            timeout_seconds: default_session_timeout(),
            key: String::new(),
            key_label: String::new(),
        }
    }
}

/// Headers forwarded to the upstream service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForwardConfig {
    /// Forward the authenticated username
    #[serde(default = "default_true")]
    pub username: bool,

    #[serde(default = "default_username_header")]
    pub username_header: String,

    /// Keep the Authorization header on forwarded requests
    #[serde(default)]
    pub authorization: bool,

    /// Forward directory attributes resolved in search mode
    #[serde(default)]
    pub extra_headers: bool,
}

impl Default for ForwardConfig {
    fn default() -> Self {
        Self {
            username: true,
            username_header: default_username_header(),
            authorization: false,
            extra_headers: false,
        }
    }
}

/// Authorization lists; both empty means every authenticated user is allowed
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccessConfig {
    /// Usernames or DNs allowed through (case-insensitive)
    #[serde(default)]
    pub allowed_users: Vec<String>,

    /// Group DNs whose members are allowed through
    #[serde(default)]
    pub allowed_groups: Vec<String>,

    /// Match nested group membership (Active Directory)
    #[serde(default)]
    pub nested_groups: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_gate_port() -> u16 {
    crate::DEFAULT_GATE_PORT
}

fn default_directory_url() -> String {
    "ldap://example.com".to_string()
}

fn default_directory_port() -> u16 {
    crate::DEFAULT_DIRECTORY_PORT
}

fn default_directory_timeout() -> u64 {
    crate::DEFAULT_CONNECT_TIMEOUT_SECS
}

fn default_attribute() -> String {
    "cn".to_string()
}

fn default_cookie_name() -> String {
    "bawwab_session_token".to_string()
}

fn default_session_timeout() -> u64 {
    crate::DEFAULT_SESSION_TIMEOUT_SECS
}

fn default_username_header() -> String {
    "Username".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_true() -> bool {
    true
}
