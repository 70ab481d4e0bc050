use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub db_host: String,
    pub db_user: String,
    pub db_password: String,
    pub db_database: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub supermarkets_path: PathBuf,
    pub imagecitations_path: PathBuf,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub session_ticket_ttl_secs: u64,
    pub session_session_ttl_secs: u64,
}

impl AppConfig {
    /// Postgres connection string assembled from the `db.*` keys.
    #[must_use]
    pub fn database_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}/{}",
            self.db_user, self.db_password, self.db_host, self.db_database
        )
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("supermarkets_path", &self.supermarkets_path)
            .field("imagecitations_path", &self.imagecitations_path)
            .field("db_host", &self.db_host)
            .field("db_user", &self.db_user)
            .field("db_password", &"[redacted]")
            .field("db_database", &self.db_database)
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("session_ticket_ttl_secs", &self.session_ticket_ttl_secs)
            .field("session_session_ttl_secs", &self.session_session_ttl_secs)
            .finish()
    }
}
