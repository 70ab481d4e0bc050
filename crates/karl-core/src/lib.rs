pub mod app_config;
pub mod config;
pub mod entities;
pub mod ids;
pub mod supermarkets;

pub use app_config::{AppConfig, Environment};
pub use config::load_app_config;
pub use entities::{
    AddProduct, Confidence, ProductBase, ProductHistoryPoint, ProductLogEntry, ProductSummary,
    ProductclassSummary, Tag, VolumeMeasure,
};
pub use ids::{
    ImageCitationId, KaruserId, ProductId, ProductclassId, ProductdetailsId,
    ProductdetailsrecordId, SessionId, SessionticketId, SupermarketId, TagId, TagcategoryId,
};
pub use supermarkets::{load_supermarkets, SupermarketConfig, SupermarketsFile};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ConfigFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    ConfigFileParse(#[source] serde_yaml::Error),

    #[error("invalid config key {key}: {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("path {path} does not exist or is not a writable directory")]
    PathUnwritable { path: String },

    #[error("failed to read supermarkets file {path}: {source}")]
    SupermarketsFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse supermarkets file: {0}")]
    SupermarketsFileParse(#[source] serde_yaml::Error),

    #[error("validation error: {0}")]
    Validation(String),
}
