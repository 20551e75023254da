use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum CoreError {
    #[error("latitude {0} is outside [-90, 90]")]
    LatitudeOutOfRange(f64),

    #[error("longitude {0} is outside [-180, 180]")]
    LongitudeOutOfRange(f64),

    #[error("place label must be non-empty")]
    EmptyPlaceLabel,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read domain table {path}: {source}")]
    DomainFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse domain table: {0}")]
    DomainFileParse(#[from] serde_yaml::Error),

    #[error("domain table validation failed: {0}")]
    Validation(String),
}
