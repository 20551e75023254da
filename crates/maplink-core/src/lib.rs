//! Domain model, configuration and reply formatting shared by the maplink
//! resolver and its binaries.

pub mod config;
pub mod coordinate;
pub mod domains;
pub mod error;
pub mod reply;
pub mod resolution;

pub use config::{load_config, load_config_from_env, ResolverConfig};
pub use coordinate::{Coordinate, PlaceLabel};
pub use domains::{load_domain_table, ConsentLabel, DomainTable};
pub use error::{ConfigError, CoreError};
pub use reply::{extract_share_link, format_failure, format_reply, waze_link};
pub use resolution::{
    FailureKind, ResolutionError, ResolutionRequest, ResolutionResult, Resolved,
    StrategyFailure, StrategyKind,
};
