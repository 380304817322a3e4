pub mod loader;
pub mod paths;
pub mod schema;

pub use loader::{load_config, load_config_from_str, load_config_or_default, validate_config};
pub use paths::DataPaths;
pub use schema::{Config, KeywordMatch, ScoringConfig, SearchConfig, SwarmConfig};
