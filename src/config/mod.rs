#[cfg(feature = "cli")]
pub mod cli;
pub mod count_store;
pub mod toml_config;

#[cfg(feature = "cli")]
pub use cli::CliConfig;
pub use count_store::{JsonCountStore, NoopCountStore};
pub use toml_config::ProtocolConfig;
