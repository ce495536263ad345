pub mod commands;
pub mod config;

pub use commands::ClearScope;
pub use config::{apply_env, find_config_file, load_options, ConfigFile, TtlValue};
