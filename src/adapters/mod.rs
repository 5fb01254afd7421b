// Adapters - External system implementations

pub mod fs_local;
pub mod native_probe;
pub mod toml_config;

// Re-export adapters
pub use fs_local::FsLocalAdapter;
pub use native_probe::NativeProbeAdapter;
pub use toml_config::TomlConfigAdapter;
