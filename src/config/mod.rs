mod settings;

pub use settings::{CacheConfig, ExtractConfig, ServerConfig, Settings, load_settings};
