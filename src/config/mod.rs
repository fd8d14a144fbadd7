//! Configuration: `AppConfig` and its sections, `AppPaths` for the platform
//! config directory, TOML persistence and `SCREEN_TO_TEXT_*` environment
//! overrides.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{
    ApiConfig, AppConfig, CaptureConfig, HotkeyConfig, RecognitionConfig, RegionConfig,
    TransportConfig, ENV_API_KEY, ENV_PORT_END, ENV_PORT_START,
};
