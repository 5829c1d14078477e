//! Domain entities and business rules

pub mod audio;
pub mod config;
pub mod dsp;
pub mod params;

// Re-export specific items to avoid ambiguous glob imports
pub use audio::{
    AudioEnumerator, AudioError, ChannelCount, DeviceId, DeviceInfo, DeviceType, SampleRate,
    StreamConfig,
};
pub use config::{
    apply_assignments, parse_assignment, AppConfig, ConfigError, ConfigManager, ConfigWatcher,
    PresetManager, SpatialSaturatorConfig,
};
pub use dsp::{
    BiquadStage, ChainCoefficients, Effect, FilterCoefficients, FilterState, HighPassFilter, MidSideCodec, Saturator,
    SaturatorShape, ShelvingFilter, SignalChain, SpatialSaturator,
};
pub use params::{
    ParameterId, ParameterRange, ParameterSnapshot, SharedParameters, FACTORY_PRESETS,
};
