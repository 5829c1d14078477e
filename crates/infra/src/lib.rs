//! Host adapters around the spatial saturator core
//!
//! Offline rendering is always available. Live streaming and device
//! enumeration through CPAL are behind the `live` feature.

pub mod audio;
