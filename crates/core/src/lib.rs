//! Spatial Saturator core
//!
//! Mid/side filtering followed by a waveshaping saturator, plus the parameter
//! and preset plumbing the host adapters build on.

pub mod domain;
