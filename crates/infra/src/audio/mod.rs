//! Audio I/O implementations
//!
//! - `wav`: offline rendering of WAV files with hound
//! - `cpal_backend` / `stream` (feature `live`): device enumeration and a
//!   duplex stream through CPAL, which abstracts WASAPI, ALSA/PulseAudio and
//!   CoreAudio

#[cfg(feature = "live")]
pub mod cpal_backend;
#[cfg(feature = "live")]
pub mod stream;
pub mod wav;

#[cfg(feature = "live")]
pub use cpal_backend::CpalEnumerator;
#[cfg(feature = "live")]
pub use stream::{LiveStream, LiveStreamConfig};
pub use wav::{process_interleaved, read_stereo_wav, render_wav, write_float_wav, RenderError, RenderReport};
