//! Real-time duplex stream running the spatial saturator
//!
//! Input callbacks copy captured frames into buffers taken from a
//! pre-filled pool; the output callback drains them, runs the chain in-place
//! on the device buffer and hands the emptied buffers back. In steady state
//! neither callback allocates.

use super::cpal_backend::{describe_device, find_device};
use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{Stream, StreamConfig as CpalStreamConfig};
use crossbeam::channel::{bounded, Receiver, Sender};
use spatial_saturator_core::domain::audio::{
    AudioError, ChannelCount, DeviceId, DeviceType, Result, StreamConfig,
};
use spatial_saturator_core::domain::dsp::{Effect, SpatialSaturator};
use spatial_saturator_core::domain::params::SharedParameters;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{error, info};

/// Buffers in flight between the input and output callbacks
const POOL_SIZE: usize = 8;

/// Audio buffer containing interleaved stereo samples
pub type AudioBuffer = Vec<f32>;

/// Devices and stream format for a live session
#[derive(Debug, Clone, Default)]
pub struct LiveStreamConfig {
    /// Input device id (None = host default)
    pub input_device: Option<DeviceId>,
    /// Output device id (None = host default)
    pub output_device: Option<DeviceId>,
    pub stream: StreamConfig,
}

/// Input side of the pool: free buffers in, filled buffers out
struct Capture {
    free: Receiver<AudioBuffer>,
    filled: Sender<AudioBuffer>,
    dropped: Arc<AtomicUsize>,
}

impl Capture {
    fn push(&self, data: &[f32]) {
        let Ok(mut buffer) = self.free.try_recv() else {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return;
        };

        buffer.clear();
        buffer.extend_from_slice(data);

        if self.filled.try_send(buffer).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Output side of the pool plus the effect
struct Playback {
    filled: Receiver<AudioBuffer>,
    free: Sender<AudioBuffer>,
    pending: Option<(AudioBuffer, usize)>,
    effect: SpatialSaturator,
}

impl Playback {
    /// Copy captured frames into `data`, zero-filling on underrun
    fn pull(&mut self, data: &mut [f32]) {
        let mut written = 0;

        while written < data.len() {
            let (buffer, offset) = match self.pending.take() {
                Some(pending) => pending,
                None => match self.filled.try_recv() {
                    Ok(buffer) => (buffer, 0),
                    Err(_) => break,
                },
            };

            let n = (buffer.len() - offset).min(data.len() - written);
            data[written..written + n].copy_from_slice(&buffer[offset..offset + n]);
            written += n;

            if offset + n < buffer.len() {
                self.pending = Some((buffer, offset + n));
            } else {
                let _ = self.free.try_send(buffer);
            }
        }

        data[written..].fill(0.0);
    }

    fn render(&mut self, data: &mut [f32]) {
        self.pull(data);
        if let Err(e) = self.effect.process(data) {
            data.fill(0.0);
            error!("Processing error: {}", e);
        }
    }
}

/// Running duplex stream: capture -> spatial saturator -> playback
pub struct LiveStream {
    _input: Stream,
    _output: Stream,
    config: StreamConfig,
    parameters: Arc<SharedParameters>,
    dropped: Arc<AtomicUsize>,
}

impl LiveStream {
    /// Open both devices and start streaming
    pub fn start(config: &LiveStreamConfig, parameters: Arc<SharedParameters>) -> Result<Self> {
        config.stream.channels.require_stereo()?;

        let host = cpal::default_host();
        let input_device = find_device(&host, config.input_device.as_ref(), DeviceType::Input)?;
        let output_device = find_device(&host, config.output_device.as_ref(), DeviceType::Output)?;

        let input_info = describe_device(&input_device, DeviceType::Input);
        let output_info = describe_device(&output_device, DeviceType::Output);
        if !input_info.supports_stereo() || !output_info.supports_stereo() {
            return Err(AudioError::UnsupportedConfiguration(format!(
                "stereo required: '{}' has {} channels, '{}' has {}",
                input_info.name, input_info.max_channels, output_info.name, output_info.max_channels
            )));
        }

        info!(
            "Starting live stream: {} -> {} at {} Hz, {} frames",
            input_info.name,
            output_info.name,
            config.stream.sample_rate.hz(),
            config.stream.buffer_size
        );

        let (free_tx, free_rx) = bounded::<AudioBuffer>(POOL_SIZE);
        let (filled_tx, filled_rx) = bounded::<AudioBuffer>(POOL_SIZE);
        // Headroom for hosts that deliver more frames than requested
        let capacity = config.stream.buffer_size as usize * ChannelCount::Stereo.count() as usize * 4;
        for _ in 0..POOL_SIZE {
            let _ = free_tx.try_send(Vec::with_capacity(capacity));
        }

        let dropped = Arc::new(AtomicUsize::new(0));
        let capture = Capture {
            free: free_rx,
            filled: filled_tx,
            dropped: Arc::clone(&dropped),
        };
        let mut playback = Playback {
            filled: filled_rx,
            free: free_tx,
            pending: None,
            effect: SpatialSaturator::new(config.stream.sample_rate.as_f64(), Arc::clone(&parameters))?,
        };

        let cpal_config = CpalStreamConfig {
            channels: ChannelCount::Stereo.count(),
            sample_rate: config.stream.sample_rate.hz(),
            buffer_size: cpal::BufferSize::Fixed(config.stream.buffer_size),
        };

        let input = input_device
            .build_input_stream(
                &cpal_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| capture.push(data),
                |err| error!("Input stream error: {}", err),
                None,
            )
            .map_err(|e| AudioError::StreamError(format!("Failed to build input stream: {}", e)))?;

        let output = output_device
            .build_output_stream(
                &cpal_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| playback.render(data),
                |err| error!("Output stream error: {}", err),
                None,
            )
            .map_err(|e| AudioError::StreamError(format!("Failed to build output stream: {}", e)))?;

        input
            .play()
            .map_err(|e| AudioError::StreamError(format!("Failed to start input stream: {}", e)))?;
        output
            .play()
            .map_err(|e| AudioError::StreamError(format!("Failed to start output stream: {}", e)))?;

        info!("Live stream running");

        Ok(Self {
            _input: input,
            _output: output,
            config: config.stream.clone(),
            parameters,
            dropped,
        })
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Parameter store read by the audio thread once per callback
    pub fn parameters(&self) -> &Arc<SharedParameters> {
        &self.parameters
    }

    /// Input callbacks discarded because the pool was exhausted
    pub fn dropped_blocks(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool() -> (Capture, Playback) {
        let (free_tx, free_rx) = bounded::<AudioBuffer>(2);
        let (filled_tx, filled_rx) = bounded::<AudioBuffer>(2);
        for _ in 0..2 {
            free_tx.try_send(Vec::with_capacity(16)).unwrap();
        }
        let capture = Capture {
            free: free_rx,
            filled: filled_tx,
            dropped: Arc::new(AtomicUsize::new(0)),
        };
        let mut effect = SpatialSaturator::new(48000.0, Arc::new(SharedParameters::default())).unwrap();
        effect.set_bypass(true);
        let playback = Playback {
            filled: filled_rx,
            free: free_tx,
            pending: None,
            effect,
        };
        (capture, playback)
    }

    #[test]
    fn test_pull_spans_buffers() {
        let (capture, mut playback) = pool();
        capture.push(&[1.0, 2.0, 3.0, 4.0]);
        capture.push(&[5.0, 6.0]);

        let mut out = [0.0f32; 4];
        playback.render(&mut out);
        assert_eq!(out, [1.0, 2.0, 3.0, 4.0]);

        let mut out = [0.0f32; 4];
        playback.render(&mut out);
        assert_eq!(out, [5.0, 6.0, 0.0, 0.0]);
    }

    #[test]
    fn test_partial_buffer_kept_pending() {
        let (capture, mut playback) = pool();
        capture.push(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);

        let mut out = [0.0f32; 4];
        playback.render(&mut out);
        assert_eq!(out, [1.0, 2.0, 3.0, 4.0]);

        let mut out = [0.0f32; 2];
        playback.render(&mut out);
        assert_eq!(out, [5.0, 6.0]);
    }

    #[test]
    fn test_exhausted_pool_drops_input() {
        let (capture, mut playback) = pool();
        capture.push(&[1.0, 1.0]);
        capture.push(&[2.0, 2.0]);
        capture.push(&[3.0, 3.0]);
        assert_eq!(capture.dropped.load(Ordering::Relaxed), 1);

        // Draining returns buffers to the pool
        let mut out = [0.0f32; 4];
        playback.render(&mut out);
        capture.push(&[4.0, 4.0]);
        assert_eq!(capture.dropped.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_underrun_outputs_silence() {
        let (_capture, mut playback) = pool();
        let mut out = [0.7f32; 8];
        playback.render(&mut out);
        assert!(out.iter().all(|&s| s == 0.0));
    }
}
