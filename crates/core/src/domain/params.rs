//! Control-rate parameters and their lock-free hand-off to the audio thread
//!
//! The control side writes through [`SharedParameters`]; the audio thread
//! takes one [`ParameterSnapshot`] per block and never sees a value change
//! mid-block.

use crossbeam::utils::CachePadded;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

/// Valid values for one parameter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterRange {
    pub min: f32,
    pub max: f32,
    /// Editor step size
    pub step: f32,
    pub default: f32,
}

impl ParameterRange {
    const fn new(min: f32, max: f32, step: f32, default: f32) -> Self {
        Self {
            min,
            max,
            step,
            default,
        }
    }

    /// Clamp into range; NaN falls back to the default
    pub fn clamp(&self, value: f32) -> f32 {
        if value.is_nan() {
            return self.default;
        }
        value.clamp(self.min, self.max)
    }

    pub fn contains(&self, value: f32) -> bool {
        value >= self.min && value <= self.max
    }
}

/// The eleven parameters of the effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterId {
    MidGainDb,
    MidFreqHz,
    SideGainDb,
    SideFreqLowerHz,
    SideFreqUpperHz,
    TanhAmplitude,
    TanhSlope,
    SaturatorMix,
    SineAmplitude,
    SineFrequency,
    MakeUpGainDb,
}

impl ParameterId {
    pub const COUNT: usize = 11;

    pub const ALL: [ParameterId; Self::COUNT] = [
        ParameterId::MidGainDb,
        ParameterId::MidFreqHz,
        ParameterId::SideGainDb,
        ParameterId::SideFreqLowerHz,
        ParameterId::SideFreqUpperHz,
        ParameterId::TanhAmplitude,
        ParameterId::TanhSlope,
        ParameterId::SaturatorMix,
        ParameterId::SineAmplitude,
        ParameterId::SineFrequency,
        ParameterId::MakeUpGainDb,
    ];

    /// Position in [`ParameterId::ALL`]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Stable snake_case key used in TOML files and on the command line
    pub fn key(self) -> &'static str {
        match self {
            ParameterId::MidGainDb => "mid_gain_db",
            ParameterId::MidFreqHz => "mid_freq_hz",
            ParameterId::SideGainDb => "side_gain_db",
            ParameterId::SideFreqLowerHz => "side_freq_lower_hz",
            ParameterId::SideFreqUpperHz => "side_freq_upper_hz",
            ParameterId::TanhAmplitude => "tanh_amplitude",
            ParameterId::TanhSlope => "tanh_slope",
            ParameterId::SaturatorMix => "saturator_mix",
            ParameterId::SineAmplitude => "sine_amplitude",
            ParameterId::SineFrequency => "sine_frequency",
            ParameterId::MakeUpGainDb => "make_up_gain_db",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|id| id.key() == key)
    }

    /// Human-readable name
    pub fn label(self) -> &'static str {
        match self {
            ParameterId::MidGainDb => "Mid Gain",
            ParameterId::MidFreqHz => "Mid Frequency",
            ParameterId::SideGainDb => "Side Gain",
            ParameterId::SideFreqLowerHz => "Side Frequency Lower",
            ParameterId::SideFreqUpperHz => "Side Frequency Upper",
            ParameterId::TanhAmplitude => "Tanh Amplitude",
            ParameterId::TanhSlope => "Tanh Slope",
            ParameterId::SaturatorMix => "Saturator Mix",
            ParameterId::SineAmplitude => "Sine Amplitude",
            ParameterId::SineFrequency => "Sine Frequency",
            ParameterId::MakeUpGainDb => "Make-Up Gain",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            ParameterId::MidGainDb | ParameterId::SideGainDb | ParameterId::MakeUpGainDb => "dB",
            ParameterId::MidFreqHz
            | ParameterId::SideFreqLowerHz
            | ParameterId::SideFreqUpperHz
            | ParameterId::SineFrequency => "Hz",
            _ => "",
        }
    }

    pub fn range(self) -> ParameterRange {
        match self {
            ParameterId::MidGainDb => ParameterRange::new(0.0, 12.0, 0.5, 2.5),
            ParameterId::MidFreqHz => ParameterRange::new(20.0, 1000.0, 1.0, 250.0),
            ParameterId::SideGainDb => ParameterRange::new(0.0, 12.0, 0.5, 6.0),
            ParameterId::SideFreqLowerHz => ParameterRange::new(20.0, 20000.0, 1.0, 140.0),
            ParameterId::SideFreqUpperHz => ParameterRange::new(1000.0, 20000.0, 1.0, 4000.0),
            ParameterId::TanhAmplitude => ParameterRange::new(0.5, 100.0, 1.0, 50.0),
            ParameterId::TanhSlope => ParameterRange::new(1.0, 15.0, 1.0, 7.0),
            ParameterId::SaturatorMix => ParameterRange::new(1.0, 100.0, 1.0, 50.0),
            ParameterId::SineAmplitude => ParameterRange::new(0.5, 100.0, 1.0, 50.0),
            ParameterId::SineFrequency => ParameterRange::new(0.5, 100.0, 1.0, 60.0),
            ParameterId::MakeUpGainDb => ParameterRange::new(-12.0, 12.0, 0.5, 0.0),
        }
    }
}

impl fmt::Display for ParameterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Names accepted by [`ParameterSnapshot::factory_preset`]
pub const FACTORY_PRESETS: [&str; 3] = ["default", "subtle", "wide"];

/// Values of all parameters for one block
///
/// Missing keys deserialize to their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterSnapshot {
    pub mid_gain_db: f32,
    pub mid_freq_hz: f32,
    pub side_gain_db: f32,
    pub side_freq_lower_hz: f32,
    pub side_freq_upper_hz: f32,
    pub tanh_amplitude: f32,
    pub tanh_slope: f32,
    pub saturator_mix: f32,
    pub sine_amplitude: f32,
    pub sine_frequency: f32,
    pub make_up_gain_db: f32,
}

impl Default for ParameterSnapshot {
    fn default() -> Self {
        let mut snapshot = Self::zeroed();
        for id in ParameterId::ALL {
            snapshot.set(id, id.range().default);
        }
        snapshot
    }
}

impl ParameterSnapshot {
    fn zeroed() -> Self {
        Self {
            mid_gain_db: 0.0,
            mid_freq_hz: 0.0,
            side_gain_db: 0.0,
            side_freq_lower_hz: 0.0,
            side_freq_upper_hz: 0.0,
            tanh_amplitude: 0.0,
            tanh_slope: 0.0,
            saturator_mix: 0.0,
            sine_amplitude: 0.0,
            sine_frequency: 0.0,
            make_up_gain_db: 0.0,
        }
    }

    pub fn get(&self, id: ParameterId) -> f32 {
        match id {
            ParameterId::MidGainDb => self.mid_gain_db,
            ParameterId::MidFreqHz => self.mid_freq_hz,
            ParameterId::SideGainDb => self.side_gain_db,
            ParameterId::SideFreqLowerHz => self.side_freq_lower_hz,
            ParameterId::SideFreqUpperHz => self.side_freq_upper_hz,
            ParameterId::TanhAmplitude => self.tanh_amplitude,
            ParameterId::TanhSlope => self.tanh_slope,
            ParameterId::SaturatorMix => self.saturator_mix,
            ParameterId::SineAmplitude => self.sine_amplitude,
            ParameterId::SineFrequency => self.sine_frequency,
            ParameterId::MakeUpGainDb => self.make_up_gain_db,
        }
    }

    /// Set a value as-is; see [`ParameterSnapshot::clamped`]
    pub fn set(&mut self, id: ParameterId, value: f32) {
        let slot = match id {
            ParameterId::MidGainDb => &mut self.mid_gain_db,
            ParameterId::MidFreqHz => &mut self.mid_freq_hz,
            ParameterId::SideGainDb => &mut self.side_gain_db,
            ParameterId::SideFreqLowerHz => &mut self.side_freq_lower_hz,
            ParameterId::SideFreqUpperHz => &mut self.side_freq_upper_hz,
            ParameterId::TanhAmplitude => &mut self.tanh_amplitude,
            ParameterId::TanhSlope => &mut self.tanh_slope,
            ParameterId::SaturatorMix => &mut self.saturator_mix,
            ParameterId::SineAmplitude => &mut self.sine_amplitude,
            ParameterId::SineFrequency => &mut self.sine_frequency,
            ParameterId::MakeUpGainDb => &mut self.make_up_gain_db,
        };
        *slot = value;
    }

    /// Copy with every value clamped into its range
    #[must_use]
    pub fn clamped(&self) -> Self {
        let mut out = *self;
        for id in ParameterId::ALL {
            out.set(id, id.range().clamp(self.get(id)));
        }
        out
    }

    /// Parameters the clamp would change
    pub fn out_of_range(&self) -> Vec<ParameterId> {
        ParameterId::ALL
            .into_iter()
            .filter(|id| !id.range().contains(self.get(*id)))
            .collect()
    }

    /// Bundled presets by name
    pub fn factory_preset(name: &str) -> Option<Self> {
        match name {
            "default" => Some(Self::default()),
            "subtle" => Some(Self {
                mid_gain_db: 1.0,
                mid_freq_hz: 200.0,
                side_gain_db: 2.0,
                side_freq_lower_hz: 120.0,
                side_freq_upper_hz: 6000.0,
                tanh_amplitude: 30.0,
                tanh_slope: 3.0,
                saturator_mix: 25.0,
                sine_amplitude: 10.0,
                sine_frequency: 20.0,
                make_up_gain_db: 0.0,
            }),
            "wide" => Some(Self {
                mid_gain_db: 0.0,
                mid_freq_hz: 250.0,
                side_gain_db: 9.0,
                side_freq_lower_hz: 200.0,
                side_freq_upper_hz: 3000.0,
                tanh_amplitude: 60.0,
                tanh_slope: 9.0,
                saturator_mix: 60.0,
                sine_amplitude: 40.0,
                sine_frequency: 80.0,
                make_up_gain_db: -3.0,
            }),
            _ => None,
        }
    }
}

/// Lock-free parameter store shared between the control and audio threads
///
/// Each value is an `f32` stored as bits in its own cache line. Loads and
/// stores are `Relaxed`: a block may see a value one block late, never a
/// torn one.
#[derive(Debug)]
pub struct SharedParameters {
    values: [CachePadded<AtomicU32>; ParameterId::COUNT],
}

impl Default for SharedParameters {
    fn default() -> Self {
        Self::new(&ParameterSnapshot::default())
    }
}

impl SharedParameters {
    pub fn new(initial: &ParameterSnapshot) -> Self {
        let initial = initial.clamped();
        Self {
            values: ParameterId::ALL
                .map(|id| CachePadded::new(AtomicU32::new(initial.get(id).to_bits()))),
        }
    }

    pub fn get(&self, id: ParameterId) -> f32 {
        f32::from_bits(self.values[id.index()].load(Ordering::Relaxed))
    }

    /// Store a value, clamped into its range
    pub fn set(&self, id: ParameterId, value: f32) {
        let value = id.range().clamp(value);
        self.values[id.index()].store(value.to_bits(), Ordering::Relaxed);
    }

    /// Store every value of a snapshot
    pub fn store(&self, snapshot: &ParameterSnapshot) {
        for id in ParameterId::ALL {
            self.set(id, snapshot.get(id));
        }
    }

    /// Read all values once; called by the audio thread at block start
    pub fn snapshot(&self) -> ParameterSnapshot {
        let mut snapshot = ParameterSnapshot::zeroed();
        for id in ParameterId::ALL {
            snapshot.set(id, self.get(id));
        }
        snapshot
    }
}
