//! Mid/side encoding and decoding

/// Convert decibels to a linear amplitude factor
#[inline]
pub fn db_to_gain(db: f64) -> f64 {
    10.0_f64.powf(db / 20.0)
}

/// Stateless L/R <-> mid/side transform
///
/// `encode` halves the sum and difference so that `decode` at unity gain is
/// its exact inverse.
#[derive(Debug, Clone, Copy, Default)]
pub struct MidSideCodec;

impl MidSideCodec {
    /// `(L, R) -> (mid, side)`
    #[inline]
    pub fn encode(left: f64, right: f64) -> (f64, f64) {
        ((left + right) * 0.5, (left - right) * 0.5)
    }

    /// `(mid, side) -> (L, R)` with make-up gain in dB
    #[inline]
    pub fn decode(mid: f64, side: f64, make_up_gain_db: f64) -> (f64, f64) {
        Self::decode_linear(mid, side, db_to_gain(make_up_gain_db))
    }

    /// Decode with a gain already converted to linear
    ///
    /// The chain converts once per block and calls this per sample.
    #[inline]
    pub fn decode_linear(mid: f64, side: f64, gain: f64) -> (f64, f64) {
        ((mid + side) * gain, (mid - side) * gain)
    }

    /// Encode an interleaved stereo buffer in-place
    pub fn encode_interleaved(buffer: &mut [f32]) {
        for frame in buffer.chunks_exact_mut(2) {
            let (mid, side) = Self::encode(frame[0] as f64, frame[1] as f64);
            frame[0] = mid as f32;
            frame[1] = side as f32;
        }
    }

    /// Decode an interleaved mid/side buffer in-place
    pub fn decode_interleaved(buffer: &mut [f32], make_up_gain_db: f64) {
        let gain = db_to_gain(make_up_gain_db);
        for frame in buffer.chunks_exact_mut(2) {
            let (left, right) = Self::decode_linear(frame[0] as f64, frame[1] as f64, gain);
            frame[0] = left as f32;
            frame[1] = right as f32;
        }
    }
}
