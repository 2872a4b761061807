use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_2, PI};

use super::modulation::Lfo;

/// Harmonic count used by the additive saw unless an instrument asks otherwise.
pub const DEFAULT_SAW_HARMONICS: u32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Waveform {
    Sine,
    Square,
    Triangle,
    /// Band-limited saw built from `harmonics` sine partials.
    AnalogueSaw { harmonics: u32 },
    /// Closed-form saw, cheap but aliased.
    DigitalSaw,
    Noise,
}

/// Convert a frequency in Hz to angular velocity.
#[inline]
pub fn angular(hertz: f64) -> f64 {
    hertz * 2.0 * PI
}

/// Phase of a carrier at `frequency` after `time` seconds, frequency-modulated by `lfo`.
#[inline]
pub fn phase(time: f64, frequency: f64, lfo: Option<Lfo>) -> f64 {
    let carrier = angular(frequency) * time;
    match lfo {
        Some(lfo) => carrier + lfo.depth * frequency * (angular(lfo.rate_hz) * time).sin(),
        None => carrier,
    }
}

/// Sample one oscillator at `time`. Stateless: the same arguments always
/// give the same value, except for [`Waveform::Noise`].
pub fn oscillate(time: f64, frequency: f64, waveform: Waveform, lfo: Option<Lfo>) -> f64 {
    if frequency <= 0.0 {
        return 0.0;
    }

    let theta = phase(time, frequency, lfo);
    match waveform {
        Waveform::Sine => theta.sin(),
        Waveform::Square => {
            if theta.sin() >= 0.0 {
                1.0
            } else {
                -1.0
            }
        }
        Waveform::Triangle => theta.sin().asin() * (2.0 / PI),
        Waveform::AnalogueSaw { harmonics } => {
            let mut output = 0.0;
            for n in 1..=harmonics.max(1) {
                let n = n as f64;
                output += (n * theta).sin() / n;
            }
            // partial sums overshoot near the edge (Gibbs)
            (output * (2.0 / PI)).clamp(-1.0, 1.0)
        }
        Waveform::DigitalSaw => {
            (2.0 / PI) * (frequency * PI * (time % (1.0 / frequency)) - FRAC_PI_2)
        }
        Waveform::Noise => rand::random::<f64>() * 2.0 - 1.0,
    }
}
