use serde::{Deserialize, Serialize};

/// Low-frequency oscillator used for vibrato.
///
/// The LFO frequency-modulates the carrier: the phase offset it adds is
/// `depth * carrier_frequency * sin(2π * rate_hz * t)`, so the same depth
/// gives the same relative wobble at every pitch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Lfo {
    pub rate_hz: f64,
    pub depth: f64,
}

impl Lfo {
    pub const fn vibrato(rate_hz: f64, depth: f64) -> Self {
        Self { rate_hz, depth }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::core::oscillator::{oscillate, Waveform};

    #[test]
    fn vibrato_bends_the_carrier() {
        let t = 0.05;
        let plain = oscillate(t, 440.0, Waveform::Sine, None);
        let bent = oscillate(t, 440.0, Waveform::Sine, Some(Lfo::vibrato(5.0, 0.001)));
        assert_ne!(plain, bent);
        // at t = 0 the modulator is at a zero crossing
        let start = oscillate(0.0, 440.0, Waveform::Sine, Some(Lfo::vibrato(5.0, 0.001)));
        assert_eq!(start, 0.0);
    }
}
