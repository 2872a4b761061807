use anyhow::{bail, Result};

/// Amplitudes at or below this are reported as exact silence. It is the
/// machine epsilon of the `f32` samples the engine emits.
pub const SILENCE_THRESHOLD: f64 = f32::EPSILON as f64;

/// Linear ADSR envelope.
///
/// The envelope holds no per-note state: the stage is derived from the
/// note's trigger timestamps on every query, so one `Envelope` is shared
/// by every note of an instrument.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Envelope {
    attack: f64,
    decay: f64,
    release: f64,
    start_amplitude: f64,
    sustain_amplitude: f64,
}

impl Envelope {
    /// Build an envelope, rejecting parameters that cannot be rendered.
    /// Zero-length stages are allowed and are skipped instantly.
    pub fn new(
        attack: f64,
        decay: f64,
        release: f64,
        start_amplitude: f64,
        sustain_amplitude: f64,
    ) -> Result<Self> {
        for (name, value) in [("attack", attack), ("decay", decay), ("release", release)] {
            if !value.is_finite() || value < 0.0 {
                bail!("envelope {name} time must be finite and non-negative (got {value}s)");
            }
        }
        for (name, value) in [("start", start_amplitude), ("sustain", sustain_amplitude)] {
            if !(0.0..=1.0).contains(&value) {
                bail!("envelope {name} amplitude must be within 0..=1 (got {value})");
            }
        }

        Ok(Self {
            attack,
            decay,
            release,
            start_amplitude,
            sustain_amplitude,
        })
    }

    /// Amplitude in `0..=1` at `time` for a note triggered at `on_time`
    /// and released at `off_time` (`None` while the key is still held).
    pub fn amplitude(&self, time: f64, on_time: f64, off_time: Option<f64>) -> f64 {
        let amplitude = match off_time {
            Some(off) if off >= on_time => {
                let base = self.held(off - on_time);
                let elapsed = (time - off).max(0.0);
                if self.release > 0.0 && elapsed < self.release {
                    base * (1.0 - elapsed / self.release)
                } else {
                    0.0
                }
            }
            _ => self.held(time - on_time),
        };

        if amplitude <= SILENCE_THRESHOLD {
            0.0
        } else {
            amplitude.min(1.0)
        }
    }

    /// Attack/decay/sustain portion, `lifetime` seconds after the trigger.
    fn held(&self, lifetime: f64) -> f64 {
        let lifetime = lifetime.max(0.0);
        if self.attack > 0.0 && lifetime <= self.attack {
            (lifetime / self.attack) * self.start_amplitude
        } else if self.decay > 0.0 && lifetime <= self.attack + self.decay {
            ((lifetime - self.attack) / self.decay)
                * (self.sustain_amplitude - self.start_amplitude)
                + self.start_amplitude
        } else {
            self.sustain_amplitude
        }
    }
}

/// A note counts as released once `off_time` is at or after its last trigger.
#[inline]
pub fn is_released(on_time: f64, off_time: Option<f64>) -> bool {
    matches!(off_time, Some(off) if off >= on_time)
}
