mod envelope;
mod modulation;
mod note;
mod waveform;

// Re-export key types so they're accessible from core::oscillator
pub use self::envelope::{is_released, Envelope, SILENCE_THRESHOLD};
pub use self::modulation::Lfo;
pub use self::note::{KeyId, Note};
pub use self::waveform::{angular, oscillate, phase, Waveform, DEFAULT_SAW_HARMONICS};
