use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::keymap::Tuning;
use crate::core::oscillator::{oscillate, Envelope, Lfo, Note, Waveform, DEFAULT_SAW_HARMONICS};

const VIBRATO: Lfo = Lfo::vibrato(5.0, 0.001);

/// Timbres the engine can render. Each variant is a fixed recipe of
/// oscillator partials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Instrument {
    Bell,
    Reed,
    Organ,
}

struct Partial {
    waveform: Waveform,
    semitones: i32,
    weight: f64,
    lfo: Option<Lfo>,
}

const fn partial(waveform: Waveform, semitones: i32, weight: f64, lfo: Option<Lfo>) -> Partial {
    Partial {
        waveform,
        semitones,
        weight,
        lfo,
    }
}

const SAW: Waveform = Waveform::AnalogueSaw {
    harmonics: DEFAULT_SAW_HARMONICS,
};

static BELL: [Partial; 3] = [
    partial(Waveform::Sine, 0, 1.0, Some(VIBRATO)),
    partial(Waveform::Sine, 12, 0.5, None),
    partial(Waveform::Sine, 24, 0.25, None),
];

static REED: [Partial; 3] = [
    partial(Waveform::Square, 0, 1.0, Some(VIBRATO)),
    partial(Waveform::Square, 12, 0.5, None),
    partial(Waveform::Noise, 0, 0.05, None),
];

static ORGAN: [Partial; 3] = [
    partial(Waveform::Triangle, 0, 1.0, None),
    partial(SAW, 12, 0.4, None),
    partial(Waveform::DigitalSaw, 24, 0.2, None),
];

pub const ALL_INSTRUMENTS: [Instrument; 3] =
    [Instrument::Bell, Instrument::Reed, Instrument::Organ];

impl Instrument {
    fn partials(self) -> &'static [Partial] {
        match self {
            Instrument::Bell => &BELL,
            Instrument::Reed => &REED,
            Instrument::Organ => &ORGAN,
        }
    }

    /// Sum of partial weights; the largest magnitude the raw waveform can reach.
    pub fn weight_sum(self) -> f64 {
        self.partials().iter().map(|p| p.weight).sum()
    }

    /// Raw waveform of `key` at `time`, before envelope and volume.
    pub fn waveform(self, time: f64, key: usize, tuning: &Tuning) -> f64 {
        self.partials()
            .iter()
            .map(|p| {
                let frequency = tuning.frequency(key, p.semitones);
                p.weight * oscillate(time, frequency, p.waveform, p.lfo)
            })
            .sum()
    }
}

/// An instrument with its envelope and output volume.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Voice {
    pub instrument: Instrument,
    pub envelope: Envelope,
    pub volume: f64,
}

impl Voice {
    pub fn new(instrument: Instrument, envelope: Envelope, volume: f64) -> Self {
        Self {
            instrument,
            envelope,
            volume,
        }
    }

    /// Render `note` at `time`. The flag is true once a released note has
    /// faded to silence; a held note is never finished, even at zero amplitude.
    pub fn render(&self, time: f64, note: &Note, tuning: &Tuning) -> (f64, bool) {
        let amplitude = self.envelope.amplitude(time, note.on_time, note.off_time);
        if amplitude == 0.0 {
            return (0.0, note.is_released());
        }
        let sample = amplitude * self.volume * self.instrument.waveform(time, note.key, tuning);
        (sample, false)
    }

    /// Largest magnitude this voice can contribute per note.
    pub fn headroom(&self) -> f64 {
        self.volume * self.instrument.weight_sum()
    }
}

/// Serializable description of a voice: the instrument plus its ADSR and volume.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoiceConfig {
    pub instrument: Instrument,
    pub attack: f64,
    pub decay: f64,
    pub release: f64,
    pub start_amplitude: f64,
    pub sustain_amplitude: f64,
    pub volume: f64,
}

impl VoiceConfig {
    /// Factory settings for `instrument`.
    pub fn preset(instrument: Instrument) -> Self {
        let (attack, decay, release, start_amplitude, sustain_amplitude, volume) =
            match instrument {
                Instrument::Bell => (0.01, 1.0, 1.0, 1.0, 0.0, 1.0),
                Instrument::Reed => (0.1, 0.01, 0.2, 1.0, 0.95, 0.6),
                Instrument::Organ => (0.02, 0.1, 0.3, 1.0, 0.8, 0.7),
            };
        Self {
            instrument,
            attack,
            decay,
            release,
            start_amplitude,
            sustain_amplitude,
            volume,
        }
    }

    pub fn build(&self) -> Result<Voice> {
        let envelope = Envelope::new(
            self.attack,
            self.decay,
            self.release,
            self.start_amplitude,
            self.sustain_amplitude,
        )
        .with_context(|| format!("invalid envelope for {:?}", self.instrument))?;
        if !self.volume.is_finite() || self.volume < 0.0 {
            bail!("{:?} volume must be non-negative (got {})", self.instrument, self.volume);
        }
        Ok(Voice::new(self.instrument, envelope, self.volume))
    }
}

/// The set of voices selectable by note channel.
#[derive(Debug, Clone)]
pub struct VoiceBank {
    voices: Vec<Voice>,
}

impl VoiceBank {
    pub fn new(voices: Vec<Voice>) -> Self {
        Self { voices }
    }

    pub fn get(&self, channel: usize) -> Option<&Voice> {
        self.voices.get(channel)
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    pub fn from_configs(configs: &[VoiceConfig]) -> Result<Self> {
        let voices = configs.iter().map(VoiceConfig::build).collect::<Result<Vec<_>>>()?;
        if voices.is_empty() {
            bail!("at least one voice is required");
        }
        Ok(Self::new(voices))
    }

    /// Bell, reed and organ on channels 0, 1 and 2.
    pub fn presets() -> Result<Self> {
        Self::from_configs(&ALL_INSTRUMENTS.map(VoiceConfig::preset))
    }
}
