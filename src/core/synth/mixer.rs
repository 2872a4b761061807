//! Sums every live note into a mono signal and frees notes that have
//! faded out after release.

use log::trace;

use super::pool::{NoteHandle, NotePool, SharedNotePool};
use crate::core::keymap::Tuning;
use crate::core::voice::VoiceBank;

pub struct Mixer {
    pool: SharedNotePool,
    voices: VoiceBank,
    tuning: Tuning,
    master_volume: f32,
    finished: Vec<NoteHandle>,
}

impl Mixer {
    pub fn new(
        pool: SharedNotePool,
        voices: VoiceBank,
        tuning: Tuning,
        master_volume: f32,
    ) -> Self {
        let capacity = pool.lock().capacity();
        Self {
            pool,
            voices,
            tuning,
            master_volume,
            finished: Vec::with_capacity(capacity),
        }
    }

    pub fn pool(&self) -> &SharedNotePool {
        &self.pool
    }

    /// Mix one sample at `time`, taking the pool lock once.
    pub fn render_sample(&mut self, time: f64) -> f32 {
        let mut pool = self.pool.lock();
        let sample = mix(&mut pool, &self.voices, &self.tuning, time, &mut self.finished);
        sample as f32 * self.master_volume
    }

    /// Fill `out` with consecutive samples starting at `start`, `period`
    /// seconds apart. The pool stays locked for the whole block.
    pub fn render_block(&mut self, start: f64, period: f64, out: &mut [f32]) {
        let mut pool = self.pool.lock();
        for (index, sample) in out.iter_mut().enumerate() {
            let time = start + index as f64 * period;
            let mixed = mix(&mut pool, &self.voices, &self.tuning, time, &mut self.finished);
            *sample = mixed as f32 * self.master_volume;
        }
    }

    /// Largest magnitude the current pool contents can produce.
    pub fn peak_bound(&self) -> f32 {
        let pool = self.pool.lock();
        let headroom: f64 = pool
            .iter()
            .filter_map(|(_, note)| self.voices.get(note.channel))
            .map(|voice| voice.headroom())
            .sum();
        headroom as f32 * self.master_volume
    }
}

/// One summation pass over the pool followed by reaping. `finished` is
/// scratch space kept by the caller so the audio path does not allocate.
fn mix(
    pool: &mut NotePool,
    voices: &VoiceBank,
    tuning: &Tuning,
    time: f64,
    finished: &mut Vec<NoteHandle>,
) -> f64 {
    finished.clear();
    let mut sum = 0.0;
    for (handle, note) in pool.iter() {
        let Some(voice) = voices.get(note.channel) else {
            continue;
        };
        let (sample, done) = voice.render(time, note, tuning);
        sum += sample;
        if done {
            finished.push(handle);
        }
    }

    for handle in finished.drain(..) {
        if let Some(note) = pool.reap(handle) {
            trace!("reaped key {} at {time:.4}s", note.key);
        }
    }
    sum
}
