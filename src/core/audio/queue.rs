use anyhow::{bail, Result};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use log::{info, warn};

use super::{AudioSink, SampleSource};

/// Push-model pipeline: the generation loop enqueues whole blocks and the
/// device callback plays them back in order. There is no warm-up gate;
/// the first block is audible as soon as it is queued.
pub fn queue_pipeline(sample_rate: u32, max_blocks: usize) -> (QueueSink, QueueDrain) {
    let max_blocks = max_blocks.max(1);
    let (tx, rx) = bounded(max_blocks);
    let (recycle_tx, recycle_rx) = bounded(max_blocks);

    let sink = QueueSink {
        tx,
        spare: recycle_rx,
        sample_rate,
        dropped: 0,
    };
    let drain = QueueDrain {
        rx,
        recycle: recycle_tx,
        current: Vec::new(),
        cursor: 0,
        underruns: 0,
    };
    (sink, drain)
}

pub struct QueueSink {
    tx: Sender<Vec<f32>>,
    spare: Receiver<Vec<f32>>,
    sample_rate: u32,
    dropped: u64,
}

impl QueueSink {
    /// Blocks waiting to be played.
    pub fn queued_blocks(&self) -> usize {
        self.tx.len()
    }

    /// Blocks discarded because the device fell behind.
    pub fn dropped_blocks(&self) -> u64 {
        self.dropped
    }
}

impl AudioSink for QueueSink {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn push_block(&mut self, block: &[f32]) -> Result<()> {
        if block.is_empty() {
            return Ok(());
        }

        let mut buffer = self.spare.try_recv().unwrap_or_default();
        buffer.clear();
        buffer.extend_from_slice(block);

        match self.tx.try_send(buffer) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.dropped += 1;
                warn!(
                    "audio queue full, dropped a {}-sample block ({} so far)",
                    block.len(),
                    self.dropped
                );
                Ok(())
            }
            Err(TrySendError::Disconnected(_)) => bail!("audio queue closed by the output device"),
        }
    }

    fn finish(&mut self) -> Result<()> {
        info!(
            "audio queue closed with {} blocks pending, {} dropped",
            self.queued_blocks(),
            self.dropped_blocks()
        );
        Ok(())
    }
}

pub struct QueueDrain {
    rx: Receiver<Vec<f32>>,
    recycle: Sender<Vec<f32>>,
    current: Vec<f32>,
    cursor: usize,
    underruns: u64,
}

impl QueueDrain {
    /// Callbacks that ran out of queued audio.
    pub fn underruns(&self) -> u64 {
        self.underruns
    }
}

impl SampleSource for QueueDrain {
    fn fill(&mut self, out: &mut [f32]) {
        let mut written = 0;
        while written < out.len() {
            if self.cursor == self.current.len() {
                match self.rx.try_recv() {
                    Ok(next) => {
                        let spent = std::mem::replace(&mut self.current, next);
                        let _ = self.recycle.try_send(spent);
                        self.cursor = 0;
                        continue;
                    }
                    Err(_) => {
                        out[written..].fill(0.0);
                        self.underruns += 1;
                        return;
                    }
                }
            }

            let n = (self.current.len() - self.cursor).min(out.len() - written);
            out[written..written + n].copy_from_slice(&self.current[self.cursor..self.cursor + n]);
            self.cursor += n;
            written += n;
        }
    }
}
