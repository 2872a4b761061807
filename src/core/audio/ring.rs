use anyhow::Result;
use log::{debug, info, warn};
use rtrb::{Consumer, Producer, RingBuffer};

use super::{AudioSink, SampleSource};

/// Pull-model pipeline over a lock-free SPSC ring. The device callback
/// emits silence until `warmup` samples have been buffered once; after
/// that it plays whatever is available and pads underruns with zeros.
pub fn ring_pipeline(sample_rate: u32, capacity: usize, warmup: usize) -> (RingSink, RingDrain) {
    let capacity = capacity.max(1);
    let (producer, consumer) = RingBuffer::new(capacity);
    let sink = RingSink {
        producer,
        sample_rate,
        overflowed: 0,
    };
    let drain = RingDrain {
        consumer,
        warmup: warmup.min(capacity),
        warmed_up: false,
    };
    (sink, drain)
}

pub struct RingSink {
    producer: Producer<f32>,
    sample_rate: u32,
    overflowed: u64,
}

impl RingSink {
    /// Samples discarded because the ring was full.
    pub fn overflowed(&self) -> u64 {
        self.overflowed
    }
}

impl AudioSink for RingSink {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn push_block(&mut self, block: &[f32]) -> Result<()> {
        let free = self.producer.slots();
        let accepted = block.len().min(free);
        for &sample in &block[..accepted] {
            // cannot fail: we checked the free slot count above
            let _ = self.producer.push(sample);
        }

        let lost = block.len() - accepted;
        if lost > 0 {
            self.overflowed += lost as u64;
            warn!("ring buffer full, dropped {lost} samples");
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        info!("ring buffer closed, {} samples overflowed", self.overflowed());
        Ok(())
    }
}

pub struct RingDrain {
    consumer: Consumer<f32>,
    warmup: usize,
    warmed_up: bool,
}

impl RingDrain {
    pub fn is_warmed_up(&self) -> bool {
        self.warmed_up
    }
}

impl SampleSource for RingDrain {
    fn fill(&mut self, out: &mut [f32]) {
        if !self.warmed_up {
            if self.consumer.slots() < self.warmup {
                out.fill(0.0);
                return;
            }
            self.warmed_up = true;
            debug!("ring buffer warmed up with {} samples", self.consumer.slots());
        }

        for sample in out.iter_mut() {
            *sample = self.consumer.pop().unwrap_or(0.0);
        }
    }
}
