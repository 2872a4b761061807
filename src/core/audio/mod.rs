//! Audio delivery: sinks the scheduler pushes finished blocks into, and
//! the matching sources the device callback drains.

pub mod device;
pub mod queue;
pub mod ring;
pub mod wav;

use anyhow::Result;

pub use device::OutputStream;
pub use queue::{queue_pipeline, QueueDrain, QueueSink};
pub use ring::{ring_pipeline, RingDrain, RingSink};
pub use wav::WavSink;

/// Receives mono `f32` blocks from the generation loop.
pub trait AudioSink {
    fn sample_rate(&self) -> u32;

    /// Hand over one finished block. An error means the output is gone
    /// for good and generation should stop.
    fn push_block(&mut self, block: &[f32]) -> Result<()>;

    /// Flush anything buffered. Called once when the loop exits.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<S: AudioSink + ?Sized> AudioSink for Box<S> {
    fn sample_rate(&self) -> u32 {
        (**self).sample_rate()
    }

    fn push_block(&mut self, block: &[f32]) -> Result<()> {
        (**self).push_block(block)
    }

    fn finish(&mut self) -> Result<()> {
        (**self).finish()
    }
}

/// Mono sample provider pulled by the output device thread.
pub trait SampleSource: Send + 'static {
    /// Fill `out` completely; emit silence where nothing is available.
    fn fill(&mut self, out: &mut [f32]);
}
