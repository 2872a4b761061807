//! Polyphonic keyboard synthesizer engine.
//!
//! Key events go through the [`messaging::MessageBus`] into a fixed-size
//! note pool; a fixed-tick [`core::Scheduler`] mixes every live note and
//! pushes mono sample blocks into an [`core::audio::AudioSink`].

pub mod app;
pub mod config;
pub mod core;
pub mod messaging;

use anyhow::Result;

use crate::config::EngineConfig;
use crate::core::audio::AudioSink;
use crate::core::clock::Clock;
use crate::core::{Mixer, Scheduler, SharedNotePool};
use crate::messaging::MessageBus;

/// Wire a validated config into a ready-to-run scheduler.
pub fn build_scheduler<C: Clock, S: AudioSink>(
    config: &EngineConfig,
    clock: C,
    sink: S,
) -> Result<Scheduler<C, S>> {
    config.validate()?;
    if sink.sample_rate() != config.sample_rate {
        anyhow::bail!(
            "sink runs at {} Hz but the engine is configured for {} Hz",
            sink.sample_rate(),
            config.sample_rate
        );
    }

    let voices = config.voice_bank()?;
    let pool = SharedNotePool::new(config.pool_capacity);
    let bus = MessageBus::new(pool.clone(), config.key_map()?, voices.len());
    let mixer = Mixer::new(pool, voices, config.tuning(), config.master_volume);

    Ok(Scheduler::new(clock, sink, mixer, bus, config.scheduler()))
}
