//! Fixed-tick generation loop.
//!
//! Each tick polls input, then renders exactly as many samples as wall
//! time has advanced since the previous tick (tracked with a fractional
//! accumulator), hands them to the sink and sleeps off the rest of the
//! tick budget. Sample times run on their own cursor, so the fraction
//! carried between ticks never shifts the grid of the next block.

use anyhow::Result;
use log::{info, warn};

use super::audio::AudioSink;
use super::clock::Clock;
use super::synth::Mixer;
use crate::messaging::MessageBus;

/// Events applied per tick before rendering; the rest wait for the next tick.
pub const MAX_EVENTS_PER_TICK: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchedulerConfig {
    pub sample_rate: u32,
    pub tick_rate: f64,
    /// Longest stretch of wall time rendered in one tick. Anything beyond
    /// is skipped rather than played late.
    pub max_lag: f64,
}

impl SchedulerConfig {
    pub fn sample_period(&self) -> f64 {
        1.0 / self.sample_rate as f64
    }

    pub fn tick_time(&self) -> f64 {
        1.0 / self.tick_rate
    }
}

/// What one tick did.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TickReport {
    pub events: usize,
    pub samples: usize,
    pub active_notes: usize,
    /// Time of the first sample rendered this tick.
    pub block_start: f64,
}

pub struct Scheduler<C: Clock, S: AudioSink> {
    clock: C,
    sink: S,
    mixer: Mixer,
    bus: MessageBus,
    config: SchedulerConfig,
    block: Vec<f32>,
    accumulator: f64,
    last: f64,
    origin: f64,
    rendered: u64,
}

impl<C: Clock, S: AudioSink> Scheduler<C, S> {
    pub fn new(clock: C, sink: S, mixer: Mixer, bus: MessageBus, config: SchedulerConfig) -> Self {
        let last = clock.now();
        let per_tick = (config.sample_rate as f64 * config.tick_time()).ceil() as usize;
        Self {
            clock,
            sink,
            mixer,
            bus,
            config,
            block: Vec::with_capacity(per_tick * 2),
            accumulator: 0.0,
            last,
            origin: last,
            rendered: 0,
        }
    }

    pub fn bus(&self) -> &MessageBus {
        &self.bus
    }

    pub fn mixer(&self) -> &Mixer {
        &self.mixer
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Run ticks until quit is requested, then flush the sink.
    pub fn run(&mut self) -> Result<()> {
        info!(
            "scheduler running at {} Hz tick, {} Hz sample rate",
            self.config.tick_rate, self.config.sample_rate
        );
        let tick_time = self.config.tick_time();

        while !self.bus.should_quit() {
            let start = self.clock.now();
            self.step()?;
            let spent = self.clock.now() - start;
            let remaining = tick_time - spent;
            if remaining > 0.0 {
                self.clock.sleep(remaining);
            }
        }

        self.sink.finish()?;
        info!("scheduler stopped");
        Ok(())
    }

    /// One tick without pacing: poll input, render the samples owed since
    /// the last tick and push them to the sink.
    pub fn step(&mut self) -> Result<TickReport> {
        let start = self.clock.now();
        let events = self.bus.process_messages(start, MAX_EVENTS_PER_TICK);

        let period = self.config.sample_period();
        self.accumulator += start - self.last;
        if self.accumulator > self.config.max_lag {
            let skipped = self.accumulator - self.config.max_lag;
            warn!("scheduler fell {skipped:.3}s behind, skipping ahead");
            self.origin += skipped;
            self.accumulator = self.config.max_lag;
        }

        let mut samples = 0;
        while self.accumulator > period {
            samples += 1;
            self.accumulator -= period;
        }

        // multiply rather than accumulate so the cursor never drifts
        let block_start = self.origin + self.rendered as f64 * period;
        self.block.resize(samples, 0.0);
        if samples > 0 {
            self.mixer.render_block(block_start, period, &mut self.block);
            self.sink.push_block(&self.block)?;
        }
        self.rendered += samples as u64;
        self.last = start;

        Ok(TickReport {
            events,
            samples,
            active_notes: self.mixer.pool().len(),
            block_start,
        })
    }
}
