use anyhow::Result;

use keysynth::build_scheduler;
use keysynth::config::EngineConfig;
use keysynth::core::audio::{queue_pipeline, ring_pipeline, AudioSink, SampleSource, WavSink};
use keysynth::core::clock::{Clock, ManualClock};
use keysynth::core::keymap::{KeyMap, Tuning};
use keysynth::core::oscillator::Envelope;
use keysynth::core::synth::{Mixer, SharedNotePool, Trigger};
use keysynth::core::voice::{Instrument, VoiceBank, VoiceConfig};
use keysynth::messaging::{InputEvent, MessageBus};

struct Memory {
    rate: u32,
    samples: Vec<f32>,
}

impl Memory {
    fn new(rate: u32) -> Self {
        Self {
            rate,
            samples: Vec::new(),
        }
    }
}

impl AudioSink for Memory {
    fn sample_rate(&self) -> u32 {
        self.rate
    }

    fn push_block(&mut self, block: &[f32]) -> Result<()> {
        self.samples.extend_from_slice(block);
        Ok(())
    }
}

fn piano() -> VoiceConfig {
    VoiceConfig {
        instrument: Instrument::Bell,
        attack: 0.01,
        decay: 0.1,
        release: 0.2,
        start_amplitude: 1.0,
        sustain_amplitude: 0.8,
        volume: 1.0,
    }
}

#[test]
fn note_lifecycle_from_trigger_to_reap() {
    let envelope = Envelope::new(0.01, 0.1, 0.2, 1.0, 0.8).unwrap();
    let pool = SharedNotePool::new(16);
    let voices = VoiceBank::from_configs(&[piano()]).unwrap();
    let mut mixer = Mixer::new(pool.clone(), voices, Tuning::default(), 0.3);

    assert!(matches!(pool.trigger(0, 0.0, 0), Trigger::Started(_)));
    {
        let guard = pool.lock();
        let (_, note) = guard.find(0).unwrap();
        let a = envelope.amplitude(0.005, note.on_time, note.off_time);
        assert!((a - 0.5).abs() < 1e-9);
    }

    mixer.render_sample(0.005);
    assert!(pool.release(0, 0.5));
    mixer.render_sample(0.6);
    assert_eq!(pool.len(), 1);

    {
        let guard = pool.lock();
        let (_, note) = guard.find(0).unwrap();
        assert_eq!(envelope.amplitude(0.7, note.on_time, note.off_time), 0.0);
    }
    assert_eq!(mixer.render_sample(0.7), 0.0);
    assert!(pool.is_empty());
}

#[test]
fn retrigger_mid_release_restarts_attack() {
    let pool = SharedNotePool::new(4);
    let voices = VoiceBank::from_configs(&[piano()]).unwrap();
    let mut mixer = Mixer::new(pool.clone(), voices, Tuning::default(), 1.0);

    pool.trigger(3, 0.0, 0);
    pool.release(3, 0.5);
    mixer.render_sample(0.55);
    assert!(matches!(pool.trigger(3, 0.6, 0), Trigger::Retriggered(_)));

    // well past the original release; the note must still be alive
    mixer.render_sample(1.0);
    let guard = pool.lock();
    let (_, note) = guard.find(3).unwrap();
    assert!(note.is_sounding());
    let envelope = Envelope::new(0.01, 0.1, 0.2, 1.0, 0.8).unwrap();
    assert!((envelope.amplitude(0.605, note.on_time, note.off_time) - 0.5).abs() < 1e-9);
}

#[test]
fn restrike_sharing_the_release_timestamp_keeps_sounding() {
    let mut config = EngineConfig::default();
    config.instruments = vec![piano()];
    let clock = ManualClock::new(0.0);
    let mut scheduler =
        build_scheduler(&config, clock.clone(), Memory::new(config.sample_rate)).unwrap();
    let tx = scheduler.bus().sender();

    tx.send(InputEvent::key_down('z', 0.0)).unwrap();
    clock.advance(1.0);
    scheduler.step().unwrap();

    tx.send(InputEvent::key_up('z', 1.0)).unwrap();
    tx.send(InputEvent::key_down('z', 1.0)).unwrap();
    clock.advance(0.05);
    scheduler.step().unwrap();
    clock.advance(0.5);
    let report = scheduler.step().unwrap();
    assert_eq!(report.active_notes, 1);

    // sustaining at 0.8, so the last block is not silent
    let tail = &scheduler.sink().samples[scheduler.sink().samples.len() - 100..];
    assert!(tail.iter().any(|s| *s != 0.0));
}

#[test]
fn scheduler_plays_keys_through_queue() {
    let config = EngineConfig::default();
    let clock = ManualClock::new(0.0);
    let (sink, mut drain) = queue_pipeline(config.sample_rate, config.queue_blocks);
    let mut scheduler = build_scheduler(&config, clock.clone(), sink).unwrap();
    let tx = scheduler.bus().sender();

    tx.send(InputEvent::key_down('z', 0.0)).unwrap();
    for _ in 0..6 {
        clock.advance(1.0 / 60.0);
        scheduler.step().unwrap();
    }
    assert_eq!(scheduler.mixer().pool().len(), 1);

    let mut out = vec![0.0f32; 4000];
    drain.fill(&mut out);
    assert!(out.iter().any(|s| s.abs() > 0.01));
    assert!(out.iter().all(|s| s.is_finite()));
}

#[test]
fn scheduler_reaps_released_notes_over_time() {
    let mut config = EngineConfig::default();
    config.instruments = vec![piano()];
    let clock = ManualClock::new(0.0);
    let mut scheduler =
        build_scheduler(&config, clock.clone(), Memory::new(config.sample_rate)).unwrap();
    let tx = scheduler.bus().sender();

    tx.send(InputEvent::key_down('z', 0.0)).unwrap();
    tx.send(InputEvent::key_down('x', 0.0)).unwrap();
    clock.advance(0.2);
    scheduler.step().unwrap();

    tx.send(InputEvent::key_up('z', 0.2)).unwrap();
    clock.advance(0.1);
    let report = scheduler.step().unwrap();
    assert_eq!(report.active_notes, 2);

    clock.advance(0.2);
    let report = scheduler.step().unwrap();
    // z is done, x is still held
    assert_eq!(report.active_notes, 1);
    assert!(scheduler.sink().samples.len() >= 22000);
    let pool = scheduler.mixer().pool().lock();
    assert!(pool.find(2).is_some());
}

#[test]
fn pool_capacity_limits_polyphony() {
    let mut config = EngineConfig::default();
    config.pool_capacity = 2;
    let clock = ManualClock::new(0.0);
    let mut scheduler =
        build_scheduler(&config, clock.clone(), Memory::new(config.sample_rate)).unwrap();
    let tx = scheduler.bus().sender();
    for symbol in "zxc".chars() {
        tx.send(InputEvent::key_down(symbol, 0.0)).unwrap();
    }
    clock.advance(0.05);
    let report = scheduler.step().unwrap();
    assert_eq!(report.events, 3);
    assert_eq!(report.active_notes, 2);
    let pool = scheduler.mixer().pool().lock();
    // 'c' maps to key 3 and found no free slot
    assert!(pool.find(3).is_none());
}

#[test]
fn ring_backend_warms_up_before_playing() {
    let config = EngineConfig::default();
    let clock = ManualClock::new(0.0);
    let (sink, mut drain) = ring_pipeline(config.sample_rate, 8192, 2048);
    let mut scheduler = build_scheduler(&config, clock.clone(), sink).unwrap();
    scheduler.bus().sender().send(InputEvent::key_down('v', 0.0)).unwrap();

    clock.advance(0.01);
    scheduler.step().unwrap();
    let mut out = vec![1.0f32; 256];
    drain.fill(&mut out);
    assert!(out.iter().all(|s| *s == 0.0));

    clock.advance(0.05);
    scheduler.step().unwrap();
    drain.fill(&mut out);
    assert!(out.iter().any(|s| *s != 0.0));
}

#[test]
fn run_records_wav_until_quit() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("take.wav");
    let config = EngineConfig::default();
    let clock = ManualClock::new(0.0);
    let sink = WavSink::create(&path, config.sample_rate).unwrap();
    let mut scheduler = build_scheduler(&config, clock.clone(), sink).unwrap();
    let tx = scheduler.bus().sender();

    tx.send(InputEvent::key_down('z', 0.0)).unwrap();
    scheduler.step().unwrap();
    clock.advance(0.1);
    tx.send(InputEvent::Quit).unwrap();
    scheduler.run().unwrap();
    drop(scheduler);

    let reader = hound::WavReader::open(&path).unwrap();
    assert_eq!(reader.spec().sample_rate, 44100);
    assert!(reader.len() >= 4000);
    assert!(clock.now() >= 0.1);
}

#[test]
fn mismatched_sink_rate_is_rejected() {
    let config = EngineConfig::default();
    let result = build_scheduler(&config, ManualClock::new(0.0), Memory::new(48000));
    assert!(result.is_err());
}

#[test]
fn bus_and_mixer_share_one_pool_across_threads() {
    let pool = SharedNotePool::new(16);
    let voices = VoiceBank::from_configs(&[piano()]).unwrap();
    let mut bus = MessageBus::new(pool.clone(), KeyMap::default(), 1);
    let mut mixer = Mixer::new(pool.clone(), voices, Tuning::default(), 0.3);
    let tx = bus.sender();

    let producer = std::thread::spawn(move || {
        for i in 0..200 {
            let t = i as f64 * 0.001;
            tx.send(InputEvent::key_down('z', t)).unwrap();
            tx.send(InputEvent::key_up('z', t + 0.0005)).unwrap();
        }
    });

    let mut block = vec![0.0f32; 64];
    for i in 0..400 {
        bus.process_messages(1.0, 16);
        mixer.render_block(i as f64 * 0.001, 1.0 / 44100.0, &mut block);
    }
    producer.join().unwrap();
    bus.process_messages(1.0, usize::MAX);
    assert!(pool.len() <= 1);
}
