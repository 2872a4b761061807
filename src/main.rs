use anyhow::{anyhow, Result};
use eframe::egui;
use log::{error, info};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::thread;

use keysynth::app::KeyboardApp;
use keysynth::config::{Backend, EngineConfig};
use keysynth::core::audio::{queue_pipeline, ring_pipeline, AudioSink, OutputStream, WavSink};
use keysynth::core::clock::SystemClock;
use keysynth::messaging::InputEvent;

fn main() {
    // RUST_LOG=keysynth=debug for engine diagnostics
    env_logger::init();
    info!("Starting keysynth");

    if let Err(e) = try_main() {
        error!("{e:#}");
        std::process::exit(1);
    }
}

fn try_main() -> Result<()> {
    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = EngineConfig::load_or_default(config_path.as_deref())?;
    info!("Config: {config:?}");

    let clock = SystemClock::new();
    match config.backend {
        Backend::Queue => {
            let (sink, drain) = queue_pipeline(config.sample_rate, config.queue_blocks);
            let stream = OutputStream::open(drain, config.sample_rate)?;
            run(&config, clock, sink, Some(stream))
        }
        Backend::Ring => {
            let (sink, drain) =
                ring_pipeline(config.sample_rate, config.ring_capacity, config.ring_warmup);
            let stream = OutputStream::open(drain, config.sample_rate)?;
            run(&config, clock, sink, Some(stream))
        }
        Backend::Wav => {
            let sink = WavSink::create(&config.wav_path, config.sample_rate)?;
            info!("Recording to {}", config.wav_path.display());
            run(&config, clock, sink, None)
        }
    }
}

/// Run the scheduler on its own thread and the keyboard window on this one
/// until either side asks to quit.
fn run<S>(
    config: &EngineConfig,
    clock: SystemClock,
    sink: S,
    stream: Option<OutputStream>,
) -> Result<()>
where
    S: AudioSink + Send + 'static,
{
    let mut scheduler = keysynth::build_scheduler(config, clock, sink)?;
    let events = scheduler.bus().sender();
    let quit = scheduler.bus().quit_flag();

    let engine_quit = quit.clone();
    let engine = thread::Builder::new()
        .name("scheduler".into())
        .spawn(move || {
            let result = scheduler.run();
            // closes the window if the engine died first
            engine_quit.store(true, Ordering::Release);
            result
        })?;

    let instruments = config.instruments.iter().map(|v| v.instrument).collect();
    let app = KeyboardApp::new(
        events.clone(),
        clock,
        quit.clone(),
        config.keys.clone(),
        instruments,
    );
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size([420.0, 160.0]),
        ..Default::default()
    };
    let window = eframe::run_native("keysynth", options, Box::new(|_cc| Ok(Box::new(app))));

    quit.store(true, Ordering::Release);
    let _ = events.send(InputEvent::Quit);
    let engine_result = engine
        .join()
        .map_err(|_| anyhow!("scheduler thread panicked"))?;
    drop(stream);

    window.map_err(|e| anyhow!("Application error: {e}"))?;
    engine_result
}
