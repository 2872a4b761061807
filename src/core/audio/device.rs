use anyhow::{anyhow, bail, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample, Stream};
use log::{error, info};

use super::SampleSource;

/// A running cpal output stream. Audio stops when this is dropped.
pub struct OutputStream {
    _stream: Stream,
}

impl OutputStream {
    /// Open the default output device at `sample_rate` and start pulling
    /// mono samples from `source`, copied to every device channel.
    pub fn open<S: SampleSource>(source: S, sample_rate: u32) -> Result<Self> {
        let host = cpal::default_host();
        info!("Using audio host: {}", host.id().name());

        let device = host
            .default_output_device()
            .ok_or_else(|| anyhow!("No output device available"))?;
        info!("Using output device: {}", device.name().unwrap_or_else(|_| "<unnamed>".into()));

        let default_config = device.default_output_config()?;
        let sample_format = default_config.sample_format();
        let config = cpal::StreamConfig {
            channels: default_config.channels(),
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };
        info!(
            "Opening stream: {} Hz, {} channel(s), {:?}",
            sample_rate, config.channels, sample_format
        );

        let stream = match sample_format {
            SampleFormat::F32 => create_stream::<f32, S>(&device, &config, source),
            SampleFormat::I16 => create_stream::<i16, S>(&device, &config, source),
            SampleFormat::U16 => create_stream::<u16, S>(&device, &config, source),
            other => bail!("Unsupported sample format {other:?}"),
        }?;
        stream.play()?;
        info!("Audio stream started");

        Ok(Self { _stream: stream })
    }
}

fn create_stream<T, S>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut source: S,
) -> Result<Stream>
where
    T: Sample + SizedSample + FromSample<f32> + Send + 'static,
    S: SampleSource,
{
    let channels = config.channels as usize;
    let mut mono: Vec<f32> = Vec::with_capacity(4096);
    let err_fn = |err| error!("an error occurred on the audio stream: {err}");

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            let frames = data.len() / channels;
            mono.resize(frames, 0.0);
            source.fill(&mut mono);

            for (frame, &value) in data.chunks_mut(channels).zip(mono.iter()) {
                let value_t = T::from_sample(value);
                for sample in frame.iter_mut() {
                    *sample = value_t;
                }
            }
        },
        err_fn,
        None,
    )?;

    Ok(stream)
}
