use super::format::AudioFormat;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, SampleRate, StreamConfig};
use ringbuf::{HeapCons, HeapRb, traits::*};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum CaptureError {
    #[error("No usable input device: {0}")]
    DeviceUnavailable(String),

    #[error("Input stream failed: {0}")]
    Stream(String),
}

/// Seam over the platform audio input, so the poll loop can be exercised
/// against a scripted device in tests.
pub trait CaptureDevice {
    /// Open the default input at `format` and start capturing into a buffer
    /// sized for `window`.
    fn open(
        &self,
        format: AudioFormat,
        window: Duration,
    ) -> Result<Box<dyn CaptureHandle>, CaptureError>;
}

/// A running capture. `stop` halts the device and drains what was recorded;
/// dropping the handle releases the device either way.
pub trait CaptureHandle {
    fn stop(self: Box<Self>) -> Vec<u8>;
}

pub struct CpalCaptureDevice;

impl CaptureDevice for CpalCaptureDevice {
    fn open(
        &self,
        format: AudioFormat,
        window: Duration,
    ) -> Result<Box<dyn CaptureHandle>, CaptureError> {
        // The ring is the recording buffer itself: fixed capacity for the
        // whole window, filled lock-free by the audio callback, drained once
        // at stop.
        let ring = HeapRb::<i16>::new(format.samples_for_duration(window.as_secs_f32()));
        let (mut producer, consumer) = ring.split();

        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| CaptureError::DeviceUnavailable("no default input device".into()))?;

        let config = StreamConfig {
            channels: format.channels,
            sample_rate: SampleRate(format.sample_rate),
            buffer_size: BufferSize::Default,
        };

        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _info: &cpal::InputCallbackInfo| {
                    // No allocation or locking here; once the ring is full the
                    // rest of the window is silently dropped.
                    for &sample in data {
                        let amplitude = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
                        if producer.try_push(amplitude).is_err() {
                            break;
                        }
                    }
                },
                move |err| {
                    tracing::warn!("Audio stream error: {}", err);
                },
                None,
            )
            .map_err(|e| CaptureError::Stream(e.to_string()))?;

        stream.play().map_err(|e| CaptureError::Stream(e.to_string()))?;

        Ok(Box::new(CpalCaptureHandle { stream, consumer }))
    }
}

struct CpalCaptureHandle {
    stream: cpal::Stream,
    consumer: HeapCons<i16>,
}

impl CaptureHandle for CpalCaptureHandle {
    fn stop(self: Box<Self>) -> Vec<u8> {
        let CpalCaptureHandle {
            stream,
            mut consumer,
        } = *self;

        // Dropping the stream stops capture and closes the device.
        drop(stream);

        let mut samples = vec![0i16; consumer.occupied_len()];
        let n = consumer.pop_slice(&mut samples);
        samples.truncate(n);

        let mut pcm = Vec::with_capacity(samples.len() * 2);
        for sample in samples {
            pcm.extend_from_slice(&sample.to_le_bytes());
        }
        pcm
    }
}
