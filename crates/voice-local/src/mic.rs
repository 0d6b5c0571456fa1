//! Default-input microphone capture (cpal)
//!
//! The cpal stream is not `Send`, so it lives on its own thread for the lifetime of the
//! returned [`MicCapture`]. Mono i16 chunks go out on a bounded channel; when the consumer
//! falls behind, chunks are dropped instead of blocking the audio callback.

use crate::EngineError;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::thread::JoinHandle;
use tracing::{debug, info, warn};

const CHUNK_SAMPLES: usize = 2048;
const CHANNEL_DEPTH: usize = 32;

pub struct MicConfig {
    pub sample_rate_hz: u32,
    pub channels: u16,
}

/// Running capture; dropping it stops the stream.
pub struct MicCapture {
    stop_tx: Option<mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl Drop for MicCapture {
    fn drop(&mut self) {
        self.stop_tx.take();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

trait ToMonoI16: cpal::SizedSample + Send + 'static {
    fn to_i16(self) -> i16;
}

impl ToMonoI16 for i16 {
    fn to_i16(self) -> i16 {
        self
    }
}

impl ToMonoI16 for u16 {
    fn to_i16(self) -> i16 {
        (self as i32 - 32768) as i16
    }
}

impl ToMonoI16 for f32 {
    fn to_i16(self) -> i16 {
        (self.clamp(-1.0, 1.0) * 32767.0) as i16
    }
}

/// Start capturing from the default input device.
pub fn start_default_input_i16() -> Result<(MicCapture, MicConfig, Receiver<Vec<i16>>), EngineError>
{
    let (tx, rx) = mpsc::sync_channel::<Vec<i16>>(CHANNEL_DEPTH);
    let (ready_tx, ready_rx) = mpsc::channel::<Result<MicConfig, EngineError>>();
    let (stop_tx, stop_rx) = mpsc::channel::<()>();

    let thread = std::thread::Builder::new()
        .name("mic-capture".into())
        .spawn(move || match open_stream(tx) {
            Ok((stream, config)) => {
                let _ = ready_tx.send(Ok(config));
                // Blocks until the sender half is dropped
                let _ = stop_rx.recv();
                drop(stream);
                debug!("microphone stream closed");
            }
            Err(e) => {
                let _ = ready_tx.send(Err(e));
            }
        })
        .map_err(|e| EngineError::Device(e.to_string()))?;

    let config = ready_rx
        .recv()
        .map_err(|_| EngineError::Device("capture thread exited".into()))??;
    info!(
        sample_rate_hz = config.sample_rate_hz,
        channels = config.channels,
        "microphone started"
    );
    Ok((
        MicCapture {
            stop_tx: Some(stop_tx),
            thread: Some(thread),
        },
        config,
        rx,
    ))
}

fn open_stream(tx: SyncSender<Vec<i16>>) -> Result<(cpal::Stream, MicConfig), EngineError> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| EngineError::Device("no default input device".into()))?;
    let supported = device
        .default_input_config()
        .map_err(|e| EngineError::Device(format!("input config: {e}")))?;
    let config = MicConfig {
        sample_rate_hz: supported.sample_rate().0,
        channels: supported.channels(),
    };
    let channels = config.channels;
    let stream_config: cpal::StreamConfig = supported.config();

    let stream = match supported.sample_format() {
        cpal::SampleFormat::I16 => build_stream::<i16>(&device, &stream_config, channels, tx)?,
        cpal::SampleFormat::U16 => build_stream::<u16>(&device, &stream_config, channels, tx)?,
        cpal::SampleFormat::F32 => build_stream::<f32>(&device, &stream_config, channels, tx)?,
        other => {
            return Err(EngineError::Device(format!(
                "unsupported sample format: {other:?}"
            )))
        }
    };
    stream
        .play()
        .map_err(|e| EngineError::Stream(format!("stream play: {e}")))?;
    Ok((stream, config))
}

fn build_stream<T: ToMonoI16>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    channels: u16,
    tx: SyncSender<Vec<i16>>,
) -> Result<cpal::Stream, EngineError> {
    let mut buf = Vec::<i16>::with_capacity(CHUNK_SAMPLES * 2);
    let channels = channels.max(1) as usize;
    device
        .build_input_stream(
            config,
            move |data: &[T], _| {
                // First channel only
                buf.extend(data.chunks_exact(channels).map(|frame| frame[0].to_i16()));
                if buf.len() >= CHUNK_SAMPLES {
                    let out = std::mem::replace(&mut buf, Vec::with_capacity(CHUNK_SAMPLES * 2));
                    if let Err(TrySendError::Full(_)) = tx.try_send(out) {
                        debug!("audio consumer behind, chunk dropped");
                    }
                }
            },
            |err| warn!(error = %err, "input stream error"),
            None,
        )
        .map_err(|e| EngineError::Stream(e.to_string()))
}
