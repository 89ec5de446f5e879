// Live microphone source
//
// A cpal input stream measures one peak magnitude per audio callback
// and publishes it through a lock-free SPSC ring. The sampling loop
// polls at its own cadence: each poll drains the ring to the freshest
// level and, between callbacks, keeps reporting the last one - the same
// read-what-is-there semantics as a polled ADC.
//
// cpal streams are not Send, so the stream lives on a dedicated holder
// thread that parks until the sensor is dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use rtrb::Consumer;

use crate::error::EngineError;
use crate::sensor::EnvelopeSensor;

/// Capacity of the callback-to-loop level ring
const LEVEL_RING_CAPACITY: usize = 64;

/// Envelope source backed by the default input device
pub struct MicSensor {
    levels: Consumer<f32>,
    last_level: u16,
    stop: Arc<AtomicBool>,
    failed: Arc<AtomicBool>,
    holder: Option<JoinHandle<()>>,
}

impl MicSensor {
    /// Open the default input device and start capturing
    pub fn open() -> Result<Self, EngineError> {
        let (mut producer, levels) = rtrb::RingBuffer::<f32>::new(LEVEL_RING_CAPACITY);
        let stop = Arc::new(AtomicBool::new(false));
        let failed = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), EngineError>>();

        let stop_holder = Arc::clone(&stop);
        let failed_holder = Arc::clone(&failed);
        let holder = std::thread::spawn(move || {
            let failed_cb = Arc::clone(&failed_holder);
            let stream = match build_input_stream(
                move |peak| {
                    // Ring full means the loop is behind; dropping the
                    // stale peak is fine, a fresher one follows
                    let _ = producer.push(peak);
                },
                move || failed_cb.store(true, Ordering::SeqCst),
            ) {
                Ok(stream) => stream,
                Err(err) => {
                    let _ = ready_tx.send(Err(err));
                    return;
                }
            };

            if let Err(err) = stream.play() {
                let _ = ready_tx.send(Err(EngineError::StreamOpenFailed {
                    reason: format!("failed to start input stream: {err}"),
                }));
                return;
            }

            let _ = ready_tx.send(Ok(()));

            while !stop_holder.load(Ordering::SeqCst) && !failed_holder.load(Ordering::SeqCst) {
                std::thread::sleep(Duration::from_millis(20));
            }
            drop(stream);
        });

        let startup = ready_rx
            .recv()
            .map_err(|_| EngineError::StreamOpenFailed {
                reason: "input stream holder exited before reporting readiness".to_string(),
            })?;
        if let Err(err) = startup {
            let _ = holder.join();
            return Err(err);
        }

        log::info!("[Mic] input stream started");
        Ok(Self {
            levels,
            last_level: 0,
            stop,
            failed,
            holder: Some(holder),
        })
    }
}

impl EnvelopeSensor for MicSensor {
    fn poll(&mut self) -> Result<Option<u16>, EngineError> {
        if self.failed.load(Ordering::SeqCst) {
            return Err(EngineError::SensorFailed {
                reason: "input stream reported an error".to_string(),
            });
        }

        // Drain to the freshest callback peak; hold the previous level
        // if no callback landed since the last tick
        let mut latest = None;
        while let Ok(peak) = self.levels.pop() {
            latest = Some(peak);
        }
        if let Some(peak) = latest {
            self.last_level = (peak.clamp(0.0, 1.0) * 65_535.0) as u16;
        }

        Ok(Some(self.last_level))
    }
}

impl Drop for MicSensor {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(holder) = self.holder.take() {
            let _ = holder.join();
        }
    }
}

fn build_input_stream(
    mut on_peak: impl FnMut(f32) + Send + 'static,
    on_error: impl Fn() + Send + 'static,
) -> Result<cpal::Stream, EngineError> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| EngineError::StreamOpenFailed {
            reason: "no default input device found".to_string(),
        })?;

    let config = device
        .default_input_config()
        .map_err(|err| EngineError::StreamOpenFailed {
            reason: format!("failed to get default input config: {err:?}"),
        })?;

    let stream_config: cpal::StreamConfig = config.clone().into();
    let channels = stream_config.channels as usize;

    let err_fn = move |err| {
        log::error!("[Mic] input stream error: {}", err);
        on_error();
    };

    let stream = match config.sample_format() {
        cpal::SampleFormat::F32 => device.build_input_stream(
            &stream_config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                // First channel only; peak magnitude over the callback
                let peak = data
                    .iter()
                    .step_by(channels.max(1))
                    .fold(0.0_f32, |acc, sample| acc.max(sample.abs()));
                on_peak(peak);
            },
            err_fn,
            None,
        ),
        other => {
            return Err(EngineError::StreamOpenFailed {
                reason: format!("unsupported input sample format {other:?}"),
            })
        }
    }
    .map_err(|err| EngineError::StreamOpenFailed {
        reason: format!("{err:?}"),
    })?;

    Ok(stream)
}

/// Names of every available input device on the default host
pub fn list_input_devices() -> Result<Vec<String>, EngineError> {
    let host = cpal::default_host();
    let devices = host
        .input_devices()
        .map_err(|err| EngineError::StreamOpenFailed {
            reason: format!("failed to enumerate input devices: {err}"),
        })?;

    Ok(devices
        .map(|device| {
            device
                .name()
                .unwrap_or_else(|_| "<unnamed device>".to_string())
        })
        .collect())
}
