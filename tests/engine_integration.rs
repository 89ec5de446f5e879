//! End-to-end tests for the sampling loop.
//!
//! These run the real engine under a manual clock, so a simulated
//! minute finishes in milliseconds of wall time while every tick keeps
//! its exact 5 ms spacing. Effect holds are zeroed so the only thing
//! advancing the clock is the loop's own pacing, which makes onset
//! timestamps and inter-onset intervals fully deterministic.

use std::sync::Arc;
use std::time::Duration;

use beatglow::aggregate::MemorySink;
use beatglow::clock::{Clock, ManualClock};
use beatglow::config::EngineConfig;
use beatglow::effects::RecordingStrip;
use beatglow::engine::{Engine, EngineEventKind, EngineHandle};
use beatglow::error::EngineError;
use beatglow::sensor::{EnvelopeSensor, SyntheticSensor};

/// Deterministic pattern source: a loud 8-tick burst every `period`
/// ticks, silence in between, exhausted after `total` ticks.
struct PatternSensor {
    period: u64,
    burst_ticks: u64,
    total: u64,
    emitted: u64,
}

impl PatternSensor {
    fn new(period: u64, total: u64) -> Self {
        Self {
            period,
            burst_ticks: 8,
            total,
            emitted: 0,
        }
    }
}

impl EnvelopeSensor for PatternSensor {
    fn poll(&mut self) -> Result<Option<u16>, EngineError> {
        if self.emitted >= self.total {
            return Ok(None);
        }
        let level = if self.emitted % self.period < self.burst_ticks {
            // 51200 >> 8 == 200 after normalization
            51_200
        } else {
            0
        };
        self.emitted += 1;
        Ok(Some(level))
    }
}

/// Sensor whose transport dies after a few good ticks.
struct DyingSensor {
    remaining: u32,
}

impl EnvelopeSensor for DyingSensor {
    fn poll(&mut self) -> Result<Option<u16>, EngineError> {
        if self.remaining == 0 {
            return Err(EngineError::SensorFailed {
                reason: "transport dropped".to_string(),
            });
        }
        self.remaining -= 1;
        Ok(Some(0))
    }
}

/// Default config with effect holds zeroed for deterministic timing.
fn instant_effects_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.effects.flash_hold_ms = 0;
    config.effects.pulse_step_ms = 0;
    config
}

#[test]
fn test_full_pipeline_detects_steady_120_bpm() {
    let clock = Arc::new(ManualClock::new());
    let strip = RecordingStrip::new();
    let frames = strip.frames_ref();
    let sink = MemorySink::new();
    let summaries = sink.summaries_ref();

    // 120 BPM at 5 ms ticks: a burst every 100 ticks; 13000 ticks is
    // 65 simulated seconds, one minute boundary
    let sensor = PatternSensor::new(100, 13_000);

    let mut engine = Engine::new(
        instant_effects_config(),
        Box::new(sensor),
        Box::new(strip),
        Box::new(sink),
        Arc::clone(&clock) as Arc<dyn Clock>,
    )
    .expect("engine construction")
    .with_effect_seed(42);

    let mut events = engine.subscribe();
    engine.run().expect("run should end at sensor exhaustion");

    // The loop paced itself through all 13000 ticks of virtual time
    assert!(clock.elapsed() >= Duration::from_secs(65));

    let mut onsets = Vec::new();
    let mut tempos = Vec::new();
    let mut minute_means = Vec::new();
    let mut started = false;
    let mut stopped = false;
    while let Ok(event) = events.try_recv() {
        match event.kind {
            EngineEventKind::Started => started = true,
            EngineEventKind::Onset { level, .. } => onsets.push((event.timestamp_ms, level)),
            EngineEventKind::BpmUpdated { bpm } => tempos.push(bpm),
            EngineEventKind::MinuteSummary { bpm } => minute_means.push(bpm),
            EngineEventKind::Stopped => stopped = true,
        }
    }

    assert!(started, "Started event missing");
    assert!(stopped, "Stopped event missing");

    // One onset per burst; the very first burst cannot fire because the
    // long window has seen nothing but the burst itself
    assert_eq!(onsets.len(), 129, "one onset per burst after the first");
    assert_eq!(onsets[0].0, 500, "first onset fires on the second burst");
    assert_eq!(onsets[1].0, 1000);
    assert!(onsets.iter().all(|(_, level)| *level > 0.0));

    // Every measured interval is exactly 500 ms
    assert_eq!(tempos.len(), 128);
    assert!(
        tempos.iter().all(|bpm| (*bpm - 120.0).abs() < 1e-9),
        "Tempo drifted from 120 BPM: {:?}",
        &tempos[..5.min(tempos.len())]
    );

    // Exactly one minute boundary was crossed, with a steady buffer
    assert_eq!(minute_means, vec![120.0]);
    assert_eq!(summaries.lock().unwrap().len(), 1);
    assert_eq!(summaries.lock().unwrap()[0].bpm, 120.0);

    // Each onset rendered something on the strip
    assert!(!frames.lock().unwrap().is_empty());
}

#[test]
fn test_constant_envelope_never_fires() {
    let clock = Arc::new(ManualClock::new());
    let strip = RecordingStrip::new();
    let frames = strip.frames_ref();

    // Constant loud level: short and long means converge, ratio gate
    // never passes
    struct ConstantSensor {
        remaining: u32,
    }
    impl EnvelopeSensor for ConstantSensor {
        fn poll(&mut self) -> Result<Option<u16>, EngineError> {
            if self.remaining == 0 {
                return Ok(None);
            }
            self.remaining -= 1;
            Ok(Some(51_200))
        }
    }

    let mut engine = Engine::new(
        instant_effects_config(),
        Box::new(ConstantSensor { remaining: 2_000 }),
        Box::new(strip),
        Box::new(MemorySink::new()),
        clock as Arc<dyn Clock>,
    )
    .unwrap();

    let mut events = engine.subscribe();
    engine.run().unwrap();

    while let Ok(event) = events.try_recv() {
        assert!(
            !matches!(event.kind, EngineEventKind::Onset { .. }),
            "Onset fired on a constant envelope"
        );
    }
    assert!(frames.lock().unwrap().is_empty(), "Strip was driven");
}

#[test]
fn test_synthetic_sensor_drives_detection() {
    let clock = Arc::new(ManualClock::new());
    let sensor = SyntheticSensor::new(120, Duration::from_secs(10), 5, 7);

    let mut engine = Engine::new(
        instant_effects_config(),
        Box::new(sensor),
        Box::new(RecordingStrip::new()),
        Box::new(MemorySink::new()),
        clock as Arc<dyn Clock>,
    )
    .unwrap()
    .with_effect_seed(7);

    let mut events = engine.subscribe();
    engine.run().unwrap();

    let mut onset_count = 0;
    let mut tempos = Vec::new();
    while let Ok(event) = events.try_recv() {
        match event.kind {
            EngineEventKind::Onset { .. } => onset_count += 1,
            EngineEventKind::BpmUpdated { bpm } => tempos.push(bpm),
            _ => {}
        }
    }

    // Ten seconds at 120 BPM: 20 bursts, roughly one onset each with
    // the first burst unable to fire against an unprimed long window
    assert!(
        (18..=20).contains(&onset_count),
        "Unexpected onset count {}",
        onset_count
    );
    let last = tempos.last().expect("tempo updates expected");
    assert!(
        (*last - 120.0).abs() < 2.0,
        "Smoothed tempo {:.1} too far from 120",
        last
    );
}

#[test]
fn test_handle_stop_ends_the_loop() {
    let clock = Arc::new(ManualClock::new());
    // Effectively endless pattern
    let sensor = PatternSensor::new(100, u64::MAX);

    let engine = Engine::new(
        instant_effects_config(),
        Box::new(sensor),
        Box::new(RecordingStrip::new()),
        Box::new(MemorySink::new()),
        clock as Arc<dyn Clock>,
    )
    .unwrap();

    let mut events = engine.subscribe();
    let handle = EngineHandle::spawn(engine);

    // Wait until the loop demonstrably runs, then stop it
    loop {
        match events.blocking_recv() {
            Ok(event) => {
                if matches!(event.kind, EngineEventKind::Onset { .. }) {
                    break;
                }
            }
            Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
            Err(other) => panic!("event bus closed early: {:?}", other),
        }
    }

    handle.stop();
    handle.join().expect("stopped run should succeed");
}

#[test]
fn test_sensor_transport_failure_is_fatal() {
    let clock = Arc::new(ManualClock::new());

    let mut engine = Engine::new(
        instant_effects_config(),
        Box::new(DyingSensor { remaining: 10 }),
        Box::new(RecordingStrip::new()),
        Box::new(MemorySink::new()),
        clock as Arc<dyn Clock>,
    )
    .unwrap();

    let mut events = engine.subscribe();
    match engine.run() {
        Err(EngineError::SensorFailed { reason }) => {
            assert!(reason.contains("transport dropped"));
        }
        other => panic!("Expected SensorFailed, got {:?}", other),
    }

    // The loop still announced its shutdown
    let mut stopped = false;
    while let Ok(event) = events.try_recv() {
        if matches!(event.kind, EngineEventKind::Stopped) {
            stopped = true;
        }
    }
    assert!(stopped, "Stopped event missing after fatal sensor error");
}

#[test]
fn test_invalid_config_is_rejected_at_construction() {
    let mut config = instant_effects_config();
    config.detector.long_window = 0;

    let result = Engine::new(
        config,
        Box::new(PatternSensor::new(100, 10)),
        Box::new(RecordingStrip::new()),
        Box::new(MemorySink::new()),
        Arc::new(ManualClock::new()) as Arc<dyn Clock>,
    );

    match result {
        Err(EngineError::ConfigInvalid { reason }) => {
            assert!(reason.contains("long_window"));
        }
        Ok(_) => panic!("Expected ConfigInvalid, got a running engine"),
        Err(other) => panic!("Expected ConfigInvalid, got {:?}", other),
    }
}
