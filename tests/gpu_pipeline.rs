//! End-to-end compute graph tests. Skipped when no GPU adapter is available.

use std::sync::Arc;

use approx::assert_abs_diff_eq;
use glam::Vec3;

use baryon::audio::{AudioFeatureRecord, SourceState};
use baryon::clock::ClockSource;
use baryon::compute::{readback, FrameInputs, GpuContext, ParticlePipeline, StateKind};
use baryon::field::{band_gain, evaluate_blended, pitch_mode_shift, FieldModulation, WaveComponent};
use baryon::params::{Config, MovementMode, ParticleParameters, MAX_WAVE_COMPONENTS};
use baryon::particles::{find_attractor, step_particle, MotionFrame, ZeroPointParams};
use baryon::{ParameterUpdate, Session};

fn context() -> Option<Arc<GpuContext>> {
    match GpuContext::new_blocking() {
        Ok(ctx) => Some(Arc::new(ctx)),
        Err(e) => {
            eprintln!("skipping GPU test: {}", e);
            None
        }
    }
}

fn small_params() -> ParticleParameters {
    ParticleParameters {
        count: 1000,
        ..ParticleParameters::default()
    }
}

fn waves() -> Vec<WaveComponent> {
    vec![
        WaveComponent::new(2.0, 1, 2, 3),
        WaveComponent::new(1.0, 4, 1, 2),
        WaveComponent::new(1.5, 3, 3, 1),
    ]
}

fn run_frames(pipeline: &mut ParticlePipeline, frames: usize, audio_active: bool) {
    let records = [AudioFeatureRecord {
        pitch_hz: 440.0,
        confidence: 0.9,
        rms: 0.3,
    }; 5];
    let spectrum = vec![0.5; 2048];
    for i in 0..frames {
        pipeline.dispatch(&FrameInputs {
            time: i as f64 / 60.0,
            dt: 1.0 / 60.0,
            records: &records,
            spectrum: &spectrum,
            amplitude: 0.4,
            audio_active,
        });
    }
}

#[test]
fn test_particles_stay_within_radius() {
    let Some(ctx) = context() else { return };

    for mode in [MovementMode::Quickest, MovementMode::Smoothed] {
        let params = ParticleParameters {
            movement_mode: mode,
            ..small_params()
        };
        let limit = params.radius * params.distance_tolerance + 1e-3;
        let mut pipeline = ParticlePipeline::new(Arc::clone(&ctx), params.clone(), waves(), 5, 2048).unwrap();
        run_frames(&mut pipeline, 30, true);

        let texels = readback::read_texture(&ctx, pipeline.output_texture()).unwrap();
        for t in &texels[..params.count] {
            let len = (t[0] * t[0] + t[1] * t[1] + t[2] * t[2]).sqrt();
            assert!(len <= limit, "{:?} particle at distance {}", mode, len);
        }
    }
}

#[test]
fn test_scalar_field_bounded_by_amplitude_sum() {
    let Some(ctx) = context() else { return };

    let params = small_params();
    let mut pipeline = ParticlePipeline::new(Arc::clone(&ctx), params.clone(), waves(), 5, 2048).unwrap();
    run_frames(&mut pipeline, 3, true);

    let bound: f32 = waves().iter().map(|c| c.amplitude).sum();
    let field = readback::read_texture(&ctx, pipeline.state_texture(StateKind::ScalarField)).unwrap();
    for t in &field[..params.count] {
        assert!(t[0].abs() <= bound + 1e-3, "field value {} above bound {}", t[0], bound);
    }
}

#[test]
fn test_silent_frames_return_toward_rest() {
    let Some(ctx) = context() else { return };

    let params = ParticleParameters {
        particle_speed: 10.0,
        ..small_params()
    };
    let mut pipeline = ParticlePipeline::new(Arc::clone(&ctx), params.clone(), waves(), 5, 2048).unwrap();
    run_frames(&mut pipeline, 120, false);

    let rest = readback::read_texture(&ctx, pipeline.rest_texture()).unwrap();
    let out = readback::read_texture(&ctx, pipeline.output_texture()).unwrap();
    for (r, p) in rest.iter().zip(out.iter()).take(params.count) {
        let d = ((r[0] - p[0]).powi(2) + (r[1] - p[1]).powi(2) + (r[2] - p[2]).powi(2)).sqrt();
        assert!(d < 1e-2, "particle {} away from rest", d);
    }
}

#[test]
fn test_rejected_parameters_keep_previous() {
    let Some(ctx) = context() else { return };

    let mut pipeline = ParticlePipeline::new(Arc::clone(&ctx), small_params(), waves(), 5, 2048).unwrap();
    let bad = ParticleParameters {
        count: 0,
        ..small_params()
    };
    assert!(pipeline.set_parameters(bad).is_err());
    assert_eq!(pipeline.params().count, 1000);

    let grown = ParticleParameters {
        count: 5000,
        ..small_params()
    };
    pipeline.set_parameters(grown).unwrap();
    assert_eq!(pipeline.params().count, 5000);
    run_frames(&mut pipeline, 2, true);
    assert_eq!(pipeline.frame(), 2);
}

fn xyz(t: &[f32; 4]) -> Vec3 {
    Vec3::new(t[0], t[1], t[2])
}

fn read(ctx: &GpuContext, pipeline: &ParticlePipeline, kind: StateKind) -> Vec<[f32; 4]> {
    readback::read_texture(ctx, pipeline.state_texture(kind)).unwrap()
}

const TONE: [AudioFeatureRecord; 2] = [
    AudioFeatureRecord {
        pitch_hz: 440.0,
        confidence: 0.9,
        rms: 0.3,
    },
    AudioFeatureRecord {
        pitch_hz: 440.0,
        confidence: 0.9,
        rms: 0.2,
    },
];

fn inputs<'a>(records: &'a [AudioFeatureRecord], spectrum: &'a [f32], time: f64, dt: f64) -> FrameInputs<'a> {
    FrameInputs {
        time,
        dt,
        records,
        spectrum,
        amplitude: 0.4,
        audio_active: true,
    }
}

#[test]
fn test_audio_data_stage_matches_records() {
    let Some(ctx) = context() else { return };

    let params = small_params();
    let mut pipeline = ParticlePipeline::new(Arc::clone(&ctx), params, waves(), 5, 2048).unwrap();
    let records = [
        AudioFeatureRecord {
            pitch_hz: 200.0,
            confidence: 0.5,
            rms: 0.1,
        },
        AudioFeatureRecord {
            pitch_hz: 400.0,
            confidence: 1.0,
            rms: 0.2,
        },
    ];
    let spectrum: Vec<f32> = (0..2048).map(|i| i as f32 / 2048.0).collect();
    pipeline.dispatch(&inputs(&records, &spectrum, 0.0, 1.0 / 60.0));

    let audio = read(&ctx, &pipeline, StateKind::AudioData);
    let total = audio.len();
    for (index, texel) in audio.iter().enumerate() {
        assert_abs_diff_eq!(texel[0], 500.0 / 1.5, epsilon = 1e-2);
        assert_abs_diff_eq!(texel[1], 0.75, epsilon = 1e-5);
        let bin = ((index as f32 / total as f32 * 2048.0) as usize).min(2047);
        assert_abs_diff_eq!(texel[2], spectrum[bin], epsilon = 1e-3);
        assert_abs_diff_eq!(texel[3], records[1].log_rms(), epsilon = 1e-5);
    }
}

#[test]
fn test_scalar_field_stage_matches_cpu_field() {
    let Some(ctx) = context() else { return };

    let params = small_params();
    let mut pipeline = ParticlePipeline::new(Arc::clone(&ctx), params.clone(), waves(), 5, 2048).unwrap();
    let spectrum = vec![0.5; 2048];
    pipeline
        .set_wave_components(vec![WaveComponent::new(2.5, 2, 1, 4), WaveComponent::new(1.0, 5, 5, 2)], 1.0)
        .unwrap();
    pipeline.dispatch(&inputs(&TONE, &spectrum, 0.0, 0.25));

    let waves_now = pipeline.waves();
    assert_abs_diff_eq!(waves_now.blend(), 0.25);
    let modulation = FieldModulation {
        gains: [band_gain(0.5, params.audio_influence); MAX_WAVE_COMPONENTS],
        mode_shift: pitch_mode_shift(440.0, 0.9, params.pitch_mode_scale, params.min_confidence),
    };
    assert_eq!(modulation.mode_shift, 2);

    let rest = readback::read_texture(&ctx, pipeline.rest_texture()).unwrap();
    let field = read(&ctx, &pipeline, StateKind::ScalarField);
    for (r, f) in rest.iter().zip(field.iter()).take(params.count) {
        let expected = evaluate_blended(
            waves_now.current(),
            waves_now.target(),
            waves_now.blend(),
            xyz(r),
            &modulation,
        );
        assert_abs_diff_eq!(f[0], expected, epsilon = 2e-2);
        assert_eq!(f[2], 2.0);
    }
}

#[test]
fn test_zero_point_stage_matches_cpu_search() {
    let Some(ctx) = context() else { return };

    let params = ParticleParameters {
        threshold: 0.3,
        surface_threshold: 0.1,
        ..small_params()
    };
    let mut pipeline = ParticlePipeline::new(Arc::clone(&ctx), params.clone(), waves(), 5, 2048).unwrap();
    let spectrum = vec![0.5; 2048];
    pipeline.dispatch(&inputs(&TONE, &spectrum, 0.0, 1.0 / 60.0));

    let rest = readback::read_texture(&ctx, pipeline.rest_texture()).unwrap();
    let values: Vec<f32> = read(&ctx, &pipeline, StateKind::ScalarField)
        .iter()
        .take(params.count)
        .map(|t| t[0])
        .collect();
    let zero_points = read(&ctx, &pipeline, StateKind::ZeroPoints);
    let zero = ZeroPointParams::from_params(&params);

    let mut found = 0;
    for index in 0..params.count {
        let gpu = &zero_points[index];
        match find_attractor(index as u32, &values, &rest[..params.count], &zero) {
            Some(attractor) => {
                found += 1;
                assert_eq!(gpu[3], 1.0, "particle {} lost its attractor", index);
                let own = xyz(&rest[index]);
                assert_abs_diff_eq!(xyz(gpu).distance(own), attractor.distance(own), epsilon = 1e-4);
            }
            None => assert_eq!(gpu[3], 0.0, "particle {} gained an attractor", index),
        }
    }
    assert!(found > 0);
}

#[test]
fn test_smaller_threshold_gives_subset_of_zero_points() {
    let Some(ctx) = context() else { return };

    let wide = ParticleParameters {
        threshold: 0.4,
        surface_threshold: 0.2,
        ..small_params()
    };
    let narrow = ParticleParameters {
        threshold: 0.2,
        surface_threshold: 0.1,
        ..wide.clone()
    };
    let spectrum = vec![0.5; 2048];
    let mut pipeline = ParticlePipeline::new(Arc::clone(&ctx), wide.clone(), waves(), 5, 2048).unwrap();

    pipeline.dispatch(&inputs(&TONE, &spectrum, 0.0, 0.0));
    let rest = readback::read_texture(&ctx, pipeline.rest_texture()).unwrap();
    let at_wide = read(&ctx, &pipeline, StateKind::ZeroPoints);

    pipeline.set_parameters(narrow).unwrap();
    pipeline.dispatch(&inputs(&TONE, &spectrum, 0.0, 0.0));
    let at_narrow = read(&ctx, &pipeline, StateKind::ZeroPoints);

    let on_band = |t: &[f32; 4], r: &[f32; 4]| t[3] == 1.0 && xyz(t) == xyz(r);
    let mut narrow_count = 0;
    for i in 0..wide.count {
        if on_band(&at_narrow[i], &rest[i]) {
            narrow_count += 1;
            assert!(on_band(&at_wide[i], &rest[i]), "particle {} valid only at the smaller threshold", i);
        }
        if at_narrow[i][3] == 1.0 {
            assert_eq!(at_wide[i][3], 1.0);
        }
    }
    let wide_count = (0..wide.count).filter(|&i| on_band(&at_wide[i], &rest[i])).count();
    assert!(narrow_count <= wide_count);
}

#[test]
fn test_particle_stage_matches_cpu_step() {
    let Some(ctx) = context() else { return };

    for mode in [MovementMode::Quickest, MovementMode::Smoothed] {
        let params = ParticleParameters {
            movement_mode: mode,
            threshold: 0.3,
            ..small_params()
        };
        let mut pipeline = ParticlePipeline::new(Arc::clone(&ctx), params.clone(), waves(), 5, 2048).unwrap();
        let spectrum = vec![0.5; 2048];
        pipeline.dispatch(&inputs(&TONE, &spectrum, 0.0, 1.0 / 60.0));
        let previous = read(&ctx, &pipeline, StateKind::Particles);

        let (time, dt) = (0.5f64, 1.0f64 / 30.0);
        pipeline.dispatch(&inputs(&TONE, &spectrum, time, dt));
        let rest = readback::read_texture(&ctx, pipeline.rest_texture()).unwrap();
        let zero_points = read(&ctx, &pipeline, StateKind::ZeroPoints);
        let moved = read(&ctx, &pipeline, StateKind::Particles);

        let frame = MotionFrame {
            time: time as f32,
            dt: dt as f32,
            active: true,
        };
        for i in 0..params.count {
            let attractor = (zero_points[i][3] > 0.5).then(|| xyz(&zero_points[i]));
            let expected = step_particle(xyz(&previous[i]), xyz(&rest[i]), attractor, &params, &frame);
            assert!(
                xyz(&moved[i]).distance(expected) < 1e-3,
                "{:?} particle {} at {:?}, expected {:?}",
                mode,
                i,
                xyz(&moved[i]),
                expected
            );
        }
    }
}

#[test]
fn test_zero_dt_frame_holds_every_stage() {
    let Some(ctx) = context() else { return };

    let mut pipeline = ParticlePipeline::new(Arc::clone(&ctx), small_params(), waves(), 5, 2048).unwrap();
    let spectrum = vec![0.5; 2048];
    run_frames(&mut pipeline, 5, true);

    pipeline.dispatch(&inputs(&TONE, &spectrum, 1.0, 0.0));
    let before: Vec<_> = StateKind::ALL.iter().map(|&k| read(&ctx, &pipeline, k)).collect();
    pipeline.dispatch(&inputs(&TONE, &spectrum, 1.0, 0.0));
    let after: Vec<_> = StateKind::ALL.iter().map(|&k| read(&ctx, &pipeline, k)).collect();

    for (kind, (a, b)) in StateKind::ALL.iter().zip(before.iter().zip(after.iter())) {
        for (x, y) in a.iter().zip(b.iter()) {
            for c in 0..4 {
                assert!((x[c] - y[c]).abs() <= 1e-6, "{} changed on a zero-dt frame", kind.name());
            }
        }
    }
}

#[test]
fn test_session_tick_feeds_clock_into_pipeline() {
    let Some(ctx) = context() else { return };

    let mut config = Config::default();
    config.particles.count = 1000;
    let mut session = Session::new(Arc::clone(&ctx), &config).unwrap();

    let first = session.tick(2.0, 0.0);
    assert_eq!(first.source, ClockSource::Wall);
    assert_eq!(first.time, 2.0);

    session.randomize_waves().unwrap();
    assert!(session.pipeline().waves().is_active());
    let second = session.tick(2.25, 0.25);
    assert_eq!(second.delta, 0.25);
    assert_abs_diff_eq!(session.pipeline().waves().blend(), 0.25);

    let diag = session.diagnostics();
    assert_eq!(diag.frame, 2);
    assert_eq!(diag.sources, SourceState::Neither);
    assert_eq!(diag.particle_count, 1000);
    assert!(session.latest_records().is_empty());

    let rejected = ParameterUpdate {
        radius: Some(-1.0),
        ..Default::default()
    };
    assert!(session.set_parameters(&rejected).is_err());
    assert_eq!(session.pipeline().params().radius, config.particles.radius);
}
