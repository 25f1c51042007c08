//! End-to-end tests for the coordinator, queue and worker pool.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};
use vhue_color::{apply_serial, HueShift, Identity, PixelTransform};
use vhue_core::{partition, Chunk, Error, ImageBuffer, Result};
use vhue_pool::{Coordinator, CoordinatorState, Frame, PipelineConfig};

/// Deterministic pseudo-random pixels.
fn noise(width: usize, height: usize, channels: usize, seed: u32) -> Arc<ImageBuffer> {
    let mut state = seed.wrapping_mul(2_654_435_761).max(1);
    let data = (0..width * height * channels)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            (state >> 24) as u8
        })
        .collect();
    Arc::new(ImageBuffer::from_raw(width, height, channels, data).unwrap())
}

fn coordinator<T: PixelTransform + 'static>(workers: usize, transform: T) -> Coordinator {
    let config = PipelineConfig {
        worker_count: Some(workers),
        ..Default::default()
    };
    Coordinator::new(config, transform).unwrap()
}

/// Blocks the first pixel it sees until `gate` fires, is dropped or a
/// second passes.
struct Gated {
    gate: Receiver<()>,
    held: AtomicBool,
}

impl PixelTransform for Gated {
    fn apply(&self, rgb: [u8; 3], _angle: f32) -> [u8; 3] {
        if !self.held.swap(true, Ordering::SeqCst) {
            let _ = self.gate.recv_timeout(Duration::from_secs(1));
        }
        rgb
    }
}

/// Announces that it holds a chunk, then blocks like [`Gated`].
struct Announced {
    started: Sender<()>,
    gated: Gated,
}

impl PixelTransform for Announced {
    fn apply(&self, rgb: [u8; 3], angle: f32) -> [u8; 3] {
        if !self.gated.held.load(Ordering::SeqCst) {
            let _ = self.started.send(());
        }
        self.gated.apply(rgb, angle)
    }
}

// ============================================================================
// Partition and reassembly
// ============================================================================

#[test]
fn identity_round_trips_for_every_worker_count() {
    let src = noise(5, 12, 3, 1);
    for workers in 1..=12 {
        let mut coord = coordinator(workers, Identity);
        let out = coord.render_at(&src, 0.0).unwrap();
        assert_eq!(out, *src, "workers = {workers}");
        coord.shutdown().unwrap();
    }
}

#[test]
fn zero_angle_hue_shift_is_exact() {
    let src = noise(7, 9, 4, 2);
    let mut coord = coordinator(4, HueShift);
    assert_eq!(coord.render_at(&src, 0.0).unwrap(), *src);
}

#[test]
fn full_rotation_returns_original() {
    let src = noise(6, 6, 3, 3);
    let mut coord = coordinator(3, HueShift);
    assert_eq!(coord.render_at(&src, 360.0).unwrap(), *src);
    assert_eq!(coord.render_at(&src, -720.0).unwrap(), *src);
}

#[test]
fn worker_count_does_not_change_output() {
    let height = 17;
    let src = noise(11, height, 4, 4);
    let mut expected = (*src).clone();
    apply_serial(&mut expected, &HueShift, 77.0);

    for workers in [1, 2, 7, height, height + 5] {
        let mut coord = coordinator(workers, HueShift);
        let out = coord.render_at(&src, 77.0).unwrap();
        assert_eq!(out, expected, "workers = {workers}");
        assert!(coord.layout().unwrap().len() <= height);
    }
}

#[test]
fn small_image_two_workers() {
    let data: Vec<u8> = (0..24).collect();
    let src = Arc::new(ImageBuffer::from_raw(4, 2, 3, data.clone()).unwrap());

    assert_eq!(
        partition(2, 2).unwrap(),
        vec![
            Chunk { index: 0, row_start: 0, row_count: 1 },
            Chunk { index: 1, row_start: 1, row_count: 1 },
        ]
    );

    let mut coord = coordinator(2, Identity);
    let out = coord.render_at(&src, 0.0).unwrap();
    assert_eq!(out.into_raw(), data);
}

#[test]
fn dimension_change_recomputes_layout() {
    let mut coord = coordinator(4, HueShift);
    let small = noise(3, 4, 3, 5);
    let large = noise(8, 21, 3, 6);

    for src in [&small, &large, &small] {
        let mut expected = (**src).clone();
        apply_serial(&mut expected, &HueShift, 200.0);
        assert_eq!(coord.render_at(src, 200.0).unwrap(), expected);
        assert_eq!(coord.layout().unwrap().height(), src.height());
    }
}

#[test]
fn bounded_queue_matches_serial() {
    let config = PipelineConfig {
        worker_count: Some(6),
        queue_capacity: Some(1),
        rotation_step: 47.0,
        frame_count: Some(5),
        ..Default::default()
    };
    let src = noise(5, 13, 3, 11);
    let mut coord = Coordinator::new(config, HueShift).unwrap();

    let mut checked = 0;
    let summary = coord
        .run(Arc::clone(&src), &mut |f: &Frame| -> Result<()> {
            let mut expected = (*src).clone();
            apply_serial(&mut expected, &HueShift, f.angle);
            assert_eq!(f.image, expected, "frame {}", f.index);
            checked += 1;
            Ok(())
        })
        .unwrap();

    assert_eq!(summary.frames, 5);
    assert_eq!(checked, 5);
    assert_eq!(coord.layout().unwrap().len(), 6);
}

// ============================================================================
// Frame loop
// ============================================================================

#[test]
fn frames_follow_rotation_step() {
    let config = PipelineConfig {
        worker_count: Some(3),
        rotation_step: 3.6,
        frame_count: Some(100),
        ..Default::default()
    };
    let src = noise(4, 5, 3, 7);
    let mut coord = Coordinator::new(config, HueShift).unwrap();

    let mut last: Option<Frame> = None;
    let summary = coord
        .run(Arc::clone(&src), &mut |f: &Frame| -> Result<()> {
            if f.index == 25 {
                let mut expected = (*src).clone();
                apply_serial(&mut expected, &HueShift, f.angle);
                assert_eq!(f.image, expected);
            }
            last = Some(f.clone());
            Ok(())
        })
        .unwrap();

    assert_eq!(summary.frames, 100);
    let last = last.unwrap();
    assert_eq!(last.index, 99);
    approx::assert_abs_diff_eq!(last.angle, 356.4, epsilon = 1e-2);
    // 100 steps of 3.6 land back on 0, give or take rounding at the wrap
    assert!(summary.final_angle < 1e-2 || summary.final_angle > 360.0 - 1e-2);
}

#[test]
fn cancel_from_another_thread() {
    let config = PipelineConfig {
        worker_count: Some(2),
        run_forever: true,
        ..Default::default()
    };
    let mut coord = Coordinator::new(config, HueShift).unwrap();
    let token = coord.cancel_token();
    let (seen_tx, seen_rx) = unbounded();

    let canceller = std::thread::spawn(move || {
        for _ in 0..5 {
            seen_rx.recv().unwrap();
        }
        token.cancel();
    });

    let summary = coord
        .run(noise(16, 16, 3, 8), &mut |f: &Frame| -> Result<()> {
            let _ = seen_tx.send(f.index);
            Ok(())
        })
        .unwrap();
    canceller.join().unwrap();

    assert!(summary.cancelled);
    assert!(summary.frames >= 5);
    assert_eq!(coord.state(), CoordinatorState::ShuttingDown);
}

#[test]
fn cancel_while_chunk_in_flight() {
    let (open, gate) = unbounded();
    let (started_tx, started_rx) = unbounded();
    let config = PipelineConfig {
        worker_count: Some(2),
        run_forever: true,
        ..Default::default()
    };
    let transform = Announced {
        started: started_tx,
        gated: Gated {
            gate,
            held: AtomicBool::new(false),
        },
    };
    let mut coord = Coordinator::new(config, transform).unwrap();
    let token = coord.cancel_token();

    let canceller = std::thread::spawn(move || {
        started_rx.recv().unwrap();
        token.cancel();
        std::thread::sleep(Duration::from_millis(20));
        let _ = open.send(());
    });

    let mut emitted = 0;
    let summary = coord
        .run(noise(4, 8, 3, 12), &mut |_: &Frame| -> Result<()> {
            emitted += 1;
            Ok(())
        })
        .unwrap();
    canceller.join().unwrap();

    // The held chunk finished after cancel and was never reassembled
    assert!(summary.cancelled);
    assert_eq!(summary.frames, 0);
    assert_eq!(emitted, 0);
    assert_eq!(coord.state(), CoordinatorState::ShuttingDown);
    assert!(matches!(coord.render_at(&noise(4, 8, 3, 12), 0.0), Err(Error::Cancelled)));
}

#[test]
fn pause_holds_run_between_frames() {
    let config = PipelineConfig {
        worker_count: Some(2),
        frame_count: Some(3),
        rotation_step: 10.0,
        ..Default::default()
    };
    let mut coord = Coordinator::new(config, HueShift).unwrap();
    let token = coord.cancel_token();
    let (seen_tx, seen_rx) = unbounded();

    let controller = {
        let token = token.clone();
        std::thread::spawn(move || {
            assert_eq!(seen_rx.recv().unwrap(), 0);
            // Paused after frame 0: nothing more arrives until resume
            assert!(token.is_paused());
            assert!(seen_rx.recv_timeout(Duration::from_millis(100)).is_err());
            token.resume();
            let rest: Vec<u64> = seen_rx.iter().collect();
            assert_eq!(rest, vec![1, 2]);
        })
    };

    let summary = coord
        .run(noise(4, 4, 3, 13), &mut |f: &Frame| -> Result<()> {
            if f.index == 0 {
                token.pause();
            }
            let _ = seen_tx.send(f.index);
            Ok(())
        })
        .unwrap();
    drop(seen_tx);
    controller.join().unwrap();

    assert!(!summary.cancelled);
    assert_eq!(summary.frames, 3);
}

// ============================================================================
// Deadlines
// ============================================================================

#[test]
fn missing_result_times_out_without_emitting() {
    let (open, gate) = unbounded();
    let config = PipelineConfig {
        worker_count: Some(1),
        frame_count: Some(3),
        collect_timeout_ms: Some(50),
        ..Default::default()
    };
    let transform = Gated {
        gate,
        held: AtomicBool::new(false),
    };
    let mut coord = Coordinator::new(config, transform).unwrap();

    let mut emitted = 0;
    let err = coord
        .run(noise(3, 3, 3, 9), &mut |_: &Frame| -> Result<()> {
            emitted += 1;
            Ok(())
        })
        .unwrap_err();

    assert!(matches!(err, Error::Timeout { received: 0, expected: 1, .. }), "{err:?}");
    assert!(err.is_recoverable());
    assert_eq!(emitted, 0);
    assert_eq!(coord.state(), CoordinatorState::Idle);

    // Workers survive the timeout, so the same frame can be rendered again
    let src = noise(3, 3, 3, 9);
    open.send(()).unwrap();
    let mut retry = None;
    for _ in 0..50 {
        match coord.render_frame(&src) {
            Ok(frame) => {
                retry = Some(frame);
                break;
            }
            Err(e) if e.is_recoverable() => std::thread::sleep(Duration::from_millis(10)),
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    let frame = retry.unwrap();
    assert_eq!(frame.index, 0);
    assert_eq!(frame.image, *src);
    coord.shutdown().unwrap();
}

#[test]
fn timed_out_frame_can_be_retried() {
    let (open, gate) = unbounded();
    let config = PipelineConfig {
        worker_count: Some(1),
        collect_timeout_ms: Some(50),
        ..Default::default()
    };
    let transform = Gated {
        gate,
        held: AtomicBool::new(false),
    };
    let mut coord = Coordinator::new(config, transform).unwrap();
    let src = noise(2, 3, 3, 10);

    let err = coord.render_frame(&src).unwrap_err();
    assert!(matches!(err, Error::Timeout { .. }));
    assert_eq!(coord.state(), CoordinatorState::Idle);
    assert_eq!(coord.angle(), 0.0);

    // Release the stuck chunk: its late result must be discarded
    open.send(()).unwrap();
    let mut retry = None;
    for _ in 0..50 {
        match coord.render_frame(&src) {
            Ok(frame) => {
                retry = Some(frame);
                break;
            }
            Err(e) if e.is_recoverable() => std::thread::sleep(Duration::from_millis(10)),
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    let frame = retry.unwrap();
    assert_eq!(frame.index, 0);
    assert_eq!(frame.image, *src);
    coord.shutdown().unwrap();
}
