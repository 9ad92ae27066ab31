use std::sync::{Arc, Mutex};

use approx::assert_abs_diff_eq;
use cuestream::nodes::{FadeCurve, FadeOutcome, FadingPanner, SamplePlayer};
use cuestream::StreamNode;

/// Constant 1.0 at 1 kHz, so every output sample is the volume at that frame.
fn ones(frames: usize, channels: usize) -> SamplePlayer {
    SamplePlayer::new(vec![1.0; frames * channels], channels, 1000)
}

fn recorder() -> (Arc<Mutex<Vec<FadeOutcome>>>, impl Fn() -> Box<dyn FnOnce(FadeOutcome) + Send>) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = log.clone();
    let make = move || {
        let sink = sink.clone();
        Box::new(move |outcome: FadeOutcome| sink.lock().unwrap().push(outcome)) as Box<dyn FnOnce(FadeOutcome) + Send>
    };
    (log, make)
}

#[test]
fn linear_fade_in_reaches_half_at_midpoint() {
    let (panner, mut handle) = FadingPanner::new(ones(1000, 1));
    let mut panner = panner.with_volume(0.0);
    let (log, callback) = recorder();
    handle.begin_fade(1.0, 100.0, FadeCurve::Linear, callback()).unwrap();

    let mut out = vec![0.0; 50];
    panner.read(&mut out);
    assert_abs_diff_eq!(out[49], 0.5, epsilon = 1e-6);
    assert_abs_diff_eq!(panner.current_volume(), 0.5, epsilon = 1e-6);
    assert!(panner.is_fading());

    handle.poll();
    assert!(log.lock().unwrap().is_empty());

    let mut out = vec![0.0; 200];
    panner.read(&mut out);
    assert_eq!(out[49], 1.0);
    assert!(out[50..].iter().all(|&s| s == 1.0));
    assert!(!panner.is_fading());

    assert_eq!(handle.poll(), 1);
    assert_eq!(handle.poll(), 0);
    assert_eq!(*log.lock().unwrap(), vec![FadeOutcome { completed: true, volume: 1.0 }]);
    assert_eq!(handle.pending(), 0);
}

#[test]
fn ramp_is_monotonic_for_every_curve() {
    for curve in [FadeCurve::Linear, FadeCurve::SCurve, FadeCurve::Square, FadeCurve::InverseSquare] {
        let (mut panner, mut handle) = FadingPanner::new(ones(300, 2));
        handle.fade_to(0.0, 200.0, curve).unwrap();
        let mut out = vec![0.0; 600];
        panner.read(&mut out);

        for pair in out.chunks_exact(4) {
            // stereo frames share the gain, and it never rises
            assert_eq!(pair[0], pair[1]);
            assert!(pair[2] <= pair[0]);
        }
        assert_eq!(out[2 * 199], 0.0);
        assert!(out[2 * 200..].iter().all(|&s| s == 0.0));
    }
}

#[test]
fn replacing_a_fade_reports_the_old_one_cancelled() {
    let (mut panner, mut handle) = FadingPanner::new(ones(1000, 1));
    let (log, callback) = recorder();
    handle.begin_fade(0.0, 100.0, FadeCurve::Linear, callback()).unwrap();

    let mut out = vec![0.0; 25];
    panner.read(&mut out);
    assert_abs_diff_eq!(out[24], 0.75, epsilon = 1e-6);

    handle.begin_fade(1.0, 10.0, FadeCurve::Linear, callback()).unwrap();
    panner.read(&mut out);
    handle.poll();

    let outcomes = log.lock().unwrap().clone();
    assert_eq!(outcomes.len(), 2);
    assert!(!outcomes[0].completed);
    assert_abs_diff_eq!(outcomes[0].volume, 0.75, epsilon = 1e-6);
    assert_eq!(outcomes[1], FadeOutcome { completed: true, volume: 1.0 });
}

#[test]
fn cancel_freezes_volume() {
    let (mut panner, mut handle) = FadingPanner::new(ones(1000, 1));
    let (log, callback) = recorder();
    handle.begin_fade(0.0, 100.0, FadeCurve::Linear, callback()).unwrap();

    let mut out = vec![0.0; 40];
    panner.read(&mut out);
    handle.cancel().unwrap();
    panner.read(&mut out);

    assert!(!panner.is_fading());
    assert_abs_diff_eq!(panner.current_volume(), 0.6, epsilon = 1e-6);
    assert!(out.iter().all(|&s| (s - 0.6).abs() < 1e-6));

    handle.poll();
    let outcomes = log.lock().unwrap().clone();
    assert_eq!(outcomes.len(), 1);
    assert!(!outcomes[0].completed);
}

#[test]
fn zero_duration_jumps_and_completes() {
    let (mut panner, mut handle) = FadingPanner::new(ones(100, 1));
    let (log, callback) = recorder();
    handle.begin_fade(0.3, 0.0, FadeCurve::SCurve, callback()).unwrap();

    let mut out = vec![0.0; 10];
    panner.read(&mut out);
    assert!(out.iter().all(|&s| (s - 0.3).abs() < 1e-6));

    assert_eq!(handle.poll(), 1);
    assert_eq!(*log.lock().unwrap(), vec![FadeOutcome { completed: true, volume: 0.3 }]);
}

#[test]
fn many_replaced_fades_all_report_back() {
    // more fades than the event queue holds, with no explicit poll in between
    let (mut panner, mut handle) = FadingPanner::new(ones(2000, 1));
    let (log, callback) = recorder();
    let mut out = vec![0.0; 5];
    for _ in 0..200 {
        handle.begin_fade(0.5, 100.0, FadeCurve::Linear, callback()).unwrap();
        panner.read(&mut out);
    }
    let mut out = vec![0.0; 200];
    panner.read(&mut out);
    handle.poll();

    let outcomes = log.lock().unwrap().clone();
    assert_eq!(outcomes.len(), 200);
    assert!(outcomes[..199].iter().all(|o| !o.completed));
    assert_eq!(outcomes[199], FadeOutcome { completed: true, volume: 0.5 });
    assert_eq!(handle.pending(), 0);
}

#[test]
fn pan_and_fade_combine() {
    let (mut panner, mut handle) = FadingPanner::new(ones(100, 2));
    handle.set_panning(true).unwrap();
    handle.set_pan(0.5).unwrap();
    handle.fade_to(0.5, 0.0, FadeCurve::Linear).unwrap();

    let mut out = vec![0.0; 20];
    panner.read(&mut out);
    for frame in out.chunks_exact(2) {
        assert_abs_diff_eq!(frame[0], 0.25, epsilon = 1e-6);
        assert_abs_diff_eq!(frame[1], 0.5, epsilon = 1e-6);
    }
}
