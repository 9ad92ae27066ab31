use approx::assert_abs_diff_eq;
use cuestream::nodes::effect::{BandSettings, BiquadEq, FilterPath, BAND_COUNT};
use cuestream::nodes::{SamplePlayer, Sine};
use cuestream::{AudioFormat, StreamNode};

fn noise(frames: usize, channels: usize) -> Vec<f32> {
    let mut state = 0x1234_5678u32;
    (0..frames * channels)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            (state as f32 / u32::MAX as f32) * 2.0 - 1.0
        })
        .collect()
}

fn run(mut eq: BiquadEq<SamplePlayer>, frames: usize, channels: usize) -> Vec<f32> {
    let mut out = vec![0.0; frames * channels];
    assert_eq!(eq.read(&mut out), out.len());
    out
}

fn rms(samples: &[f32]) -> f32 {
    (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
}

#[test]
fn disabled_bands_are_bit_exact() {
    let input = noise(2048, 2);
    let settings = [
        BandSettings::bell(3.0, 12.0, 1.0),
        BandSettings::bell(1000.0, 0.0, 1.0),
        BandSettings::high_shelf(8000.0, 0.0, 0.7),
        BandSettings::DISABLED,
    ];
    let (eq, _handle) = BiquadEq::with_settings(SamplePlayer::new(input.clone(), 2, 48_000), settings);
    assert_eq!(run(eq, 2048, 2), input);
}

#[test]
fn zero_db_low_shelf_is_transparent() {
    let input = noise(1024, 1);
    for (freq, q) in [(20.0, 0.3), (250.0, 0.707), (12_000.0, 4.0)] {
        let mut settings = [BandSettings::DISABLED; BAND_COUNT];
        settings[0] = BandSettings::low_shelf(freq, 0.0, q);
        let (eq, _handle) = BiquadEq::with_settings(SamplePlayer::new(input.clone(), 1, 48_000), settings);
        assert_eq!(run(eq, 1024, 1), input);
    }
}

#[test]
fn filter_paths_agree_with_scalar() {
    let settings = [
        BandSettings::low_shelf(120.0, 4.0, 0.7),
        BandSettings::bell(900.0, -6.0, 2.0),
        BandSettings::notch(3000.0, 8.0),
        BandSettings::high_shelf(9000.0, 3.0, 0.7),
    ];

    for channels in [2, 3, 6] {
        let input = noise(4096, channels);
        let make = |path| {
            let (eq, _handle) =
                BiquadEq::with_settings(SamplePlayer::new(input.clone(), channels, 48_000), settings);
            eq.with_path(path)
        };
        let reference = run(make(FilterPath::Scalar), 4096, channels);
        assert_eq!(run(make(FilterPath::Interleaved), 4096, channels), reference);
        if channels == 2 {
            assert_eq!(run(make(FilterPath::Stereo), 4096, channels), reference);
        }
    }
}

#[test]
fn history_persists_across_uneven_reads() {
    let input = noise(1000, 2);
    let settings = [
        BandSettings::bell(440.0, 9.0, 0.5),
        BandSettings::DISABLED,
        BandSettings::high_shelf(5000.0, -8.0, 1.0),
        BandSettings::DISABLED,
    ];
    let (whole, _h) = BiquadEq::with_settings(SamplePlayer::new(input.clone(), 2, 48_000), settings);
    let reference = run(whole, 1000, 2);

    let (mut split, _h) = BiquadEq::with_settings(SamplePlayer::new(input, 2, 48_000), settings);
    let mut pieces = Vec::new();
    for frames in [1, 7, 64, 3, 500, 425] {
        let mut block = vec![0.0; frames * 2];
        split.read(&mut block);
        pieces.extend_from_slice(&block);
    }
    assert_eq!(pieces, reference);
}

#[test]
fn bell_boost_matches_its_magnitude() {
    let source = Sine::new(1000.0, AudioFormat::mono(48_000)).with_amplitude(0.25);
    let (mut eq, mut handle) = BiquadEq::new(source);
    handle.set_band(1, BandSettings::bell(1000.0, 6.0, 1.0)).unwrap();

    let mut out = vec![0.0; 48_000];
    eq.read(&mut out);
    assert_abs_diff_eq!(eq.magnitude_db(1000.0), 6.0, epsilon = 0.01);

    let gain = rms(&out[24_000..]) / (0.25 / 2f32.sqrt());
    assert_abs_diff_eq!(20.0 * gain.log10(), 6.0, epsilon = 0.05);
}

#[test]
fn notch_removes_its_frequency() {
    let source = Sine::new(2000.0, AudioFormat::mono(48_000)).with_amplitude(0.5);
    let mut settings = [BandSettings::DISABLED; BAND_COUNT];
    settings[3] = BandSettings::notch(2000.0, 2.0);
    let (mut eq, _handle) = BiquadEq::with_settings(source, settings);

    let mut out = vec![0.0; 48_000];
    eq.read(&mut out);
    assert!(rms(&out[24_000..]) < 1e-3);
}

#[test]
fn handle_changes_apply_on_next_read() {
    let (mut eq, mut handle) = BiquadEq::new(SamplePlayer::new(noise(64, 1), 1, 48_000));
    handle.set_band(2, BandSettings::high_shelf(4000.0, 6.0, 0.7)).unwrap();
    assert!(!eq.bands()[2].is_active());

    let mut out = [0.0; 16];
    eq.read(&mut out);
    assert!(eq.bands()[2].is_active());
    assert!(eq.magnitude_db(15_000.0) > 5.0);

    handle.set_all([BandSettings::DISABLED; BAND_COUNT]).unwrap();
    eq.read(&mut out);
    assert_eq!(eq.magnitude_db(15_000.0), 0.0);
}

#[test]
fn trailing_partial_frame_is_left_alone() {
    let mut settings = [BandSettings::DISABLED; BAND_COUNT];
    settings[0] = BandSettings::bell(1000.0, 6.0, 1.0);
    let (mut eq, _handle) = BiquadEq::with_settings(SamplePlayer::new(noise(8, 2), 2, 48_000), settings);

    let mut block = noise(8, 2);
    block.push(0.5);
    let before = block.clone();
    eq.apply(&mut block);

    assert_ne!(block[..16], before[..16]);
    assert_eq!(block[16], 0.5);
}
