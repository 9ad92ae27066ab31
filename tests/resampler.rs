use cuestream::nodes::{ResamplingNode, SamplePlayer, Sine};
use cuestream::resample::{Resampler, ResamplerConfig};
use cuestream::{AudioFormat, DspError, StreamNode};

fn read_all<N: StreamNode>(node: &mut N) -> Vec<f32> {
    let ch = node.format().channels;
    let mut out = Vec::new();
    let mut block = vec![0.0; 700 * ch];
    loop {
        let n = node.read(&mut block);
        out.extend_from_slice(&block[..n]);
        if n < block.len() {
            return out;
        }
    }
}

fn rms(samples: &[f32]) -> f32 {
    (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
}

fn test_signal(frames: usize, channels: usize) -> Vec<f32> {
    (0..frames * channels)
        .map(|i| ((i * 7919) % 2001) as f32 / 1000.0 - 1.0)
        .collect()
}

#[test]
fn unity_ratio_is_identity_for_linear_and_point() {
    let input = test_signal(3000, 2);
    for config in [ResamplerConfig::linear(), ResamplerConfig::point()] {
        let player = SamplePlayer::new(input.clone(), 2, 48_000);
        let mut node = ResamplingNode::new(player, 48_000, config).unwrap();
        let output = read_all(&mut node);
        assert_eq!(output.len(), input.len(), "{config:?}");
        for (a, b) in output.iter().zip(&input) {
            assert!((a - b).abs() < 1e-6);
        }
    }
}

fn round_trip_rms(config: ResamplerConfig) -> (f32, usize) {
    let sine = Sine::new(1000.0, AudioFormat::mono(48_000))
        .with_amplitude(0.5)
        .with_frames(48_000);
    let down = ResamplingNode::new(sine, 44_100, config).unwrap();
    let mut up = ResamplingNode::new(down, 48_000, config).unwrap();
    assert_eq!(up.format(), AudioFormat::mono(48_000));

    let output = read_all(&mut up);
    // skip the start-up and tail transients
    (rms(&output[4_000..40_000]), output.len())
}

#[test]
fn sinc_round_trip_preserves_energy() {
    let expected = 0.5 / 2f32.sqrt();
    let (level, len) = round_trip_rms(ResamplerConfig::sinc());
    assert!((level / expected - 1.0).abs() < 0.01, "rms {level}");
    assert!((47_990..=48_010).contains(&len), "length {len}");
}

#[test]
fn filtered_round_trip_preserves_energy() {
    let expected = 0.5 / 2f32.sqrt();
    let (level, _) = round_trip_rms(ResamplerConfig::sinc().with_filter_stages(2));
    assert!((level / expected - 1.0).abs() < 0.01, "rms {level}");
}

#[test]
fn large_ratio_round_trip_preserves_energy() {
    // 96 kHz -> 8 kHz keeps 1 kHz well inside the narrowed passband
    let sine = Sine::new(1000.0, AudioFormat::mono(96_000))
        .with_amplitude(0.5)
        .with_frames(96_000);
    let down = ResamplingNode::new(sine, 8_000, ResamplerConfig::sinc()).unwrap();
    let mut up = ResamplingNode::new(down, 96_000, ResamplerConfig::sinc()).unwrap();

    let output = read_all(&mut up);
    let expected = 0.5 / 2f32.sqrt();
    let level = rms(&output[10_000..80_000]);
    assert!((level / expected - 1.0).abs() < 0.01, "rms {level}");
}

#[test]
fn downsampling_removes_content_above_nyquist() {
    // 20 kHz is above the 11.025 kHz output Nyquist
    let sine = Sine::new(20_000.0, AudioFormat::mono(48_000))
        .with_amplitude(0.5)
        .with_frames(24_000);
    let mut node = ResamplingNode::new(sine, 22_050, ResamplerConfig::sinc()).unwrap();
    let output = read_all(&mut node);
    assert!(rms(&output[1_000..10_000]) < 0.01);
}

#[test]
fn output_length_follows_the_ratio() {
    let player = SamplePlayer::new(test_signal(44_100, 1), 1, 44_100);
    let mut node = ResamplingNode::new(player, 48_000, ResamplerConfig::linear()).unwrap();
    let output = read_all(&mut node);
    assert!((47_998..=48_001).contains(&output.len()), "length {}", output.len());
}

#[test]
fn zero_rate_is_rejected() {
    let player = SamplePlayer::new(vec![0.0; 16], 1, 0);
    assert!(matches!(
        ResamplingNode::new(player, 48_000, ResamplerConfig::linear()),
        Err(DspError::InvalidSampleRate(0))
    ));
    assert!(Resampler::new(48_000, 0, 1, ResamplerConfig::sinc()).is_err());
}

#[test]
fn reset_restarts_from_silence() {
    let input = test_signal(64, 1);
    let mut r = Resampler::new(48_000, 48_000, 1, ResamplerConfig::linear()).unwrap();

    let mut first = vec![0.0; 32];
    let (required, scratch) = r.prepare(32);
    scratch.copy_from_slice(&input[..required]);
    r.process(required, 32, &mut first);

    r.reset();
    let mut second = vec![0.0; 32];
    let (required, scratch) = r.prepare(32);
    scratch.copy_from_slice(&input[..required]);
    r.process(required, 32, &mut second);

    assert_eq!(first, second);
}
