use super::{PeakLevel, PeakSample, MIN_REDUCTION, MIN_SAMPLES};

/// Unquantized summary, kept while halving so rounding doesn't accumulate.
#[derive(Clone, Copy)]
struct Summary {
    peak: f32,
    /// Mean of squares
    power: f64,
}

/// Build the pyramid for interleaved `samples`, coarsest level first.
///
/// The finest level always exists, even when it is shorter than
/// [`MIN_SAMPLES`]. Returns no levels for empty input.
pub fn build_levels(samples: &[f32], channels: usize) -> Vec<PeakLevel> {
    let channels = channels.max(1);
    let group = MIN_REDUCTION as usize * channels;
    if samples.len() < channels {
        return Vec::new();
    }

    let mut current: Vec<Summary> = samples
        .chunks(group)
        .map(|chunk| Summary {
            peak: chunk.iter().fold(0.0f32, |m, s| m.max(s.abs())),
            power: chunk.iter().map(|&s| (s as f64) * (s as f64)).sum::<f64>() / chunk.len() as f64,
        })
        .collect();
    let mut reduction = MIN_REDUCTION;
    let mut levels = vec![quantize_level(reduction, &current)];

    while current.len().div_ceil(2) >= MIN_SAMPLES {
        current = current
            .chunks(2)
            .map(|pair| Summary {
                peak: pair.iter().fold(0.0f32, |m, s| m.max(s.peak)),
                power: pair.iter().map(|s| s.power).sum::<f64>() / pair.len() as f64,
            })
            .collect();
        reduction *= 2;
        levels.push(quantize_level(reduction, &current));
    }

    levels.reverse();
    levels
}

fn quantize_level(reduction: u32, summaries: &[Summary]) -> PeakLevel {
    PeakLevel {
        reduction,
        samples: summaries
            .iter()
            .map(|s| PeakSample::new(s.peak, s.power.sqrt() as f32))
            .collect(),
    }
}
