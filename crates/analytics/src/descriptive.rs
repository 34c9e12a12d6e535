use crate::error::{InsufficientData, Outcome, finite, require};
use crate::slicer::WorkingWindow;
use crate::stats::{self, MIN_STD};
use configuration::DescriptiveParams;
use core_types::ReturnTimeline;
use serde::Serialize;
use std::collections::HashMap;

/// Share of a normal distribution within 1, 2 and 3 standard deviations.
const NORMAL_SHARES: [f64; 3] = [0.682, 0.954, 0.998];

/// Summary statistics of one return timeline of a window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DescriptiveStats {
    pub timeline: ReturnTimeline,
    pub count: usize,
    pub sum: Outcome<f64>,
    pub mean: Outcome<f64>,
    pub median: Outcome<f64>,
    pub mode: Outcome<f64>,
    pub min: Outcome<f64>,
    pub max: Outcome<f64>,
    pub range: Outcome<f64>,
    pub variance: Outcome<f64>,
    pub std_dev: Outcome<f64>,
    /// Adjusted Fisher-Pearson coefficient (G1).
    pub skewness: Outcome<f64>,
    /// Adjusted excess kurtosis (G2).
    pub kurtosis: Outcome<f64>,
    pub distribution: Outcome<FrequencyDistribution>,
    pub deviation_bands: Outcome<Vec<DeviationBand>>,
    pub signs: Outcome<SignSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrequencyDistribution {
    pub buckets: Vec<Bucket>,
    /// Values dropped by the 1.5 x IQR fence before bucketing.
    pub excluded_outliers: usize,
}

/// `[lower, upper)`; the last bucket also contains `upper`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bucket {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
    pub share: f64,
}

/// Observations inside `mean ± k·std`, next to what a normal distribution predicts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DeviationBand {
    pub k: u8,
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
    pub share: f64,
    pub normal_share: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SignSummary {
    pub positive: usize,
    pub negative: usize,
    pub zero: usize,
    pub positive_share: f64,
    pub negative_share: f64,
    pub zero_share: f64,
    pub average_positive: Outcome<f64>,
    pub average_negative: Outcome<f64>,
}

/// Describes the returns of `window` on the configured timeline.
pub fn describe(window: &WorkingWindow<'_>, params: &DescriptiveParams) -> DescriptiveStats {
    let returns = window.returns_for(params.timeline);
    let stats = describe_values(&returns.values(), params);

    tracing::debug!(
        symbol = window.symbol(),
        timeline = ?params.timeline,
        count = stats.count,
        mean = ?stats.mean,
        std_dev = ?stats.std_dev,
        "Descriptive statistics computed."
    );

    DescriptiveStats {
        timeline: params.timeline,
        ..stats
    }
}

/// Describes an arbitrary sample.
pub fn describe_values(values: &[f64], params: &DescriptiveParams) -> DescriptiveStats {
    let n = values.len();
    let sorted = stats::sorted(values);

    let mean = stats::mean(values)
        .ok_or_else(|| InsufficientData::too_few(1, n))
        .and_then(finite);
    let min = require(1, n).map(|_| sorted[0]);
    let max = require(1, n).map(|_| sorted[n - 1]);
    let variance = stats::sample_variance(values)
        .ok_or_else(|| InsufficientData::too_few(2, n))
        .and_then(finite);
    let std_dev = variance.map(f64::sqrt);

    DescriptiveStats {
        timeline: ReturnTimeline::default(),
        count: n,
        sum: require(1, n).and_then(|_| finite(values.iter().sum())),
        mean,
        median: stats::percentile(&sorted, 50.0).ok_or_else(|| InsufficientData::too_few(1, n)),
        mode: require(1, n).map(|_| mode(values, &sorted, params.bucket_count)),
        min,
        max,
        range: min.and_then(|lo| max.map(|hi| hi - lo)),
        variance,
        std_dev,
        skewness: skewness(values),
        kurtosis: kurtosis(values),
        distribution: require(1, n)
            .map(|_| distribution(&sorted, params.bucket_count, params.exclude_outliers)),
        deviation_bands: mean.and_then(|m| std_dev.map(|s| deviation_bands(values, m, s))),
        signs: require(1, n).map(|_| signs(values)),
    }
}

/// The most frequent exact value when any value repeats, otherwise the
/// midpoint of the first most-populated histogram bucket.
fn mode(values: &[f64], sorted: &[f64], bucket_count: usize) -> f64 {
    let mut counts: HashMap<u64, usize> = HashMap::new();
    for v in values {
        *counts.entry(v.to_bits()).or_default() += 1;
    }
    let top = counts.values().copied().max().unwrap_or(0);
    if top > 1 {
        if let Some(v) = values.iter().find(|v| counts[&v.to_bits()] == top) {
            return *v;
        }
    }

    let lo = sorted[0];
    let hi = sorted[sorted.len() - 1];
    if hi - lo <= 0.0 {
        return lo;
    }
    let buckets = bucketize(sorted, lo, hi, bucket_count);
    let mut best = 0;
    for (i, b) in buckets.iter().enumerate() {
        if b.count > buckets[best].count {
            best = i;
        }
    }
    (buckets[best].lower + buckets[best].upper) / 2.0
}

fn skewness(values: &[f64]) -> Outcome<f64> {
    let n = values.len();
    require(3, n)?;
    let (m2, m3, _) =
        stats::central_moments(values).ok_or_else(|| InsufficientData::too_few(3, n))?;
    if m2.sqrt() <= MIN_STD {
        return Err(InsufficientData::zero_variance());
    }
    let n = n as f64;
    let g1 = m3 / m2.powf(1.5);
    finite(g1 * (n * (n - 1.0)).sqrt() / (n - 2.0))
}

fn kurtosis(values: &[f64]) -> Outcome<f64> {
    let n = values.len();
    require(4, n)?;
    let (m2, _, m4) =
        stats::central_moments(values).ok_or_else(|| InsufficientData::too_few(4, n))?;
    if m2.sqrt() <= MIN_STD {
        return Err(InsufficientData::zero_variance());
    }
    let n = n as f64;
    let g2 = m4 / (m2 * m2) - 3.0;
    finite(((n + 1.0) * g2 + 6.0) * (n - 1.0) / ((n - 2.0) * (n - 3.0)))
}

fn distribution(
    sorted: &[f64],
    bucket_count: usize,
    exclude_outliers: bool,
) -> FrequencyDistribution {
    let mut kept: Vec<f64> = if exclude_outliers {
        let q1 = stats::percentile(sorted, 25.0).unwrap_or(sorted[0]);
        let q3 = stats::percentile(sorted, 75.0).unwrap_or(sorted[sorted.len() - 1]);
        let fence = 1.5 * (q3 - q1);
        sorted
            .iter()
            .copied()
            .filter(|v| *v >= q1 - fence && *v <= q3 + fence)
            .collect()
    } else {
        sorted.to_vec()
    };

    if kept.is_empty() {
        kept = sorted.to_vec();
    }
    let excluded_outliers = sorted.len() - kept.len();
    let lo = kept[0];
    let hi = kept[kept.len() - 1];
    let buckets = if hi - lo <= 0.0 {
        vec![Bucket {
            lower: lo,
            upper: hi,
            count: kept.len(),
            share: 1.0,
        }]
    } else {
        bucketize(&kept, lo, hi, bucket_count)
    };

    FrequencyDistribution {
        buckets,
        excluded_outliers,
    }
}

fn bucketize(values: &[f64], lo: f64, hi: f64, bucket_count: usize) -> Vec<Bucket> {
    let bucket_count = bucket_count.max(1);
    let width = (hi - lo) / bucket_count as f64;
    let mut counts = vec![0usize; bucket_count];
    for v in values {
        let idx = (((v - lo) / width).floor() as usize).min(bucket_count - 1);
        counts[idx] += 1;
    }
    let total = values.len() as f64;
    counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| Bucket {
            lower: lo + width * i as f64,
            upper: if i + 1 == bucket_count { hi } else { lo + width * (i + 1) as f64 },
            count,
            share: count as f64 / total,
        })
        .collect()
}

fn deviation_bands(values: &[f64], mean: f64, std_dev: f64) -> Vec<DeviationBand> {
    let total = values.len() as f64;
    (1u8..=3)
        .zip(NORMAL_SHARES)
        .map(|(k, normal_share)| {
            let lower = mean - f64::from(k) * std_dev;
            let upper = mean + f64::from(k) * std_dev;
            let count = values.iter().filter(|v| **v >= lower && **v <= upper).count();
            DeviationBand {
                k,
                lower,
                upper,
                count,
                share: count as f64 / total,
                normal_share,
            }
        })
        .collect()
}

fn signs(values: &[f64]) -> SignSummary {
    let positives: Vec<f64> = values.iter().copied().filter(|v| *v > 0.0).collect();
    let negatives: Vec<f64> = values.iter().copied().filter(|v| *v < 0.0).collect();
    let zero = values.len() - positives.len() - negatives.len();
    let total = values.len() as f64;

    SignSummary {
        positive: positives.len(),
        negative: negatives.len(),
        zero,
        positive_share: positives.len() as f64 / total,
        negative_share: negatives.len() as f64 / total,
        zero_share: zero as f64 / total,
        average_positive: stats::mean(&positives).ok_or(InsufficientData::too_few(1, 0)),
        average_negative: stats::mean(&negatives).ok_or(InsufficientData::too_few(1, 0)),
    }
}
