//! The signal-processing kernels the spatial engine is built from: linear
//! resampling, tilt/gain shaping, direct convolution, the stereo-pan
//! fallback, and int16 interleaving. All functions are pure; state lives in
//! the engine.

use std::f32::consts::PI;

/// Linearly resamples `samples` from `src_rate` to `dst_rate`. Identity when
/// the rates match or the input is empty. Fractional source positions are
/// interpolated between adjacent samples.
pub fn resample_linear(samples: &[f32], src_rate: u32, dst_rate: u32) -> Vec<f32> {
    if src_rate == dst_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = dst_rate as f64 / src_rate as f64;
    let out_len = ((samples.len() as f64 * ratio).round() as usize).max(1);
    let last = (samples.len() - 1) as f64;

    (0..out_len)
        .map(|i| {
            // Source position for this output sample, spanning [0, last].
            let pos = if out_len == 1 {
                0.0
            } else {
                i as f64 * last / (out_len - 1) as f64
            };
            let base = pos.floor() as usize;
            let frac = (pos - base as f64) as f32;
            if base + 1 < samples.len() {
                samples[base] * (1.0 - frac) + samples[base + 1] * frac
            } else {
                samples[base]
            }
        })
        .collect()
}

/// Applies the per-class timbre shaping: a first-difference high-pass mixed
/// back into the dry signal scaled by `tilt_eq`, then an overall `gain`,
/// hard-clamped to [-1, 1].
pub fn shape_tilt_gain(samples: &[f32], tilt_eq: f32, gain: f32) -> Vec<f32> {
    let mut prev = 0.0f32;
    samples
        .iter()
        .map(|&s| {
            let tilted = s + tilt_eq * (s - prev);
            prev = s;
            (tilted * gain).clamp(-1.0, 1.0)
        })
        .collect()
}

/// Direct convolution; output length is `signal + ir - 1`. Either input
/// empty yields an empty output.
pub fn convolve(signal: &[f32], impulse: &[f32]) -> Vec<f32> {
    if signal.is_empty() || impulse.is_empty() {
        return Vec::new();
    }
    let mut out = vec![0.0f32; signal.len() + impulse.len() - 1];
    for (i, &s) in signal.iter().enumerate() {
        for (j, &h) in impulse.iter().enumerate() {
            out[i + j] += s * h;
        }
    }
    out
}

/// Scales both channels down when their combined peak magnitude exceeds 1.0.
/// Leaves signals already within range untouched.
pub fn normalize_pair(left: &mut [f32], right: &mut [f32]) {
    let peak = left
        .iter()
        .chain(right.iter())
        .fold(0.0f32, |acc, &s| acc.max(s.abs()));
    if peak > 1.0 {
        let scale = 1.0 / peak;
        for s in left.iter_mut() {
            *s *= scale;
        }
        for s in right.iter_mut() {
            *s *= scale;
        }
    }
}

/// Equal-power stereo pan for when no HRIR is available. The pan position
/// comes from azimuth clamped to +-90 degrees; extreme elevation attenuates
/// both channels by up to 10%.
pub fn stereo_pan(samples: &[f32], azimuth_deg: f32, elevation_deg: f32) -> (Vec<f32>, Vec<f32>) {
    let pan = (azimuth_deg / 90.0).clamp(-1.0, 1.0);
    let angle = (pan + 1.0) * PI / 4.0;
    let elevation_atten = 1.0 - 0.1 * (elevation_deg.clamp(-90.0, 90.0).abs() / 90.0);
    let left_gain = angle.cos() * elevation_atten;
    let right_gain = angle.sin() * elevation_atten;

    let left = samples.iter().map(|&s| s * left_gain).collect();
    let right = samples.iter().map(|&s| s * right_gain).collect();
    (left, right)
}

/// Interleaves float channels into 16-bit little-endian stereo frames.
/// Channels of unequal length are zero-padded to the longer one.
pub fn interleave_i16(left: &[f32], right: &[f32]) -> Vec<i16> {
    let frames = left.len().max(right.len());
    let mut out = Vec::with_capacity(frames * 2);
    for i in 0..frames {
        out.push(to_i16(left.get(i).copied().unwrap_or(0.0)));
        out.push(to_i16(right.get(i).copied().unwrap_or(0.0)));
    }
    out
}

fn to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16
}
