//! Windowed-sinc FIR design.

use num_traits::{
    Float,
    FloatConst,
    FromPrimitive,
};

#[inline]
pub fn sinc<T>(x: T) -> T
where
    T: Float + FloatConst,
{
    if x == T::zero() {
        T::one()
    }
    else {
        (T::PI() * x).sin() / (T::PI() * x)
    }
}

pub fn hamming_window<T>(len: usize) -> impl Iterator<Item = T>
where
    T: Float + FloatConst + FromPrimitive,
{
    let m = T::from_usize(len - 1).unwrap();
    (0..len).map(move |i| {
        let i_t = T::from_usize(i).unwrap();
        T::from_f64(0.54).unwrap()
            - T::from_f64(0.46).unwrap() * (T::from_f64(2.0).unwrap() * T::PI() * i_t / m).cos()
    })
}

pub fn blackman_window<T>(len: usize) -> impl Iterator<Item = T>
where
    T: Float + FloatConst + FromPrimitive,
{
    let m = T::from_usize(len - 1).unwrap();
    (0..len).map(move |i| {
        let i_t = T::from_usize(i).unwrap();
        T::from_f64(0.42).unwrap()
            - T::from_f64(0.5).unwrap() * (T::from_f64(2.0).unwrap() * T::PI() * i_t / m).cos()
            + T::from_f64(0.08).unwrap() * (T::from_f64(4.0).unwrap() * T::PI() * i_t / m).cos()
    })
}

/// Bandpass coefficients as the difference of two lowpass sincs,
/// Hamming-windowed. The window is the only shaping applied; passband
/// gain stays at roughly unity.
pub fn bandpass_sinc(num_taps: usize, sample_rate: f64, low_cutoff: f64, high_cutoff: f64) -> Vec<f32> {
    assert!(num_taps > 1);
    assert!(0.0 < low_cutoff && low_cutoff < high_cutoff && high_cutoff < sample_rate / 2.0);

    let fl = low_cutoff / sample_rate;
    let fh = high_cutoff / sample_rate;
    let center = (num_taps - 1) as f64 / 2.0;

    hamming_window::<f64>(num_taps)
        .enumerate()
        .map(|(i, window)| {
            let n = i as f64 - center;
            let ideal = 2.0 * fh * sinc(2.0 * fh * n) - 2.0 * fl * sinc(2.0 * fl * n);
            (ideal * window) as f32
        })
        .collect()
}

/// Blackman-windowed Hilbert transformer. `num_taps` must be odd; the
/// ideal response is 2/(pi n) on odd taps and zero elsewhere.
pub fn hilbert(num_taps: usize) -> Vec<f32> {
    assert!(num_taps % 2 == 1, "hilbert filter needs an odd tap count");

    let center = (num_taps - 1) / 2;

    blackman_window::<f64>(num_taps)
        .enumerate()
        .map(|(i, window)| {
            let n = i as i64 - center as i64;
            let ideal = if n % 2 == 0 {
                0.0
            }
            else {
                2.0 / (std::f64::consts::PI * n as f64)
            };
            (ideal * window) as f32
        })
        .collect()
}
