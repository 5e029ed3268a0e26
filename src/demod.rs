//! Instantaneous-frequency estimation.
//!
//! The estimator builds an analytic signal with a Hilbert FIR and reads
//! the frequency off the phase advance between consecutive complex
//! samples. Differencing conjugate products instead of unwrapping the
//! phase keeps the estimate continuous across the +/-pi boundary.
//!
//! <https://wirelesspi.com/frequency-modulation-fm-and-demodulation-using-dsp-techniques/>

use num_complex::Complex;

use crate::{
    filter::{
        design,
        DelayLine,
    },
    scan::Scanner,
    util::unlerp,
    BLACK_TONE,
    WHITE_TONE,
};

const DEFAULT_HILBERT_TAPS: usize = 63;

const DC_BLOCK_ALPHA: f32 = 0.995;

/// Complex magnitudes below this are treated as no signal; the
/// discriminator holds its previous estimate instead of reading phase
/// noise.
const SQUELCH_NORM_SQR: f32 = 1e-7;

/// One-pole DC removal, per instance.
#[derive(Clone, Copy, Debug, Default)]
pub struct DcBlocker {
    previous_input: f32,
    previous_output: f32,
}

impl DcBlocker {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

impl Scanner<f32> for DcBlocker {
    type Output = f32;

    fn scan(&mut self, sample: f32) -> f32 {
        let output = sample - self.previous_input + DC_BLOCK_ALPHA * self.previous_output;
        self.previous_input = sample;
        self.previous_output = output;
        output
    }
}

/// Peak-envelope AGC with separate attack and release rates. Gain
/// changes are smoothed so the correction itself does not modulate the
/// signal.
#[derive(Clone, Copy, Debug)]
pub struct Agc {
    target: f32,
    attack: f32,
    release: f32,
    envelope: f32,
    gain: f32,
}

impl Agc {
    pub fn new(target: f32, attack: f32, release: f32) -> Self {
        Self {
            target,
            attack,
            release,
            envelope: 0.0,
            gain: 1.0,
        }
    }

    pub fn clear(&mut self) {
        self.envelope = 0.0;
        self.gain = 1.0;
    }
}

impl Default for Agc {
    fn default() -> Self {
        Self::new(0.5, 0.01, 0.001)
    }
}

impl Scanner<f32> for Agc {
    type Output = f32;

    fn scan(&mut self, sample: f32) -> f32 {
        let magnitude = sample.abs();

        if magnitude > self.envelope {
            self.envelope = self.attack * magnitude + (1.0 - self.attack) * self.envelope;
        }
        else {
            self.envelope = self.release * magnitude + (1.0 - self.release) * self.envelope;
        }

        if self.envelope > 1e-6 {
            let desired_gain = self.target / self.envelope;
            self.gain = 0.1 * desired_gain + 0.9 * self.gain;
        }

        sample * self.gain
    }
}

/// Real input to complex analytic signal. The imaginary part is the
/// Hilbert FIR output; the real part is the raw sample read from the
/// delay line at the filter's group delay so both channels line up.
#[derive(Clone, Debug)]
pub struct AnalyticSignal {
    coefficients: Vec<f32>,
    delayed: DelayLine<f32>,
    group_delay: usize,
}

impl AnalyticSignal {
    pub fn new(num_taps: usize) -> Self {
        let coefficients = design::hilbert(num_taps);
        Self {
            delayed: DelayLine::new(coefficients.len()),
            group_delay: (coefficients.len() - 1) / 2,
            coefficients,
        }
    }

    pub fn clear(&mut self) {
        self.delayed.clear();
    }
}

impl Scanner<f32> for AnalyticSignal {
    type Output = Complex<f32>;

    fn scan(&mut self, sample: f32) -> Complex<f32> {
        let _ = self.delayed.push(sample);

        if !self.delayed.is_full() {
            return Complex::new(0.0, 0.0);
        }

        let mut quadrature = 0.0f32;
        for (delayed, coefficient) in self.delayed.iter().zip(&self.coefficients) {
            quadrature += delayed * coefficient;
        }

        let in_phase = self
            .delayed
            .get(self.group_delay)
            .copied()
            .unwrap_or_default();

        Complex::new(in_phase, quadrature)
    }
}

/// Differential discriminator: frequency from the argument of
/// Z(n) * conj(Z(n-1)).
#[derive(Clone, Copy, Debug)]
pub struct Discriminator {
    delayed: Complex<f32>,
    norm_factor: f64,
    last_frequency: f64,
}

impl Discriminator {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            delayed: Complex::new(0.0, 0.0),
            norm_factor: sample_rate / std::f64::consts::TAU,
            last_frequency: 0.0,
        }
    }

    #[inline]
    pub fn last_frequency(&self) -> f64 {
        self.last_frequency
    }

    pub fn clear(&mut self) {
        self.delayed = Complex::new(0.0, 0.0);
        self.last_frequency = 0.0;
    }
}

impl Scanner<Complex<f32>> for Discriminator {
    type Output = f64;

    fn scan(&mut self, sample: Complex<f32>) -> f64 {
        if sample.norm_sqr() < SQUELCH_NORM_SQR {
            return self.last_frequency;
        }

        let frequency = f64::from((self.delayed.conj() * sample).arg()) * self.norm_factor;
        self.delayed = sample;
        self.last_frequency = frequency;
        frequency
    }
}

/// The full per-sample chain: DC removal, AGC, analytic signal,
/// discriminator. Emits 0 Hz until the Hilbert delay line has filled.
#[derive(Clone, Debug)]
pub struct FrequencyEstimator {
    dc_blocker: DcBlocker,
    agc: Agc,
    analytic: AnalyticSignal,
    discriminator: Discriminator,
}

impl FrequencyEstimator {
    pub fn new(sample_rate: f64) -> Self {
        Self::with_hilbert_taps(sample_rate, DEFAULT_HILBERT_TAPS)
    }

    pub fn with_hilbert_taps(sample_rate: f64, num_taps: usize) -> Self {
        assert!(sample_rate > 0.0);
        Self {
            dc_blocker: DcBlocker::new(),
            agc: Agc::default(),
            analytic: AnalyticSignal::new(num_taps),
            discriminator: Discriminator::new(sample_rate),
        }
    }

    #[inline]
    pub fn last_frequency(&self) -> f64 {
        self.discriminator.last_frequency()
    }

    pub fn clear(&mut self) {
        self.dc_blocker.clear();
        self.agc.clear();
        self.analytic.clear();
        self.discriminator.clear();
    }
}

impl Scanner<f32> for FrequencyEstimator {
    type Output = f64;

    fn scan(&mut self, sample: f32) -> f64 {
        let leveled = self.agc.scan(self.dc_blocker.scan(sample));
        let analytic = self.analytic.scan(leveled);
        self.discriminator.scan(analytic)
    }
}

/// Maps a frequency to an 8-bit luminance/chroma level: 1500 Hz and
/// below is 0, 2300 Hz and above is 255, linear in between.
pub fn frequency_to_level(frequency: f64) -> u8 {
    let normalized = unlerp(frequency, BLACK_TONE, WHITE_TONE).clamp(0.0, 1.0);
    (normalized * 255.0) as u8
}
