//! Polyphase windowed-sinc sample-rate conversion.
//!
//! A single prototype lowpass (Blackman-windowed sinc, cutoff at
//! 0.45 times the narrower of the two rates) is decomposed into a bank
//! of phase filters; each output sample convolves one phase against a
//! window of input history selected by a fractional read index.

const DEFAULT_NUM_PHASES: usize = 64;
const DEFAULT_TAPS_PER_PHASE: usize = 16;

#[derive(Clone, Debug)]
pub struct Resampler {
    /// Input samples consumed per output sample.
    ratio: f64,
    num_phases: usize,
    taps_per_phase: usize,
    filter_bank: Vec<Vec<f32>>,
    history: Vec<f32>,
    /// Fractional read index into `history` plus the current block.
    position: f64,
}

impl Resampler {
    pub fn new(input_rate: f64, target_rate: f64) -> Self {
        Self::with_quality(
            input_rate,
            target_rate,
            DEFAULT_NUM_PHASES,
            DEFAULT_TAPS_PER_PHASE,
        )
    }

    pub fn with_quality(
        input_rate: f64,
        target_rate: f64,
        num_phases: usize,
        taps_per_phase: usize,
    ) -> Self {
        assert!(input_rate > 0.0 && target_rate > 0.0);
        assert!(num_phases >= 32);
        assert!(taps_per_phase >= 16);

        let filter_bank = design_filter_bank(input_rate, target_rate, num_phases, taps_per_phase);

        Self {
            ratio: input_rate / target_rate,
            num_phases,
            taps_per_phase,
            filter_bank,
            history: vec![0.0; taps_per_phase],
            position: 0.0,
        }
    }

    pub fn reset(&mut self) {
        self.history.clear();
        self.history.resize(self.taps_per_phase, 0.0);
        self.position = 0.0;
    }

    /// Converts one block. Output length is roughly
    /// `input.len() / ratio`; trailing input that does not yet span a
    /// full phase window stays buffered for the next call.
    pub fn process(&mut self, input: &[f32]) -> Vec<f32> {
        let mut work = Vec::with_capacity(self.history.len() + input.len());
        work.extend_from_slice(&self.history);
        work.extend_from_slice(input);

        let mut output = Vec::with_capacity((input.len() as f64 / self.ratio) as usize + 1);

        loop {
            let base = self.position as usize;
            if base + self.taps_per_phase > work.len() {
                break;
            }

            let fraction = self.position - self.position.floor();
            let phase = ((fraction * self.num_phases as f64) as usize).min(self.num_phases - 1);

            let coefficients = &self.filter_bank[phase];
            let mut sum = 0.0f32;
            for (tap, &coefficient) in coefficients.iter().enumerate() {
                sum += work[base + tap] * coefficient;
            }
            output.push(sum);

            self.position += self.ratio;
        }

        // keep everything the read index has not fully crossed
        let consumed = self.position as usize;
        self.position -= consumed as f64;

        if consumed < work.len() {
            self.history.clear();
            self.history.extend_from_slice(&work[consumed..]);
        }
        else {
            self.history.clear();
            self.history.resize(self.taps_per_phase, 0.0);
        }

        output
    }
}

fn design_filter_bank(
    input_rate: f64,
    target_rate: f64,
    num_phases: usize,
    taps_per_phase: usize,
) -> Vec<Vec<f32>> {
    let total_taps = num_phases * taps_per_phase;
    let cutoff = input_rate.min(target_rate) * 0.45;
    // the prototype is designed at the phase-interpolated rate
    let omega_c = 2.0 * std::f64::consts::PI * cutoff / (input_rate * num_phases as f64);

    let center = (total_taps - 1) as f64 / 2.0;
    let prototype = crate::filter::design::blackman_window::<f64>(total_taps)
        .enumerate()
        .map(|(i, window)| {
            let n = i as f64 - center;
            let ideal = if n.abs() < 1e-9 {
                omega_c / std::f64::consts::PI
            }
            else {
                (omega_c * n).sin() / (std::f64::consts::PI * n)
            };
            ideal * window
        })
        .collect::<Vec<f64>>();

    let mut bank = vec![vec![0.0f32; taps_per_phase]; num_phases];
    for (phase, coefficients) in bank.iter_mut().enumerate() {
        let mut phase_sum = 0.0f64;
        for (tap, coefficient) in coefficients.iter_mut().enumerate() {
            let value = prototype[phase + tap * num_phases];
            *coefficient = value as f32;
            phase_sum += value;
        }
        // unit DC gain per phase
        for coefficient in coefficients.iter_mut() {
            *coefficient = (*coefficient as f64 / phase_sum) as f32;
        }
    }

    bank
}

#[cfg(test)]
mod tests {
    use crate::filter::resampling::Resampler;

    #[test]
    fn output_length_tracks_rate_ratio() {
        let mut resampler = Resampler::new(48000.0, 11025.0);
        let input = vec![0.0f32; 4800];
        let expected = (4800.0 * 11025.0 / 48000.0) as isize;

        let output = resampler.process(&input);
        assert!(
            (output.len() as isize - expected).abs() <= 1,
            "got {}, expected about {}",
            output.len(),
            expected
        );
    }

    #[test]
    fn unit_dc_signal_passes_with_unit_gain() {
        let mut resampler = Resampler::new(44100.0, 11025.0);
        let input = vec![1.0f32; 8820];

        let output = resampler.process(&input);
        // skip the zero-history warm-up
        for &sample in &output[64..] {
            assert!((sample - 1.0).abs() < 0.01, "gain error: {sample}");
        }
    }

    #[test]
    fn upsampling_works_too() {
        let mut resampler = Resampler::new(11025.0, 44100.0);
        let input = vec![0.5f32; 1000];

        let output = resampler.process(&input);
        let expected = (1000.0 * 4.0) as isize;
        assert!((output.len() as isize - expected).abs() <= 1);
        for &sample in &output[256..] {
            assert!((sample - 0.5).abs() < 0.01);
        }
    }

    #[test]
    fn short_blocks_stay_buffered_until_enough_arrive() {
        let mut resampler = Resampler::new(44100.0, 11025.0);

        // two-sample blocks sometimes leave too little trailing input
        // for a phase window; those calls return nothing and the
        // samples surface on a later call
        let mut starved_calls = 0;
        let mut produced = 0;
        for _ in 0..100 {
            let output = resampler.process(&[0.25; 2]);
            if output.is_empty() {
                starved_calls += 1;
            }
            produced += output.len();
        }

        assert!(starved_calls > 0, "every call produced output");
        let expected = (200.0 * 11025.0 / 44100.0) as isize;
        assert!((produced as isize - expected).abs() <= 2);
    }

    #[test]
    fn reset_clears_streaming_state() {
        let mut resampler = Resampler::new(44100.0, 11025.0);
        let first = resampler.process(&[1.0; 4410]);
        resampler.reset();
        let second = resampler.process(&[1.0; 4410]);
        assert_eq!(first, second);
    }
}
