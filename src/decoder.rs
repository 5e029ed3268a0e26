//! Top-level orchestration.
//!
//! `Decoder` owns the whole pipeline: input resampling to the internal
//! rate, bandpass filtering, instantaneous-frequency estimation, and
//! the two protocol state machines. Audio goes in through
//! [`process`](Decoder::process); decoded output comes back through
//! the registered callbacks, inline, in stream order.

use crate::{
    demod::FrequencyEstimator,
    filter::{
        design,
        resampling::Resampler,
        FirFilter,
    },
    image::Pixel,
    modes::{
        pd_timings,
        SstvFamily,
        SstvMode,
    },
    pd::PdDemodulator,
    scan::Scanner,
    vis::VisDetector,
    INTERNAL_SAMPLE_RATE,
};

const BANDPASS_TAPS: usize = 101;
const BANDPASS_LOW_HZ: f64 = 500.0;
const BANDPASS_HIGH_HZ: f64 = 2500.0;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("sample rate must be positive, got {sample_rate}")]
    InvalidSampleRate { sample_rate: f64 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    SearchingVis,
    DecodingImageData,
    ImageComplete,
}

type ModeDetectedCallback = Box<dyn FnMut(SstvMode)>;
type LineDecodedCallback = Box<dyn FnMut(i32, &[Pixel])>;
type ImageCompleteCallback = Box<dyn FnMut(i32, i32)>;

pub struct Decoder {
    state: State,
    resampler: Option<Resampler>,
    bandpass: FirFilter<f32, f32>,
    estimator: FrequencyEstimator,
    vis: VisDetector,
    pd: Option<PdDemodulator>,
    mode: Option<SstvMode>,
    on_mode_detected: Option<ModeDetectedCallback>,
    on_line_decoded: Option<LineDecodedCallback>,
    on_image_complete: Option<ImageCompleteCallback>,
}

impl Decoder {
    /// Creates a decoder for mono audio at `sample_rate`. Input at any
    /// rate other than the internal one is resampled on the way in.
    pub fn new(sample_rate: f64) -> Result<Self, ConfigError> {
        if !(sample_rate > 0.0) || !sample_rate.is_finite() {
            return Err(ConfigError::InvalidSampleRate { sample_rate });
        }

        let resampler = (sample_rate != INTERNAL_SAMPLE_RATE)
            .then(|| Resampler::new(sample_rate, INTERNAL_SAMPLE_RATE));

        Ok(Self {
            state: State::SearchingVis,
            resampler,
            bandpass: FirFilter::new(design::bandpass_sinc(
                BANDPASS_TAPS,
                INTERNAL_SAMPLE_RATE,
                BANDPASS_LOW_HZ,
                BANDPASS_HIGH_HZ,
            )),
            estimator: FrequencyEstimator::new(INTERNAL_SAMPLE_RATE),
            vis: VisDetector::new(INTERNAL_SAMPLE_RATE),
            pd: None,
            mode: None,
            on_mode_detected: None,
            on_line_decoded: None,
            on_image_complete: None,
        })
    }

    pub fn set_on_mode_detected(&mut self, callback: impl FnMut(SstvMode) + 'static) {
        self.on_mode_detected = Some(Box::new(callback));
    }

    pub fn set_on_line_decoded(&mut self, callback: impl FnMut(i32, &[Pixel]) + 'static) {
        self.on_line_decoded = Some(Box::new(callback));
    }

    pub fn set_on_image_complete(&mut self, callback: impl FnMut(i32, i32) + 'static) {
        self.on_image_complete = Some(Box::new(callback));
    }

    /// Returns the decoder to the VIS hunt and clears all filter and
    /// state-machine history. Registered callbacks stay in place.
    pub fn reset(&mut self) {
        self.state = State::SearchingVis;
        if let Some(resampler) = &mut self.resampler {
            resampler.reset();
        }
        self.bandpass.clear();
        self.estimator.clear();
        self.vis.reset();
        self.pd = None;
        self.mode = None;
        tracing::debug!("decoder reset, searching for vis");
    }

    /// Consumes a block of samples, normalised to [-1, 1]. Callbacks
    /// fire inline before this returns.
    pub fn process(&mut self, samples: &[f32]) {
        match &mut self.resampler {
            Some(resampler) => {
                let resampled = resampler.process(samples);
                for sample in resampled {
                    self.process_sample(sample);
                }
            }
            None => {
                for &sample in samples {
                    self.process_sample(sample);
                }
            }
        }
    }

    fn process_sample(&mut self, sample: f32) {
        let filtered = self.bandpass.scan(sample);
        let frequency = self.estimator.scan(filtered);

        match self.state {
            State::SearchingVis => {
                if let Some(mode) = self.vis.process_frequency(frequency) {
                    self.handle_mode_detected(mode);
                }
            }

            State::DecodingImageData => {
                let group = match &mut self.pd {
                    Some(pd) => pd.process_frequency(frequency),
                    None => None,
                };

                if let Some(group) = group {
                    if let Some(callback) = &mut self.on_line_decoded {
                        for (offset, line) in group.lines.iter().enumerate() {
                            callback((group.first_line_index + offset) as i32, line);
                        }
                    }

                    if group.image_complete {
                        if let Some(mode) = &self.mode {
                            if let Some(callback) = &mut self.on_image_complete {
                                callback(mode.width as i32, mode.height as i32);
                            }
                        }
                        self.state = State::ImageComplete;
                    }
                }
            }

            State::ImageComplete => {}
        }
    }

    fn handle_mode_detected(&mut self, mode: SstvMode) {
        if let Some(callback) = &mut self.on_mode_detected {
            callback(mode);
        }

        match (mode.family, pd_timings(mode.vis_code)) {
            (SstvFamily::Pd, Some(timings)) => {
                tracing::debug!(mode = %mode.name, "starting pd demodulation");
                self.pd = Some(PdDemodulator::new(INTERNAL_SAMPLE_RATE, &mode, timings));
                self.mode = Some(mode);
                self.state = State::DecodingImageData;
            }
            _ => {
                tracing::debug!(
                    mode = %mode.name,
                    code = mode.vis_code.get(),
                    "unsupported mode, resetting"
                );
                self.reset();
            }
        }
    }
}

impl std::fmt::Debug for Decoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Decoder")
            .field("state", &self.state)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use crate::decoder::Decoder;

    #[test]
    fn rejects_nonsense_sample_rates() {
        assert!(Decoder::new(0.0).is_err());
        assert!(Decoder::new(-44100.0).is_err());
        assert!(Decoder::new(f64::NAN).is_err());
        assert!(Decoder::new(44100.0).is_ok());
    }

    #[test]
    fn silence_produces_no_callbacks() {
        let mut decoder = Decoder::new(11025.0).unwrap();
        decoder.set_on_mode_detected(|_| panic!("mode callback on silence"));
        decoder.set_on_line_decoded(|_, _| panic!("line callback on silence"));
        decoder.set_on_image_complete(|_, _| panic!("complete callback on silence"));

        decoder.process(&vec![0.0; 44100]);
        decoder.reset();
        decoder.process(&vec![0.0; 1000]);
    }
}
