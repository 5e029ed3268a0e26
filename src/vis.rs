//! VIS header detection.
//!
//! The detector runs directly on the instantaneous-frequency stream: an
//! eight-tone calibration preamble, two 1900 Hz leader bursts split by a
//! 10 ms break, then the framed 7-bit mode code (LSB first, even
//! parity, 1100 Hz mark / 1300 Hz space at 30 ms per bit).

use crate::{
    filter::MedianFilter,
    modes::{
        builtin_mode,
        SstvMode,
        VisCode,
    },
    scan::Scanner,
    LEADER_BREAK_TIME_MS,
    LEADER_TIME_MS,
    LEADER_TONE,
    PREAMBLE_TONES,
    SYNC_TONE,
    TONE_TOLERANCE,
    VIS_BIT_THRESHOLD,
    VIS_BIT_TIME_MS,
};

const MEDIAN_WINDOW: usize = 9;

/// Cumulative off-tone budget inside one state before a hard reset.
const MAX_ERROR_TIME_MS: f64 = 15.0;

/// A smoothed frequency below this means the carrier is gone.
const MIN_CARRIER_FREQUENCY: f64 = 100.0;

/// The first preamble tone is accepted slightly short so the median
/// prefilter's warm-up does not push acquisition past the tone
/// boundary.
const ACQUIRE_MARGIN_MS: f64 = 5.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Idle,
    Preamble,
    LeaderBurst1,
    Break1200,
    LeaderBurst2,
    StartBit,
    DataBits,
    ParityBit,
    StopBit,
    Complete,
}

#[derive(Debug)]
pub struct VisDetector {
    samples_per_ms: f64,
    median: MedianFilter,
    state: State,
    state_timer: f64,
    error_samples: f64,
    preamble_step: usize,
    code_bits: u8,
    bit_count: u8,
    bit_frequency_sum: f64,
    bit_sample_count: usize,
}

impl VisDetector {
    pub fn new(sample_rate: f64) -> Self {
        assert!(sample_rate > 0.0);
        Self {
            samples_per_ms: sample_rate / 1000.0,
            median: MedianFilter::new(MEDIAN_WINDOW),
            state: State::Idle,
            state_timer: 0.0,
            error_samples: 0.0,
            preamble_step: 0,
            code_bits: 0,
            bit_count: 0,
            bit_frequency_sum: 0.0,
            bit_sample_count: 0,
        }
    }

    pub fn reset(&mut self) {
        self.state = State::Idle;
        self.state_timer = 0.0;
        self.error_samples = 0.0;
        self.preamble_step = 0;
        self.code_bits = 0;
        self.bit_count = 0;
        self.bit_frequency_sum = 0.0;
        self.bit_sample_count = 0;
    }

    fn transition_to(&mut self, state: State) {
        self.state = state;
        self.state_timer = 0.0;
        self.error_samples = 0.0;
        self.bit_frequency_sum = 0.0;
        self.bit_sample_count = 0;
    }

    /// Tracks one expected tone. Returns true once the state timer
    /// covers `duration_ms`; spends the off-tone budget (and eventually
    /// resets) while the frequency is somewhere else.
    fn tone_elapsed(&mut self, frequency: f64, tone: f64, duration_ms: f64) -> bool {
        if (frequency - tone).abs() < TONE_TOLERANCE {
            self.state_timer >= duration_ms * self.samples_per_ms
        }
        else {
            self.error_samples += 1.0;
            if self.error_samples > MAX_ERROR_TIME_MS * self.samples_per_ms {
                tracing::debug!(state = ?self.state, "off-tone budget exhausted");
                self.reset();
            }
            false
        }
    }

    /// Consumes one frequency sample. Returns the detected mode when
    /// the header completes; unknown codes complete too, with
    /// [`SstvFamily::Unknown`](crate::modes::SstvFamily).
    pub fn process_frequency(&mut self, raw_frequency: f64) -> Option<SstvMode> {
        let frequency = self.median.scan(raw_frequency);

        if self.state == State::Complete {
            return None;
        }

        self.state_timer += 1.0;

        // dead carrier: restart the hunt immediately
        if frequency < MIN_CARRIER_FREQUENCY {
            self.reset();
            return None;
        }

        match self.state {
            State::Idle => {
                let (tone, duration_ms) = PREAMBLE_TONES[0];
                if (frequency - tone).abs() < TONE_TOLERANCE {
                    if self.state_timer >= (duration_ms - ACQUIRE_MARGIN_MS) * self.samples_per_ms
                    {
                        self.preamble_step = 1;
                        self.transition_to(State::Preamble);
                    }
                }
                else {
                    self.state_timer = 0.0;
                }
            }

            State::Preamble => {
                let (tone, duration_ms) = PREAMBLE_TONES[self.preamble_step];
                if self.tone_elapsed(frequency, tone, duration_ms) {
                    self.preamble_step += 1;
                    self.error_samples = 0.0;
                    self.state_timer = 0.0;
                    if self.preamble_step >= PREAMBLE_TONES.len() {
                        self.transition_to(State::LeaderBurst1);
                    }
                }
            }

            State::LeaderBurst1 => {
                if self.tone_elapsed(frequency, LEADER_TONE, LEADER_TIME_MS) {
                    self.transition_to(State::Break1200);
                }
            }

            State::Break1200 => {
                if self.tone_elapsed(frequency, SYNC_TONE, LEADER_BREAK_TIME_MS) {
                    self.transition_to(State::LeaderBurst2);
                }
            }

            State::LeaderBurst2 => {
                if self.tone_elapsed(frequency, LEADER_TONE, LEADER_TIME_MS) {
                    self.transition_to(State::StartBit);
                }
            }

            State::StartBit => {
                if self.tone_elapsed(frequency, SYNC_TONE, VIS_BIT_TIME_MS) {
                    self.transition_to(State::DataBits);
                }
            }

            State::DataBits => {
                self.bit_frequency_sum += frequency;
                self.bit_sample_count += 1;

                if self.state_timer >= VIS_BIT_TIME_MS * self.samples_per_ms {
                    let mean = self.bit_frequency_sum / self.bit_sample_count as f64;
                    // mark (1100 Hz) sits below the midpoint
                    if mean < VIS_BIT_THRESHOLD {
                        self.code_bits |= 1u8 << self.bit_count;
                    }
                    self.bit_count += 1;

                    self.state_timer = 0.0;
                    self.bit_frequency_sum = 0.0;
                    self.bit_sample_count = 0;

                    if self.bit_count >= 7 {
                        self.transition_to(State::ParityBit);
                    }
                }
            }

            State::ParityBit => {
                self.bit_frequency_sum += frequency;
                self.bit_sample_count += 1;

                if self.state_timer >= VIS_BIT_TIME_MS * self.samples_per_ms {
                    let mean = self.bit_frequency_sum / self.bit_sample_count as f64;
                    let parity_bit = mean < VIS_BIT_THRESHOLD;

                    let code = VisCode::new_unchecked(self.code_bits);
                    if parity_bit == code.parity() {
                        self.transition_to(State::StopBit);
                    }
                    else {
                        tracing::warn!(code = code.get(), "vis parity mismatch");
                        self.reset();
                    }
                }
            }

            State::StopBit => {
                if self.tone_elapsed(frequency, SYNC_TONE, VIS_BIT_TIME_MS) {
                    let code = VisCode::new_unchecked(self.code_bits);
                    let mode = builtin_mode(code)
                        .copied()
                        .unwrap_or_else(|| SstvMode::unknown(code));
                    tracing::debug!(mode = %mode.name, code = code.get(), "vis complete");
                    self.state = State::Complete;
                    return Some(mode);
                }
            }

            State::Complete => {}
        }

        None
    }
}
