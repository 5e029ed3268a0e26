//! PD line-group demodulation.
//!
//! PD modes send two image rows per group: a 1200 Hz sync pulse, a
//! short black porch, then four equal data segments (Y of the even
//! row, shared R-Y, shared B-Y, Y of the odd row). The sync pulse is a
//! hard resynchronisation point; between consecutive data segments the
//! fractional timer overshoot is carried so sub-sample alignment never
//! drifts across a group.

use crate::{
    demod::frequency_to_level,
    image::{
        ycbcr_to_rgb,
        Pixel,
    },
    modes::{
        PdTimings,
        SstvMode,
    },
    util::lerp,
    PORCH_TONE,
    SYNC_TONE,
    TONE_TOLERANCE,
};

const AFC_ALPHA: f64 = 0.1;

/// Offset measurement window inside the sync pulse, clear of both
/// edges.
const AFC_WINDOW_START_MS: f64 = 5.0;
const AFC_WINDOW_END_MS: f64 = 15.0;

/// Earliest point at which a porch-coloured frequency may cut the sync
/// pulse short.
const SMART_SYNC_MIN_MS: f64 = 15.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Segment {
    Idle,
    Sync,
    Porch,
    Y1,
    Ry,
    By,
    Y2,
}

/// Two decoded scan lines sharing chroma.
#[derive(Clone, Debug)]
pub struct LineGroup {
    pub first_line_index: usize,
    pub lines: [Vec<Pixel>; 2],
    /// Set on the group that fills the last row of the image.
    pub image_complete: bool,
}

#[derive(Clone, Debug)]
pub struct PdDemodulator {
    samples_per_ms: f64,
    width: usize,
    height: usize,
    sync_samples: f64,
    porch_samples: f64,
    segment_samples: f64,
    segment: Segment,
    timer: f64,
    frequency_offset: f64,
    line_index: usize,
    completed: bool,
    segment_buffer: Vec<f64>,
    y1_levels: Vec<u8>,
    cr_levels: Vec<u8>,
    cb_levels: Vec<u8>,
    y2_levels: Vec<u8>,
}

impl PdDemodulator {
    pub fn new(sample_rate: f64, mode: &SstvMode, timings: &PdTimings) -> Self {
        assert!(sample_rate > 0.0);
        assert!(mode.width > 0 && mode.height > 0);

        let samples_per_ms = sample_rate / 1000.0;

        Self {
            samples_per_ms,
            width: mode.width,
            height: mode.height,
            sync_samples: timings.sync_ms * samples_per_ms,
            porch_samples: timings.porch_ms * samples_per_ms,
            segment_samples: timings.segment_ms * samples_per_ms,
            segment: Segment::Idle,
            timer: 0.0,
            frequency_offset: 0.0,
            line_index: 0,
            completed: false,
            segment_buffer: Vec::new(),
            y1_levels: Vec::new(),
            cr_levels: Vec::new(),
            cb_levels: Vec::new(),
            y2_levels: Vec::new(),
        }
    }

    #[inline]
    pub fn line_index(&self) -> usize {
        self.line_index
    }

    #[inline]
    pub fn is_complete(&self) -> bool {
        self.completed
    }

    pub fn reset(&mut self) {
        self.segment = Segment::Idle;
        self.timer = 0.0;
        self.frequency_offset = 0.0;
        self.line_index = 0;
        self.completed = false;
        self.segment_buffer.clear();
        self.y1_levels.clear();
        self.cr_levels.clear();
        self.cb_levels.clear();
        self.y2_levels.clear();
    }

    /// Consumes one frequency sample; returns a line group when the
    /// fourth data segment of a group finishes.
    pub fn process_frequency(&mut self, frequency: f64) -> Option<LineGroup> {
        if self.completed {
            return None;
        }

        let corrected = frequency - self.frequency_offset;

        self.timer += 1.0;

        match self.segment {
            Segment::Idle => {
                // hard sync: the transmitter clock realigns here
                if (frequency - SYNC_TONE).abs() < TONE_TOLERANCE {
                    self.segment = Segment::Sync;
                    self.timer = 0.0;
                }
            }

            Segment::Sync => {
                // fold the carrier offset into the AFC estimate,
                // measured mid-pulse away from both edges
                if self.timer > AFC_WINDOW_START_MS * self.samples_per_ms
                    && self.timer < AFC_WINDOW_END_MS * self.samples_per_ms
                {
                    let measured = frequency - SYNC_TONE;
                    self.frequency_offset =
                        AFC_ALPHA * measured + (1.0 - AFC_ALPHA) * self.frequency_offset;
                }

                let porch_seen = self.timer > SMART_SYNC_MIN_MS * self.samples_per_ms
                    && (corrected - PORCH_TONE).abs() < TONE_TOLERANCE;

                if porch_seen || self.timer >= self.sync_samples {
                    self.segment = Segment::Porch;
                    self.timer = 0.0;
                }
            }

            Segment::Porch => {
                if self.timer >= self.porch_samples {
                    self.segment = Segment::Y1;
                    self.timer = 0.0;
                    self.segment_buffer.clear();
                    self.segment_buffer
                        .reserve(self.segment_samples as usize + 10);
                }
            }

            Segment::Y1 | Segment::Ry | Segment::By | Segment::Y2 => {
                self.segment_buffer.push(corrected);

                if self.timer >= self.segment_samples {
                    self.finalize_segment();

                    if self.segment == Segment::Y2 {
                        // back to hunting; the next sync pulse
                        // re-aligns the clock, so no carry here
                        self.segment = Segment::Idle;
                        self.timer = 0.0;
                        self.segment_buffer.clear();
                        return self.finalize_line_group();
                    }

                    self.segment = match self.segment {
                        Segment::Y1 => Segment::Ry,
                        Segment::Ry => Segment::By,
                        _ => Segment::Y2,
                    };

                    // carry the fractional overshoot between
                    // consecutive data segments
                    self.timer -= self.segment_samples;
                    self.segment_buffer.clear();
                }
            }
        }

        None
    }

    fn finalize_segment(&mut self) {
        let levels = if self.segment_buffer.is_empty() {
            Vec::new()
        }
        else {
            resample_to_width(&self.segment_buffer, self.width)
        };

        match self.segment {
            Segment::Y1 => self.y1_levels = levels,
            Segment::Ry => self.cr_levels = levels,
            Segment::By => self.cb_levels = levels,
            Segment::Y2 => self.y2_levels = levels,
            Segment::Idle | Segment::Sync | Segment::Porch => {}
        }
    }

    fn finalize_line_group(&mut self) -> Option<LineGroup> {
        if self.y1_levels.len() != self.width
            || self.cr_levels.len() != self.width
            || self.cb_levels.len() != self.width
            || self.y2_levels.len() != self.width
        {
            tracing::warn!(line = self.line_index, "incomplete line group dropped");
            return None;
        }

        if self.line_index >= self.height {
            return None;
        }

        let first_line_index = self.line_index;
        let even = (0..self.width)
            .map(|x| ycbcr_to_rgb(self.y1_levels[x], self.cb_levels[x], self.cr_levels[x]))
            .collect::<Vec<Pixel>>();
        let odd = (0..self.width)
            .map(|x| ycbcr_to_rgb(self.y2_levels[x], self.cb_levels[x], self.cr_levels[x]))
            .collect::<Vec<Pixel>>();

        self.line_index += 2;

        let image_complete = self.line_index >= self.height;
        if image_complete {
            self.completed = true;
            tracing::debug!(
                width = self.width,
                height = self.height,
                "image transmission complete"
            );
        }

        Some(LineGroup {
            first_line_index,
            lines: [even, odd],
            image_complete,
        })
    }
}

/// Squeezes a segment's frequency samples onto `width` pixels. The
/// frequency is interpolated first, then mapped to a level; the
/// mid-values differ from mapping first.
fn resample_to_width(buffer: &[f64], width: usize) -> Vec<u8> {
    let source_len = buffer.len() as f64;

    (0..width)
        .map(|i| {
            let position = i as f64 / width as f64 * source_len;
            let index = position as usize;
            let next = (index + 1).min(buffer.len() - 1);
            let weight = position - index as f64;
            let frequency = lerp(weight, buffer[index], buffer[next]);
            frequency_to_level(frequency)
        })
        .collect()
}
