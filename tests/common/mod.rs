//! Shared helpers: a phase-continuous FM tone synthesiser and an event
//! recorder for decoder callbacks.

use std::{
    cell::RefCell,
    rc::Rc,
};

use slowscan::{
    modes::PdTimings,
    Decoder,
    Pixel,
    SstvMode,
    LEADER_BREAK_TIME_MS,
    LEADER_TIME_MS,
    LEADER_TONE,
    PREAMBLE_TONES,
    SYNC_TONE,
    VIS_BIT_TIME_MS,
    VIS_HIGH_TONE,
    VIS_LOW_TONE,
};

pub const GREY_TONE: f64 = 1900.0;

/// Generates frequency-modulated audio with a continuous phase and
/// sub-sample duration bookkeeping, so long transmissions never
/// accumulate rounding error.
pub struct Synth {
    sample_rate: f64,
    amplitude: f64,
    phase: f64,
    duration_remainder: f64,
    pub samples: Vec<f32>,
}

impl Synth {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            sample_rate,
            amplitude: 0.5,
            phase: 0.0,
            duration_remainder: 0.0,
            samples: Vec::new(),
        }
    }

    fn sample_count(&mut self, duration_ms: f64) -> usize {
        let exact = duration_ms * self.sample_rate / 1000.0 + self.duration_remainder;
        let count = exact as usize;
        self.duration_remainder = exact - count as f64;
        count
    }

    pub fn tone(&mut self, frequency: f64, duration_ms: f64) {
        let count = self.sample_count(duration_ms);
        let step = std::f64::consts::TAU * frequency / self.sample_rate;

        for _ in 0..count {
            self.samples.push((self.phase.sin() * self.amplitude) as f32);
            self.phase += step;
            if self.phase > std::f64::consts::TAU {
                self.phase -= std::f64::consts::TAU;
            }
        }
    }

    pub fn silence(&mut self, duration_ms: f64) {
        let count = self.sample_count(duration_ms);
        self.samples.extend(std::iter::repeat(0.0).take(count));
    }

    pub fn vis_header(&mut self, code: u8) {
        self.vis_header_with_parity(code, false);
    }

    pub fn vis_header_with_parity(&mut self, code: u8, corrupt_parity: bool) {
        for (frequency, duration_ms) in PREAMBLE_TONES {
            self.tone(frequency, duration_ms);
        }

        self.tone(LEADER_TONE, LEADER_TIME_MS);
        self.tone(SYNC_TONE, LEADER_BREAK_TIME_MS);
        self.tone(LEADER_TONE, LEADER_TIME_MS);
        self.tone(SYNC_TONE, VIS_BIT_TIME_MS); // start bit

        let mut ones = 0;
        for bit in 0..7 {
            let set = (code >> bit) & 1 == 1;
            if set {
                ones += 1;
            }
            self.tone(if set { VIS_HIGH_TONE } else { VIS_LOW_TONE }, VIS_BIT_TIME_MS);
        }

        let parity_set = (ones % 2 == 1) != corrupt_parity;
        self.tone(
            if parity_set { VIS_HIGH_TONE } else { VIS_LOW_TONE },
            VIS_BIT_TIME_MS,
        );

        self.tone(SYNC_TONE, VIS_BIT_TIME_MS); // stop bit
    }

    /// One PD line group where all four data segments sit at
    /// `data_tone`.
    pub fn flat_group(&mut self, timings: &PdTimings, data_tone: f64, segment_ms: f64) {
        self.tone(SYNC_TONE, timings.sync_ms);
        self.tone(1500.0, timings.porch_ms);
        for _ in 0..4 {
            self.tone(data_tone, segment_ms);
        }
    }
}

#[derive(Clone, Debug)]
pub enum Event {
    Mode(SstvMode),
    Line(i32, Vec<Pixel>),
    Complete(i32, i32),
}

pub fn attach_recorder(decoder: &mut Decoder) -> Rc<RefCell<Vec<Event>>> {
    let events = Rc::new(RefCell::new(Vec::new()));

    let recorder = events.clone();
    decoder.set_on_mode_detected(move |mode| {
        recorder.borrow_mut().push(Event::Mode(mode));
    });

    let recorder = events.clone();
    decoder.set_on_line_decoded(move |index, pixels| {
        recorder.borrow_mut().push(Event::Line(index, pixels.to_vec()));
    });

    let recorder = events.clone();
    decoder.set_on_image_complete(move |width, height| {
        recorder.borrow_mut().push(Event::Complete(width, height));
    });

    events
}

pub fn modes(events: &[Event]) -> Vec<SstvMode> {
    events
        .iter()
        .filter_map(|event| {
            match event {
                Event::Mode(mode) => Some(*mode),
                _ => None,
            }
        })
        .collect()
}

pub fn lines(events: &[Event]) -> Vec<(i32, Vec<Pixel>)> {
    events
        .iter()
        .filter_map(|event| {
            match event {
                Event::Line(index, pixels) => Some((*index, pixels.clone())),
                _ => None,
            }
        })
        .collect()
}

pub fn completions(events: &[Event]) -> Vec<(i32, i32)> {
    events
        .iter()
        .filter_map(|event| {
            match event {
                Event::Complete(width, height) => Some((*width, *height)),
                _ => None,
            }
        })
        .collect()
}
