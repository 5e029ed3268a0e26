//! Streaming decoder for PD-family SSTV transmissions.
//!
//! SSTV images travel as frequency-modulated audio: 1500 Hz is black,
//! 2300 Hz is white, and a framed VIS code in front of the image names
//! the mode. This crate recovers scan lines in real time from a stream
//! of mono audio samples at any input rate.
//!
//! # References
//!
//! - <http://lionel.cordesses.free.fr/gpages/sstv.html>
//! - <http://www.barberdsp.com/downloads/Dayton%20Paper.pdf>
//! - JL Barber N7CXI, "Proposal for SSTV Mode Specifications", 2000

pub mod decoder;
pub mod demod;
pub mod filter;
pub mod image;
pub mod modes;
pub mod pd;
pub mod scan;
pub mod util;
pub mod vis;

pub use crate::{
    decoder::{
        ConfigError,
        Decoder,
    },
    image::Pixel,
    modes::{
        SstvFamily,
        SstvMode,
        VisCode,
    },
};

/// Everything downstream of the input resampler runs at this rate.
pub const INTERNAL_SAMPLE_RATE: f64 = 11025.0;

// sync, leader break, vis start/stop
pub const SYNC_TONE: f64 = 1200.0;

pub const BLACK_TONE: f64 = 1500.0;
pub const WHITE_TONE: f64 = 2300.0;

pub const PORCH_TONE: f64 = BLACK_TONE;

pub const LEADER_TONE: f64 = 1900.0;
pub const LEADER_TIME_MS: f64 = 300.0;

pub const LEADER_BREAK_TIME_MS: f64 = 10.0;

pub const VIS_BIT_TIME_MS: f64 = 30.0;
pub const VIS_LOW_TONE: f64 = 1300.0;
pub const VIS_HIGH_TONE: f64 = 1100.0;

/// Midpoint between the two VIS bit tones; bit decisions compare the
/// bit-interval mean frequency against this.
pub const VIS_BIT_THRESHOLD: f64 = 1200.0;

/// How far a measured frequency may sit from a nominal tone and still
/// count as that tone.
pub const TONE_TOLERANCE: f64 = 60.0;

/// Calibration preamble in front of the VIS header: (frequency, duration in ms).
pub const PREAMBLE_TONES: [(f64, f64); 8] = [
    (1900.0, 100.0),
    (1500.0, 100.0),
    (1900.0, 100.0),
    (1500.0, 100.0),
    (2300.0, 100.0),
    (1500.0, 100.0),
    (2300.0, 100.0),
    (1500.0, 100.0),
];
