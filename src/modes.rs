//! Mode specifications.
//!
//! VIS codes and PD timings from [N7CXI, 2000][1] and the
//! [VIS code registry][2].
//!
//! [1]: http://www.barberdsp.com/downloads/Dayton%20Paper.pdf
//! [2]: https://web.archive.org/web/20050306193820/http://www.tima.com/~djones/vis.txt

use std::{
    collections::HashMap,
    sync::OnceLock,
};

/// A 7-bit VIS mode code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct VisCode(u8);

impl VisCode {
    #[inline]
    pub const fn new(value: u8) -> Option<Self> {
        if value & 0x80 == 0 {
            Some(Self(value))
        }
        else {
            None
        }
    }

    #[inline]
    pub const fn new_unchecked(value: u8) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(&self) -> u8 {
        self.0
    }

    /// True when the code has an odd number of set bits, i.e. the even
    /// parity bit that follows it on air must be 1.
    #[inline]
    pub fn parity(&self) -> bool {
        let parity = (self.0 >> 6)
            ^ (self.0 >> 5)
            ^ (self.0 >> 4)
            ^ (self.0 >> 3)
            ^ (self.0 >> 2)
            ^ (self.0 >> 1)
            ^ self.0;
        parity & 1 != 0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SstvFamily {
    Pd,
    Unknown,
}

#[derive(Clone, Copy, Debug)]
pub struct SstvMode {
    pub name: &'static str,
    pub vis_code: VisCode,
    pub width: usize,
    pub height: usize,
    /// Nominal length of a full transmission in seconds.
    pub duration: f64,
    pub family: SstvFamily,
}

/// Per-mode PD line-group timing. One group carries two image rows:
/// sync, porch, then the four data segments Y1, R-Y, B-Y, Y2.
#[derive(Clone, Copy, Debug)]
pub struct PdTimings {
    pub sync_ms: f64,
    pub porch_ms: f64,
    pub segment_ms: f64,
}

impl SstvMode {
    /// N7CXI, 2000
    pub const PD50: Self = Self {
        name: "PD50",
        vis_code: VisCode(93),
        width: 320,
        height: 256,
        duration: 50.0,
        family: SstvFamily::Pd,
    };

    /// N7CXI, 2000
    pub const PD90: Self = Self {
        name: "PD90",
        vis_code: VisCode(99),
        width: 320,
        height: 256,
        duration: 90.0,
        family: SstvFamily::Pd,
    };

    /// N7CXI, 2000
    pub const PD120: Self = Self {
        name: "PD120",
        vis_code: VisCode(95),
        width: 640,
        height: 496,
        duration: 126.0,
        family: SstvFamily::Pd,
    };

    /// N7CXI, 2000
    pub const PD160: Self = Self {
        name: "PD160",
        vis_code: VisCode(98),
        width: 512,
        height: 400,
        duration: 161.0,
        family: SstvFamily::Pd,
    };

    /// N7CXI, 2000
    pub const PD180: Self = Self {
        name: "PD180",
        vis_code: VisCode(96),
        width: 640,
        height: 496,
        duration: 187.0,
        family: SstvFamily::Pd,
    };

    /// N7CXI, 2000
    pub const PD240: Self = Self {
        name: "PD240",
        vis_code: VisCode(97),
        width: 640,
        height: 496,
        duration: 248.0,
        family: SstvFamily::Pd,
    };

    /// Placeholder for codes that decode cleanly but are not in the
    /// builtin map. The orchestrator ignores these and keeps searching.
    pub fn unknown(vis_code: VisCode) -> Self {
        Self {
            name: "Unknown",
            vis_code,
            width: 0,
            height: 0,
            duration: 0.0,
            family: SstvFamily::Unknown,
        }
    }
}

impl PdTimings {
    pub const PD50: Self = Self {
        sync_ms: 20.0,
        porch_ms: 2.08,
        segment_ms: 91.52,
    };

    pub const PD90: Self = Self {
        sync_ms: 20.0,
        porch_ms: 2.08,
        segment_ms: 170.24,
    };

    pub const PD120: Self = Self {
        sync_ms: 20.0,
        porch_ms: 2.08,
        segment_ms: 121.60,
    };

    pub const PD160: Self = Self {
        sync_ms: 20.0,
        porch_ms: 2.08,
        segment_ms: 195.85,
    };

    pub const PD180: Self = Self {
        sync_ms: 20.0,
        porch_ms: 2.08,
        segment_ms: 183.04,
    };

    pub const PD240: Self = Self {
        sync_ms: 20.0,
        porch_ms: 2.08,
        segment_ms: 244.48,
    };
}

pub fn builtin_mode(vis_code: VisCode) -> Option<&'static SstvMode> {
    static MAP: OnceLock<HashMap<VisCode, &'static SstvMode>> = OnceLock::new();
    let map = MAP.get_or_init(|| {
        let mut map = HashMap::new();
        let mut insert = |mode: &'static SstvMode| map.insert(mode.vis_code, mode);
        insert(&SstvMode::PD50);
        insert(&SstvMode::PD90);
        insert(&SstvMode::PD120);
        insert(&SstvMode::PD160);
        insert(&SstvMode::PD180);
        insert(&SstvMode::PD240);
        map
    });

    map.get(&vis_code).copied()
}

pub fn pd_timings(vis_code: VisCode) -> Option<&'static PdTimings> {
    static MAP: OnceLock<HashMap<VisCode, &'static PdTimings>> = OnceLock::new();
    let map = MAP.get_or_init(|| {
        let mut map = HashMap::new();
        map.insert(SstvMode::PD50.vis_code, &PdTimings::PD50);
        map.insert(SstvMode::PD90.vis_code, &PdTimings::PD90);
        map.insert(SstvMode::PD120.vis_code, &PdTimings::PD120);
        map.insert(SstvMode::PD160.vis_code, &PdTimings::PD160);
        map.insert(SstvMode::PD180.vis_code, &PdTimings::PD180);
        map.insert(SstvMode::PD240.vis_code, &PdTimings::PD240);
        map
    });

    map.get(&vis_code).copied()
}

#[cfg(test)]
mod tests {
    use crate::modes::{
        builtin_mode,
        pd_timings,
        SstvMode,
        VisCode,
    };

    #[test]
    fn correct_vis_codes() {
        assert_eq!(SstvMode::PD50.vis_code, VisCode(0x5d));
        assert_eq!(SstvMode::PD90.vis_code, VisCode(0x63));
        assert_eq!(SstvMode::PD120.vis_code, VisCode(0x5f));
        assert_eq!(SstvMode::PD160.vis_code, VisCode(0x62));
        assert_eq!(SstvMode::PD180.vis_code, VisCode(0x60));
        assert_eq!(SstvMode::PD240.vis_code, VisCode(0x61));
    }

    #[test]
    fn every_builtin_mode_has_timings() {
        for code in [93u8, 95, 96, 97, 98, 99] {
            let code = VisCode::new(code).unwrap();
            let mode = builtin_mode(code).unwrap();
            let timings = pd_timings(code).unwrap();

            // group time x group count should land near the nominal
            // transmission length
            let group_ms = timings.sync_ms + timings.porch_ms + 4.0 * timings.segment_ms;
            let total_s = group_ms * (mode.height as f64 / 2.0) / 1000.0;
            assert!(
                (total_s - mode.duration).abs() / mode.duration < 0.02,
                "{}: {total_s} s vs nominal {} s",
                mode.name,
                mode.duration
            );
        }
    }

    #[test]
    fn unknown_codes_are_not_in_the_map() {
        assert!(builtin_mode(VisCode::new(44).unwrap()).is_none());
        assert!(pd_timings(VisCode::new(44).unwrap()).is_none());
    }

    #[test]
    fn parity_counts_set_bits() {
        assert!(!VisCode::new_unchecked(0).parity());
        assert!(VisCode::new_unchecked(1).parity());
        assert!(!VisCode::new_unchecked(95).parity()); // six set bits
        assert!(VisCode::new_unchecked(93).parity()); // five set bits
    }
}
