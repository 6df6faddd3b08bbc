//! Download progress values.

use std::fmt;

/// Fraction of a download received so far.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Progress {
    /// A value in `[0, 1]`.
    Known(f32),
    /// The server did not announce a size.
    Unknown,
}

impl Default for Progress {
    fn default() -> Self {
        Progress::Known(0.0)
    }
}

impl Progress {
    /// Computes the progress of `total_written` bytes out of `total_expected`.
    ///
    /// A missing or zero expected size yields [`Progress::Unknown`]. The
    /// fraction is clamped to `[0, 1]` for servers announcing a short length.
    pub fn from_bytes(total_written: u64, total_expected: Option<u64>) -> Self {
        match total_expected {
            Some(expected) if expected > 0 => {
                let fraction = total_written as f64 / expected as f64;
                Progress::Known(fraction.clamp(0.0, 1.0) as f32)
            }
            _ => Progress::Unknown,
        }
    }

    /// The fraction, unless unknown.
    pub fn fraction(&self) -> Option<f32> {
        match self {
            Progress::Known(f) => Some(*f),
            Progress::Unknown => None,
        }
    }

    /// Returns `true` if the total size is unknown.
    pub fn is_unknown(&self) -> bool {
        matches!(self, Progress::Unknown)
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Progress::Known(fraction) => write!(f, "{:.1}%", fraction * 100.0),
            Progress::Unknown => f.write_str("unknown"),
        }
    }
}
