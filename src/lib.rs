//! Live pitch tracking and voice range classification.
//!
//! The live path (`audio::monitor`) estimates pitch on raw windows for
//! immediate feedback. Once a recording stops, `analysis::batch` cleans the
//! whole buffer, gates and estimates every window, and classifies the
//! trimmed average into a voice range.

pub mod analysis;
pub mod audio;
pub mod config;
pub mod display;
pub mod dsp;
pub mod error;
pub mod paths;
pub mod util;
