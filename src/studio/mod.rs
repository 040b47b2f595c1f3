//! Studio session: wires settings, audio, scene, clock and capture together.

/// The controller driving one session.
pub mod controller;

pub use controller::{DEFAULT_SEED, ExportStart, StudioController, TickReport};
