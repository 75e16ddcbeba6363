//! Library exports for embedding the scrollshot engine.
//!
//! Exposes the capture session alongside the supporting modules it is built
//! from so that frontends (CLIs, shell integrations, test harnesses) can wire
//! their own surfaces, snapshot providers, and delivery sinks to the same
//! pipeline the reference binary uses.

pub mod capture;
pub mod compose;
pub mod config;
pub mod delivery;
pub mod geometry;
pub mod progress;
pub mod session;
pub mod sim;
pub mod surface;

pub use capture::CaptureKind;
pub use config::Config;
pub use session::{CaptureSession, Selection, SessionOptions};
