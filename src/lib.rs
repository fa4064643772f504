//! # starpp
//!
//! `starpp` is the beatmap difficulty and performance-points engine of an
//! osu!-compatible client: it parses beatmap files into primitive hit
//! objects, materializes slider geometry and timing, runs the three-skill
//! strain model, and turns the result into star ratings and per-score pp.
//!
//! On top of the core pipeline it ships the orchestration the client
//! needs: a batch recalculator that refreshes a whole score database after
//! an algorithm bump, a live calculator for in-play values, and an async
//! cache for song browsing.
//!
//! Please note that until this crate hits `1.0`, none of the APIs in this
//! crate are stable, so pin to the version that you are using!

#![deny(missing_docs)]

#[macro_use]
extern crate bitflags;
#[macro_use]
extern crate derive_more;
#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate log;
#[macro_use]
extern crate num_derive;
#[macro_use]
extern crate static_assertions;
#[macro_use]
extern crate thiserror;

/// The batch recalculator.
pub mod batch;
/// Primitive beatmap objects and the text parser.
pub mod beatmap;
/// Cooperative cancellation tokens.
pub mod cancel;
/// Combo colors.
pub mod color;
/// Beatmap database entities.
pub mod database;
/// The difficulty pipeline.
pub mod diff;
/// Errors.
pub mod errors;
/// Data structures for hitsounds.
pub mod hitsounds;
/// The live (in-play) calculator.
pub mod live;
/// Math.
pub mod math;
/// Mod flags and parameters.
pub mod mods;
/// Engine tunables.
pub mod options;
/// The performance points calculator.
pub mod pp;
/// The async pp cache for song browsing.
pub mod ppcache;
/// Pre-calculated star-rating tables.
pub mod precalc;
/// Game rules (hit windows, approach times, circle sizes).
pub mod rules;
/// Calculating slider body shapes.
pub mod spline;
/// Timing and timing points.
pub mod timing;

/// Exports everything in the library.
pub mod prelude {
    pub use crate::batch::*;
    pub use crate::beatmap::*;
    pub use crate::cancel::*;
    pub use crate::color::*;
    pub use crate::database::*;
    pub use crate::diff::*;
    pub use crate::errors::*;
    pub use crate::hitsounds::*;
    pub use crate::live::*;
    pub use crate::math::*;
    pub use crate::mods::*;
    pub use crate::options::*;
    pub use crate::pp::*;
    pub use crate::ppcache::*;
    pub use crate::precalc::*;
    pub use crate::spline::*;
    pub use crate::timing::*;
}
