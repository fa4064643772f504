//! Engine tunables.

/// Hard cap on the number of hit objects in one beatmap.
pub const MAX_NUM_HITOBJECTS: usize = 40_000;

/// Hard cap on `|repeat| * tick_count` predicted slider scoring events.
pub const MAX_NUM_SLIDER_SCORING_TIMES: usize = 32_768;

/// Hard cap on ticks generated for a single slider.
pub const MAX_SLIDER_TICKS: usize = 2_048;

/// osu! refuses to play sliders with more than this many repeats; the
/// engine clamps instead.
pub const MAX_SLIDER_REPEATS: i32 = 9_000;

/// Highest `osu file format v<N>` the parser accepts.
pub const MAX_SUPPORTED_VERSION: i32 = 14;

/// Slider count at and above which curves are materialized lazily.
pub const LAZY_CURVE_SLIDER_THRESHOLD: usize = 5_000;

/// Tunables for the difficulty engine.
///
/// The defaults reproduce the client's behavior; they exist as values so
/// embedders can trade accuracy for speed.
#[derive(Clone, Copy, Debug)]
pub struct Options {
    /// Arc-length step between sampled slider curve points, in osu!pixels.
    pub slider_curve_points_separation: f32,

    /// Coordinate / pixel-length sanity clamp, also the maximum curve
    /// length considered by the lazy slider cursor.
    pub slider_curve_max_length: f32,

    /// Sliders clamped to the maximum length are skipped by the lazy
    /// cursor walk when set.
    pub ignore_clamped_sliders: bool,

    /// Slider tail lenience in milliseconds.
    pub slider_end_inside_check_offset: f64,

    /// Whether stacking is resolved before strain calculation.
    pub stars_stacking: bool,

    /// Batch worker thread count override; 0 picks a count from the CPU.
    pub batch_threads: usize,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            slider_curve_points_separation: 20.0,
            slider_curve_max_length: 32_768.0,
            ignore_clamped_sliders: true,
            slider_end_inside_check_offset: 36.0,
            stars_stacking: true,
            batch_threads: 0,
        }
    }
}
