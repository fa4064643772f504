//! Primitive beatmap objects: the output of the text parser.

mod parse;
mod slider;

pub use self::parse::parse_beatmap;
pub use self::slider::calculate_slider_times_clicks_ticks;

use crate::color::Color;
use crate::errors::LoadError;
use crate::hitsounds::{HitSamples, SampleSet};
use crate::math::Point;
use crate::timing::TimingPoint;

/// One slider scoring event used by the difficulty engine: a point in time
/// where the cursor must be inside the follow circle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SliderScoringTime {
    /// What kind of event this is.
    pub kind: ScoringTimeKind,

    /// Absolute time of the event in milliseconds.
    pub time: f32,
}

/// Scoring event kinds; the numeric order (TICK < REPEAT < END) is the
/// tie-break for events at equal times.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ScoringTimeKind {
    /// An intermediate slider tick.
    Tick,
    /// A repeat arrow at either end of the body.
    Repeat,
    /// The (leniency-adjusted) slider end.
    End,
}

/// A hit circle primitive.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HitCircle {
    /// X coordinate in osu!pixels.
    pub x: i32,
    /// Y coordinate in osu!pixels.
    pub y: i32,
    /// Hit time in milliseconds.
    pub time: i32,
    /// Number shown inside the circle (1-based within its combo).
    pub number: i32,
    /// Combo colour counter at this object.
    pub color_counter: i32,
    /// Accumulated combo colour skip offset.
    pub color_offset: i32,
    /// Hitsound descriptor.
    pub samples: HitSamples,
}

/// A slider primitive.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Slider {
    /// Anchor X coordinate in osu!pixels.
    pub x: i32,
    /// Anchor Y coordinate in osu!pixels.
    pub y: i32,
    /// Curve type letter (L/P/B/C).
    pub curve_type: char,
    /// Repeat count (1 = no repeats), clamped to [0, 9000].
    pub repeat: i32,
    /// Declared body length in osu!pixels, clamped to ±32768.
    pub pixel_length: f32,
    /// Hit time in milliseconds.
    pub time: i32,
    /// Number shown inside the head circle.
    pub number: i32,
    /// Combo colour counter at this object.
    pub color_counter: i32,
    /// Accumulated combo colour skip offset.
    pub color_offset: i32,
    /// Control points (anchor first, sanitized).
    pub points: Vec<Point<f32>>,
    /// Hitsound played while holding the body.
    pub hover_samples: HitSamples,
    /// Per-edge hitsounds (head, tail, and one per repeat in between).
    pub edge_samples: Vec<HitSamples>,

    /// Total slider duration in milliseconds (set by timing expansion).
    pub slider_time: f32,
    /// One-way traversal time in milliseconds (set by timing expansion).
    pub slider_time_without_repeats: f32,
    /// Tick positions as fractions of one span, sorted (set by timing
    /// expansion).
    pub ticks: Vec<f32>,
    /// Scoring-time table for the difficulty engine, sorted by
    /// `(time, kind)` (set by timing expansion).
    pub scoring_times: Vec<SliderScoringTime>,
}

/// A spinner primitive.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Spinner {
    /// X coordinate in osu!pixels.
    pub x: i32,
    /// Y coordinate in osu!pixels.
    pub y: i32,
    /// Start time in milliseconds.
    pub time: i32,
    /// End time in milliseconds.
    pub end_time: i32,
    /// Hitsound descriptor.
    pub samples: HitSamples,
}

/// A break section.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Break {
    /// Start time in milliseconds.
    pub start_time: i64,
    /// End time in milliseconds.
    pub end_time: i64,
}

/// Header fields parsed out of `[General]`, `[Metadata]` and
/// `[Difficulty]`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BeatmapMeta {
    /// The title of the song (ASCII).
    pub title: String,
    /// The title of the song (UTF-8), possibly empty.
    pub title_unicode: String,
    /// The artist of the song (ASCII).
    pub artist: String,
    /// The artist of the song (UTF-8), possibly empty.
    pub artist_unicode: String,
    /// The creator of the mapset.
    pub creator: String,
    /// The name of the difficulty ("Version").
    pub difficulty_name: String,
    /// Optional source.
    pub source: String,
    /// Optional search tags.
    pub tags: String,
    /// Background image filename from the first background event.
    pub background_image_filename: String,
    /// Audio filename.
    pub audio_filename: String,
    /// Song-select preview time in milliseconds (-1 = none).
    pub preview_time: i32,
    /// Online beatmap ID, if uploaded.
    pub beatmap_id: i32,
    /// Online beatmap set ID, if uploaded.
    pub beatmap_set_id: i32,
}

/// Everything the parser extracts from one beatmap file.
#[derive(Clone, Debug)]
pub struct PrimitiveContainer {
    /// Hit circles, in file order.
    pub hitcircles: Vec<HitCircle>,
    /// Sliders, in file order.
    pub sliders: Vec<Slider>,
    /// Spinners, in file order.
    pub spinners: Vec<Spinner>,
    /// Break sections.
    pub breaks: Vec<Break>,

    /// Timing points, sorted (offset, uninherited-first, ...).
    pub timingpoints: Vec<TimingPoint>,
    /// Up to 8 combo colours in index order.
    pub combo_colors: Vec<Color>,

    /// Stack leniency from `[General]`.
    pub stack_leniency: f32,
    /// Slider velocity base from `[Difficulty]`.
    pub slider_multiplier: f32,
    /// Slider tick frequency from `[Difficulty]`.
    pub slider_tick_rate: f32,

    /// Circle size.
    pub circle_size: f32,
    /// Approach rate; defaults to OD when the file predates the field.
    pub approach_rate: f32,
    /// Overall difficulty.
    pub overall_difficulty: f32,
    /// HP drain rate.
    pub hp_drain: f32,

    /// Sum of break durations in milliseconds.
    pub total_break_duration: u32,

    /// Sample set used when a timing point doesn't specify one.
    pub default_sample_set: SampleSet,

    /// File format version (`osu file format v<N>`).
    pub version: i32,

    /// Song metadata.
    pub meta: BeatmapMeta,

    /// Set once slider timing data has been populated, so the container
    /// can be reused across multiple difficulty builds.
    pub slider_times_calculated: bool,
}

impl Default for PrimitiveContainer {
    fn default() -> Self {
        PrimitiveContainer {
            hitcircles: Vec::new(),
            sliders: Vec::new(),
            spinners: Vec::new(),
            breaks: Vec::new(),
            timingpoints: Vec::new(),
            combo_colors: Vec::new(),
            stack_leniency: 0.7,
            slider_multiplier: 1.0,
            slider_tick_rate: 1.0,
            circle_size: 5.0,
            approach_rate: 5.0,
            overall_difficulty: 5.0,
            hp_drain: 5.0,
            total_break_duration: 0,
            default_sample_set: SampleSet::Normal,
            version: 14,
            meta: BeatmapMeta {
                preview_time: -1,
                beatmap_set_id: -1,
                ..BeatmapMeta::default()
            },
            slider_times_calculated: false,
        }
    }
}

impl PrimitiveContainer {
    /// Total number of hit objects.
    pub fn num_objects(&self) -> usize {
        self.hitcircles.len() + self.sliders.len() + self.spinners.len()
    }

    /// Expands slider timing (duration, ticks, scoring times) in place if
    /// it hasn't been done yet.
    pub fn ensure_slider_times(&mut self) -> Result<(), LoadError> {
        if self.slider_times_calculated {
            return Ok(());
        }
        calculate_slider_times_clicks_ticks(
            self.version,
            &mut self.sliders,
            &self.timingpoints,
            self.slider_multiplier,
            self.slider_tick_rate,
            &crate::cancel::StopToken::none(),
        )?;
        self.slider_times_calculated = true;
        Ok(())
    }
}
