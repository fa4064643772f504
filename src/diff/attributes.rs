//! Difficulty attribute records and incremental calculation state.

/// The three skills tracked by the strain engine.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Skill {
    /// Tapping speed.
    Speed = 0,
    /// Aim, sliders included.
    AimSliders = 1,
    /// Aim with slider travel ignored.
    AimNoSliders = 2,
}

/// Number of skills.
pub const NUM_SKILLS: usize = 3;

/// How much strains decay per second, per skill (indexed by [`Skill`]).
pub const DECAY_BASE: [f64; NUM_SKILLS] = [0.3, 0.15, 0.15];

/// Termination epsilon for the weighted strain sums.
pub const DIFFCALC_EPSILON: f64 = 1e-32;

/// Keeps final pp normalized across balancing changes.
pub const PERFORMANCE_BASE_MULTIPLIER: f64 = 1.14;

/// The core data computed by difficulty calculation and consumed by the pp
/// calculator.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DifficultyAttributes {
    /// Difficulty of the aim skill.
    pub aim_difficulty: f64,
    /// Logistic count of sliders that are hard to aim.
    pub aim_difficult_slider_count: f64,

    /// Difficulty of the speed skill.
    pub speed_difficulty: f64,
    /// Logistic count of notes that are relevant to speed.
    pub speed_note_count: f64,

    /// Ratio of aim-without-sliders rating to full aim rating.
    pub slider_factor: f64,

    /// Share of top-weighted aim strains that are sliders.
    pub aim_top_weighted_slider_factor: f64,
    /// Share of top-weighted speed strains that are sliders.
    pub speed_top_weighted_slider_factor: f64,

    /// Logistic count of strains near the aim difficulty ceiling.
    pub aim_difficult_strain_count: f64,
    /// Logistic count of strains near the speed difficulty ceiling.
    pub speed_difficult_strain_count: f64,

    /// Average scoreV1 nested-object score per hit object.
    pub nested_score_per_object: f64,
    /// The scoreV1 difficulty multiplier of the beatmap.
    pub legacy_score_base_multiplier: f64,

    /// Number of sliders considered.
    pub slider_count: i32,
    /// The combo part of the maximum achievable scoreV1 score.
    pub maximum_legacy_combo_score: u32,

    /// Approach rate the attributes were computed at (pp-side only).
    pub approach_rate: f64,
    /// Overall difficulty the attributes were computed at (pp-side only).
    pub overall_difficulty: f64,
}

/// Raw difficulty values before the final rating transform.
///
/// Identical for hidden and non-hidden at the same strains, so cached and
/// reused to avoid redundant strain passes for HD pairs.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RawDifficultyValues {
    /// Aim with slider travel ignored.
    pub aim_no_sliders: f64,
    /// Aim, sliders included.
    pub aim: f64,
    /// Speed.
    pub speed: f64,
}

/// Per-skill state carried between incremental (per-object) calculations.
#[derive(Clone, Debug, Default)]
pub struct IncrementalState {
    /// End of the current 400ms peak window.
    pub interval_end: f64,
    /// Running maximum strain within the current window.
    pub max_strain: f64,
    /// Highest per-object strain seen so far.
    pub max_object_strain: f64,
    /// Highest slider strain seen so far.
    pub max_slider_strain: f64,

    /// `difficulty / 10` of the last full evaluation, for the difficult
    /// strain count.
    pub consistent_top_strain: f64,
    /// Running difficult-strain logistic sum.
    pub difficult_strains: f64,
    /// Running top-weighted slider logistic sum.
    pub top_weighted_sliders: f64,

    /// Running difficult-slider logistic sum.
    pub aim_difficult_slider_count: f64,
    /// Running speed-note logistic sum.
    pub speed_note_count: f64,

    /// Sorted (ascending) list of finished peak-window strains.
    pub highest_strains: Vec<f64>,
    /// Strains of every slider seen so far.
    pub slider_strains: Vec<f64>,
}

/// The beatmap-side inputs of a difficulty calculation.
///
/// Decouples the strain engine from the beatmap entities; the basic
/// settings are NOT adjusted by the speed multiplier.
#[derive(Clone, Copy, Debug)]
pub struct DifficultyInput {
    /// Circle size.
    pub cs: f32,
    /// HP drain.
    pub hp: f32,
    /// Approach rate.
    pub ar: f32,
    /// Overall difficulty.
    pub od: f32,

    /// Hidden mod.
    pub hidden: bool,
    /// Relax mod.
    pub relax: bool,
    /// Autopilot mod.
    pub autopilot: bool,
    /// Touch device.
    pub touch_device: bool,
    /// Speed multiplier.
    pub speed_multiplier: f32,

    /// Total break time in milliseconds.
    pub break_duration: u32,
    /// First-object to last-object time span in milliseconds.
    pub playable_length: u32,
}

impl Default for DifficultyInput {
    fn default() -> Self {
        DifficultyInput {
            cs: 5.0,
            hp: 5.0,
            ar: 5.0,
            od: 5.0,
            hidden: false,
            relax: false,
            autopilot: false,
            touch_device: false,
            speed_multiplier: 1.0,
            break_duration: 0,
            playable_length: 0,
        }
    }
}

impl DifficultyInput {
    /// Builds the input from resolved mod parameters plus the lengths a
    /// difficulty-object build produced.
    pub fn from_params(
        params: &crate::mods::ModParams,
        break_duration: u32,
        playable_length: u32,
    ) -> DifficultyInput {
        DifficultyInput {
            cs: params.cs,
            hp: params.hp,
            ar: params.ar,
            od: params.od,
            hidden: params.hidden,
            relax: params.relax,
            autopilot: params.autopilot,
            touch_device: params.touch_device,
            speed_multiplier: params.speed,
            break_duration,
            playable_length,
        }
    }
}
