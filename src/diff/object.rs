//! Per-object strain state and the skill evaluators.

use crate::math::{
    reverse_lerp, smootherstep, smoothstep, smoothstep_bell_curve, Point,
};
use crate::options::Options;

use super::attributes::{Skill, DECAY_BASE, NUM_SKILLS};
use super::{DifficultyHitObject, HitObjectKind};
use crate::beatmap::ScoringTimeKind;

const AIM_MULTIPLIER: f64 = 26.0;
const SPEED_MULTIPLIER: f64 = 1.47;

/// Cursor normalization radius; positions are scaled as if every circle
/// had this radius.
pub const NORMALIZED_RADIUS: f32 = 50.0;

/// Radius of the follow circle relative to the normalized radius.
pub const MAXIMUM_SLIDER_RADIUS: f32 = NORMALIZED_RADIUS * 2.4;

/// Radius a player is assumed to actually use while following a slider.
pub const ASSUMED_SLIDER_RADIUS: f32 = NORMALIZED_RADIUS * 1.8;

/// Strain decay factor for a skill over `ms` milliseconds.
#[inline]
pub fn strain_decay(skill: Skill, ms: f64) -> f64 {
    DECAY_BASE[skill as usize].powf(ms / 1000.0)
}

/// A run of approximately equal deltas inside the rhythm window.
#[derive(Copy, Clone, Debug)]
pub struct RhythmIsland {
    delta: i32,
    delta_count: i32,
}

impl RhythmIsland {
    const NONE: RhythmIsland = RhythmIsland {
        delta: i32::MAX,
        delta_count: 0,
    };

    fn equals(&self, other: &RhythmIsland, delta_difference_epsilon: f64) -> bool {
        ((self.delta - other.delta).abs() as f64) < delta_difference_epsilon
            && self.delta_count == other.delta_count
    }
}

/// Scratch storage reused across strain calculations.
#[derive(Default)]
pub struct StrainScratch {
    island_counts: Vec<(RhythmIsland, i32)>,
}

/// Per-object difficulty state: a snapshot of the hit object's
/// position/timing plus every precalculated and strain value the skills
/// need. Objects are addressed by index into one shared slice.
#[derive(Clone, Debug)]
pub struct DiffObject {
    /// Index of this object (and its hit object) in the arrays.
    pub idx: usize,

    /// Object kind.
    pub kind: HitObjectKind,
    /// Stacked position.
    pub pos: Point<f32>,
    /// Start time in ms, speed-adjusted.
    pub time: i32,
    /// End time in ms, speed-adjusted.
    pub end_time: i32,
    /// Slider repeat count.
    pub repeats: i32,

    /// Per-skill strain values.
    pub strains: [f64; NUM_SKILLS],

    /// Speed strain before the rhythm multiplier; the two are combined in
    /// different ways downstream.
    pub raw_speed_strain: f64,
    /// Rhythm multiplier for the speed skill.
    pub rhythm: f64,

    /// Start position normalized on the radius.
    pub norm_start: Point<f32>,

    /// Angle formed with the two previous objects, `[0, pi]`; NaN when
    /// undefined.
    pub angle: f64,

    /// Normalized distance from the previous object's cursor end.
    pub jump_distance: f64,
    /// Jump distance with slider lenience subtracted.
    pub min_jump_distance: f64,
    /// Time available for the (lenient) jump, >= 25ms.
    pub min_jump_time: f64,
    /// Repeat-weighted lazy travel distance (sliders).
    pub travel_distance: f64,

    /// Time since the previous object.
    pub delta_time: f64,
    /// Delta time floored to 25ms.
    pub adjusted_delta_time: f64,

    /// Where the lazy cursor ends up after following this slider.
    pub lazy_end_pos: Point<f32>,
    /// Total distance the lazy cursor moved.
    pub lazy_travel_dist: f64,
    /// Tracking time of the lazy cursor walk.
    pub lazy_travel_time: f64,
    /// Lazy travel time floored to 25ms.
    pub travel_time: f64,
    /// High-CS bonus, `max(1, 1 + (30 - radius) / 40)`.
    pub small_circle_bonus: f64,

    /// Set once the lazy cursor walk ran for this slider.
    pub lazy_calc_finished: bool,
}

impl DiffObject {
    /// Snapshots a hit object into strain state.
    pub fn new(
        ho: &DifficultyHitObject,
        idx: usize,
        radius_scaling_factor: f32,
        small_circle_bonus: f64,
    ) -> DiffObject {
        DiffObject {
            idx,
            kind: ho.kind,
            pos: ho.pos,
            time: ho.time,
            end_time: ho.end_time,
            repeats: ho.repeats,
            strains: [0.0; NUM_SKILLS],
            raw_speed_strain: 0.0,
            rhythm: 0.0,
            norm_start: ho.pos.scale(radius_scaling_factor),
            angle: f64::NAN,
            jump_distance: 0.0,
            min_jump_distance: 0.0,
            min_jump_time: 0.0,
            travel_distance: 0.0,
            delta_time: 0.0,
            adjusted_delta_time: 0.0,
            lazy_end_pos: ho.pos,
            lazy_travel_dist: 0.0,
            lazy_travel_time: 0.0,
            travel_time: 0.0,
            small_circle_bonus,
            lazy_calc_finished: false,
        }
    }

    /// Strain of this object for a skill, rhythm applied for speed.
    #[inline]
    pub fn get_strain(&self, skill: Skill) -> f64 {
        self.strains[skill as usize] * if skill == Skill::Speed { self.rhythm } else { 1.0 }
    }

    /// Slider-only strain; -1 for non-sliders so callers can filter.
    #[inline]
    pub fn get_slider_strain(&self, skill: Skill) -> f64 {
        if self.kind == HitObjectKind::Slider {
            self.get_strain(skill)
        } else {
            -1.0
        }
    }

    /// How doubletappable the transition to the next object is, in
    /// `[0, 1]`.
    pub fn doubletapness(&self, next_time: Option<i32>, hit_window_300: f64) -> f64 {
        let next_time = match next_time {
            Some(t) => t,
            None => return 0.0,
        };

        let cur_delta = self.delta_time.max(1.0);
        let next_delta = (next_time - self.time).max(1) as f64;
        let delta_diff = (next_delta - cur_delta).abs();
        let speed_ratio = cur_delta / cur_delta.max(delta_diff);
        let window_ratio = (cur_delta / hit_window_300).min(1.0).powi(2);

        1.0 - speed_ratio.powf(1.0 - window_ratio)
    }

    /// Computes and stores the decayed strains of all three skills.
    ///
    /// `earlier` is the slice of every object before this one (the rhythm
    /// window walks it), `next_time` the start time of the following
    /// object if any.
    #[allow(clippy::too_many_arguments)]
    pub fn calculate_strains(
        &mut self,
        prev: &DiffObject,
        next_time: Option<i32>,
        earlier: &[DiffObject],
        hit_window_300: f64,
        autopilot_nerf: bool,
        scratch: &mut StrainScratch,
    ) {
        let time_elapsed = (self.time - prev.time) as f64;
        self.delta_time = time_elapsed;
        self.adjusted_delta_time = time_elapsed.max(25.0);

        for skill in [Skill::Speed, Skill::AimSliders, Skill::AimNoSliders] {
            let object_strain = match self.kind {
                HitObjectKind::Spinner if skill == Skill::Speed => {
                    self.raw_speed_strain = 0.0;
                    self.rhythm = 0.0;
                    0.0
                }
                HitObjectKind::Spinner => 0.0,
                _ => match skill {
                    Skill::Speed => self.speed_strain(
                        prev,
                        next_time,
                        earlier,
                        hit_window_300,
                        autopilot_nerf,
                        scratch,
                    ),
                    Skill::AimSliders => self.aim_strain(prev, earlier, true),
                    Skill::AimNoSliders => self.aim_strain(prev, earlier, false),
                },
            };

            let decay_time = if skill == Skill::Speed {
                self.adjusted_delta_time
            } else {
                self.delta_time
            };
            let multiplier = if skill == Skill::Speed {
                SPEED_MULTIPLIER
            } else {
                AIM_MULTIPLIER
            };

            let mut current_strain = prev.strains[skill as usize];
            current_strain *= strain_decay(skill, decay_time);
            current_strain += object_strain * multiplier;
            self.strains[skill as usize] = current_strain;
        }
    }

    /// `objects[max(0, prev_index - back)]`, where `prev_index` is the
    /// index of the object before this one.
    #[inline]
    fn previous<'a>(&self, earlier: &'a [DiffObject], back: usize) -> &'a DiffObject {
        &earlier[(self.idx - 1).saturating_sub(back)]
    }

    fn speed_strain(
        &mut self,
        prev: &DiffObject,
        next_time: Option<i32>,
        earlier: &[DiffObject],
        hit_window_300: f64,
        autopilot_nerf: bool,
        scratch: &mut StrainScratch,
    ) -> f64 {
        const SINGLE_SPACING_THRESHOLD: f64 = 125.0;
        const MIN_SPEED_BONUS: f64 = 75.0; // ~200bpm 1/4 streams
        const SPEED_BALANCING_FACTOR: f64 = 40.0;
        const DISTANCE_MULTIPLIER: f64 = 0.8;

        const HISTORY_TIME_MAX: i32 = 5000;
        const HISTORY_OBJECTS_MAX: i32 = 32;
        const RHYTHM_OVERALL_MULTIPLIER: f64 = 1.0;
        const RHYTHM_RATIO_MULTIPLIER: f64 = 15.0;

        let distance = SINGLE_SPACING_THRESHOLD.min(prev.travel_distance + self.min_jump_distance);

        let mut adjusted_delta_time = self.adjusted_delta_time;
        adjusted_delta_time /= ((adjusted_delta_time / hit_window_300) / 0.93).clamp(0.92, 1.0);

        let doubletapness = 1.0 - self.doubletapness(next_time, hit_window_300);

        let speed_bonus = if adjusted_delta_time < MIN_SPEED_BONUS {
            0.75 * ((MIN_SPEED_BONUS - adjusted_delta_time) / SPEED_BALANCING_FACTOR).powi(2)
        } else {
            0.0
        };

        let distance_bonus = if autopilot_nerf {
            0.0
        } else {
            // flow aim on small circles doesn't scale as hard as jumps,
            // so only the square root of the high-CS bonus applies
            (distance / SINGLE_SPACING_THRESHOLD).powf(3.95)
                * DISTANCE_MULTIPLIER
                * self.small_circle_bonus.sqrt()
        };

        self.raw_speed_strain =
            (1.0 + speed_bonus + distance_bonus) * 1000.0 * doubletapness / adjusted_delta_time;

        // rhythm window: walk back up to 32 objects or 5000ms
        let mut rhythm_complexity_sum = 0.0f64;

        let delta_difference_epsilon = hit_window_300 * 0.3;

        let mut island = RhythmIsland::NONE;
        let mut previous_island = RhythmIsland::NONE;

        scratch.island_counts.clear();

        // ratio of the current start of an island, keeps tighter rhythms buffed
        let mut start_ratio = 0.0f64;

        let mut first_delta_switch = false;

        let prev_object_index = (self.idx - 1) as i32;
        let historical_note_count = prev_object_index.min(HISTORY_OBJECTS_MAX);

        let mut rhythm_start = 0i32;
        while rhythm_start < historical_note_count - 2
            && self.time - self.previous(earlier, rhythm_start as usize).time < HISTORY_TIME_MAX
        {
            rhythm_start += 1;
        }

        let mut prev_obj = self.previous(earlier, rhythm_start as usize);
        let mut last_obj = self.previous(earlier, rhythm_start as usize + 1);

        for i in (1..=rhythm_start).rev() {
            let curr_obj = self.previous(earlier, (i - 1) as usize);

            // scales note 0 to 1 from history to now; limited by either
            // time or object count
            let time_decay =
                (HISTORY_TIME_MAX - (self.time - curr_obj.time)) as f64 / HISTORY_TIME_MAX as f64;
            let note_decay = (historical_note_count - i) as f64 / historical_note_count as f64;
            let curr_historical_decay = note_decay.min(time_decay);

            let curr_delta = curr_obj.delta_time.max(1e-7);
            let prev_delta = prev_obj.delta_time.max(1e-7);
            let last_delta = last_obj.delta_time.max(1e-7);

            // deltas that are multiples of each other (100 and 200) deserve
            // less of a rhythm bonus, so only the fractional part counts
            let delta_difference = prev_delta.max(curr_delta) / prev_delta.min(curr_delta);
            let delta_difference_fraction = delta_difference - delta_difference.trunc();

            let curr_ratio = 1.0
                + RHYTHM_RATIO_MULTIPLIER
                    * 0.5f64.min(smoothstep_bell_curve(delta_difference_fraction, 0.5, 0.5));

            let difference_multiplier = (2.0 - delta_difference / 8.0).clamp(0.0, 1.0);

            let window_penalty = (((prev_delta - curr_delta).abs() - delta_difference_epsilon)
                .max(0.0)
                / delta_difference_epsilon)
                .min(1.0);

            let mut effective_ratio = window_penalty * curr_ratio * difference_multiplier;

            if first_delta_switch {
                if (prev_delta - curr_delta).abs() < delta_difference_epsilon {
                    // island is still progressing
                    if island.delta == i32::MAX {
                        island.delta = (curr_delta as i32).max(25);
                    }
                    island.delta_count += 1;
                } else {
                    if curr_obj.kind == HitObjectKind::Slider {
                        // bpm change into a slider, this is an easy acc window
                        effective_ratio *= 0.125;
                    }
                    if prev_obj.kind == HitObjectKind::Slider {
                        // bpm change from a slider, typically easier than circle -> circle
                        effective_ratio *= 0.3;
                    }
                    if island.delta_count % 2 == previous_island.delta_count % 2 {
                        // repeated island polarity (2 -> 4, 3 -> 5)
                        effective_ratio *= 0.5;
                    }
                    if last_delta > prev_delta + delta_difference_epsilon
                        && prev_delta > curr_delta + delta_difference_epsilon
                    {
                        // previous increase happened a note ago,
                        // 1/1 -> 1/2-1/4 shouldn't be buffed
                        effective_ratio *= 0.125;
                    }
                    if previous_island.delta_count == island.delta_count {
                        // repeated island size (triplet -> triplet)
                        effective_ratio *= 0.5;
                    }

                    let island_count = scratch
                        .island_counts
                        .iter_mut()
                        .find(|(i, _)| i.equals(&island, delta_difference_epsilon));

                    match island_count {
                        Some((_, count)) => {
                            // only count islands that come one after another
                            if previous_island.equals(&island, delta_difference_epsilon) {
                                *count += 1;
                            }

                            // repeated islands are nerfed harder the faster they are
                            let power = 2.75
                                / (1.0 + std::f64::consts::E.powf(14.0 - 0.24 * island.delta as f64));
                            effective_ratio *= (3.0 / *count as f64)
                                .min((1.0 / *count as f64).powf(power));
                        }
                        None => {
                            scratch.island_counts.push((island, 1));
                        }
                    }

                    // scale down if the object is doubletappable
                    let doubletapness =
                        prev_obj.doubletapness(Some(curr_obj.time), hit_window_300);
                    effective_ratio *= 1.0 - doubletapness * 0.75;

                    rhythm_complexity_sum +=
                        (effective_ratio * start_ratio).sqrt() * curr_historical_decay;

                    start_ratio = effective_ratio;
                    previous_island = island;

                    if prev_delta + delta_difference_epsilon < curr_delta {
                        // we're slowing down, stop counting
                        first_delta_switch = false;
                    }

                    island = RhythmIsland {
                        delta: (curr_delta as i32).max(25),
                        delta_count: 1,
                    };
                }
            } else if prev_delta > curr_delta + delta_difference_epsilon {
                // we want to be speeding up; begin counting the island
                // until we change speed again
                first_delta_switch = true;

                if curr_obj.kind == HitObjectKind::Slider {
                    effective_ratio *= 0.6;
                }
                if prev_obj.kind == HitObjectKind::Slider {
                    effective_ratio *= 0.6;
                }

                start_ratio = effective_ratio;
                island = RhythmIsland {
                    delta: (curr_delta as i32).max(25),
                    delta_count: 1,
                };
            }

            last_obj = prev_obj;
            prev_obj = curr_obj;
        }

        // multiplier applied on top of the raw strain, range [1, inf) (not really)
        self.rhythm = ((4.0 + rhythm_complexity_sum * RHYTHM_OVERALL_MULTIPLIER).sqrt() / 2.0)
            * (1.0 - self.doubletapness(next_time, hit_window_300));

        scratch.island_counts.clear();
        self.raw_speed_strain
    }

    fn aim_strain(&self, prev: &DiffObject, earlier: &[DiffObject], with_sliders: bool) -> f64 {
        const WIDE_ANGLE_MULTIPLIER: f64 = 1.5;
        const ACUTE_ANGLE_MULTIPLIER: f64 = 2.55;
        const SLIDER_MULTIPLIER: f64 = 1.35;
        const VELOCITY_CHANGE_MULTIPLIER: f64 = 0.75;
        const WIGGLE_MULTIPLIER: f64 = 1.02;

        const DEG: f64 = std::f64::consts::PI / 180.0;

        if self.idx as i32 - 1 <= 1 || prev.kind == HitObjectKind::Spinner {
            return 0.0;
        }

        let wide_angle_bonus_of = |angle: f64| smoothstep(angle, 40.0 * DEG, 140.0 * DEG);
        let acute_angle_bonus_of = |angle: f64| smoothstep(angle, 140.0 * DEG, 40.0 * DEG);

        let prev_prev = self.previous(earlier, 1);
        let prev2 = self.previous(earlier, 2);

        let mut curr_velocity = self.jump_distance / self.adjusted_delta_time;

        if prev.kind == HitObjectKind::Slider && with_sliders {
            let travel_velocity = prev.travel_distance / prev.travel_time;
            let movement_velocity = self.min_jump_distance / self.min_jump_time;
            curr_velocity = curr_velocity.max(movement_velocity + travel_velocity);
        }
        let mut aim_strain = curr_velocity;

        let mut prev_velocity = prev.jump_distance / prev.adjusted_delta_time;
        if prev_prev.kind == HitObjectKind::Slider && with_sliders {
            let travel_velocity = prev_prev.travel_distance / prev_prev.travel_time;
            let movement_velocity = prev.min_jump_distance / prev.min_jump_time;
            prev_velocity = prev_velocity.max(movement_velocity + travel_velocity);
        }

        let mut wide_angle_bonus = 0.0;
        let mut acute_angle_bonus = 0.0;
        let mut slider_bonus = 0.0;
        let mut velocity_change_bonus = 0.0;
        let mut wiggle_bonus = 0.0;

        if !self.angle.is_nan() && !prev.angle.is_nan() {
            let angle_bonus = curr_velocity.min(prev_velocity);

            if self.adjusted_delta_time.max(prev.adjusted_delta_time)
                < 1.25 * self.adjusted_delta_time.min(prev.adjusted_delta_time)
            {
                acute_angle_bonus = acute_angle_bonus_of(self.angle);
                acute_angle_bonus *= 0.08
                    + 0.92
                        * (1.0
                            - acute_angle_bonus.min(acute_angle_bonus_of(prev.angle).powi(3)));
                acute_angle_bonus *= angle_bonus
                    * smootherstep(60000.0 / (self.adjusted_delta_time * 2.0), 300.0, 400.0)
                    * smootherstep(self.jump_distance, 100.0, 200.0);
            }

            wide_angle_bonus = wide_angle_bonus_of(self.angle);
            wide_angle_bonus *=
                1.0 - wide_angle_bonus.min(wide_angle_bonus_of(prev.angle).powi(3));
            wide_angle_bonus *= angle_bonus * smootherstep(self.jump_distance, 0.0, 100.0);

            wiggle_bonus = angle_bonus
                * smootherstep(self.jump_distance, 50.0, 100.0)
                * reverse_lerp(self.jump_distance, 300.0, 100.0).powf(1.8)
                * smootherstep(self.angle, 110.0 * DEG, 60.0 * DEG)
                * smootherstep(prev.jump_distance, 50.0, 100.0)
                * reverse_lerp(prev.jump_distance, 300.0, 100.0).powf(1.8)
                * smootherstep(prev.angle, 110.0 * DEG, 60.0 * DEG);

            {
                let distance = (prev.pos - prev2.pos).magnitude() as f64;
                if distance < 1.0 {
                    wide_angle_bonus *= 1.0 - 0.35 * (1.0 - distance);
                }
            }
        }

        if prev_velocity.max(curr_velocity) != 0.0 {
            // sliderless velocities for the change bonus
            prev_velocity =
                (prev.jump_distance + prev_prev.travel_distance) / prev.adjusted_delta_time;
            curr_velocity = (self.jump_distance + prev.travel_distance) / self.adjusted_delta_time;

            let dist_ratio = smoothstep(
                (prev_velocity - curr_velocity).abs() / prev_velocity.max(curr_velocity),
                0.0,
                1.0,
            );
            let overlap_velocity_buff = (125.0
                / self.adjusted_delta_time.min(prev.adjusted_delta_time))
            .min((prev_velocity - curr_velocity).abs());
            velocity_change_bonus = overlap_velocity_buff
                * dist_ratio
                * (self.adjusted_delta_time.min(prev.adjusted_delta_time)
                    / self.adjusted_delta_time.max(prev.adjusted_delta_time))
                .powi(2);
        }

        if prev.kind == HitObjectKind::Slider {
            slider_bonus = prev.travel_distance / prev.travel_time;
        }

        aim_strain += wiggle_bonus * WIGGLE_MULTIPLIER;
        aim_strain += velocity_change_bonus * VELOCITY_CHANGE_MULTIPLIER;
        aim_strain += (acute_angle_bonus * ACUTE_ANGLE_MULTIPLIER)
            .max(wide_angle_bonus * WIDE_ANGLE_MULTIPLIER);

        aim_strain *= self.small_circle_bonus;

        if with_sliders {
            aim_strain += slider_bonus * SLIDER_MULTIPLIER;
        }

        aim_strain
    }
}

/// Walks a slider's scoring times with the lazy cursor, filling
/// `lazy_end_pos`, `lazy_travel_dist` and `lazy_travel_time`.
///
/// The cursor only moves when a scoring event demands more distance than
/// the skill threshold (90 for ticks/ends, 50 for repeats); on the final
/// event a straight line to the lazy end position wins if shorter.
pub(crate) fn compute_slider_cursor(
    slider: &mut DiffObject,
    ho: &DifficultyHitObject,
    circle_radius: f32,
    options: &Options,
) {
    if slider.lazy_calc_finished {
        return;
    }
    let curve = match ho.curve.as_ref() {
        Some(curve) => curve,
        None => return,
    };

    // sliders clamped to the maximum length get skipped entirely; their
    // bodies are degenerate and would produce absurd travel values
    if options.ignore_clamped_sliders && curve.pixel_length() >= options.slider_curve_max_length {
        return;
    }

    // although this looks like a duplicate of the end tick time, it has a
    // noticeable impact on some maps due to precision issues
    let tail_leniency = options.slider_end_inside_check_offset;
    let total_duration = ho.span_duration as f64 * ho.repeats as f64;
    let tracking_end_time =
        ho.time as f64 + (total_duration - tail_leniency).max(total_duration / 2.0);

    slider.lazy_travel_time = tracking_end_time - ho.time as f64;

    let mut end_time_min = slider.lazy_travel_time / ho.span_duration as f64;
    if end_time_min % 2.0 >= 1.0 {
        end_time_min = 1.0 - end_time_min % 1.0;
    } else {
        end_time_min %= 1.0;
    }

    slider.lazy_end_pos = curve.point_at(end_time_min as f32);

    let mut cursor_pos = ho.pos;
    let scaling_factor = 50.0 / circle_radius as f64;

    let num_scoring_times = ho.scoring_times.len();
    for (i, scoring_time) in ho.scoring_times.iter().enumerate() {
        let mut diff: Point<f32>;

        if scoring_time.kind == ScoringTimeKind::End {
            // the position of the slider end is at the visual end, but the
            // time is at the scoring end
            let t = if ho.repeats % 2 == 1 { 1.0 } else { 0.0 };
            diff = curve.point_at(t) - cursor_pos;
        } else {
            let mut progress = ((scoring_time.time - ho.time as f32)
                .clamp(0.0, ho.duration() as f32) as f64)
                / ho.span_duration as f64;
            if progress % 2.0 >= 1.0 {
                progress = 1.0 - progress % 1.0;
            } else {
                progress %= 1.0;
            }

            diff = curve.point_at(progress as f32) - cursor_pos;
        }

        let mut diff_len = scaling_factor * diff.magnitude() as f64;

        let mut req_diff = 90.0;

        if i == num_scoring_times - 1 {
            // slider end: a direct move to the lazy end position wins if shorter
            let lazy_diff = slider.lazy_end_pos - cursor_pos;
            if lazy_diff.magnitude() < diff.magnitude() {
                diff = lazy_diff;
            }
            diff_len = scaling_factor * diff.magnitude() as f64;
        } else if scoring_time.kind == ScoringTimeKind::Repeat {
            req_diff = 50.0;
        }

        if diff_len > req_diff {
            cursor_pos = cursor_pos + diff.scale(((diff_len - req_diff) / diff_len) as f32);
            diff_len *= (diff_len - req_diff) / diff_len;
            slider.lazy_travel_dist += diff_len;
        }

        if i == num_scoring_times - 1 {
            slider.lazy_end_pos = cursor_pos;
        }
    }

    slider.lazy_calc_finished = true;
}

/// The position the cursor rests at after playing this object: the lazy
/// slider end for sliders, the object position otherwise.
pub(crate) fn end_cursor_position(
    dobj: &mut DiffObject,
    ho: &DifficultyHitObject,
    circle_radius: f32,
    options: &Options,
) -> Point<f32> {
    if dobj.kind == HitObjectKind::Slider {
        compute_slider_cursor(dobj, ho, circle_radius, options);
        return dobj.lazy_end_pos;
    }

    dobj.pos
}
