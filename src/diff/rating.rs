//! Final rating transforms: raw skill values to star rating, plus the
//! scoreV1 scoring attributes.

use crate::math::{lerp, reverse_lerp};
use crate::rules;

use super::attributes::{
    DifficultyAttributes, DifficultyInput, RawDifficultyValues, PERFORMANCE_BASE_MULTIPLIER,
};
use super::{DifficultyHitObject, HitObjectKind};
use crate::beatmap::ScoringTimeKind;

/// Maps a raw difficulty value to its rating.
pub fn difficulty_rating(difficulty_value: f64) -> f64 {
    const DIFFICULTY_MULTIPLIER: f64 = 0.0675;
    difficulty_value.sqrt() * DIFFICULTY_MULTIPLIER
}

/// Converts a skill rating into its pp-scale performance value.
#[inline]
pub fn strain_difficulty_to_performance(difficulty: f64) -> f64 {
    (5.0 * (difficulty / 0.0675).max(1.0) - 4.0).powi(3) / 100_000.0
}

/// Star rating from the combined base performance of aim and speed.
pub fn star_rating_from_performance(base_performance: f64) -> f64 {
    const STAR_RATING_MULTIPLIER: f64 = 0.0265;

    if base_performance <= 0.00001 {
        return 0.0;
    }

    PERFORMANCE_BASE_MULTIPLIER.cbrt()
        * STAR_RATING_MULTIPLIER
        * ((100_000.0 / 2.0f64.powf(1.0 / 1.1) * base_performance).cbrt() + 4.0)
}

/// Star rating from the two final skill ratings.
pub fn total_stars_from_skills(aim: f64, speed: f64) -> f64 {
    let base_aim_performance = strain_difficulty_to_performance(aim);
    let base_speed_performance = strain_difficulty_to_performance(speed);
    let base_performance =
        (base_aim_performance.powf(1.1) + base_speed_performance.powf(1.1)).powf(1.0 / 1.1);
    star_rating_from_performance(base_performance)
}

/// Star rating the map would have from its raw aim/speed values alone,
/// used to scale the visibility bonus.
pub fn mechanical_difficulty_rating(aim_difficulty_value: f64, speed_difficulty_value: f64) -> f64 {
    let aim_value = strain_difficulty_to_performance(difficulty_rating(aim_difficulty_value));
    let speed_value = strain_difficulty_to_performance(difficulty_rating(speed_difficulty_value));

    let total_value = (aim_value.powf(1.1) + speed_value.powf(1.1)).powf(1.0 / 1.1);

    star_rating_from_performance(total_value)
}

fn aim_visibility_factor(approach_rate: f64, mechanical_difficulty_rating: f64) -> f64 {
    const AR_FACTOR_END_POINT: f64 = 11.5;

    let mechanical_difficulty_factor = reverse_lerp(mechanical_difficulty_rating, 5.0, 10.0);
    let ar_factor_starting_point = lerp(9.0, 10.33, mechanical_difficulty_factor);

    reverse_lerp(approach_rate, AR_FACTOR_END_POINT, ar_factor_starting_point)
}

fn speed_visibility_factor(approach_rate: f64, mechanical_difficulty_rating: f64) -> f64 {
    const AR_FACTOR_END_POINT: f64 = 11.5;

    let mechanical_difficulty_factor = reverse_lerp(mechanical_difficulty_rating, 5.0, 10.0);
    let ar_factor_starting_point = lerp(10.0, 10.33, mechanical_difficulty_factor);

    reverse_lerp(approach_rate, AR_FACTOR_END_POINT, ar_factor_starting_point)
}

fn visibility_bonus(approach_rate: f64, visibility_factor: f64, slider_factor: f64) -> f64 {
    // traceable-style mods would flip this; the engine always treats
    // hidden objects as fully invisible
    let is_always_partially_visible = false;

    let mut reading_bonus = if is_always_partially_visible { 0.025 } else { 0.04 }
        * (12.0 - approach_rate.min(12.0).max(7.0));

    reading_bonus *= visibility_factor;

    // slideraim on low AR is rewarded less
    let slider_visibility_factor = slider_factor.powi(3);

    // below AR7, reduce the reward while the object is visible
    if approach_rate < 7.0 {
        reading_bonus += if is_always_partially_visible { 0.02 } else { 0.045 }
            * (7.0 - approach_rate.max(0.0))
            * slider_visibility_factor;
    }

    // from AR0 down, cap so the bonus can't grow to infinity
    if approach_rate < 0.0 {
        reading_bonus += if is_always_partially_visible { 0.01 } else { 0.1 }
            * (1.0 - approach_rate.max(1.5))
            * slider_visibility_factor;
    }

    reading_bonus
}

fn rating_length_bonus(total_hits: u32) -> f64 {
    let total_hits = total_hits as f64;
    0.95 + 0.4 * (total_hits / 2000.0).min(1.0)
        + if total_hits > 2000.0 {
            (total_hits / 2000.0).log10() * 0.5
        } else {
            0.0
        }
}

/// Transforms a raw aim difficulty value into the final aim rating.
#[allow(clippy::too_many_arguments)]
pub fn compute_aim_rating(
    aim_difficulty_value: f64,
    total_hits: u32,
    approach_rate: f64,
    overall_difficulty: f64,
    mechanical_difficulty_rating: f64,
    slider_factor: f64,
    input: &DifficultyInput,
) -> f64 {
    if input.autopilot {
        return 0.0;
    }

    let mut aim_rating = difficulty_rating(aim_difficulty_value);

    if input.touch_device {
        aim_rating = aim_rating.powf(0.8);
    }

    if input.relax {
        aim_rating *= 0.9;
    }

    let mut rating_multiplier = 1.0;

    let approach_rate_length_bonus = rating_length_bonus(total_hits);

    let mut approach_rate_factor = 0.0;
    if approach_rate > 10.33 {
        approach_rate_factor = 0.3 * (approach_rate - 10.33);
    } else if approach_rate < 8.0 {
        approach_rate_factor = 0.05 * (8.0 - approach_rate);
    }

    if input.relax {
        approach_rate_factor = 0.0;
    }

    // longer maps with high AR are harder to read
    rating_multiplier += approach_rate_factor * approach_rate_length_bonus;

    if input.hidden {
        let factor = aim_visibility_factor(approach_rate, mechanical_difficulty_rating);
        rating_multiplier += visibility_bonus(approach_rate, factor, slider_factor);
    }

    // accuracy difficulty matters when scaling with accuracy
    rating_multiplier *= 0.98 + overall_difficulty.max(0.0).powi(2) / 2500.0;

    aim_rating * rating_multiplier.cbrt()
}

/// Transforms a raw speed difficulty value into the final speed rating.
pub fn compute_speed_rating(
    speed_difficulty_value: f64,
    total_hits: u32,
    approach_rate: f64,
    overall_difficulty: f64,
    mechanical_difficulty_rating: f64,
    input: &DifficultyInput,
) -> f64 {
    if input.relax {
        return 0.0;
    }

    let mut speed_rating = difficulty_rating(speed_difficulty_value);

    if input.autopilot {
        speed_rating *= 0.5;
    }

    let mut rating_multiplier = 1.0;

    let approach_rate_length_bonus = rating_length_bonus(total_hits);

    let mut approach_rate_factor = 0.0;
    if approach_rate > 10.33 {
        approach_rate_factor = 0.3 * (approach_rate - 10.33);
    }

    if input.autopilot {
        approach_rate_factor = 0.0;
    }

    rating_multiplier += approach_rate_factor * approach_rate_length_bonus;

    if input.hidden {
        let factor = speed_visibility_factor(approach_rate, mechanical_difficulty_rating);
        rating_multiplier += visibility_bonus(approach_rate, factor, 1.0);
    }

    rating_multiplier *= 0.95 + overall_difficulty.max(0.0).powi(2) / 750.0;

    speed_rating * rating_multiplier.cbrt()
}

/// ScoreV1 spinner score for a spinner of the given duration.
///
/// Reproduces osu-stable mechanics at the maximum spin rate, slightly
/// underestimating bonus score to represent the average case.
fn score_v1_spinner_score(spinner_duration: f64) -> f64 {
    const SPIN_SCORE: i32 = 100;
    const BONUS_SPIN_SCORE: i32 = 1000;

    const MAXIMUM_ROTATIONS_PER_SECOND: f64 = 477.0 / 60.0;
    const MINIMUM_ROTATIONS_PER_SECOND: f64 = 3.0;

    let seconds_duration = spinner_duration / 1000.0;

    let total_half_spins_possible = (seconds_duration * MAXIMUM_ROTATIONS_PER_SECOND * 2.0) as i32;
    let half_spins_required_for_completion =
        (seconds_duration * MINIMUM_ROTATIONS_PER_SECOND) as i32;
    // bonus starts another 1.5 rotations after completion
    let half_spins_required_before_bonus = half_spins_required_for_completion + 3;

    let mut score = 0i64;

    let full_spins = total_half_spins_possible / 2;
    score += (SPIN_SCORE * full_spins) as i64;

    let mut bonus_spins = (total_half_spins_possible - half_spins_required_before_bonus) / 2;
    bonus_spins = (bonus_spins - full_spins / 2).max(0);
    score += (BONUS_SPIN_SCORE * bonus_spins) as i64;

    score as f64
}

/// Fills the scoreV1 scoring constants on the attributes: nested score per
/// object, the legacy difficulty multiplier, and the maximum combo score.
pub fn calculate_score_v1_attributes(
    attributes: &mut DifficultyAttributes,
    hit_objects: &[DifficultyHitObject],
    input: &DifficultyInput,
    up_to_object_index: i32,
) {
    const BIG_TICK_SCORE: f64 = 30.0;
    const SMALL_TICK_SCORE: f64 = 10.0;

    let mut slider_score = 0.0;
    let mut spinner_score = 0.0;

    let up_to = if up_to_object_index < 1 {
        hit_objects.len()
    } else {
        (up_to_object_index as usize).min(hit_objects.len())
    };

    for ho in &hit_objects[..up_to] {
        match ho.kind {
            HitObjectKind::Slider => {
                // 1 for head, 1 for tail, plus repeats
                let big_ticks = 2 + (ho.repeats - 1);

                let small_ticks = ho
                    .scoring_times
                    .iter()
                    .filter(|st| st.kind == ScoringTimeKind::Tick)
                    .count();

                slider_score += big_ticks as f64 * BIG_TICK_SCORE + small_ticks as f64 * SMALL_TICK_SCORE;
            }
            HitObjectKind::Spinner => {
                spinner_score += score_v1_spinner_score((ho.base_end_time - ho.base_time) as f64);
            }
            HitObjectKind::Circle => {}
        }
    }

    attributes.nested_score_per_object = (slider_score + spinner_score) / up_to.max(1) as f64;

    // legacy score base multiplier, from the classic difficulty formula
    let break_time_ms = input.break_duration;
    let drain_length =
        (input.playable_length - break_time_ms.min(input.playable_length)).max(1000) / 1000;
    attributes.legacy_score_base_multiplier = ((input.cs
        + input.hp
        + input.od
        + (hit_objects.len() as f32 / drain_length as f32 * 8.0).clamp(0.0, 16.0))
        / 38.0
        * 5.0)
        .round() as i32 as f64;

    // maximum combo score
    const SCORE_INCREASE: f64 = 300.0;
    let mut combo = 0i64;
    attributes.maximum_legacy_combo_score = 0;

    let mut total: u64 = 0;
    for ho in &hit_objects[..up_to] {
        if ho.kind == HitObjectKind::Slider {
            // combo rises for each nested object, and for sliders the
            // combo increase applies before the score is given
            combo += ho.scoring_times.len() as i64;
            combo += 1;
        }

        total += ((combo - 1).max(0) as f64
            * (SCORE_INCREASE / 25.0 * attributes.legacy_score_base_multiplier))
            as u64;

        if ho.kind != HitObjectKind::Slider {
            combo += 1;
        }
    }
    attributes.maximum_legacy_combo_score = total.min(u32::MAX as u64) as u32;

    // slider count travels with the attributes for the pp side
    attributes.slider_count = hit_objects[..up_to]
        .iter()
        .filter(|ho| ho.kind == HitObjectKind::Slider)
        .count() as i32;
}

/// Recomputes the final star rating from cached raw difficulty values with
/// different mod flags (e.g. hidden), skipping all strain calculation.
pub fn recompute_star_rating(
    raw: &RawDifficultyValues,
    num_diff_objects: u32,
    input: &DifficultyInput,
) -> f64 {
    let slider_factor = if raw.aim > 0.0 {
        difficulty_rating(raw.aim_no_sliders) / difficulty_rating(raw.aim)
    } else {
        1.0
    };
    let mechanical = mechanical_difficulty_rating(raw.aim, raw.speed);

    let adj_ar = rules::ar_with_speed(input.ar as f64, input.speed_multiplier as f64);
    let adj_od = rules::adjust_od_by_clock_rate(input.od as f64, input.speed_multiplier as f64);

    let aim = compute_aim_rating(
        raw.aim,
        num_diff_objects,
        adj_ar,
        adj_od,
        mechanical,
        slider_factor,
        input,
    );
    let speed = compute_speed_rating(raw.speed, num_diff_objects, adj_ar, adj_od, mechanical, input);

    total_stars_from_skills(aim, speed)
}
