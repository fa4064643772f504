//! The performance points calculator: a pure function of difficulty
//! attributes and score inputs.

use crate::diff::attributes::{DifficultyAttributes, PERFORMANCE_BASE_MULTIPLIER};
use crate::diff::rating::strain_difficulty_to_performance;
use crate::math::{erf, erf_inv, lerp, logistic, reverse_lerp, smoothstep};
use crate::mods::ModFlags;
use crate::rules;

/// Everything a pp calculation needs to know about one played score.
#[derive(Clone, Debug)]
pub struct ScoreParams {
    /// Difficulty attributes of the beatmap under the score's mods.
    pub attributes: DifficultyAttributes,

    /// The score's mod bitfield.
    pub mod_flags: ModFlags,
    /// Speed multiplier the score was played at.
    pub timescale: f64,
    /// AR before the speed multiplier (other mods already applied).
    pub ar: f64,
    /// OD before the speed multiplier (other mods already applied).
    pub od: f64,

    /// Number of hit objects considered (may be a prefix during play).
    pub num_hit_objects: i32,
    /// Number of circles.
    pub num_circles: i32,
    /// Number of sliders.
    pub num_sliders: i32,
    /// Number of spinners.
    pub num_spinners: i32,

    /// Maximum achievable combo over the considered objects.
    pub max_possible_combo: i32,
    /// Highest combo the score reached; negative means full combo.
    pub combo: i32,
    /// Miss count.
    pub misses: i32,
    /// 300 count; negative means "everything else".
    pub c300: i32,
    /// 100 count.
    pub c100: i32,
    /// 50 count.
    pub c50: i32,

    /// The classic total score, 0 if unknown; enables score-based miss
    /// estimation.
    pub legacy_total_score: u32,
    /// Whether the score was imported from the legacy client (different
    /// scoreV1 multiplier curve).
    pub is_legacy_import: bool,
}

struct ScoreData {
    mod_flags: ModFlags,
    accuracy: f64,
    count_great: i32,
    count_ok: i32,
    count_meh: i32,
    count_miss: i32,
    total_hits: i32,
    beatmap_max_combo: i32,
    score_max_combo: i32,
    amount_hit_objects_with_accuracy: i32,
    legacy_total_score: u32,
}

/// Computes total pp for a score.
///
/// Depends on the active mods plus OD and AR; the incoming AR/OD must not
/// have the speed multiplier applied yet.
pub fn calculate_pp(mut params: ScoreParams) -> f64 {
    let has = |flag: ModFlags| params.mod_flags.contains(flag);

    if params.c300 < 0 {
        params.c300 = params.num_hit_objects - params.c100 - params.c50 - params.misses;
    }

    if params.combo < 0 {
        params.combo = params.max_possible_combo;
    }
    if params.combo < 1 {
        return 0.0;
    }

    let total_hits = params.c300 + params.c100 + params.c50 + params.misses;

    let score = ScoreData {
        mod_flags: params.mod_flags,
        accuracy: if total_hits > 0 {
            (params.c300 * 300 + params.c100 * 100 + params.c50 * 50) as f64
                / (total_hits * 300) as f64
        } else {
            0.0
        },
        count_great: params.c300,
        count_ok: params.c100,
        count_meh: params.c50,
        count_miss: params.misses,
        total_hits,
        beatmap_max_combo: params.max_possible_combo,
        score_max_combo: params.combo,
        amount_hit_objects_with_accuracy: if has(ModFlags::ScoreV2) {
            params.num_circles + params.num_sliders
        } else {
            params.num_circles
        },
        legacy_total_score: params.legacy_total_score,
    };

    // the original (unadjusted) OD feeds the scoreV1 model
    params.attributes.overall_difficulty = params.od;
    params.attributes.slider_count = params.num_sliders;

    let adj_ar = rules::ar_with_speed(params.ar, params.timescale);
    let adj_od = rules::adjust_od_by_clock_rate(params.od, params.timescale);

    // slider breaks aren't exposed to pp calculation, so misses have to be
    // estimated from the combo (and, for legacy scores, from the score)
    let mut combo_based_miss_count = 0.0;
    if params.num_sliders > 0 {
        let full_combo_threshold =
            params.max_possible_combo as f64 - 0.1 * params.num_sliders as f64;
        if (params.combo as f64) < full_combo_threshold {
            combo_based_miss_count = full_combo_threshold / (params.combo as f64).max(1.0);
        }
    }
    let mut effective_miss_count = combo_based_miss_count
        .clamp(params.misses as f64, (params.c50 + params.c100 + params.misses) as f64);

    if score.legacy_total_score > 0 {
        let score_based = calculate_score_based_misscount(
            &params.attributes,
            &score,
            params.timescale,
            params.is_legacy_import,
        );
        effective_miss_count = score_based
            .clamp(params.misses as f64, (params.c50 + params.c100 + params.misses) as f64);
    }

    let mut multiplier = PERFORMANCE_BASE_MULTIPLIER;
    {
        if has(ModFlags::NoFail) {
            multiplier *= (1.0 - 0.02 * effective_miss_count).max(0.9);
        }

        if has(ModFlags::SpunOut) && score.total_hits > 0 {
            multiplier *=
                1.0 - (params.num_spinners as f64 / score.total_hits as f64).powf(0.85);
        }

        if has(ModFlags::Relax) {
            let ok_multiplier = 0.75 * (if adj_od > 0.0 { 1.0 - adj_od / 13.33 } else { 1.0 }).max(0.0);
            let meh_multiplier =
                (if adj_od > 0.0 { 1.0 - (adj_od / 13.33).powi(5) } else { 1.0 }).max(0.0);
            effective_miss_count = (effective_miss_count
                + params.c100 as f64 * ok_multiplier
                + params.c50 as f64 * meh_multiplier)
                .min(score.total_hits as f64);
        }
    }

    let speed_deviation = calculate_speed_deviation(&score, &params.attributes, params.timescale);

    // deviation is calculated against the unadjusted values, the skill
    // values against the adjusted ones
    params.attributes.approach_rate = adj_ar;
    params.attributes.overall_difficulty = adj_od;

    let aim_value = compute_aim_value(&score, &params.attributes, effective_miss_count);
    let speed_value =
        compute_speed_value(&score, &params.attributes, effective_miss_count, speed_deviation);
    let accuracy_value = compute_accuracy_value(&score, &params.attributes);

    (aim_value.powf(1.1) + speed_value.powf(1.1) + accuracy_value.powf(1.1)).powf(1.0 / 1.1)
        * multiplier
}

fn length_bonus(total_hits: i32) -> f64 {
    let total_hits = total_hits as f64;
    0.95 + 0.4 * (total_hits / 2000.0).min(1.0)
        + if total_hits > 2000.0 {
            (total_hits / 2000.0).log10() * 0.5
        } else {
            0.0
        }
}

fn compute_aim_value(
    score: &ScoreData,
    attributes: &DifficultyAttributes,
    effective_miss_count: f64,
) -> f64 {
    if score.mod_flags.contains(ModFlags::Autopilot) {
        return 0.0;
    }

    let mut aim_difficulty = attributes.aim_difficulty;

    // dropped slider ends aren't tracked, so the improperly-followed
    // difficult sliders are estimated from the combo deficit
    if attributes.slider_count > 0 && attributes.aim_difficult_slider_count > 0.0 {
        let maximum_possible_dropped_sliders =
            score.count_ok + score.count_meh + score.count_miss;
        let estimate_improperly_followed_difficult_sliders = (maximum_possible_dropped_sliders
            .min(score.beatmap_max_combo - score.score_max_combo)
            as f64)
            .clamp(0.0, attributes.aim_difficult_slider_count);
        let slider_nerf_factor = (1.0 - attributes.slider_factor)
            * (1.0
                - estimate_improperly_followed_difficult_sliders
                    / attributes.aim_difficult_slider_count)
                .powi(3)
            + attributes.slider_factor;
        aim_difficulty *= slider_nerf_factor;
    }

    let mut aim_value = strain_difficulty_to_performance(aim_difficulty);

    aim_value *= length_bonus(score.total_hits);

    if effective_miss_count > 0.0 && score.total_hits > 0 {
        let aim_estimated_slider_breaks = calculate_estimated_slider_breaks(
            score,
            attributes.aim_top_weighted_slider_factor,
            effective_miss_count,
        );
        let relevant_miss_count = (effective_miss_count + aim_estimated_slider_breaks)
            .min((score.count_ok + score.count_meh + score.count_miss) as f64);
        aim_value *= 0.96
            / ((relevant_miss_count
                / (4.0 * attributes.aim_difficult_strain_count.ln().powf(0.94)))
                + 1.0);
    }

    aim_value * score.accuracy
}

fn compute_speed_value(
    score: &ScoreData,
    attributes: &DifficultyAttributes,
    effective_miss_count: f64,
    speed_deviation: f64,
) -> f64 {
    if score.mod_flags.contains(ModFlags::Relax) || speed_deviation.is_nan() {
        return 0.0;
    }

    let mut speed_value = strain_difficulty_to_performance(attributes.speed_difficulty);

    speed_value *= length_bonus(score.total_hits);

    if effective_miss_count > 0.0 {
        let speed_estimated_slider_breaks = calculate_estimated_slider_breaks(
            score,
            attributes.speed_top_weighted_slider_factor,
            effective_miss_count,
        );
        let relevant_miss_count = (effective_miss_count + speed_estimated_slider_breaks)
            .min((score.count_ok + score.count_meh + score.count_miss) as f64);
        speed_value *= 0.96
            / ((relevant_miss_count
                / (4.0 * attributes.speed_difficult_strain_count.ln().powf(0.94)))
                + 1.0);
    }

    speed_value *= calculate_speed_high_deviation_nerf(attributes, speed_deviation);

    // accuracy over the speed-relevant notes, assuming the worst case
    let relevant_total_diff = (score.total_hits as f64 - attributes.speed_note_count).max(0.0);
    let relevant_count_great = (score.count_great as f64 - relevant_total_diff).max(0.0);
    let relevant_count_ok = (score.count_ok as f64
        - (relevant_total_diff - score.count_great as f64).max(0.0))
    .max(0.0);
    let relevant_count_meh = (score.count_meh as f64
        - (relevant_total_diff - (score.count_great + score.count_ok) as f64).max(0.0))
    .max(0.0);
    let relevant_accuracy = if attributes.speed_note_count == 0.0 {
        0.0
    } else {
        (relevant_count_great * 6.0 + relevant_count_ok * 2.0 + relevant_count_meh)
            / (attributes.speed_note_count * 6.0)
    };

    // scale with accuracy and OD
    speed_value *= ((score.accuracy + relevant_accuracy) / 2.0)
        .powf((14.5 - attributes.overall_difficulty) / 2.0);

    if score.mod_flags.contains(ModFlags::Singletap) {
        speed_value *= 1.25;
    }

    if score.mod_flags.contains(ModFlags::NoKeylock) {
        speed_value *= 0.5;
    }

    speed_value
}

fn compute_accuracy_value(score: &ScoreData, attributes: &DifficultyAttributes) -> f64 {
    if score.mod_flags.contains(ModFlags::Relax) {
        return 0.0;
    }

    let better_accuracy_percentage = if score.amount_hit_objects_with_accuracy > 0 {
        (((score.count_great
            - (score.total_hits - score.amount_hit_objects_with_accuracy).max(0))
            as f64)
            * 6.0
            + score.count_ok as f64 * 2.0
            + score.count_meh as f64)
            / (score.amount_hit_objects_with_accuracy as f64 * 6.0)
    } else {
        0.0
    };

    // can go negative when there are more misses than accuracy objects
    let better_accuracy_percentage = better_accuracy_percentage.max(0.0);

    let mut accuracy_value = 1.52163f64.powf(attributes.overall_difficulty)
        * better_accuracy_percentage.powi(24)
        * 2.83;

    accuracy_value *= (score.amount_hit_objects_with_accuracy as f64 / 1000.0)
        .powf(0.3)
        .min(1.15);

    if score.mod_flags.contains(ModFlags::Hidden) {
        // reduced bonus above AR10
        accuracy_value *= 1.0 + 0.08 * reverse_lerp(attributes.approach_rate, 11.5, 10.0);
    }

    if score.mod_flags.contains(ModFlags::Flashlight) {
        accuracy_value *= 1.02;
    }

    accuracy_value
}

fn calculate_estimated_slider_breaks(
    score: &ScoreData,
    top_weighted_slider_factor: f64,
    effective_miss_count: f64,
) -> f64 {
    if score.count_ok == 0 || score.beatmap_max_combo < 1 {
        return 0.0;
    }

    let missed_combo_percent =
        1.0 - score.score_max_combo as f64 / score.beatmap_max_combo as f64;
    let mut estimated_slider_breaks =
        (score.count_ok as f64).min(effective_miss_count * top_weighted_slider_factor);

    // scores with more Oks are more likely to have slider breaks
    let ok_adjustment =
        ((score.count_ok as f64 - estimated_slider_breaks) + 0.5) / score.count_ok as f64;

    // near a single effective miss the score-based estimate is already
    // good at telling whether only one break occurred
    estimated_slider_breaks *= smoothstep(effective_miss_count, 1.0, 2.0);

    estimated_slider_breaks * ok_adjustment * logistic(missed_combo_percent, 0.33, 15.0, 1.0)
}

fn calculate_speed_deviation(
    score: &ScoreData,
    attributes: &DifficultyAttributes,
    timescale: f64,
) -> f64 {
    if score.count_great + score.count_ok + score.count_meh == 0 {
        return f64::NAN;
    }

    let mut speed_note_count = attributes.speed_note_count;
    speed_note_count += (score.total_hits as f64 - attributes.speed_note_count) * 0.1;

    let relevant_count_miss = (score.count_miss as f64).min(speed_note_count);
    let relevant_count_meh = (score.count_meh as f64).min(speed_note_count - relevant_count_miss);
    let relevant_count_ok =
        (score.count_ok as f64).min(speed_note_count - relevant_count_miss - relevant_count_meh);
    let relevant_count_great =
        (speed_note_count - relevant_count_miss - relevant_count_meh - relevant_count_ok).max(0.0);

    calculate_deviation(
        attributes,
        timescale,
        relevant_count_great,
        relevant_count_ok,
        relevant_count_meh,
    )
}

fn calculate_deviation(
    attributes: &DifficultyAttributes,
    timescale: f64,
    relevant_count_great: f64,
    relevant_count_ok: f64,
    relevant_count_meh: f64,
) -> f64 {
    if relevant_count_great + relevant_count_ok + relevant_count_meh <= 0.0 {
        return f64::NAN;
    }

    let od = attributes.overall_difficulty;
    let great_hit_window =
        rules::adjust_hit_window(rules::od_to_300_hit_window_ms(od)) / timescale;
    let ok_hit_window = rules::adjust_hit_window(rules::od_to_100_hit_window_ms(od)) / timescale;
    let meh_hit_window = rules::adjust_hit_window(rules::od_to_50_hit_window_ms(od)) / timescale;

    // 99% confidence interval
    const Z: f64 = 2.32634787404;
    const SQRT2: f64 = std::f64::consts::SQRT_2;
    const SQRT3: f64 = 1.7320508075688772;
    const SQRT2_OVER_PI: f64 = 0.7978845608028654;

    let n = (relevant_count_great + relevant_count_ok).max(1.0);
    let p = relevant_count_great / n;
    // Wilson lower bound on the true 300 probability
    let p_lower_bound = p.min(
        (n * p + Z * Z / 2.0) / (n + Z * Z)
            - Z / (n + Z * Z) * (n * p * (1.0 - p) + Z * Z / 4.0).sqrt(),
    );

    let deviation = if p_lower_bound > 0.01 {
        let mut deviation = great_hit_window / (SQRT2 * erf_inv(p_lower_bound));
        let ok_hit_window_tail_amount = SQRT2_OVER_PI * ok_hit_window
            * f64::exp(-0.5 * (ok_hit_window / deviation).powi(2))
            / (deviation * erf(ok_hit_window / (SQRT2 * deviation)));
        deviation *= (1.0 - ok_hit_window_tail_amount).sqrt();
        deviation
    } else {
        ok_hit_window / SQRT3
    };

    let meh_variance = (meh_hit_window * meh_hit_window
        + ok_hit_window * meh_hit_window
        + ok_hit_window * ok_hit_window)
        / 3.0;

    (((relevant_count_great + relevant_count_ok) * deviation.powi(2)
        + relevant_count_meh * meh_variance)
        / (relevant_count_great + relevant_count_ok + relevant_count_meh))
        .sqrt()
}

fn calculate_speed_high_deviation_nerf(
    attributes: &DifficultyAttributes,
    speed_deviation: f64,
) -> f64 {
    if speed_deviation.is_nan() {
        return 0.0;
    }

    let speed_value = strain_difficulty_to_performance(attributes.speed_difficulty);
    let excess_speed_difficulty_cutoff = 100.0 + 220.0 * (22.0 / speed_deviation).powf(6.5);
    if speed_value <= excess_speed_difficulty_cutoff {
        return 1.0;
    }

    const SCALE: f64 = 50.0;
    let mut adjusted_speed_value = SCALE
        * (((speed_value - excess_speed_difficulty_cutoff) / SCALE + 1.0).ln()
            + excess_speed_difficulty_cutoff / SCALE);
    let lerp_val = 1.0 - ((speed_deviation - 22.0) / (27.0 - 22.0)).clamp(0.0, 1.0);
    adjusted_speed_value = lerp(adjusted_speed_value, speed_value, lerp_val);

    adjusted_speed_value / speed_value
}

fn calculate_score_based_misscount(
    attributes: &DifficultyAttributes,
    score: &ScoreData,
    timescale: f64,
    is_legacy_import: bool,
) -> f64 {
    if score.beatmap_max_combo == 0 {
        return 0.0;
    }

    let score_v2 = score.mod_flags.contains(ModFlags::ScoreV2);

    let mod_multiplier = score_v1_mod_multiplier(score.mod_flags, timescale, is_legacy_import);
    let score_v1_multiplier = attributes.legacy_score_base_multiplier * mod_multiplier;
    let relevant_combo_per_object = calculate_relevant_score_combo_per_object(attributes, score);

    let maximum_miss_count = calculate_maximum_combo_based_miss_count(attributes, score);

    let mut score_obtained_during_max_combo = calculate_score_at_combo(
        attributes,
        score,
        score.score_max_combo as f64,
        relevant_combo_per_object,
        score_v1_multiplier,
    );
    if score_v2 {
        score_obtained_during_max_combo *= 700_000.0 / attributes.maximum_legacy_combo_score as f64;
    }

    let score_legacy_total_score = score.legacy_total_score as f64
        - if score_v2 {
            300_000.0 * score.accuracy.powi(10) * mod_multiplier
        } else {
            0.0
        };
    let remaining_score = score_legacy_total_score - score_obtained_during_max_combo;

    if remaining_score <= 0.0 {
        return maximum_miss_count;
    }

    let remaining_combo = (score.beatmap_max_combo - score.score_max_combo) as f64;
    let mut expected_remaining_score = calculate_score_at_combo(
        attributes,
        score,
        remaining_combo,
        relevant_combo_per_object,
        score_v1_multiplier,
    );
    if score_v2 {
        expected_remaining_score *= 700_000.0 / attributes.maximum_legacy_combo_score as f64;
    }

    let score_based_miss_count = expected_remaining_score / remaining_score;

    // below one detected miss, the combo-based count decides FC or not
    let score_based_miss_count = score_based_miss_count.max(1.0);

    // capped by a very harsh version of the combo-based miss count
    score_based_miss_count.min(maximum_miss_count)
}

fn calculate_score_at_combo(
    attributes: &DifficultyAttributes,
    score: &ScoreData,
    combo: f64,
    relevant_combo_per_object: f64,
    score_v1_multiplier: f64,
) -> f64 {
    let total_hits = score.count_great + score.count_ok + score.count_meh + score.count_miss;

    let estimated_objects = (combo / relevant_combo_per_object) - 1.0;

    // the combo portion of scoreV1 follows an arithmetic progression over
    // the combo per object
    let combo_score = if relevant_combo_per_object > 0.0 {
        (2.0 * (relevant_combo_per_object - 1.0) + (estimated_objects - 1.0) * relevant_combo_per_object)
            * estimated_objects
            / 2.0
    } else {
        0.0
    };

    let combo_score = combo_score * (300.0 / 25.0) * score_v1_multiplier;

    // scoreV2 only wants the combo portion, unscaled by accuracy; its real
    // formula differs but estimation precision is less important here
    if score.mod_flags.contains(ModFlags::ScoreV2) {
        return combo_score;
    }

    let objects_hit =
        (total_hits - score.count_miss) as f64 * combo / score.beatmap_max_combo as f64;

    // score also has a non-combo portion
    let non_combo_score = (300.0 + attributes.nested_score_per_object) * objects_hit;

    (combo_score + non_combo_score) * score.accuracy
}

fn calculate_relevant_score_combo_per_object(
    attributes: &DifficultyAttributes,
    score: &ScoreData,
) -> f64 {
    let mut combo_score = attributes.maximum_legacy_combo_score as f64;

    // reverse the scoreV1 multipliers to get the raw value
    combo_score /= 300.0 / 25.0 * attributes.legacy_score_base_multiplier;

    // then reverse the arithmetic progression for the combo per object
    let max_combo = score.beatmap_max_combo as f64;
    let result = (max_combo - 2.0) * max_combo;
    result / (max_combo + 2.0 * (combo_score - 1.0)).max(1.0)
}

fn calculate_maximum_combo_based_miss_count(
    attributes: &DifficultyAttributes,
    score: &ScoreData,
) -> f64 {
    let score_miss_count = score.count_miss;

    if attributes.slider_count <= 0 {
        return score_miss_count as f64;
    }

    let total_imperfect_hits = score.count_ok + score.count_meh + score_miss_count;

    let mut miss_count = 0.0f64;

    // full combo is max combo minus dropped slider tails; classic scores
    // can't know those, so 10% of all sliders is assumed
    let full_combo_threshold =
        score.beatmap_max_combo as f64 - 0.1 * attributes.slider_count as f64;

    if (score.score_max_combo as f64) < full_combo_threshold {
        miss_count = (full_combo_threshold / (score.score_max_combo.max(1)) as f64).powf(2.5);
    }

    // classic scores can't have more misses than imperfect judgements
    miss_count = miss_count.min(total_imperfect_hits as f64);

    // every slider is worth at least 2 combo in classic mechanics, so a
    // score that loses 1 combo can't have slider-broken; it dropped an end
    let max_possible_slider_breaks = attributes
        .slider_count
        .min((score.beatmap_max_combo - score.score_max_combo) / 2);

    let slider_breaks = miss_count - score_miss_count as f64;

    if slider_breaks > max_possible_slider_breaks as f64 {
        miss_count = (score_miss_count + max_possible_slider_breaks) as f64;
    }

    miss_count
}

/// The scoreV1 total-score multiplier for a mod combination.
///
/// Has to match how the score's classic total was actually calculated: the
/// engine's own scores use a smooth curve over the speed multiplier, while
/// legacy-imported scores used flat DT/HT factors.
pub fn score_v1_mod_multiplier(flags: ModFlags, speed_override: f64, legacy_import: bool) -> f64 {
    let has = |flag: ModFlags| flags.contains(flag);
    let mut multiplier = 1.0f64;

    if !legacy_import {
        let sv2 = has(ModFlags::ScoreV2);

        // dumb formula, but the values for HT/DT were dumb to begin with
        if speed_override > 1.0 {
            multiplier *= 0.24 * speed_override + 0.76;
        } else if speed_override < 1.0 {
            multiplier *= 0.008 * f64::exp(4.81588 * speed_override);
        }

        if has(ModFlags::Easy) || (has(ModFlags::NoFail) && !sv2) {
            multiplier *= 0.5;
        }
        if has(ModFlags::HardRock) {
            multiplier *= if sv2 { 1.1 } else { 1.06 };
        }
        if has(ModFlags::Flashlight) {
            multiplier *= 1.12;
        }
        if has(ModFlags::Hidden) {
            multiplier *= 1.06;
        }
        if has(ModFlags::SpunOut) {
            multiplier *= 0.90;
        }
        if has(ModFlags::Relax) || has(ModFlags::Autopilot) {
            multiplier *= 0.0;
        }
    } else {
        let sv2 = has(ModFlags::ScoreV2);
        let dt = speed_override > 1.0;
        let ht = speed_override < 1.0;

        if has(ModFlags::NoFail) {
            multiplier *= if sv2 { 1.0 } else { 0.5 };
        }
        if has(ModFlags::Easy) {
            multiplier *= 0.5;
        }
        if ht {
            multiplier *= 0.30;
        }
        if has(ModFlags::HardRock) {
            multiplier *= if sv2 { 1.1 } else { 1.06 };
        }
        if dt {
            multiplier *= if sv2 { 1.2 } else { 1.12 };
        }
        if has(ModFlags::Hidden) {
            multiplier *= 1.06;
        }
        if has(ModFlags::SpunOut) {
            multiplier *= 0.90;
        }
    }

    multiplier
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_attributes() -> DifficultyAttributes {
        DifficultyAttributes {
            aim_difficulty: 2.5,
            aim_difficult_slider_count: 40.0,
            speed_difficulty: 2.0,
            speed_note_count: 250.0,
            slider_factor: 0.98,
            aim_top_weighted_slider_factor: 0.2,
            speed_top_weighted_slider_factor: 0.15,
            aim_difficult_strain_count: 90.0,
            speed_difficult_strain_count: 70.0,
            nested_score_per_object: 18.0,
            legacy_score_base_multiplier: 4.0,
            slider_count: 120,
            maximum_legacy_combo_score: 6_000_000,
            approach_rate: 9.0,
            overall_difficulty: 8.5,
        }
    }

    fn test_params() -> ScoreParams {
        ScoreParams {
            attributes: test_attributes(),
            mod_flags: ModFlags::empty(),
            timescale: 1.0,
            ar: 9.0,
            od: 8.5,
            num_hit_objects: 500,
            num_circles: 350,
            num_sliders: 120,
            num_spinners: 30,
            max_possible_combo: 800,
            combo: 800,
            misses: 0,
            c300: 500,
            c100: 0,
            c50: 0,
            legacy_total_score: 0,
            is_legacy_import: false,
        }
    }

    #[test]
    fn ss_play_yields_positive_pp() {
        let pp = calculate_pp(test_params());
        assert!(pp > 0.0 && pp.is_finite());
    }

    #[test]
    fn zero_combo_yields_zero() {
        let params = ScoreParams {
            combo: 0,
            ..test_params()
        };
        assert_eq!(calculate_pp(params), 0.0);
    }

    #[test]
    fn misses_lower_pp() {
        let clean = calculate_pp(test_params());
        let missy = calculate_pp(ScoreParams {
            misses: 10,
            c300: 490,
            combo: 400,
            ..test_params()
        });
        assert!(missy < clean);
    }

    #[test]
    fn relax_zeroes_speed_and_accuracy() {
        // relax pp comes from aim alone and so has to drop
        let normal = calculate_pp(test_params());
        let relax = calculate_pp(ScoreParams {
            mod_flags: ModFlags::Relax,
            ..test_params()
        });
        assert!(relax < normal);
        assert!(relax > 0.0);
    }

    #[test]
    fn autopilot_zeroes_aim() {
        let ap = calculate_pp(ScoreParams {
            mod_flags: ModFlags::Autopilot,
            ..test_params()
        });
        let normal = calculate_pp(test_params());
        assert!(ap < normal);
    }

    #[test]
    fn negative_c300_is_autofilled() {
        let explicit = calculate_pp(test_params());
        let auto = calculate_pp(ScoreParams {
            c300: -1,
            ..test_params()
        });
        assert!((explicit - auto).abs() < 1e-9);
    }

    #[test]
    fn hidden_buffs_accuracy_value() {
        let hd = calculate_pp(ScoreParams {
            mod_flags: ModFlags::Hidden,
            ..test_params()
        });
        let normal = calculate_pp(test_params());
        assert!(hd > normal);
    }

    #[test]
    fn scorev1_multiplier_curves() {
        // modern curve at DT vs legacy import flat value
        let modern = score_v1_mod_multiplier(ModFlags::empty(), 1.5, false);
        assert!((modern - (0.24 * 1.5 + 0.76)).abs() < 1e-9);

        let legacy = score_v1_mod_multiplier(ModFlags::empty(), 1.5, true);
        assert!((legacy - 1.12).abs() < 1e-9);

        let legacy_ht = score_v1_mod_multiplier(ModFlags::empty(), 0.75, true);
        assert!((legacy_ht - 0.30).abs() < 1e-9);

        assert_eq!(score_v1_mod_multiplier(ModFlags::Relax, 1.0, false), 0.0);
    }

    #[test]
    fn score_based_misscount_bounded_by_imperfect_hits() {
        // 90% max combo, huge legacy score: score-based count must sit
        // between the combo-based count and c100 + c50 + misses
        let attributes = test_attributes();
        let params = ScoreParams {
            attributes: attributes.clone(),
            combo: 720,
            misses: 0,
            c300: 495,
            c100: 5,
            legacy_total_score: 12_000_000,
            ..test_params()
        };
        let pp_with_score = calculate_pp(params.clone());
        assert!(pp_with_score > 0.0);

        // and misses never exceed the imperfect-hit bound internally
        let score = ScoreData {
            mod_flags: ModFlags::empty(),
            accuracy: 0.99,
            count_great: 495,
            count_ok: 5,
            count_meh: 0,
            count_miss: 0,
            total_hits: 500,
            beatmap_max_combo: 800,
            score_max_combo: 720,
            amount_hit_objects_with_accuracy: 350,
            legacy_total_score: 12_000_000,
        };
        let miss_count = calculate_score_based_misscount(&attributes, &score, 1.0, false);
        assert!(miss_count <= 5.0);
        assert!(miss_count >= 0.0);
    }
}
