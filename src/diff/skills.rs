//! Peak-strain windows and the per-skill difficulty value.

use crate::math::lerp;

use super::attributes::{DifficultyAttributes, IncrementalState, Skill, DIFFCALC_EPSILON};
use super::object::{strain_decay, DiffObject};
use super::HitObjectKind;

/// Length of one peak-strain section in milliseconds.
const STRAIN_STEP: f64 = 400.0;

/// Weight decay between consecutive top strains.
const DECAY_WEIGHT: f64 = 0.9;

/// Top sections scaled down to soften extreme difficulty spikes.
const REDUCED_SECTION_COUNT: usize = 10;
const REDUCED_STRAIN_BASELINE: f64 = 0.75;

fn insert_sorted(values: &mut Vec<f64>, value: f64) {
    let idx = values.partition_point(|&v| v <= value);
    values.insert(idx, value);
}

fn logistic_note(value: f64, max: f64) -> f64 {
    1.0 / (1.0 + f64::exp(-((value / max * 12.0) - 6.0)))
}

fn difficult_strain_note(value: f64, consistent_top_strain: f64) -> f64 {
    1.1 / (1.0 + f64::exp(-10.0 * (value / consistent_top_strain - 0.88)))
}

/// Weighs the per-object strains of one skill into its difficulty value
/// and fills the derived attributes.
///
/// When `incremental` state is given, only the last object's contribution
/// is added to the carried sums and sorted peak list; otherwise the whole
/// array is processed from scratch.
pub fn calculate_difficulty(
    skill: Skill,
    dobjects: &[DiffObject],
    count: usize,
    mut incremental: Option<&mut IncrementalState>,
    out_strains: Option<&mut Vec<f64>>,
    out_attributes: Option<&mut DifficultyAttributes>,
) -> f64 {
    if count < 1 {
        return 0.0;
    }

    let mut interval_end = match incremental.as_ref() {
        Some(state) => state.interval_end,
        None => (dobjects[0].time as f64 / STRAIN_STEP).ceil() * STRAIN_STEP,
    };
    let mut max_strain = incremental.as_ref().map(|s| s.max_strain).unwrap_or(0.0);

    let mut highest_strains: Vec<f64> = Vec::new();

    let start = if incremental.is_some() { count - 1 } else { 0 };
    for i in start..count {
        let cur = &dobjects[i];
        let prev = &dobjects[i.saturating_sub(1)];

        // close previous peak sections until the current object's section
        while cur.time as f64 > interval_end {
            match incremental.as_mut() {
                Some(state) => insert_sorted(&mut state.highest_strains, max_strain),
                None => highest_strains.push(max_strain),
            }

            // skip strain decay across very long breaks (e.g. beatmap
            // upload size limit hack diffs); decay at 60s is ~4e-32,
            // below any meaningful difference
            let strain_delta = interval_end - prev.time as f64;
            if i < 1 || strain_delta > 600_000.0 {
                max_strain = 0.0;
            } else {
                max_strain = prev.get_strain(skill) * strain_decay(skill, strain_delta);
            }

            interval_end += STRAIN_STEP;
        }

        let cur_strain = cur.get_strain(skill);
        max_strain = max_strain.max(cur_strain);
    }

    // the peak of the unfinished last section isn't saved by the loop
    match incremental.as_mut() {
        Some(state) => {
            state.interval_end = interval_end;
            state.max_strain = max_strain;
            highest_strains = state.highest_strains.clone();
            insert_sorted(&mut highest_strains, max_strain);
        }
        None => highest_strains.push(max_strain),
    }

    if let Some(out) = out_strains {
        *out = highest_strains.clone();
    }

    match out_attributes {
        Some(attributes) => {
            fill_note_counts(skill, dobjects, count, incremental.as_deref_mut(), attributes);
            let difficulty = weigh_strains(skill, &mut highest_strains, incremental.is_some());
            fill_difficult_strains(skill, dobjects, count, incremental, attributes, difficulty);
            difficulty
        }
        None => weigh_strains(skill, &mut highest_strains, incremental.is_some()),
    }
}

fn weigh_strains(skill: Skill, highest_strains: &mut Vec<f64>, already_sorted: bool) -> f64 {
    // ascending order lets the reduced-top-section loop below index from
    // the back and keeps insertions cheap
    if !already_sorted {
        highest_strains.sort_unstable_by(f64::total_cmp);
    }

    let skill_reduced_section_count = match skill {
        Skill::Speed => 5,
        Skill::AimSliders | Skill::AimNoSliders => REDUCED_SECTION_COUNT,
    };

    // the highest strains are reduced first to account for extreme
    // difficulty spikes
    let len = highest_strains.len();
    let actual_reduced = len.min(skill_reduced_section_count);
    let mut reduced_sections = [0.0f64; REDUCED_SECTION_COUNT];
    for i in 0..actual_reduced {
        let scale = f64::log10(lerp(
            1.0,
            10.0,
            (i as f64 / skill_reduced_section_count as f64).clamp(0.0, 1.0),
        ));
        let value = highest_strains[len - i - 1] * lerp(REDUCED_STRAIN_BASELINE, 1.0, scale);
        reduced_sections[i] = value;
    }

    // re-sort: take the reduced entries out and insert them back in order
    let mut sorted: Vec<f64> = highest_strains[..len - actual_reduced].to_vec();
    for &value in reduced_sections.iter().take(actual_reduced) {
        insert_sorted(&mut sorted, value);
    }

    // weigh the top strains
    let mut difficulty = 0.0;
    let mut weight = 1.0;
    for i in 0..sorted.len() {
        let last = difficulty;
        difficulty += sorted[sorted.len() - i - 1] * weight;
        weight *= DECAY_WEIGHT;
        if (difficulty - last).abs() < DIFFCALC_EPSILON {
            break;
        }
    }

    difficulty
}

fn fill_note_counts(
    skill: Skill,
    dobjects: &[DiffObject],
    count: usize,
    incremental: Option<&mut IncrementalState>,
    attributes: &mut DifficultyAttributes,
) {
    match skill {
        Skill::Speed => {
            // relevant speed note count: a logistic vote per object
            // against the hardest one
            let max_object_strain = match incremental.as_ref() {
                Some(state) => state
                    .max_object_strain
                    .max(dobjects[count - 1].get_strain(skill)),
                None => dobjects[..count]
                    .iter()
                    .map(|o| o.get_strain(skill))
                    .fold(0.0f64, f64::max),
            };

            if max_object_strain == 0.0 {
                attributes.speed_note_count = 0.0;
                return;
            }

            match incremental {
                Some(state) if (state.max_object_strain - max_object_strain).abs() < DIFFCALC_EPSILON => {
                    state.speed_note_count +=
                        logistic_note(dobjects[count - 1].get_strain(skill), max_object_strain);
                    attributes.speed_note_count = state.speed_note_count;
                }
                Some(state) => {
                    let sum: f64 = dobjects[..count]
                        .iter()
                        .map(|o| logistic_note(o.get_strain(skill), max_object_strain))
                        .sum();
                    state.max_object_strain = max_object_strain;
                    state.speed_note_count = sum;
                    attributes.speed_note_count = sum;
                }
                None => {
                    attributes.speed_note_count = dobjects[..count]
                        .iter()
                        .map(|o| logistic_note(o.get_strain(skill), max_object_strain))
                        .sum();
                }
            }
        }

        Skill::AimSliders => {
            // difficult slider count, same logistic against the hardest slider
            match incremental {
                Some(state) => {
                    if dobjects[count - 1].kind != HitObjectKind::Slider {
                        attributes.aim_difficult_slider_count = state.aim_difficult_slider_count;
                        return;
                    }

                    let cur_slider_strain = dobjects[count - 1].strains[Skill::AimSliders as usize];
                    state.slider_strains.push(cur_slider_strain);
                    let max_slider_strain = state.max_slider_strain.max(cur_slider_strain);

                    if max_slider_strain <= 0.0 {
                        attributes.aim_difficult_slider_count = 0.0;
                        return;
                    }

                    if (state.max_slider_strain - max_slider_strain).abs() < DIFFCALC_EPSILON {
                        state.aim_difficult_slider_count +=
                            logistic_note(cur_slider_strain, max_slider_strain);
                    } else {
                        state.aim_difficult_slider_count = state
                            .slider_strains
                            .iter()
                            .map(|&s| logistic_note(s, max_slider_strain))
                            .sum();
                        state.max_slider_strain = max_slider_strain;
                    }
                    attributes.aim_difficult_slider_count = state.aim_difficult_slider_count;
                }
                None => {
                    let max_slider_strain = dobjects[..count]
                        .iter()
                        .map(|o| o.get_slider_strain(skill))
                        .fold(-1.0f64, f64::max);

                    if max_slider_strain <= 0.0 {
                        attributes.aim_difficult_slider_count = 0.0;
                        return;
                    }

                    attributes.aim_difficult_slider_count = dobjects[..count]
                        .iter()
                        .filter_map(|o| {
                            let strain = o.get_slider_strain(skill);
                            (strain >= 0.0).then(|| logistic_note(strain, max_slider_strain))
                        })
                        .sum();
                }
            }
        }

        Skill::AimNoSliders => {}
    }
}

fn fill_difficult_strains(
    skill: Skill,
    dobjects: &[DiffObject],
    count: usize,
    incremental: Option<&mut IncrementalState>,
    attributes: &mut DifficultyAttributes,
    difficulty: f64,
) {
    let (difficult_strain_count, top_weighted_sliders) = if difficulty == 0.0 {
        (0.0, 0.0)
    } else {
        let consistent_top_strain = difficulty / 10.0;

        match incremental {
            Some(state) if (state.consistent_top_strain - consistent_top_strain).abs() < DIFFCALC_EPSILON => {
                state.difficult_strains +=
                    difficult_strain_note(dobjects[count - 1].get_strain(skill), consistent_top_strain);

                let slider_strain = dobjects[count - 1].get_slider_strain(skill);
                if slider_strain >= 0.0 {
                    state.top_weighted_sliders +=
                        difficult_strain_note(slider_strain, consistent_top_strain);
                }

                (state.difficult_strains, state.top_weighted_sliders)
            }
            state => {
                let mut total_sum = 0.0;
                let mut slider_sum = 0.0;
                for obj in &dobjects[..count] {
                    total_sum += difficult_strain_note(obj.get_strain(skill), consistent_top_strain);

                    let slider_strain = obj.get_slider_strain(skill);
                    if slider_strain >= 0.0 {
                        slider_sum += difficult_strain_note(slider_strain, consistent_top_strain);
                    }
                }

                if let Some(state) = state {
                    state.consistent_top_strain = consistent_top_strain;
                    state.difficult_strains = total_sum;
                    state.top_weighted_sliders = slider_sum;
                }

                (total_sum, slider_sum)
            }
        }
    };

    match skill {
        Skill::Speed => {
            attributes.speed_difficult_strain_count = difficult_strain_count;
            attributes.speed_top_weighted_slider_factor = top_weighted_sliders;
        }
        Skill::AimSliders | Skill::AimNoSliders => {
            attributes.aim_difficult_strain_count = difficult_strain_count;
            attributes.aim_top_weighted_slider_factor = top_weighted_sliders;
        }
    }
}
