//! End-to-end difficulty pipeline properties: hidden pairs, incremental
//! equivalence, rating monotonicity.

mod common;

use starpp::beatmap::parse_beatmap;
use starpp::cancel::StopToken;
use starpp::diff::{
    calculate_star_diff, load_difficulty_objects, recompute_star_rating, DiffObject,
    DifficultyAttributes, DifficultyInput, IncrementalState, RawDifficultyValues, StarCalcParams,
    NUM_SKILLS,
};
use starpp::mods::ModParams;
use starpp::options::Options;
use starpp::pp::{calculate_pp, ScoreParams};

struct Calc {
    container: starpp::beatmap::PrimitiveContainer,
}

impl Calc {
    fn new(map: &str) -> Calc {
        Calc {
            container: parse_beatmap(map.as_bytes(), "test.osu", &StopToken::none()).unwrap(),
        }
    }

    fn stars(&mut self, params: &ModParams) -> (f64, DifficultyAttributes, RawDifficultyValues) {
        let mut loaded = load_difficulty_objects(
            &mut self.container,
            params.ar,
            params.cs,
            params.speed,
            false,
            &StopToken::none(),
            &Options::default(),
        )
        .unwrap();

        let mut attributes = DifficultyAttributes::default();
        let mut raw = RawDifficultyValues::default();
        let mut arena: Vec<DiffObject> = Vec::new();

        let stars = calculate_star_diff(StarCalcParams {
            cached_diff_objects: &mut arena,
            attributes: &mut attributes,
            hit_objects: &mut loaded.objects,
            input: DifficultyInput::from_params(
                params,
                loaded.total_break_duration,
                loaded.playable_length,
            ),
            out_aim_strains: None,
            out_speed_strains: None,
            incremental: None,
            up_to_object_index: -1,
            cancel: StopToken::none(),
            out_raw_difficulty: Some(&mut raw),
            force_fill_diffobj_cache: false,
            options: Options::default(),
        });

        (stars, attributes, raw)
    }
}

fn nomod_params() -> ModParams {
    ModParams {
        ar: 9.0,
        cs: 4.0,
        od: 8.0,
        hp: 5.0,
        ..ModParams::default()
    }
}

#[test]
fn synthetic_map_has_positive_stars() {
    let (stars, attributes, raw) = Calc::new(&common::jump_map(300)).stars(&nomod_params());
    assert!(stars > 0.5 && stars < 15.0, "stars = {stars}");
    assert!(attributes.aim_difficulty > 0.0);
    assert!(attributes.speed_difficulty > 0.0);
    assert!(attributes.speed_note_count > 0.0);
    assert!(raw.aim >= raw.aim_no_sliders);
}

#[test]
fn single_circle_rates_zero_stars() {
    let map = format!("{}256,192,0,1,0\n", common::map_header(9.0, 8.0, 4.0));
    let (stars, _, _) = Calc::new(&map).stars(&nomod_params());
    assert_eq!(stars, 0.0);
}

#[test]
fn hidden_pair_shares_raw_difficulty() {
    let mut calc = Calc::new(&common::jump_map(300));

    let nomod = nomod_params();
    let hidden = ModParams {
        hidden: true,
        ..nomod
    };

    let (stars_nomod, attrs_nomod, raw_nomod) = calc.stars(&nomod);
    let (stars_hidden, attrs_hidden, raw_hidden) = calc.stars(&hidden);

    // raw difficulty values are bit-identical; only the final rating
    // transform differs
    assert_eq!(raw_nomod.aim.to_bits(), raw_hidden.aim.to_bits());
    assert_eq!(raw_nomod.aim_no_sliders.to_bits(), raw_hidden.aim_no_sliders.to_bits());
    assert_eq!(raw_nomod.speed.to_bits(), raw_hidden.speed.to_bits());

    assert!(stars_hidden > stars_nomod, "AR 9 hidden must rate higher");

    assert_eq!(
        attrs_nomod.aim_difficult_slider_count.to_bits(),
        attrs_hidden.aim_difficult_slider_count.to_bits()
    );
    assert_eq!(
        attrs_nomod.speed_note_count.to_bits(),
        attrs_hidden.speed_note_count.to_bits()
    );
}

#[test]
fn hidden_recompute_matches_direct_calculation() {
    let mut calc = Calc::new(&common::jump_map(300));

    let nomod = nomod_params();
    let hidden = ModParams {
        hidden: true,
        ..nomod
    };

    let num_objects = {
        let loaded = load_difficulty_objects(
            &mut calc.container,
            nomod.ar,
            nomod.cs,
            nomod.speed,
            false,
            &StopToken::none(),
            &Options::default(),
        )
        .unwrap();
        loaded.objects.len() as u32
    };

    let (_, _, raw) = calc.stars(&nomod);
    let (direct_hidden_stars, _, _) = calc.stars(&hidden);

    let input = DifficultyInput::from_params(&hidden, 0, 0);
    let recomputed = recompute_star_rating(&raw, num_objects, &input);

    assert!(
        (recomputed - direct_hidden_stars).abs() < 1e-9,
        "recompute {recomputed} vs direct {direct_hidden_stars}"
    );
}

#[test]
fn doubletime_rates_higher_than_nomod() {
    let mut calc = Calc::new(&common::jump_map(300));
    let (stars_1x, _, _) = calc.stars(&nomod_params());
    let (stars_dt, _, _) = calc.stars(&ModParams {
        speed: 1.5,
        ..nomod_params()
    });
    assert!(stars_dt > stars_1x);
}

#[test]
fn relax_zeroes_speed_rating() {
    let mut calc = Calc::new(&common::jump_map(300));
    let (_, attributes, _) = calc.stars(&ModParams {
        relax: true,
        ..nomod_params()
    });
    assert_eq!(attributes.speed_difficulty, 0.0);
    assert!(attributes.aim_difficulty > 0.0);
}

#[test]
fn autopilot_zeroes_aim_rating() {
    let mut calc = Calc::new(&common::jump_map(300));
    let (_, attributes, _) = calc.stars(&ModParams {
        autopilot: true,
        ..nomod_params()
    });
    assert_eq!(attributes.aim_difficulty, 0.0);
    assert!(attributes.speed_difficulty > 0.0);
}

#[test]
fn incremental_matches_full_recalculation() {
    let map = common::jump_map(240);
    let params = nomod_params();

    // full pipeline reference values at a few checkpoints
    let checkpoints = [0usize, 10, 60, 150, 239];
    let mut reference = Vec::new();
    for &k in &checkpoints {
        let mut calc = Calc::new(&map);
        let mut loaded = load_difficulty_objects(
            &mut calc.container,
            params.ar,
            params.cs,
            params.speed,
            false,
            &StopToken::none(),
            &Options::default(),
        )
        .unwrap();

        let mut attributes = DifficultyAttributes::default();
        let mut arena: Vec<DiffObject> = Vec::new();
        let stars = calculate_star_diff(StarCalcParams {
            cached_diff_objects: &mut arena,
            attributes: &mut attributes,
            hit_objects: &mut loaded.objects,
            input: DifficultyInput::from_params(&params, 0, loaded.playable_length),
            out_aim_strains: None,
            out_speed_strains: None,
            incremental: None,
            up_to_object_index: k as i32,
            cancel: StopToken::none(),
            out_raw_difficulty: None,
            force_fill_diffobj_cache: false,
            options: Options::default(),
        });
        reference.push((stars, attributes));
    }

    // incremental run from 0 forward with a fresh state
    let mut calc = Calc::new(&map);
    let mut loaded = load_difficulty_objects(
        &mut calc.container,
        params.ar,
        params.cs,
        params.speed,
        false,
        &StopToken::none(),
        &Options::default(),
    )
    .unwrap();

    let mut arena: Vec<DiffObject> = Vec::new();
    let mut incremental: [IncrementalState; NUM_SKILLS] = Default::default();

    let num_objects = loaded.objects.len();
    let mut checkpoint_iter = checkpoints.iter().peekable();
    for k in 0..num_objects {
        let mut attributes = DifficultyAttributes::default();
        let stars = calculate_star_diff(StarCalcParams {
            cached_diff_objects: &mut arena,
            attributes: &mut attributes,
            hit_objects: &mut loaded.objects,
            input: DifficultyInput::from_params(&params, 0, loaded.playable_length),
            out_aim_strains: None,
            out_speed_strains: None,
            incremental: Some(&mut incremental),
            up_to_object_index: k as i32,
            cancel: StopToken::none(),
            out_raw_difficulty: None,
            force_fill_diffobj_cache: true,
            options: Options::default(),
        });

        if let Some(&&cp) = checkpoint_iter.peek() {
            if cp == k {
                let (ref_stars, ref_attrs) = &reference[checkpoints.iter().position(|&c| c == cp).unwrap()];
                assert!(
                    (stars - ref_stars).abs() < 1e-3,
                    "at {k}: incremental {stars} vs full {ref_stars}"
                );
                assert!(
                    (attributes.speed_note_count - ref_attrs.speed_note_count).abs() < 1e-3,
                    "speed note count diverged at {k}"
                );
                assert!(
                    (attributes.aim_difficult_strain_count - ref_attrs.aim_difficult_strain_count)
                        .abs()
                        < 1e-3,
                    "aim difficult strains diverged at {k}"
                );
                checkpoint_iter.next();
            }
        }
    }
}

#[test]
fn pp_pipeline_end_to_end() {
    let mut calc = Calc::new(&common::jump_map(300));
    let params = nomod_params();

    let max_combo = {
        let loaded = load_difficulty_objects(
            &mut calc.container,
            params.ar,
            params.cs,
            params.speed,
            false,
            &StopToken::none(),
            &Options::default(),
        )
        .unwrap();
        loaded.total_max_combo()
    };
    let (stars, attributes, _) = calc.stars(&params);
    assert!(stars > 0.0);

    let num_circles = calc.container.hitcircles.len() as i32;
    let num_sliders = calc.container.sliders.len() as i32;

    let ss = calculate_pp(ScoreParams {
        attributes: attributes.clone(),
        mod_flags: Default::default(),
        timescale: 1.0,
        ar: params.ar as f64,
        od: params.od as f64,
        num_hit_objects: num_circles + num_sliders,
        num_circles,
        num_sliders,
        num_spinners: 0,
        max_possible_combo: max_combo as i32,
        combo: max_combo as i32,
        misses: 0,
        c300: -1,
        c100: 0,
        c50: 0,
        legacy_total_score: 0,
        is_legacy_import: false,
    });
    assert!(ss > 0.0 && ss.is_finite());

    let with_misses = calculate_pp(ScoreParams {
        attributes,
        mod_flags: Default::default(),
        timescale: 1.0,
        ar: params.ar as f64,
        od: params.od as f64,
        num_hit_objects: num_circles + num_sliders,
        num_circles,
        num_sliders,
        num_spinners: 0,
        max_possible_combo: max_combo as i32,
        combo: (max_combo / 2) as i32,
        misses: 5,
        c300: -1,
        c100: 10,
        c50: 0,
        legacy_total_score: 0,
        is_legacy_import: false,
    });
    assert!(with_misses < ss);
}
