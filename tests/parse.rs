//! Parser and builder invariants over synthetic beatmaps.

mod common;

use starpp::beatmap::{parse_beatmap, ScoringTimeKind};
use starpp::cancel::{StopSource, StopToken};
use starpp::diff::{load_difficulty_objects, HitObjectKind};
use starpp::errors::LoadError;
use starpp::options::Options;

fn parse(input: &str) -> starpp::beatmap::PrimitiveContainer {
    parse_beatmap(input.as_bytes(), "test.osu", &StopToken::none()).unwrap()
}

#[test]
fn basic_circles_and_sliders_scenario() {
    let mut container = parse(&common::basic_scenario_map());
    assert_eq!(container.hitcircles.len(), 2);
    assert_eq!(container.sliders.len(), 1);
    assert_eq!(container.timingpoints.len(), 1);

    container.ensure_slider_times().unwrap();
    let slider = &container.sliders[0];
    assert!((slider.slider_time_without_repeats - 321.43).abs() < 0.01);
    assert_eq!(slider.ticks.len(), 1);
    // repeat=1 contributes no repeat events: 1 tick + 1 end
    assert_eq!(slider.scoring_times.len(), 2);
    assert_eq!(slider.scoring_times[1].kind, ScoringTimeKind::End);

    let loaded = load_difficulty_objects(
        &mut container,
        9.0,
        4.0,
        1.0,
        false,
        &StopToken::none(),
        &Options::default(),
    )
    .unwrap();
    // circle + (slider head + tick + end) + circle
    assert_eq!(loaded.total_max_combo(), 5);
}

#[test]
fn difficulty_objects_are_sorted_and_combo_is_monotone() {
    let mut container = parse(&common::jump_map(200));
    let loaded = load_difficulty_objects(
        &mut container,
        9.0,
        4.0,
        1.0,
        false,
        &StopToken::none(),
        &Options::default(),
    )
    .unwrap();

    for pair in loaded.objects.windows(2) {
        assert!(pair[0].time <= pair[1].time);
        if pair[0].time == pair[1].time {
            assert!(pair[0].kind <= pair[1].kind);
        }
    }

    let mut prev = 0;
    for i in 0..loaded.objects.len() {
        let combo = loaded.max_combo_at(i);
        assert!(combo > prev, "cumulative combo must strictly increase");
        prev = combo;
    }
    assert_eq!(loaded.max_combo_at(loaded.objects.len() - 1), loaded.total_max_combo());
}

#[test]
fn scoring_time_count_matches_repeats_and_ticks() {
    let input = format!(
        "{}128,128,300,2,0,L|384:192,4,140\n",
        common::map_header(9.0, 8.0, 4.0)
    );
    let mut container = parse(&input);
    container.ensure_slider_times().unwrap();
    let s = &container.sliders[0];
    assert_eq!(
        s.scoring_times.len(),
        (s.repeat as usize - 1) + s.repeat as usize * s.ticks.len() + 1
    );
}

#[test]
fn object_cap_is_enforced_exactly() {
    // one under / at the cap parses, one over fails
    let at_cap = common::stacked_map(40_000);
    assert!(parse_beatmap(at_cap.as_bytes(), "cap.osu", &StopToken::none()).is_ok());

    let over_cap = common::stacked_map(40_001);
    assert_eq!(
        parse_beatmap(over_cap.as_bytes(), "cap.osu", &StopToken::none()).unwrap_err(),
        LoadError::TooManyHitObjects
    );
}

#[test]
fn cancelled_parse_is_interrupted() {
    let source = StopSource::new();
    source.request_stop();
    let result = parse_beatmap(
        common::basic_scenario_map().as_bytes(),
        "x.osu",
        &source.token(),
    );
    assert_eq!(result.unwrap_err(), LoadError::LoadInterrupted);
}

#[test]
fn empty_map_is_no_objects() {
    let input = common::map_header(9.0, 8.0, 4.0);
    let mut container = parse(&input);
    let result = load_difficulty_objects(
        &mut container,
        9.0,
        4.0,
        1.0,
        false,
        &StopToken::none(),
        &Options::default(),
    );
    assert!(matches!(result.unwrap_err(), LoadError::NoObjects));
}

#[test]
fn stacked_circles_accumulate_stack_counts() {
    let mut container = parse(&common::stacked_map(5));
    let loaded = load_difficulty_objects(
        &mut container,
        9.0,
        4.0,
        1.0,
        false,
        &StopToken::none(),
        &Options::default(),
    )
    .unwrap();

    // v14 uses peppy's algorithm: the earliest note of a stack carries the
    // highest stack count
    assert!(loaded.objects[0].stack > loaded.objects[4].stack);
    assert_eq!(loaded.objects[4].stack, 0);
}

#[test]
fn speed_rescale_divides_time_fields() {
    let mut container = parse(&common::jump_map(64));
    let loaded_1x = load_difficulty_objects(
        &mut container,
        9.0,
        4.0,
        1.0,
        false,
        &StopToken::none(),
        &Options::default(),
    )
    .unwrap();
    let loaded_15x = load_difficulty_objects(
        &mut container,
        9.0,
        4.0,
        1.5,
        false,
        &StopToken::none(),
        &Options::default(),
    )
    .unwrap();

    for (a, b) in loaded_1x.objects.iter().zip(&loaded_15x.objects) {
        assert_eq!(b.time, (a.base_time as f64 / 1.5) as i32);
        assert_eq!(a.base_time, b.base_time);
        if a.kind == HitObjectKind::Slider {
            assert!((b.span_duration - a.span_duration / 1.5).abs() < 0.01);
        }
    }

    // playable length stays in base time
    assert_eq!(loaded_1x.playable_length, loaded_15x.playable_length);
}

#[test]
fn rescale_to_speed_is_reversible() {
    let mut container = parse(&common::jump_map(64));
    let mut loaded = load_difficulty_objects(
        &mut container,
        9.0,
        4.0,
        1.0,
        false,
        &StopToken::none(),
        &Options::default(),
    )
    .unwrap();

    let times: Vec<i32> = loaded.objects.iter().map(|o| o.time).collect();
    loaded.rescale_to_speed(1.5);
    loaded.rescale_to_speed(0.75);
    loaded.rescale_to_speed(1.0);
    let restored: Vec<i32> = loaded.objects.iter().map(|o| o.time).collect();
    assert_eq!(times, restored);
}
