//! Slider timing expansion: durations, ticks and the scoring-time table.

use crate::cancel::StopToken;
use crate::errors::LoadError;
use crate::options::{MAX_NUM_SLIDER_SCORING_TIMES, MAX_SLIDER_TICKS};
use crate::timing::{timing_info_at, TimingInfo, TimingPoint};

use super::{ScoringTimeKind, Slider, SliderScoringTime};

/// Slider tail lenience in milliseconds; the scoring end sits this much
/// before the visual end (or at the half point for very short sliders).
pub const SLIDER_END_INSIDE_CHECK_OFFSET: f64 = 36.0;

fn slider_tick_distance(slider_multiplier: f32, slider_tick_rate: f32) -> f32 {
    (100.0 * slider_multiplier) / slider_tick_rate
}

fn slider_time_for_slider(slider: &Slider, info: &TimingInfo, slider_multiplier: f32) -> f32 {
    let duration = info.beat_length * (slider.pixel_length / slider_multiplier) / 100.0;
    duration.max(1.0)
}

fn slider_velocity(info: &TimingInfo, slider_multiplier: f32, slider_tick_rate: f32) -> f32 {
    let beat_length = info.beat_length;
    if beat_length > 0.0 {
        slider_tick_distance(slider_multiplier, slider_tick_rate) * slider_tick_rate * (1000.0 / beat_length)
    } else {
        slider_tick_distance(slider_multiplier, slider_tick_rate) * slider_tick_rate
    }
}

fn timing_point_multiplier(info: &TimingInfo) -> f32 {
    let mut beat_length_base = info.beat_length_base;
    if beat_length_base == 0.0 {
        beat_length_base = 1.0;
    }
    info.beat_length / beat_length_base
}

/// Fills `slider_time`, `slider_time_without_repeats`, `ticks` and
/// `scoring_times` on every slider.
///
/// From version 8 onward the tick distance is divided by the inherited
/// beat-length ratio; ticks closer to the tail than `0.01 * velocity` are
/// skipped; NaN timing produces no ticks at all. A slider whose predicted
/// `|repeat| * ticks` exceeds the engine cap fails the map with
/// [`LoadError::TooManyHitObjects`].
pub fn calculate_slider_times_clicks_ticks(
    beatmap_version: i32,
    sliders: &mut [Slider],
    timingpoints: &[TimingPoint],
    slider_multiplier: f32,
    slider_tick_rate: f32,
    dead: &StopToken,
) -> Result<(), LoadError> {
    if timingpoints.is_empty() {
        return Err(LoadError::NoTimingPoints);
    }

    for s in sliders.iter_mut() {
        if dead.stop_requested() {
            return Err(LoadError::LoadInterrupted);
        }

        // sanity reset
        s.ticks.clear();
        s.scoring_times.clear();

        // calculate duration
        let info = timing_info_at(s.time, timingpoints);
        s.slider_time_without_repeats = slider_time_for_slider(s, &info, slider_multiplier);
        s.slider_time = s.slider_time_without_repeats * s.repeat as f32;

        // calculate ticks; none for NaN timingpoints or infinite lengths
        if !info.is_nan && s.pixel_length.is_finite() {
            let min_tick_pixel_distance_from_end =
                0.01 * slider_velocity(&info, slider_multiplier, slider_tick_rate);
            let tick_pixel_length = if beatmap_version < 8 {
                slider_tick_distance(slider_multiplier, slider_tick_rate)
            } else {
                slider_tick_distance(slider_multiplier, slider_tick_rate)
                    / timing_point_multiplier(&info)
            };

            if tick_pixel_length.is_finite() {
                let tick_duration_percent_of_slider_length =
                    tick_pixel_length / if s.pixel_length == 0.0 { 1.0 } else { s.pixel_length };
                let tick_count = (((s.pixel_length / tick_pixel_length).ceil() as i64) - 1)
                    .min(MAX_SLIDER_TICKS as i64);

                if tick_count > 0 {
                    let tick_t_offset = tick_duration_percent_of_slider_length;
                    let mut pixel_distance_to_end = s.pixel_length;
                    let mut t = tick_t_offset;
                    for _ in 0..tick_count {
                        // skip ticks too close to the end of the slider
                        pixel_distance_to_end -= tick_pixel_length;
                        if pixel_distance_to_end <= min_tick_pixel_distance_from_end {
                            break;
                        }

                        s.ticks.push(t);
                        t += tick_t_offset;
                    }
                }
            }
        }

        // bail before this many predicted scoringTimes run out of memory
        if (s.repeat.unsigned_abs() as usize).saturating_mul(s.ticks.len())
            > MAX_NUM_SLIDER_SCORING_TIMES
        {
            return Err(LoadError::TooManyHitObjects);
        }

        // the scoring-time table holds every point in time where the cursor
        // must be inside the followcircle with a key held:

        // 1) the head circle is skipped

        // 2) repeat times, alternating between slider begin and end
        for i in 0..(s.repeat - 1).max(0) {
            let time = s.time as f32 + s.slider_time_without_repeats * (i + 1) as f32;
            s.scoring_times.push(SliderScoringTime {
                kind: ScoringTimeKind::Repeat,
                time,
            });
        }

        // 3) tick times, mirrored across each repeat direction
        for i in 0..s.repeat.max(0) {
            for &tick in &s.ticks {
                let tick_percent_from_start_abs = if (i + 1) % 2 != 0 { tick } else { 1.0 - tick };
                let time = s.time as f32
                    + s.slider_time_without_repeats * i as f32
                    + tick_percent_from_start_abs * s.slider_time_without_repeats;
                s.scoring_times.push(SliderScoringTime {
                    kind: ScoringTimeKind::Tick,
                    time,
                });
            }
        }

        // 4) the slider end, potentially before the last tick for bullshit
        // sliders; the sort takes care of that
        let end_time = (s.time as f32 + s.slider_time / 2.0)
            .max((s.time as f32 + s.slider_time) - SLIDER_END_INSIDE_CHECK_OFFSET as f32);
        s.scoring_times.push(SliderScoringTime {
            kind: ScoringTimeKind::End,
            time: end_time,
        });

        if dead.stop_requested() {
            return Err(LoadError::LoadInterrupted);
        }

        // 5) earliest to latest, kind as tie-break
        s.scoring_times
            .sort_by(|a, b| a.time.total_cmp(&b.time).then(a.kind.cmp(&b.kind)));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beatmap::parse_beatmap;

    fn expanded(input: &str) -> crate::beatmap::PrimitiveContainer {
        let mut c = parse_beatmap(input.as_bytes(), "test.osu", &StopToken::none()).unwrap();
        c.ensure_slider_times().unwrap();
        c
    }

    const BASIC: &str = "osu file format v14\n\
        [Difficulty]\nSliderMultiplier:1.4\nSliderTickRate:1\n\
        [TimingPoints]\n0,300,4,1,0,100,1,0\n\
        [HitObjects]\n128,128,300,2,0,L|384:192,1,150\n";

    #[test]
    fn basic_slider_timing() {
        let c = expanded(BASIC);
        let s = &c.sliders[0];
        // beatLength * (pixelLength / multiplier) / 100 = 300 * 150 / 1.4 / 100
        assert!((s.slider_time_without_repeats - 321.42856).abs() < 0.01);
        assert_eq!(s.ticks.len(), 1);
        // 1 tick + 1 end, repeat=1 contributes no repeat events
        assert_eq!(s.scoring_times.len(), 2);
        assert_eq!(s.scoring_times[0].kind, ScoringTimeKind::Tick);
        assert_eq!(s.scoring_times[1].kind, ScoringTimeKind::End);
    }

    #[test]
    fn scoring_time_count_identity() {
        // repeat = 3: (repeat-1) repeats + repeat * ticks + 1 end
        let input = "osu file format v14\n\
            [Difficulty]\nSliderMultiplier:1.4\nSliderTickRate:1\n\
            [TimingPoints]\n0,300,4,1,0,100,1,0\n\
            [HitObjects]\n128,128,300,2,0,L|384:192,3,150\n";
        let c = expanded(input);
        let s = &c.sliders[0];
        assert_eq!(
            s.scoring_times.len(),
            (s.repeat as usize - 1) + s.repeat as usize * s.ticks.len() + 1
        );
    }

    #[test]
    fn zero_pixel_length_has_no_ticks_one_end() {
        let input = "osu file format v14\n\
            [Difficulty]\nSliderMultiplier:1.4\nSliderTickRate:1\n\
            [TimingPoints]\n0,300,4,1,0,100,1,0\n\
            [HitObjects]\n128,128,300,2,0,L|128:128,1,0\n";
        let c = expanded(input);
        let s = &c.sliders[0];
        assert!(s.ticks.is_empty());
        assert_eq!(s.scoring_times.len(), 1);
        assert_eq!(s.scoring_times[0].kind, ScoringTimeKind::End);
        // a zero-length slider still lasts 1ms
        assert_eq!(s.slider_time_without_repeats, 1.0);
    }

    #[test]
    fn zero_repeat_has_one_end_event() {
        let input = "osu file format v14\n\
            [Difficulty]\nSliderMultiplier:1.4\nSliderTickRate:1\n\
            [TimingPoints]\n0,300,4,1,0,100,1,0\n\
            [HitObjects]\n128,128,300,2,0,L|384:192,0,150\n";
        let c = expanded(input);
        let s = &c.sliders[0];
        assert_eq!(s.scoring_times.len(), 1);
        assert_eq!(s.scoring_times[0].kind, ScoringTimeKind::End);
    }

    #[test]
    fn nan_timing_produces_no_ticks() {
        let input = "osu file format v14\n\
            [Difficulty]\nSliderMultiplier:1.4\nSliderTickRate:1\n\
            [TimingPoints]\n0,NaN,4,1,0,100,1,0\n\
            [HitObjects]\n128,128,300,2,0,L|384:192,1,150\n";
        let c = expanded(input);
        assert!(c.sliders[0].ticks.is_empty());
    }

    #[test]
    fn no_timing_points_is_an_error() {
        let input = "osu file format v14\n[HitObjects]\n128,128,300,2,0,L|384:192,1,150\n";
        let mut c = parse_beatmap(input.as_bytes(), "t.osu", &StopToken::none()).unwrap();
        assert_eq!(c.ensure_slider_times().unwrap_err(), LoadError::NoTimingPoints);
    }

    #[test]
    fn tail_lenience_shifts_end_event() {
        let c = expanded(BASIC);
        let s = &c.sliders[0];
        let end = s.scoring_times.last().unwrap().time;
        let expected = (s.time as f32 + s.slider_time - 36.0).max(s.time as f32 + s.slider_time / 2.0);
        assert!((end - expected).abs() < 0.01);
    }
}
