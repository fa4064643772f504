//! The beatmap text parser.

use std::str::FromStr;

use regex::Regex;

use crate::cancel::StopToken;
use crate::color::Color;
use crate::errors::LoadError;
use crate::hitsounds::{HitSamples, HitSoundType, SampleSet};
use crate::math::Point;
use crate::options::{MAX_NUM_HITOBJECTS, MAX_SLIDER_REPEATS, MAX_SUPPORTED_VERSION};
use crate::timing::{timing_point_cmp, TimingPoint};

use super::{Break, HitCircle, PrimitiveContainer, Slider, Spinner};

lazy_static! {
    static ref OSU_FORMAT_VERSION_RGX: Regex =
        Regex::new(r"osu file format v(?P<version>\d+)").expect("compile");
    static ref KEY_VALUE_RGX: Regex =
        Regex::new(r"^(?P<key>[A-Za-z0-9]+)\s*:\s*(?P<value>.*)$").expect("compile");
    static ref QUOTED_FILENAME_RGX: Regex = Regex::new("\"(?P<name>[^\"]+)\"").expect("compile");
}

// hit object type bits
const TYPE_CIRCLE: u32 = 1 << 0;
const TYPE_SLIDER: u32 = 1 << 1;
const TYPE_NEW_COMBO: u32 = 1 << 2;
const TYPE_SPINNER: u32 = 1 << 3;
const TYPE_MANIA_HOLD_NOTE: u32 = 1 << 7;

/// Coordinate and pixel-length sanity clamp.
const SLIDER_SANITY_RANGE: f32 = 32_768.0;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Block {
    Header,
    General,
    Metadata,
    Difficulty,
    Events,
    TimingPoints,
    Colours,
    HitObjects,
}

const SECTION_HEADERS: [(&str, Block); 7] = [
    ("[General]", Block::General),
    ("[Metadata]", Block::Metadata),
    ("[Difficulty]", Block::Difficulty),
    ("[Events]", Block::Events),
    ("[TimingPoints]", Block::TimingPoints),
    ("[Colours]", Block::Colours),
    ("[HitObjects]", Block::HitObjects),
];

fn parse_f32_finite(token: &str) -> Option<f32> {
    token.trim().parse::<f32>().ok().filter(|v| v.is_finite())
}

fn split_into<'a>(buf: &mut Vec<&'a str>, input: &'a str, separator: char) {
    buf.clear();
    buf.extend(input.split(separator));
}

/// Parses beatmap bytes into a [`PrimitiveContainer`].
///
/// The parser is strict about structure (header first, `Mode: 0`, object
/// caps) but tolerant about individual lines: a malformed hit object or
/// timing point is logged and skipped rather than failing the file.
pub fn parse_beatmap(
    data: &[u8],
    source_name: &str,
    dead: &StopToken,
) -> Result<PrimitiveContainer, LoadError> {
    if dead.stop_requested() {
        return Err(LoadError::LoadInterrupted);
    }
    if data.is_empty() {
        return Err(LoadError::FileLoad);
    }

    let text = String::from_utf8_lossy(data);
    let text = text.trim_start_matches('\u{feff}');

    let mut container = PrimitiveContainer::default();

    // scratch buffers reused across lines so steady-state parsing of
    // 10000+ objects allocates O(1)
    let mut csv_buf: Vec<&str> = Vec::new();
    let mut pipe_buf: Vec<&str> = Vec::new();
    let mut edge_sounds_buf: Vec<&str> = Vec::new();
    let mut edge_sets_buf: Vec<&str> = Vec::new();

    let mut temp_colors: [Option<Color>; 8] = Default::default();
    let mut temp_timingpoints: Vec<TimingPoint> = Vec::new();

    let mut hitobjects_without_spinner_counter = 0i32;
    let mut color_counter = 1i32;
    let mut color_offset = 0i32;
    let mut combo_number = 1i32;

    let mut seen_header = false;
    let mut seen_approach_rate = false;
    let mut block = Block::Header;
    let mut blocks_unseen: Vec<(&str, Block)> = SECTION_HEADERS.to_vec();

    for raw_line in text.lines() {
        if dead.stop_requested() {
            return Err(LoadError::LoadInterrupted);
        }

        let line = raw_line.trim_end_matches('\r');

        // ignore comments, but only at the beginning of a line
        // (e.g. allow Artist:DJ'TEKINA//SOMETHING)
        if line.trim().is_empty() || line.trim_start().starts_with("//") {
            continue;
        }

        // the header has to come before any section
        if seen_header {
            if let Some(pos) = blocks_unseen.iter().position(|(header, _)| *header == line.trim()) {
                block = blocks_unseen.remove(pos).1;
                continue;
            }
        } else {
            seen_header = true;
        }

        match block {
            Block::Header => {
                if let Some(captures) = OSU_FORMAT_VERSION_RGX.captures(line) {
                    container.version = captures["version"].parse().unwrap_or(container.version);
                    if container.version > MAX_SUPPORTED_VERSION {
                        return Err(LoadError::UnknownVersion);
                    }
                }
            }

            Block::General => {
                if let Some(captures) = KEY_VALUE_RGX.captures(line) {
                    let value = captures["value"].trim();
                    match &captures["key"] {
                        "SampleSet" => {
                            container.default_sample_set = match value.to_lowercase().as_str() {
                                "normal" => SampleSet::Normal,
                                "soft" => SampleSet::Soft,
                                "drum" => SampleSet::Drum,
                                _ => container.default_sample_set,
                            }
                        }
                        "StackLeniency" => {
                            if let Some(v) = parse_f32_finite(value) {
                                container.stack_leniency = v;
                            }
                        }
                        "Mode" => {
                            if value.parse::<i32>().unwrap_or(0) != 0 {
                                return Err(LoadError::NonStdGamemode);
                            }
                        }
                        "AudioFilename" => container.meta.audio_filename = value.to_owned(),
                        "PreviewTime" => {
                            container.meta.preview_time = value.parse().unwrap_or(-1);
                        }
                        _ => {}
                    }
                }
            }

            Block::Metadata => {
                if let Some(captures) = KEY_VALUE_RGX.captures(line) {
                    let value = captures["value"].trim().to_owned();
                    let meta = &mut container.meta;
                    match &captures["key"] {
                        "Title" => meta.title = value,
                        "TitleUnicode" => meta.title_unicode = value,
                        "Artist" => meta.artist = value,
                        "ArtistUnicode" => meta.artist_unicode = value,
                        "Creator" => meta.creator = value,
                        "Version" => meta.difficulty_name = value,
                        "Source" => meta.source = value,
                        "Tags" => meta.tags = value,
                        "BeatmapID" => meta.beatmap_id = value.parse().unwrap_or(0),
                        "BeatmapSetID" => meta.beatmap_set_id = value.parse().unwrap_or(-1),
                        _ => {}
                    }
                }
            }

            Block::Difficulty => {
                if let Some(captures) = KEY_VALUE_RGX.captures(line) {
                    let value = captures["value"].trim();
                    match &captures["key"] {
                        "CircleSize" => {
                            if let Some(v) = parse_f32_finite(value) {
                                container.circle_size = v;
                            }
                        }
                        "ApproachRate" => {
                            if let Some(v) = parse_f32_finite(value) {
                                container.approach_rate = v;
                                seen_approach_rate = true;
                            }
                        }
                        "OverallDifficulty" => {
                            if let Some(v) = parse_f32_finite(value) {
                                container.overall_difficulty = v;
                            }
                        }
                        "HPDrainRate" => {
                            if let Some(v) = parse_f32_finite(value) {
                                container.hp_drain = v;
                            }
                        }
                        "SliderMultiplier" => {
                            if let Some(v) = parse_f32_finite(value) {
                                container.slider_multiplier = v;
                            }
                        }
                        "SliderTickRate" => {
                            if let Some(v) = parse_f32_finite(value) {
                                container.slider_tick_rate = v;
                            }
                        }
                        _ => {}
                    }
                }
            }

            Block::Events => {
                split_into(&mut csv_buf, line, ',');
                if csv_buf.len() >= 3 {
                    let kind = csv_buf[0].trim();
                    if kind == "2" || kind.eq_ignore_ascii_case("break") {
                        let start = csv_buf[1].trim().parse::<i64>();
                        let end = csv_buf[2].trim().parse::<i64>();
                        if let (Ok(start_time), Ok(end_time)) = (start, end) {
                            container.breaks.push(Break { start_time, end_time });
                        }
                    } else if (kind == "0" || kind.eq_ignore_ascii_case("background"))
                        && container.meta.background_image_filename.is_empty()
                    {
                        if let Some(captures) = QUOTED_FILENAME_RGX.captures(line) {
                            container.meta.background_image_filename = captures["name"].to_owned();
                        }
                    }
                }
            }

            Block::TimingPoints => match TimingPoint::from_str(line) {
                Ok(tp) => temp_timingpoints.push(tp),
                Err(err) => {
                    debug!("File: {} invalid timing point ({}): {}", source_name, err, line);
                }
            },

            Block::Colours => {
                if let Some(captures) = KEY_VALUE_RGX.captures(line) {
                    let key = &captures["key"];
                    if let Some(num) = key.strip_prefix("Combo").and_then(|n| n.parse::<usize>().ok()) {
                        // bare minimum validation effort
                        if (1..=8).contains(&num) {
                            if let Ok(color) = Color::from_str(&captures["value"]) {
                                temp_colors[num - 1] = Some(color);
                            }
                        }
                    }
                }
            }

            Block::HitObjects => {
                // circles:  x,y,time,type,hitSounds,hitSamples
                // sliders:  x,y,time,type,hitSounds,curveType|x:y|...,repeat,pixelLength,edgeHitsounds,edgeSets,hitSamples
                // spinners: x,y,time,type,hitSounds,endTime,hitSamples
                split_into(&mut csv_buf, line, ',');
                if csv_buf.len() < 5 {
                    continue;
                }

                let x = parse_f32_finite(csv_buf[0]);
                let y = parse_f32_finite(csv_buf[1]);
                let time = csv_buf[2].trim().parse::<i32>().ok();
                let obj_type = csv_buf[3].trim().parse::<u32>().ok();
                let hit_sounds = csv_buf[4].trim().parse::<i32>().ok();

                let valid = match (x, y, time, obj_type, hit_sounds) {
                    (Some(_), Some(_), Some(_), Some(obj_type), Some(_)) => {
                        (obj_type & TYPE_MANIA_HOLD_NOTE) == 0
                            && !((obj_type & TYPE_SLIDER) != 0 && csv_buf.len() < 8)
                            && !((obj_type & TYPE_SPINNER) != 0 && csv_buf.len() < 6)
                    }
                    _ => false,
                };
                if !valid {
                    debug!("File: {} invalid hit object: {}", source_name, line);
                    continue;
                }

                let (x, y) = (x.unwrap(), y.unwrap());
                let time = time.unwrap();
                let obj_type = obj_type.unwrap();
                let hit_sounds = hit_sounds.unwrap() as u8;

                if (obj_type & TYPE_SPINNER) == 0 {
                    hitobjects_without_spinner_counter += 1;
                }

                if (obj_type & TYPE_NEW_COMBO) != 0 {
                    combo_number = 1;

                    // special case 1: a spinner does not increase the raw
                    // color counter (but the offset still advances)
                    // special case 2: the first non-spinner object is always
                    // a new combo and does not increase the counter either
                    if (obj_type & TYPE_SPINNER) == 0 && hitobjects_without_spinner_counter > 1 {
                        color_counter += 1;
                    }

                    // special case 3: bits 4-6 choose how many combo colours to skip
                    color_offset += ((obj_type >> 4) & 0b111) as i32;
                }

                if (obj_type & TYPE_CIRCLE) != 0 {
                    let mut circle = HitCircle {
                        x: x as i32,
                        y: y as i32,
                        time,
                        number: combo_number,
                        color_counter,
                        color_offset,
                        ..HitCircle::default()
                    };
                    combo_number += 1;
                    circle.samples.hit_sounds =
                        HitSoundType::from_bits_truncate(hit_sounds) & HitSoundType::VALID_HITSOUNDS;

                    if csv_buf.len() > 5 {
                        // ignore errors, use defaults
                        circle.samples.parse_into(csv_buf[5]);
                    }

                    container.hitcircles.push(circle);
                } else if (obj_type & TYPE_SLIDER) != 0 {
                    let mut slider = Slider {
                        time,
                        color_counter,
                        color_offset,
                        ..Slider::default()
                    };
                    slider.hover_samples.hit_sounds = HitSoundType::from_bits_truncate(hit_sounds)
                        & HitSoundType::VALID_SLIDER_HITSOUNDS;

                    split_into(&mut pipe_buf, csv_buf[5], '|');
                    slider.curve_type = match pipe_buf.first().and_then(|t| t.chars().next()) {
                        Some(letter) => letter,
                        None => {
                            debug!("File: {} invalid slider curve field: {}", source_name, line);
                            continue;
                        }
                    };
                    for curve_point in &pipe_buf[1..] {
                        // just skip infinite/invalid curve points
                        let mut coords = curve_point.split(':');
                        let cp_x = coords.next().and_then(parse_f32_finite);
                        let cp_y = coords.next().and_then(parse_f32_finite);
                        if let (Some(cp_x), Some(cp_y)) = (cp_x, cp_y) {
                            slider.points.push(Point::new(
                                cp_x.clamp(-SLIDER_SANITY_RANGE, SLIDER_SANITY_RANGE),
                                cp_y.clamp(-SLIDER_SANITY_RANGE, SLIDER_SANITY_RANGE),
                            ));
                        }
                    }

                    slider.repeat = match csv_buf[6].trim().parse::<i32>() {
                        Ok(repeat) => repeat,
                        Err(_) => {
                            debug!("File: {} invalid slider repeat: {}", source_name, line);
                            continue;
                        }
                    };

                    slider.pixel_length = match csv_buf[7].trim().parse::<f32>() {
                        Ok(len) if len.is_finite() => len,
                        // a token containing "e+" at this position means ±infinity
                        _ if csv_buf[7].to_lowercase().contains("e+") => {
                            if csv_buf[7].trim().starts_with('-') {
                                -SLIDER_SANITY_RANGE
                            } else {
                                SLIDER_SANITY_RANGE
                            }
                        }
                        _ => {
                            debug!(
                                "File: {} invalid slider pixel length: {}",
                                source_name, csv_buf[7]
                            );
                            continue;
                        }
                    };

                    // osu! keeps the hitobject point and the control points
                    // separate; older beatmaps store the start point inside
                    // the control points
                    let anchor = Point::new(
                        x.clamp(-SLIDER_SANITY_RANGE, SLIDER_SANITY_RANGE),
                        y.clamp(-SLIDER_SANITY_RANGE, SLIDER_SANITY_RANGE),
                    );
                    if slider.points.first() != Some(&anchor) {
                        slider.points.insert(0, anchor);
                    }

                    // partially allow bullshit sliders (second point makes them valid)
                    if slider.points.len() == 1 {
                        slider.points.push(anchor);
                    }

                    if csv_buf.len() > 8 {
                        split_into(&mut edge_sounds_buf, csv_buf[8], '|');
                    } else {
                        edge_sounds_buf.clear();
                    }
                    if csv_buf.len() > 9 {
                        split_into(&mut edge_sets_buf, csv_buf[9], '|');
                    } else {
                        edge_sets_buf.clear();
                    }

                    for (i, edge_sound) in edge_sounds_buf.iter().enumerate() {
                        let mut samples = HitSamples::default();
                        // ignore parse errors, default hitSounds to 0
                        let bits = edge_sound.trim().parse::<i32>().unwrap_or(0) as u8;
                        samples.hit_sounds =
                            HitSoundType::from_bits_truncate(bits) & HitSoundType::VALID_HITSOUNDS;

                        if let Some(edge_set) = edge_sets_buf.get(i) {
                            let mut parts = edge_set.split(':');
                            if let Some(part) = parts.next() {
                                samples.normal_set = SampleSet::from_token(part);
                            }
                            if let Some(part) = parts.next() {
                                samples.addition_set = SampleSet::from_token(part);
                            }
                        }

                        slider.edge_samples.push(samples);
                    }

                    // no start sample specified, use default
                    if slider.edge_samples.is_empty() {
                        slider.edge_samples.push(HitSamples::default());
                    }
                    // no end sample specified, use the same as the start
                    if slider.edge_samples.len() == 1 {
                        slider.edge_samples.push(slider.edge_samples[0].clone());
                    }

                    if csv_buf.len() > 10 {
                        slider.hover_samples.parse_into(csv_buf[10]);
                    }

                    slider.x = anchor.x as i32;
                    slider.y = anchor.y as i32;
                    slider.repeat = slider.repeat.clamp(0, MAX_SLIDER_REPEATS);
                    slider.pixel_length = slider
                        .pixel_length
                        .clamp(-SLIDER_SANITY_RANGE, SLIDER_SANITY_RANGE);
                    slider.number = combo_number;
                    combo_number += 1;
                    container.sliders.push(slider);
                } else if (obj_type & TYPE_SPINNER) != 0 {
                    let end_time = match csv_buf[5].trim().parse::<i32>() {
                        Ok(end_time) => end_time,
                        Err(_) => {
                            debug!("File: {} invalid spinner: {}", source_name, line);
                            continue;
                        }
                    };

                    let mut spinner = Spinner {
                        x: x as i32,
                        y: y as i32,
                        time,
                        end_time,
                        ..Spinner::default()
                    };
                    spinner.samples.hit_sounds =
                        HitSoundType::from_bits_truncate(hit_sounds) & HitSoundType::VALID_HITSOUNDS;

                    if csv_buf.len() > 6 {
                        spinner.samples.parse_into(csv_buf[6]);
                    }

                    container.spinners.push(spinner);
                }
            }
        }
    }

    // late bail; this many hitobjects would run out of memory otherwise
    if container.num_objects() > MAX_NUM_HITOBJECTS {
        return Err(LoadError::TooManyHitObjects);
    }

    container.combo_colors = temp_colors.iter().flatten().copied().collect();

    for brk in &container.breaks {
        container.total_break_duration += (brk.end_time - brk.start_time).max(0) as u32;
    }

    if !seen_approach_rate {
        // old file compatibility
        container.approach_rate = container.overall_difficulty;
    }

    temp_timingpoints.sort_by(timing_point_cmp);
    container.timingpoints = temp_timingpoints;

    Ok(container)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = "osu file format v14\n\
        [General]\nMode: 0\nStackLeniency: 0.7\n\
        [Difficulty]\nCircleSize:4\nOverallDifficulty:8\nApproachRate:9\nHPDrainRate:5\nSliderMultiplier:1.4\nSliderTickRate:1\n\
        [TimingPoints]\n0,300,4,1,0,100,1,0\n\
        [HitObjects]\n\
        256,192,0,1,0\n\
        128,128,300,2,0,L|384:192,1,150\n\
        256,192,900,5,0\n";

    fn parse(input: &str) -> PrimitiveContainer {
        parse_beatmap(input.as_bytes(), "test.osu", &StopToken::none()).unwrap()
    }

    #[test]
    fn basic_circles_and_sliders() {
        let c = parse(MINIMAL);
        assert_eq!(c.hitcircles.len(), 2);
        assert_eq!(c.sliders.len(), 1);
        assert_eq!(c.timingpoints.len(), 1);
        assert_eq!(c.version, 14);
        assert_eq!(c.circle_size, 4.0);
        assert_eq!(c.approach_rate, 9.0);
    }

    #[test]
    fn empty_data_is_file_load_error() {
        let result = parse_beatmap(b"", "empty.osu", &StopToken::none());
        assert_eq!(result.unwrap_err(), LoadError::FileLoad);
    }

    #[test]
    fn future_version_is_rejected() {
        let result = parse_beatmap(b"osu file format v99\n", "v99.osu", &StopToken::none());
        assert_eq!(result.unwrap_err(), LoadError::UnknownVersion);
    }

    #[test]
    fn non_std_gamemode_is_rejected() {
        let input = "osu file format v14\n[General]\nMode: 3\n";
        let result = parse_beatmap(input.as_bytes(), "mania.osu", &StopToken::none());
        assert_eq!(result.unwrap_err(), LoadError::NonStdGamemode);
    }

    #[test]
    fn mania_hold_note_skips_line_not_file() {
        let input = "osu file format v14\n[TimingPoints]\n0,300\n[HitObjects]\n\
            256,192,0,128,0,1000:0:0:0:0:\n\
            256,192,0,1,0\n";
        let c = parse(input);
        assert_eq!(c.hitcircles.len(), 1);
    }

    #[test]
    fn infinite_pixel_length_clamps() {
        let input = "osu file format v14\n[TimingPoints]\n0,300\n[HitObjects]\n\
            128,128,300,2,0,L|384:192,1,1e+40\n";
        let c = parse(input);
        assert_eq!(c.sliders[0].pixel_length, 32_768.0);
    }

    #[test]
    fn first_nonspinner_does_not_advance_color_counter() {
        let input = "osu file format v14\n[TimingPoints]\n0,300\n[HitObjects]\n\
            0,0,0,5,0\n\
            0,0,300,5,0\n";
        let c = parse(input);
        assert_eq!(c.hitcircles[0].color_counter, 1);
        assert_eq!(c.hitcircles[1].color_counter, 2);
        assert_eq!(c.hitcircles[0].number, 1);
        assert_eq!(c.hitcircles[1].number, 1);
    }

    #[test]
    fn spinner_advances_offset_but_not_counter() {
        let input = "osu file format v14\n[TimingPoints]\n0,300\n[HitObjects]\n\
            0,0,0,5,0\n\
            256,192,300,28,0,600\n\
            0,0,900,5,0\n";
        let c = parse(input);
        // spinner with new-combo + skip 1 advances the offset only
        assert_eq!(c.hitcircles[1].color_counter, 2);
        assert_eq!(c.hitcircles[1].color_offset, 1);
    }

    #[test]
    fn comments_and_crlf_are_tolerated() {
        let input = "osu file format v14\r\n// comment\r\n[TimingPoints]\r\n0,300\r\n[HitObjects]\r\n0,0,0,1,0\r\n";
        let c = parse(input);
        assert_eq!(c.hitcircles.len(), 1);
        assert_eq!(c.timingpoints.len(), 1);
    }

    #[test]
    fn slider_anchor_forced_into_control_points() {
        let c = parse(MINIMAL);
        let slider = &c.sliders[0];
        assert_eq!(slider.points[0], Point::new(128.0, 128.0));
        assert_eq!(slider.points.len(), 2);
    }

    #[test]
    fn colors_compress_in_index_order() {
        let input = "osu file format v14\n[Colours]\nCombo2 : 0,128,255\nCombo1 : 255,0,0\n\
            [TimingPoints]\n0,300\n[HitObjects]\n0,0,0,1,0\n";
        let c = parse(input);
        assert_eq!(c.combo_colors.len(), 2);
        assert_eq!(c.combo_colors[0], Color::new(255, 0, 0));
    }

    #[test]
    fn missing_ar_defaults_to_od() {
        let input = "osu file format v14\n[Difficulty]\nOverallDifficulty:7\n\
            [TimingPoints]\n0,300\n[HitObjects]\n0,0,0,1,0\n";
        let c = parse(input);
        assert_eq!(c.approach_rate, 7.0);
    }
}
