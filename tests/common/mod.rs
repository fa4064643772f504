//! Shared helpers for the integration tests: synthetic beatmap builders.

// not every test binary uses every builder
#![allow(dead_code)]

use std::fmt::Write;

/// The standard header used by the synthetic maps.
pub fn map_header(ar: f32, od: f32, cs: f32) -> String {
    format!(
        "osu file format v14\n\
         [General]\n\
         Mode: 0\n\
         StackLeniency: 0.7\n\
         [Metadata]\n\
         Title:Synthetic\n\
         Artist:starpp\n\
         Creator:tests\n\
         Version:generated\n\
         [Difficulty]\n\
         CircleSize:{cs}\n\
         OverallDifficulty:{od}\n\
         ApproachRate:{ar}\n\
         HPDrainRate:5\n\
         SliderMultiplier:1.4\n\
         SliderTickRate:1\n\
         [TimingPoints]\n\
         0,300,4,1,0,100,1,0\n\
         [HitObjects]\n"
    )
}

/// A jump map: `n` circles alternating between two positions every 150ms,
/// with a slider every 8th object.
pub fn jump_map(n: usize) -> String {
    let mut out = map_header(9.0, 8.0, 4.0);
    for i in 0..n {
        let t = i * 150;
        let x = if i % 2 == 0 { 100 } else { 400 };
        let y = if i % 4 < 2 { 120 } else { 260 };
        if i % 8 == 7 {
            let _ = writeln!(out, "{x},{y},{t},2,0,L|{}:{y},1,140", x + 150);
        } else {
            let new_combo = if i % 6 == 0 { 5 } else { 1 };
            let _ = writeln!(out, "{x},{y},{t},{new_combo},0");
        }
    }
    out
}

/// A short map with stacked notes (same position, short gaps).
pub fn stacked_map(n: usize) -> String {
    let mut out = map_header(9.0, 8.0, 4.0);
    for i in 0..n {
        let t = i * 100;
        let _ = writeln!(out, "256,192,{t},1,0");
    }
    out
}

/// The abridged "basic circles and sliders" scenario map.
pub fn basic_scenario_map() -> String {
    "osu file format v14\n\
     [General]\n\
     Mode: 0\n\
     StackLeniency: 0.7\n\
     [Difficulty]\n\
     CircleSize:4\n\
     OverallDifficulty:8\n\
     ApproachRate:9\n\
     HPDrainRate:5\n\
     SliderMultiplier:1.4\n\
     SliderTickRate:1\n\
     [TimingPoints]\n\
     0,300,4,1,0,100,1,0\n\
     [HitObjects]\n\
     256,192,0,1,0\n\
     128,128,300,2,0,L|384:192,1,150\n\
     256,192,900,5,0\n"
        .to_owned()
}
