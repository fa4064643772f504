//! Timing points and timing queries.

use std::cmp::Ordering;
use std::str::FromStr;

use crate::errors::ParseError;

/// A raw timing point, mirroring the beatmap file format.
///
/// `ms_per_beat >= 0` means uninherited (defines the BPM); negative values
/// are inherited and define a slider-velocity multiplier. NaN values are
/// kept as-is and flagged by [`timing_info_at`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimingPoint {
    /// Offset in milliseconds, rounded to the nearest integer.
    pub offset: f64,

    /// Milliseconds per beat; negative for inherited points.
    pub ms_per_beat: f64,

    /// Sample set for this timing section.
    pub sample_set: i32,

    /// Custom sample index.
    pub sample_index: i32,

    /// Volume in percent, clamped to [0, 100].
    pub volume: i32,

    /// True for uninherited ("red") points.
    pub uninherited: bool,

    /// Whether kiai time is on for this section.
    pub kiai: bool,
}

impl FromStr for TimingPoint {
    type Err = ParseError;

    /// Parses one `[TimingPoints]` line.
    ///
    /// Accepts the long form (7 or 8 comma-separated fields, the 8th being
    /// kiai) and the ancient short form (offset, msPerBeat).
    fn from_str(input: &str) -> Result<TimingPoint, Self::Err> {
        let input = input.trim_end_matches(',');
        let mut parts = input.split(',').map(str::trim);

        let offset: f64 = parts
            .next()
            .ok_or(ParseError::InvalidTimingPoint("empty line"))?
            .parse()?;
        let ms_per_beat: f64 = parts
            .next()
            .ok_or(ParseError::InvalidTimingPoint("missing msPerBeat"))?
            .parse()?;

        let mut point = TimingPoint {
            offset: offset.round(),
            ms_per_beat,
            sample_set: 0,
            sample_index: 0,
            volume: 100,
            uninherited: true,
            kiai: false,
        };

        // short form has no further fields
        let meter = match parts.next() {
            Some(meter) => meter,
            None => return Ok(point),
        };
        let _: i32 = meter.parse()?;

        if let Some(part) = parts.next() {
            point.sample_set = part.parse()?;
        }
        if let Some(part) = parts.next() {
            point.sample_index = part.parse()?;
        }
        if let Some(part) = parts.next() {
            point.volume = part.parse::<i32>()?.clamp(0, 100);
        }
        if let Some(part) = parts.next() {
            point.uninherited = part.parse::<i32>()? == 1;
        }
        if let Some(part) = parts.next() {
            point.kiai = part.parse::<i32>()? > 0;
        }

        Ok(point)
    }
}

/// Total order used to sort the timing point array: offset first, then
/// uninherited before inherited, then sample set, sample index, kiai.
pub fn timing_point_cmp(a: &TimingPoint, b: &TimingPoint) -> Ordering {
    if a.offset != b.offset {
        return a.offset.partial_cmp(&b.offset).unwrap_or(Ordering::Equal);
    }

    let a_uninherited = a.ms_per_beat >= 0.0;
    let b_uninherited = b.ms_per_beat >= 0.0;
    if a_uninherited != b_uninherited {
        return if a_uninherited { Ordering::Less } else { Ordering::Greater };
    }

    (a.sample_set, a.sample_index, !a.kiai).cmp(&(b.sample_set, b.sample_index, !b.kiai))
}

/// Resolved timing info at a point in time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimingInfo {
    /// Offset of the governing uninherited point.
    pub offset: i32,

    /// Beat length of the governing uninherited point.
    pub beat_length_base: f32,

    /// Beat length with the inherited multiplier applied.
    pub beat_length: f32,

    /// Sample set at this time.
    pub sample_set: i32,

    /// Sample index at this time.
    pub sample_index: i32,

    /// Volume at this time.
    pub volume: i32,

    /// True if either source point carries a NaN beat length.
    pub is_nan: bool,
}

impl Default for TimingInfo {
    fn default() -> Self {
        TimingInfo {
            offset: 0,
            beat_length_base: 1.0,
            beat_length: 1.0,
            sample_set: 0,
            sample_index: 0,
            volume: 100,
            is_nan: false,
        }
    }
}

/// Walks the sorted timing point array and resolves the timing info that
/// governs `position_ms`.
///
/// Correctly handles aspire maps: the last uninherited point at or before
/// the position defines the base beat length, the last inherited point
/// after it (if any) contributes a multiplier `clamp(-msPerBeat, 10, 1000)
/// / 100`, and NaN beat lengths set the `is_nan` flag instead of
/// propagating.
pub fn timing_info_at(position_ms: i32, timingpoints: &[TimingPoint]) -> TimingInfo {
    let mut info = TimingInfo::default();
    if timingpoints.is_empty() {
        return info;
    }

    let mut point = 0usize;
    let mut sample_point = 0usize;
    let mut audio_point = 0usize;

    for (i, tp) in timingpoints.iter().enumerate() {
        if tp.offset > position_ms as f64 {
            break;
        }

        audio_point = i;

        if tp.uninherited {
            point = i;
        } else {
            sample_point = i;
        }
    }

    let mult = if sample_point > point && timingpoints[sample_point].ms_per_beat < 0.0 {
        ((-timingpoints[sample_point].ms_per_beat) as f32).clamp(10.0, 1000.0) / 100.0
    } else {
        1.0
    };

    info.beat_length_base = timingpoints[point].ms_per_beat as f32;
    info.offset = timingpoints[point].offset as i32;
    info.is_nan =
        timingpoints[sample_point].ms_per_beat.is_nan() || timingpoints[point].ms_per_beat.is_nan();
    info.beat_length = info.beat_length_base * mult;

    info.volume = timingpoints[audio_point].volume;
    info.sample_set = timingpoints[audio_point].sample_set;
    info.sample_index = timingpoints[audio_point].sample_index;

    info
}

/// BPM statistics over a beatmap's timing points.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BpmInfo {
    /// Slowest BPM.
    pub min: i32,
    /// Fastest BPM.
    pub max: i32,
    /// The BPM active for the longest total duration.
    pub most_common: i32,
}

/// Derives min/max/most-common BPM from uninherited timing points.
///
/// The first point is forced to start at 0 (osu-stable compatibility) and
/// BPM values are capped at 9001.
pub fn get_bpm(timingpoints: &[TimingPoint]) -> BpmInfo {
    if timingpoints.is_empty() {
        return BpmInfo::default();
    }

    let mut tuples: Vec<(i32, f64)> = Vec::with_capacity(timingpoints.len());

    let last_time = timingpoints.last().unwrap().offset;
    for (i, tp) in timingpoints.iter().enumerate() {
        if tp.offset > last_time {
            continue;
        }
        if tp.ms_per_beat <= 0.0 || tp.ms_per_beat.is_nan() {
            continue;
        }

        let current_time = if i == 0 { 0.0 } else { tp.offset };
        let next_time = if i == timingpoints.len() - 1 {
            last_time
        } else {
            timingpoints[i + 1].offset
        };

        let bpm = (60_000.0 / tp.ms_per_beat).min(9001.0).round() as i32;
        let duration = (next_time - current_time).max(0.0);

        match tuples.iter_mut().find(|(b, _)| *b == bpm) {
            Some((_, total)) => *total += duration,
            None => tuples.push((bpm, duration)),
        }
    }

    let mut info = BpmInfo {
        min: 9001,
        max: 0,
        most_common: 0,
    };
    let mut longest = 0.0f64;
    for &(bpm, duration) in &tuples {
        info.min = info.min.min(bpm);
        info.max = info.max.max(bpm);
        if duration > longest || (duration == longest && bpm > info.most_common) {
            longest = duration;
            info.most_common = bpm;
        }
    }
    if info.min > info.max {
        info.min = info.max;
    }

    info
}

#[cfg(test)]
mod tests {
    use super::*;

    fn red(offset: f64, ms_per_beat: f64) -> TimingPoint {
        TimingPoint {
            offset,
            ms_per_beat,
            sample_set: 0,
            sample_index: 0,
            volume: 100,
            uninherited: true,
            kiai: false,
        }
    }

    fn green(offset: f64, ms_per_beat: f64) -> TimingPoint {
        TimingPoint {
            uninherited: false,
            ..red(offset, ms_per_beat)
        }
    }

    #[test]
    fn short_form_defaults() {
        let tp: TimingPoint = "1000,300".parse().unwrap();
        assert_eq!(tp.offset, 1000.0);
        assert_eq!(tp.ms_per_beat, 300.0);
        assert!(tp.uninherited);
        assert_eq!(tp.volume, 100);
    }

    #[test]
    fn long_form_with_kiai() {
        let tp: TimingPoint = "0,300,4,1,0,80,1,1".parse().unwrap();
        assert!(tp.uninherited);
        assert!(tp.kiai);
        assert_eq!(tp.volume, 80);
    }

    #[test]
    fn offset_rounds_to_nearest() {
        let tp: TimingPoint = "10.6,300".parse().unwrap();
        assert_eq!(tp.offset, 11.0);
    }

    #[test]
    fn inherited_multiplier_is_clamped() {
        let points = [red(0.0, 500.0), green(100.0, -5000.0)];
        let info = timing_info_at(200, &points);
        assert_eq!(info.beat_length_base, 500.0);
        // -(-5000) clamps to 1000 -> x10
        assert_eq!(info.beat_length, 5000.0);
    }

    #[test]
    fn green_before_red_is_ignored() {
        let points = [green(0.0, -50.0), red(100.0, 400.0)];
        let info = timing_info_at(200, &points);
        assert_eq!(info.beat_length, 400.0);
    }

    #[test]
    fn nan_flag_propagates() {
        let points = [red(0.0, f64::NAN)];
        assert!(timing_info_at(50, &points).is_nan);
    }

    #[test]
    fn uninherited_sorts_before_inherited_at_same_offset() {
        let mut points = vec![green(0.0, -100.0), red(0.0, 300.0)];
        points.sort_by(timing_point_cmp);
        assert!(points[0].uninherited);
    }

    #[test]
    fn bpm_statistics() {
        // 300 ms/beat = 200 bpm for 10s, 600 ms/beat = 100 bpm afterwards
        let points = [red(0.0, 300.0), red(10_000.0, 600.0)];
        let info = get_bpm(&points);
        assert_eq!(info.min, 100);
        assert_eq!(info.max, 200);
        assert_eq!(info.most_common, 200);
    }
}
