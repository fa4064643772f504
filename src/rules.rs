//! Game rules: hit windows, approach times, circle sizes.
//!
//! These mappings are fixed by the game client and are shared by every
//! stage of the difficulty pipeline.

/// osu!pixel playfield correction factor kept for compatibility with the
/// client's gamefield rounding.
pub const BROKEN_GAMEFIELD_ROUNDING_ALLOWANCE: f32 = 1.00041;

/// Raw hit circle diameter in osu!pixels for a circle size value.
pub fn raw_hit_circle_diameter(cs: f32) -> f32 {
    ((1.0 - 0.7 * (cs - 5.0) / 5.0) / 2.0) * 128.0 * BROKEN_GAMEFIELD_ROUNDING_ALLOWANCE
}

/// Raw hit circle radius in osu!pixels.
pub fn raw_hit_circle_radius(cs: f32) -> f32 {
    raw_hit_circle_diameter(cs) / 2.0
}

/// The 300 hit window in milliseconds (before the half-millisecond floor).
pub fn od_to_300_hit_window_ms(od: f64) -> f64 {
    80.0 - 6.0 * od
}

/// The 100 hit window in milliseconds.
pub fn od_to_100_hit_window_ms(od: f64) -> f64 {
    140.0 - 8.0 * od
}

/// The 50 hit window in milliseconds.
pub fn od_to_50_hit_window_ms(od: f64) -> f64 {
    200.0 - 10.0 * od
}

/// Quantizes a hit window the way the client does before comparisons.
#[inline]
pub fn adjust_hit_window(hit_window: f64) -> f64 {
    hit_window.floor() - 0.5
}

/// OD as it effectively plays at a given clock rate.
pub fn adjust_od_by_clock_rate(od: f64, clock_rate: f64) -> f64 {
    (79.5 - (adjust_hit_window(od_to_300_hit_window_ms(od)) / clock_rate)) / 6.0
}

/// Approach time (preempt) in milliseconds for an AR value.
pub fn approach_time_ms(ar: f32) -> f32 {
    if ar < 5.0 {
        1200.0 + 600.0 * (5.0 - ar) / 5.0
    } else {
        1200.0 - 750.0 * (ar - 5.0) / 5.0
    }
}

/// Approach time used by the stacking pass; identical to the gameplay
/// preempt at 1.0x speed.
pub fn approach_time_for_stacking(ar: f32) -> f32 {
    approach_time_ms(ar)
}

/// AR as it effectively plays at a given speed multiplier.
pub fn ar_with_speed(ar: f64, speed: f64) -> f64 {
    let ms = approach_time_ms(ar as f32) as f64 / speed;
    if ms > 1200.0 {
        (1800.0 - ms) / 120.0
    } else {
        (1200.0 - ms) / 150.0 + 5.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn od10_window_is_20ms_before_floor() {
        assert_eq!(od_to_300_hit_window_ms(10.0), 20.0);
        assert_eq!(adjust_hit_window(od_to_300_hit_window_ms(10.0)), 19.5);
    }

    #[test]
    fn adjusted_od_is_identity_at_1x() {
        for od in [0.0, 5.0, 8.0, 10.0] {
            assert!((adjust_od_by_clock_rate(od, 1.0) - od).abs() < 1e-9);
        }
    }

    #[test]
    fn ar_with_speed_is_identity_at_1x() {
        for ar in [0.0, 5.0, 9.0, 10.0] {
            assert!((ar_with_speed(ar, 1.0) - ar).abs() < 1e-6);
        }
    }

    #[test]
    fn doubletime_raises_effective_ar() {
        assert!(ar_with_speed(9.0, 1.5) > 10.0);
    }
}
