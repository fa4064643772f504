//! Pre-calculated star ratings for common mod combinations.
//!
//! 9 speeds x 6 mod combos (None, HR, HD, EZ, HD|HR, HD|EZ) = 54 cells per
//! beatmap, so the song browser can answer SR queries for the usual mod
//! panel without touching the difficulty pipeline.

use crate::mods::ModFlags;

/// The precalculated speed multipliers, ascending.
pub const SPEEDS: [f32; 9] = [0.75, 0.8, 0.9, 1.0, 1.1, 1.2, 1.3, 1.4, 1.5];

/// Display names matching [`SPEEDS`].
pub const SPEED_NAMES: [&str; 9] = ["0.75", "0.8", "0.9", "1.0", "1.1", "1.2", "1.3", "1.4", "1.5"];

/// Number of precalculated mod combinations per speed.
pub const NUM_MOD_COMBOS: usize = 6;

/// Display names for the mod combo indices.
pub const MOD_NAMES: [&str; NUM_MOD_COMBOS] = ["NM", "HR", "HD", "EZ", "HDHR", "HDEZ"];

/// Total number of precalculated ratings per beatmap.
pub const NUM_PRECALC_RATINGS: usize = SPEEDS.len() * NUM_MOD_COMBOS;

/// Index of the nomod 1.0x cell: speed index 3 (1.0) * 6 combos + None.
pub const NOMOD_1X_INDEX: usize = 3 * NUM_MOD_COMBOS;

const_assert_eq!(SPEEDS.len(), SPEED_NAMES.len());
const_assert_eq!(NUM_PRECALC_RATINGS, 54);

/// One beatmap's precalculated star ratings.
pub type SrArray = [f32; NUM_PRECALC_RATINGS];

/// Returned for mod combinations outside the precalc table (e.g. EZ|HR).
pub const INVALID_MOD_COMBO: usize = usize::MAX;

/// Maps mod flags to their combo index, or [`INVALID_MOD_COMBO`] for
/// disallowed combinations.
pub fn mod_combo_index(flags: ModFlags) -> usize {
    let hr = flags.contains(ModFlags::HardRock) as usize;
    let hd = (flags.contains(ModFlags::Hidden) as usize) << 1;
    let ez = (flags.contains(ModFlags::Easy) as usize) << 2;
    let key = hr | hd | ez;

    const LUT: [usize; 8] = [
        0,                 // None
        1,                 // HR
        2,                 // HD
        4,                 // HR|HD
        3,                 // EZ
        INVALID_MOD_COMBO, // EZ|HR (disallowed)
        5,                 // EZ|HD
        INVALID_MOD_COMBO, // all (disallowed)
    ];

    LUT[key]
}

/// Index of the closest precalculated speed; never fails.
pub fn speed_index(speed: f32) -> usize {
    let upper = SPEEDS.partition_point(|&s| s < speed);
    if upper == 0 {
        return 0;
    }
    if upper == SPEEDS.len() {
        return SPEEDS.len() - 1;
    }

    let prev = upper - 1;
    if speed - SPEEDS[prev] <= SPEEDS[upper] - speed {
        prev
    } else {
        upper
    }
}

/// Flat index into an [`SrArray`] for a mod+speed combination, or
/// [`INVALID_MOD_COMBO`] when the flags are disallowed.
pub fn index_of(flags: ModFlags, speed: f32) -> usize {
    let mi = mod_combo_index(flags);
    if mi == INVALID_MOD_COMBO {
        return INVALID_MOD_COMBO;
    }

    speed_index(speed) * NUM_MOD_COMBOS + mi
}

/// Human-readable name of an [`SrArray`] cell, for debug output.
pub fn describe_index(idx: usize) -> String {
    if idx >= NUM_PRECALC_RATINGS {
        return "invalid".to_owned();
    }

    format!("{}@{}x", MOD_NAMES[idx % NUM_MOD_COMBOS], SPEED_NAMES[idx / NUM_MOD_COMBOS])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nomod_index_is_the_1x_none_cell() {
        assert_eq!(index_of(ModFlags::empty(), 1.0), NOMOD_1X_INDEX);
        assert_eq!(describe_index(NOMOD_1X_INDEX), "NM@1.0x");
    }

    #[test]
    fn disallowed_combos_are_invalid() {
        assert_eq!(mod_combo_index(ModFlags::Easy | ModFlags::HardRock), INVALID_MOD_COMBO);
        assert_eq!(
            mod_combo_index(ModFlags::Easy | ModFlags::HardRock | ModFlags::Hidden),
            INVALID_MOD_COMBO
        );
    }

    #[test]
    fn speed_snaps_to_nearest() {
        assert_eq!(speed_index(0.5), 0);
        assert_eq!(speed_index(1.0), 3);
        assert_eq!(speed_index(1.06), 4);
        assert_eq!(speed_index(3.0), 8);
    }

    #[test]
    fn non_difficulty_flags_do_not_move_the_index() {
        assert_eq!(
            index_of(ModFlags::Hidden | ModFlags::Flashlight, 1.0),
            index_of(ModFlags::Hidden, 1.0)
        );
    }
}
