//! Mod flags and per-score mod state.

use std::hash::{Hash, Hasher};

#[allow(non_upper_case_globals)]
bitflags! {
    /// The engine's 64-bit mod bitfield.
    ///
    /// Only a handful of these affect difficulty (Hidden, Relax, Autopilot,
    /// TouchDevice; HardRock/Easy act through the resolved AR/CS/OD/HP and
    /// the speed multiplier is carried separately as a float). The rest
    /// affect pp only, or mark a score non-submittable.
    pub struct ModFlags: u64 {
        /// Failing does not end the play.
        const NoFail = 1 << 0;
        /// Halved difficulty settings.
        const Easy = 1 << 1;
        /// Cursor movement is automated.
        const Autopilot = 1 << 2;
        /// Keypresses are automated.
        const Relax = 1 << 3;

        /// Objects fade out instead of showing an approach circle.
        const Hidden = 1 << 4;
        /// AR/OD/HP x1.4, CS x1.3, playfield flipped.
        const HardRock = 1 << 5;
        /// Only a small area around the cursor is visible.
        const Flashlight = 1 << 6;
        /// A miss ends the play.
        const SuddenDeath = 1 << 7;
        /// Anything below a 300 ends the play.
        const Perfect = Self::SuddenDeath.bits | (1 << 8);
        /// Nightmare (cosmetic/experimental).
        const Nightmare = 1 << 9;

        /// Speed change without pitch correction.
        const NoPitchCorrection = 1 << 10;
        /// Played on a touch device; aim is rated lower.
        const TouchDevice = 1 << 11;
        /// Spinners are completed automatically.
        const SpunOut = 1 << 12;
        /// ScoreV2 scoring rules.
        const ScoreV2 = 1 << 13;
        /// First-person playfield projection.
        const FPoSu = 1 << 14;
        /// Target practice.
        const Target = 1 << 15;

        /// Only one key may be used; speed pp is buffed.
        const Singletap = 1 << 43;
        /// Keylock disabled; speed pp is halved.
        const NoKeylock = 1 << 44;

        /// No health drain; non-submittable.
        const NoHP = 1 << 62;
        /// The play is fully automated; pp is zero.
        const Autoplay = 1 << 63;
    }
}

impl Default for ModFlags {
    fn default() -> Self {
        ModFlags::empty()
    }
}

#[allow(non_upper_case_globals)]
bitflags! {
    /// The classic 32-bit mod bitfield used by imported legacy scores.
    pub struct LegacyFlags: u32 {
        #[allow(missing_docs)]
        const NoFail = 1 << 0;
        #[allow(missing_docs)]
        const Easy = 1 << 1;
        #[allow(missing_docs)]
        const TouchDevice = 1 << 2;
        #[allow(missing_docs)]
        const Hidden = 1 << 3;
        #[allow(missing_docs)]
        const HardRock = 1 << 4;
        #[allow(missing_docs)]
        const SuddenDeath = 1 << 5;
        #[allow(missing_docs)]
        const DoubleTime = 1 << 6;
        #[allow(missing_docs)]
        const Relax = 1 << 7;
        #[allow(missing_docs)]
        const HalfTime = 1 << 8;
        #[allow(missing_docs)]
        const Nightcore = Self::DoubleTime.bits | (1 << 9);
        #[allow(missing_docs)]
        const Flashlight = 1 << 10;
        #[allow(missing_docs)]
        const Autoplay = 1 << 11;
        #[allow(missing_docs)]
        const SpunOut = 1 << 12;
        #[allow(missing_docs)]
        const Autopilot = 1 << 13;
        #[allow(missing_docs)]
        const Perfect = Self::SuddenDeath.bits | (1 << 14);
        #[allow(missing_docs)]
        const ScoreV2 = 1 << 29;
    }
}

impl LegacyFlags {
    /// Converts legacy flags to the engine bitfield plus the implied speed
    /// multiplier (DT/NC 1.5x, HT 0.75x).
    pub fn to_mod_flags(self) -> (ModFlags, f32) {
        let mut flags = ModFlags::empty();
        let mut set = |legacy: LegacyFlags, modern: ModFlags| {
            if self.contains(legacy) {
                flags |= modern;
            }
        };

        set(LegacyFlags::NoFail, ModFlags::NoFail);
        set(LegacyFlags::Easy, ModFlags::Easy);
        set(LegacyFlags::TouchDevice, ModFlags::TouchDevice);
        set(LegacyFlags::Hidden, ModFlags::Hidden);
        set(LegacyFlags::HardRock, ModFlags::HardRock);
        set(LegacyFlags::SuddenDeath, ModFlags::SuddenDeath);
        set(LegacyFlags::Relax, ModFlags::Relax);
        set(LegacyFlags::Flashlight, ModFlags::Flashlight);
        set(LegacyFlags::Autoplay, ModFlags::Autoplay);
        set(LegacyFlags::SpunOut, ModFlags::SpunOut);
        set(LegacyFlags::Autopilot, ModFlags::Autopilot);
        set(LegacyFlags::Perfect, ModFlags::Perfect);
        set(LegacyFlags::ScoreV2, ModFlags::ScoreV2);
        if self.contains(LegacyFlags::Nightcore) {
            flags |= ModFlags::NoPitchCorrection;
        }

        let speed = if self.contains(LegacyFlags::DoubleTime) {
            1.5
        } else if self.contains(LegacyFlags::HalfTime) {
            0.75
        } else {
            1.0
        };

        (flags, speed)
    }
}

/// The full mod state attached to a score.
///
/// The stored AR/CS/OD/HP overrides are already locked to their final
/// values; the speed multiplier is applied on top of them at calculation
/// time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Mods {
    /// Mod bitfield.
    pub flags: ModFlags,

    /// Speed multiplier (1.0 = none, 1.5 = DT, 0.75 = HT).
    pub speed: f32,

    /// Explicit AR override, wins over HardRock/Easy scaling.
    pub ar_override: Option<f32>,
    /// Explicit CS override.
    pub cs_override: Option<f32>,
    /// Explicit OD override.
    pub od_override: Option<f32>,
    /// Explicit HP override.
    pub hp_override: Option<f32>,
}

impl Default for Mods {
    fn default() -> Self {
        Mods {
            flags: ModFlags::empty(),
            speed: 1.0,
            ar_override: None,
            cs_override: None,
            od_override: None,
            hp_override: None,
        }
    }
}

impl Mods {
    /// Plain mods with a given flag set and 1.0x speed.
    pub fn from_flags(flags: ModFlags) -> Mods {
        Mods {
            flags,
            ..Mods::default()
        }
    }

    /// Whether a flag (combination) is set.
    #[inline]
    pub fn has(&self, flags: ModFlags) -> bool {
        self.flags.contains(flags)
    }

    fn naive_scaled(&self, base: f32, override_value: Option<f32>, hr_mul: f32) -> f32 {
        if let Some(value) = override_value {
            return value;
        }
        if self.has(ModFlags::HardRock) {
            (base * hr_mul).min(10.0)
        } else if self.has(ModFlags::Easy) {
            base * 0.5
        } else {
            base
        }
    }

    /// AR with HardRock/Easy or an explicit override applied (speed-independent).
    pub fn naive_ar(&self, base_ar: f32) -> f32 {
        self.naive_scaled(base_ar, self.ar_override, 1.4)
    }

    /// CS with HardRock/Easy or an explicit override applied.
    pub fn naive_cs(&self, base_cs: f32) -> f32 {
        self.naive_scaled(base_cs, self.cs_override, 1.3)
    }

    /// OD with HardRock/Easy or an explicit override applied (speed-independent).
    pub fn naive_od(&self, base_od: f32) -> f32 {
        self.naive_scaled(base_od, self.od_override, 1.4)
    }

    /// HP with HardRock/Easy or an explicit override applied.
    pub fn naive_hp(&self, base_hp: f32) -> f32 {
        self.naive_scaled(base_hp, self.hp_override, 1.4)
    }
}

/// The only inputs that invalidate the difficulty pipeline.
///
/// Scores on the same beatmap with identical `ModParams` share one
/// difficulty calculation; everything else affects pp only.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ModParams {
    /// Resolved approach rate.
    pub ar: f32,
    /// Resolved circle size.
    pub cs: f32,
    /// Resolved overall difficulty.
    pub od: f32,
    /// Resolved HP drain.
    pub hp: f32,
    /// Speed multiplier.
    pub speed: f32,
    /// Hidden flag.
    pub hidden: bool,
    /// Relax flag.
    pub relax: bool,
    /// Autopilot flag.
    pub autopilot: bool,
    /// Touch-device flag.
    pub touch_device: bool,
}

impl Default for ModParams {
    fn default() -> Self {
        ModParams {
            ar: 5.0,
            cs: 5.0,
            od: 5.0,
            hp: 5.0,
            speed: 1.0,
            hidden: false,
            relax: false,
            autopilot: false,
            touch_device: false,
        }
    }
}

impl ModParams {
    /// Resolves the difficulty-affecting parameters for a score on a map
    /// with the given base settings.
    pub fn resolve(mods: &Mods, base_ar: f32, base_cs: f32, base_od: f32, base_hp: f32) -> ModParams {
        ModParams {
            ar: mods.naive_ar(base_ar),
            cs: mods.naive_cs(base_cs),
            od: mods.naive_od(base_od),
            hp: mods.naive_hp(base_hp),
            speed: mods.speed,
            hidden: mods.has(ModFlags::Hidden),
            relax: mods.has(ModFlags::Relax),
            autopilot: mods.has(ModFlags::Autopilot),
            touch_device: mods.has(ModFlags::TouchDevice),
        }
    }
}

// params are always finite, so bitwise equality is an equivalence
impl Eq for ModParams {}

impl Hash for ModParams {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.ar.to_bits().hash(state);
        self.cs.to_bits().hash(state);
        self.od.to_bits().hash(state);
        self.hp.to_bits().hash(state);
        self.speed.to_bits().hash(state);
        self.hidden.hash(state);
        self.relax.hash(state);
        self.autopilot.hash(state);
        self.touch_device.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hardrock_scaling_caps_at_ten() {
        let mods = Mods::from_flags(ModFlags::HardRock);
        assert_eq!(mods.naive_ar(9.0), 10.0);
        assert!((mods.naive_cs(4.0) - 5.2).abs() < 1e-6);
    }

    #[test]
    fn override_wins_over_flags() {
        let mods = Mods {
            ar_override: Some(11.0),
            ..Mods::from_flags(ModFlags::Easy)
        };
        assert_eq!(mods.naive_ar(9.0), 11.0);
        assert_eq!(mods.naive_od(8.0), 4.0);
    }

    #[test]
    fn legacy_nightcore_implies_doubletime_speed() {
        let (flags, speed) = LegacyFlags::Nightcore.to_mod_flags();
        assert!(flags.contains(ModFlags::NoPitchCorrection));
        assert_eq!(speed, 1.5);
    }
}
