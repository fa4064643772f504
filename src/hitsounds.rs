//! Data structures for hitsounds.

use num::FromPrimitive;

/// A set of hitsound samples.
///
/// Hitsounds come in sample sets of (normal, soft, drum). A sample set can
/// apply to the whole beatmap, to a timing section, to an individual hit
/// object, or to the hitsound additions (whistle, finish, clap).
#[derive(Copy, Clone, Debug, Default, FromPrimitive, PartialEq, Eq)]
pub enum SampleSet {
    /// No sample set; inherit from the timing section / beatmap default.
    #[default]
    Default = 0,
    /// Normal sample set.
    Normal = 1,
    /// Soft sample set.
    Soft = 2,
    /// Drum sample set.
    Drum = 3,
}

impl SampleSet {
    /// Lenient numeric parse: values outside 0-3 fall back to Normal.
    pub fn from_token(token: &str) -> SampleSet {
        token
            .trim()
            .parse::<i32>()
            .ok()
            .and_then(SampleSet::from_i32)
            .unwrap_or(SampleSet::Normal)
    }
}

#[allow(non_upper_case_globals)]
bitflags! {
    /// A representation of hitsound additions attached to an object edge.
    pub struct HitSoundType: u8 {
        /// Normal hitsound
        const NORMAL = 1 << 0;

        /// Whistle hitsound
        const WHISTLE = 1 << 1;

        /// Finish (cymbal) hitsound
        const FINISH = 1 << 2;

        /// Clap hitsound
        const CLAP = 1 << 3;

        /// Everything a circle/spinner may carry
        const VALID_HITSOUNDS = Self::NORMAL.bits | Self::WHISTLE.bits | Self::FINISH.bits | Self::CLAP.bits;

        /// Everything a slider body ("hover") may carry
        const VALID_SLIDER_HITSOUNDS = Self::NORMAL.bits | Self::WHISTLE.bits;
    }
}

impl Default for HitSoundType {
    fn default() -> Self {
        HitSoundType::empty()
    }
}

/// A single hitsound descriptor as attached to a hit object or slider edge.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HitSamples {
    /// The additions (whistle, finish, clap) played on hit.
    pub hit_sounds: HitSoundType,

    /// The sample set for the normal hitsound.
    pub normal_set: SampleSet,

    /// The sample set for the additions.
    pub addition_set: SampleSet,

    /// Custom sample index (0 = default).
    pub index: i32,

    /// Sample volume in percent, clamped to [0, 100].
    pub volume: u8,

    /// Optional custom sample filename; can be empty.
    pub filename: String,
}

impl HitSamples {
    /// Parses the colon-separated `hitSample` field.
    ///
    /// Up to 5 components, all optional; missing components keep their
    /// defaults and parse errors within a component are ignored.
    pub fn parse_into(&mut self, field: &str) {
        if field.is_empty() {
            return;
        }

        let mut parts = field.split(':');

        if let Some(part) = parts.next() {
            self.normal_set = SampleSet::from_token(part);
        }
        if let Some(part) = parts.next() {
            self.addition_set = SampleSet::from_token(part);
        }
        if let Some(part) = parts.next() {
            self.index = part.trim().parse().unwrap_or(0);
        }
        if let Some(part) = parts.next() {
            // negative volumes exist in the wild
            let volume: i32 = part.trim().parse().unwrap_or(0);
            self.volume = volume.clamp(0, 100) as u8;
        }
        if let Some(part) = parts.next() {
            self.filename = part.to_owned();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_hitsample_fields() {
        let mut samples = HitSamples::default();
        samples.parse_into("2:0");
        assert_eq!(samples.normal_set, SampleSet::Soft);
        assert_eq!(samples.addition_set, SampleSet::Default);
        assert_eq!(samples.volume, 0);
    }

    #[test]
    fn out_of_range_sampleset_defaults_to_normal() {
        assert_eq!(SampleSet::from_token("7"), SampleSet::Normal);
        assert_eq!(SampleSet::from_token("-1"), SampleSet::Normal);
        assert_eq!(SampleSet::from_token("3"), SampleSet::Drum);
    }

    #[test]
    fn negative_volume_clamped() {
        let mut samples = HitSamples::default();
        samples.parse_into("0:0:0:-20:custom.wav");
        assert_eq!(samples.volume, 0);
        assert_eq!(samples.filename, "custom.wav");
    }
}
