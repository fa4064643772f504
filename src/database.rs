//! Beatmap database entities: the set/difficulty tree, score records and
//! the lock-ordered side tables the batch recalculator works against.
//!
//! Ownership is a tree plus side tables: the database owns the sets, a
//! set owns its difficulties, and a difficulty refers back to its set by
//! index. The 54-cell star-rating arrays live in a separate map keyed by
//! the beatmap hash.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::RwLock;

use crate::beatmap::PrimitiveContainer;
use crate::mods::Mods;
use crate::precalc::{self, SrArray, NOMOD_1X_INDEX, NUM_PRECALC_RATINGS};
use crate::timing::{get_bpm, BpmInfo};

/// An opaque 16-byte beatmap identity (the MD5 of the file in the full
/// client); the engine never hashes files itself.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct MapHash(pub [u8; 16]);

impl fmt::Debug for MapHash {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for b in self.0 {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

impl fmt::Display for MapHash {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl MapHash {
    /// A hash derived from a counter, handy for synthetic test corpora.
    pub fn from_u64(v: u64) -> MapHash {
        let mut bytes = [0u8; 16];
        bytes[..8].copy_from_slice(&v.to_le_bytes());
        MapHash(bytes)
    }
}

/// A single playable difficulty.
#[derive(Debug)]
pub struct BeatmapDifficulty {
    /// Beatmap identity.
    pub hash: MapHash,
    /// Index of the owning set inside the database; `None` until adopted.
    pub set_index: Option<usize>,

    /// Path to the .osu file.
    pub file_path: String,
    /// Path to the containing folder.
    pub folder: String,

    /// Song title.
    pub title: String,
    /// Song artist.
    pub artist: String,
    /// Mapset creator.
    pub creator: String,
    /// Difficulty name ("Version").
    pub difficulty_name: String,
    /// Audio filename.
    pub audio_filename: String,
    /// Background image filename.
    pub background_image_filename: String,

    /// Last modification time of the file, as reported by the embedder.
    pub last_modification_time: i64,

    /// Playable length in milliseconds.
    pub length_ms: u32,
    /// Song-select preview time.
    pub preview_time: i32,

    /// Base approach rate.
    pub ar: f32,
    /// Base circle size.
    pub cs: f32,
    /// Base HP drain.
    pub hp: f32,
    /// Base overall difficulty.
    pub od: f32,

    /// Stack leniency.
    pub stack_leniency: f32,
    /// Slider tick rate.
    pub slider_tick_rate: f32,
    /// Slider velocity base.
    pub slider_multiplier: f32,

    /// The pp algorithm version the stored values were computed with.
    pub ppv2_version: u32,
    /// Star rating without mods at 1.0x.
    pub stars_nomod: f32,

    /// Slowest BPM.
    pub min_bpm: i32,
    /// Fastest BPM.
    pub max_bpm: i32,
    /// Most common BPM.
    pub most_common_bpm: i32,

    /// Number of circles.
    pub num_circles: i32,
    /// Number of sliders.
    pub num_sliders: i32,
    /// Number of spinners.
    pub num_spinners: i32,

    /// Whether this difficulty is externally managed; recalculated values
    /// are then also persisted as an override row.
    pub is_external: bool,

    // last SR query (idx in the low byte, f32 bits up top); avoids the
    // array lookup for repeated queries of the same cell
    sr_query_cache: AtomicU64,
}

impl Clone for BeatmapDifficulty {
    fn clone(&self) -> Self {
        BeatmapDifficulty {
            hash: self.hash,
            set_index: self.set_index,
            file_path: self.file_path.clone(),
            folder: self.folder.clone(),
            title: self.title.clone(),
            artist: self.artist.clone(),
            creator: self.creator.clone(),
            difficulty_name: self.difficulty_name.clone(),
            audio_filename: self.audio_filename.clone(),
            background_image_filename: self.background_image_filename.clone(),
            last_modification_time: self.last_modification_time,
            length_ms: self.length_ms,
            preview_time: self.preview_time,
            ar: self.ar,
            cs: self.cs,
            hp: self.hp,
            od: self.od,
            stack_leniency: self.stack_leniency,
            slider_tick_rate: self.slider_tick_rate,
            slider_multiplier: self.slider_multiplier,
            ppv2_version: self.ppv2_version,
            stars_nomod: self.stars_nomod,
            min_bpm: self.min_bpm,
            max_bpm: self.max_bpm,
            most_common_bpm: self.most_common_bpm,
            num_circles: self.num_circles,
            num_sliders: self.num_sliders,
            num_spinners: self.num_spinners,
            is_external: self.is_external,
            sr_query_cache: AtomicU64::new(self.sr_query_cache.load(Ordering::Relaxed)),
        }
    }
}

impl BeatmapDifficulty {
    /// A bare difficulty pointing at a file.
    pub fn new(hash: MapHash, file_path: impl Into<String>, folder: impl Into<String>) -> Self {
        BeatmapDifficulty {
            hash,
            set_index: None,
            file_path: file_path.into(),
            folder: folder.into(),
            title: String::new(),
            artist: String::new(),
            creator: String::new(),
            difficulty_name: String::new(),
            audio_filename: String::new(),
            background_image_filename: String::new(),
            last_modification_time: 0,
            length_ms: 0,
            preview_time: -1,
            ar: 5.0,
            cs: 5.0,
            hp: 5.0,
            od: 5.0,
            stack_leniency: 0.7,
            slider_tick_rate: 1.0,
            slider_multiplier: 1.0,
            ppv2_version: 0,
            stars_nomod: 0.0,
            min_bpm: 0,
            max_bpm: 0,
            most_common_bpm: 0,
            num_circles: 0,
            num_sliders: 0,
            num_spinners: 0,
            is_external: false,
            sr_query_cache: AtomicU64::new(u64::MAX),
        }
    }

    /// Fills the metadata fields from a parsed container.
    pub fn apply_metadata(&mut self, container: &PrimitiveContainer) {
        let meta = &container.meta;
        self.title = meta.title.clone();
        self.artist = meta.artist.clone();
        self.creator = meta.creator.clone();
        self.difficulty_name = meta.difficulty_name.clone();
        self.audio_filename = meta.audio_filename.clone();
        self.background_image_filename = meta.background_image_filename.clone();
        self.preview_time = meta.preview_time;

        self.ar = container.approach_rate;
        self.cs = container.circle_size;
        self.hp = container.hp_drain;
        self.od = container.overall_difficulty;
        self.stack_leniency = container.stack_leniency;
        self.slider_tick_rate = container.slider_tick_rate;
        self.slider_multiplier = container.slider_multiplier;

        self.num_circles = container.hitcircles.len() as i32;
        self.num_sliders = container.sliders.len() as i32;
        self.num_spinners = container.spinners.len() as i32;

        let bpm: BpmInfo = get_bpm(&container.timingpoints);
        self.min_bpm = bpm.min;
        self.max_bpm = bpm.max;
        self.most_common_bpm = bpm.most_common;
    }

    /// Total object count.
    pub fn num_objects(&self) -> i32 {
        self.num_circles + self.num_sliders + self.num_spinners
    }

    /// Looks up one cell of the precalculated SR array, falling back to
    /// the stored nomod rating while the array is missing or stale.
    pub fn star_rating(&self, idx: usize, star_ratings: &HashMap<MapHash, Box<SrArray>>) -> f32 {
        if idx >= NUM_PRECALC_RATINGS {
            return self.stars_nomod;
        }

        // repeated queries of the same cell skip the map lookup
        let cached = self.sr_query_cache.load(Ordering::Relaxed);
        if cached != u64::MAX && (cached & 0xff) as usize == idx {
            let value = f32::from_bits((cached >> 32) as u32);
            if value > 0.0 {
                return value;
            }
        }

        let value = star_ratings
            .get(&self.hash)
            .map(|arr| arr[idx])
            .filter(|&v| v > 0.0)
            .unwrap_or(self.stars_nomod);

        self.sr_query_cache.store(
            ((value.to_bits() as u64) << 32) | idx as u64,
            Ordering::Relaxed,
        );
        value
    }

    /// The values the database persists for externally-managed ("peppy")
    /// beatmaps.
    pub fn get_overrides(&self) -> MapOverrides {
        MapOverrides {
            ppv2_version: self.ppv2_version,
            stars_nomod: self.stars_nomod,
            length_ms: self.length_ms,
            num_circles: self.num_circles,
            num_sliders: self.num_sliders,
            num_spinners: self.num_spinners,
            min_bpm: self.min_bpm,
            max_bpm: self.max_bpm,
            most_common_bpm: self.most_common_bpm,
        }
    }
}

/// Persisted per-difficulty override values.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MapOverrides {
    /// Algorithm version the overrides were computed with.
    pub ppv2_version: u32,
    /// Nomod star rating.
    pub stars_nomod: f32,
    /// Playable length.
    pub length_ms: u32,
    /// Number of circles.
    pub num_circles: i32,
    /// Number of sliders.
    pub num_sliders: i32,
    /// Number of spinners.
    pub num_spinners: i32,
    /// Slowest BPM.
    pub min_bpm: i32,
    /// Fastest BPM.
    pub max_bpm: i32,
    /// Most common BPM.
    pub most_common_bpm: i32,
}

/// A bundle of difficulties sharing audio, background and metadata.
#[derive(Clone, Debug, Default)]
pub struct BeatmapSet {
    /// Owned difficulties; never empty for a valid set.
    pub difficulties: Vec<BeatmapDifficulty>,

    /// Folder shared by the difficulties.
    pub folder: String,
    /// Representative title (from the first difficulty).
    pub title: String,
    /// Representative artist.
    pub artist: String,
    /// Representative creator.
    pub creator: String,

    /// Longest difficulty length.
    pub length_ms: u32,
    /// Smallest CS among the difficulties.
    pub cs: f32,
    /// Largest AR among the difficulties.
    pub ar: f32,
    /// Largest OD among the difficulties.
    pub od: f32,
    /// Largest HP among the difficulties.
    pub hp: f32,
    /// Slowest BPM over all difficulties.
    pub min_bpm: i32,
    /// Fastest BPM over all difficulties.
    pub max_bpm: i32,
    /// Most common BPM over all difficulties.
    pub most_common_bpm: i32,
    /// Newest modification time.
    pub last_modification_time: i64,
}

impl BeatmapSet {
    /// Builds a set around its difficulties and computes the
    /// representative values.
    pub fn new(difficulties: Vec<BeatmapDifficulty>) -> BeatmapSet {
        assert!(
            !difficulties.is_empty(),
            "a beatmapset cannot have 0 difficulties"
        );

        let mut set = BeatmapSet {
            folder: difficulties[0].folder.clone(),
            title: difficulties[0].title.clone(),
            artist: difficulties[0].artist.clone(),
            creator: difficulties[0].creator.clone(),
            difficulties,
            ..BeatmapSet::default()
        };
        set.update_representative_values();
        set
    }

    /// Recomputes the set-level summary values from the difficulties.
    /// Calling this twice in a row is a no-op.
    pub fn update_representative_values(&mut self) {
        if self.difficulties.is_empty() {
            return;
        }

        self.length_ms = 0;
        self.cs = 99.0;
        self.ar = 0.0;
        self.od = 0.0;
        self.hp = 0.0;
        self.min_bpm = 9001;
        self.max_bpm = 0;
        self.most_common_bpm = 0;
        self.last_modification_time = 0;

        for diff in &self.difficulties {
            self.length_ms = self.length_ms.max(diff.length_ms);
            self.cs = self.cs.min(diff.cs);
            self.ar = self.ar.max(diff.ar);
            self.hp = self.hp.max(diff.hp);
            self.od = self.od.max(diff.od);
            self.min_bpm = self.min_bpm.min(diff.min_bpm);
            self.max_bpm = self.max_bpm.max(diff.max_bpm);
            self.most_common_bpm = self.most_common_bpm.max(diff.most_common_bpm);
            self.last_modification_time =
                self.last_modification_time.max(diff.last_modification_time);
        }
    }
}

/// One finished play as stored in the score database.
#[derive(Clone, Debug, Default)]
pub struct FinishedScore {
    /// Unique score identifier within the database.
    pub id: u64,
    /// The beatmap it was set on.
    pub beatmap_hash: MapHash,

    /// Mods and overrides.
    pub mods: Mods,

    /// Classic total score.
    pub score: u64,
    /// Highest combo reached.
    pub combo_max: i32,
    /// Miss count.
    pub num_misses: i32,
    /// 300 count.
    pub num_300s: i32,
    /// 100 count.
    pub num_100s: i32,
    /// 50 count.
    pub num_50s: i32,

    /// Whether this score was imported from the legacy client.
    pub is_legacy_import: bool,

    /// pp algorithm version of the stored values.
    pub ppv2_version: u32,
    /// Stored pp.
    pub ppv2_score: f64,
    /// Stored total star rating.
    pub ppv2_total_stars: f64,
    /// Stored aim stars.
    pub ppv2_aim_stars: f64,
    /// Stored speed stars.
    pub ppv2_speed_stars: f64,
}

impl FinishedScore {
    /// A score needs a recalc when its stored pp predates the current
    /// algorithm, or it has a real score but no stored pp at all.
    pub fn needs_recalc(&self, current_version: u32) -> bool {
        self.ppv2_version < current_version || (self.score > 0 && self.ppv2_score <= 0.0)
    }
}

/// Location of a difficulty inside the set tree.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DiffHandle {
    /// Index of the set in the database.
    pub set: usize,
    /// Index of the difficulty within the set.
    pub diff: usize,
}

/// The in-memory beatmap/score database.
///
/// Lock order when taking more than one: `sets` (difficulties), then
/// `star_ratings`, then `overrides`. The scores table is independent.
pub struct Database {
    sets: RwLock<Vec<BeatmapSet>>,
    index: RwLock<HashMap<MapHash, DiffHandle>>,
    star_ratings: RwLock<HashMap<MapHash, Box<SrArray>>>,
    overrides: RwLock<HashMap<MapHash, MapOverrides>>,
    scores: RwLock<HashMap<MapHash, Vec<FinishedScore>>>,

    /// Set whenever stored scores change, so the embedder knows to persist.
    pub scores_changed: AtomicBool,
}

impl Default for Database {
    fn default() -> Self {
        Database {
            sets: RwLock::new(Vec::new()),
            index: RwLock::new(HashMap::new()),
            star_ratings: RwLock::new(HashMap::new()),
            overrides: RwLock::new(HashMap::new()),
            scores: RwLock::new(HashMap::new()),
            scores_changed: AtomicBool::new(false),
        }
    }
}

impl Database {
    /// An empty database.
    pub fn new() -> Database {
        Database::default()
    }

    /// Adopts a set: assigns the back-indices and indexes the contained
    /// difficulties by hash. Returns the set index.
    pub fn add_set(&self, mut set: BeatmapSet) -> usize {
        let mut sets = self.sets.write().unwrap();
        let mut index = self.index.write().unwrap();

        let set_idx = sets.len();
        for (diff_idx, diff) in set.difficulties.iter_mut().enumerate() {
            diff.set_index = Some(set_idx);
            index.insert(
                diff.hash,
                DiffHandle {
                    set: set_idx,
                    diff: diff_idx,
                },
            );
        }
        sets.push(set);
        set_idx
    }

    /// Number of sets.
    pub fn num_sets(&self) -> usize {
        self.sets.read().unwrap().len()
    }

    /// Runs a closure over a difficulty, if present.
    pub fn with_difficulty<R>(
        &self,
        hash: &MapHash,
        f: impl FnOnce(&BeatmapDifficulty) -> R,
    ) -> Option<R> {
        let handle = *self.index.read().unwrap().get(hash)?;
        let sets = self.sets.read().unwrap();
        let diff = sets.get(handle.set)?.difficulties.get(handle.diff)?;
        Some(f(diff))
    }

    /// Runs a closure over a difficulty mutably, if present.
    pub fn with_difficulty_mut<R>(
        &self,
        hash: &MapHash,
        f: impl FnOnce(&mut BeatmapDifficulty) -> R,
    ) -> Option<R> {
        let handle = *self.index.read().unwrap().get(hash)?;
        let mut sets = self.sets.write().unwrap();
        let diff = sets.get_mut(handle.set)?.difficulties.get_mut(handle.diff)?;
        Some(f(diff))
    }

    /// Runs a closure over every difficulty.
    pub fn for_each_difficulty(&self, mut f: impl FnMut(&BeatmapDifficulty)) {
        let sets = self.sets.read().unwrap();
        for set in sets.iter() {
            for diff in &set.difficulties {
                f(diff);
            }
        }
    }

    /// Refreshes the representative values of the sets owning the given
    /// difficulties.
    pub fn update_parent_sets(&self, set_indices: impl IntoIterator<Item = usize>) {
        let mut sets = self.sets.write().unwrap();
        for idx in set_indices {
            if let Some(set) = sets.get_mut(idx) {
                set.update_representative_values();
            }
        }
    }

    /// The set index owning a difficulty.
    pub fn parent_set_of(&self, hash: &MapHash) -> Option<usize> {
        self.index.read().unwrap().get(hash).map(|h| h.set)
    }

    /// Whether an SR array exists for this beatmap.
    pub fn has_star_ratings(&self, hash: &MapHash) -> bool {
        self.star_ratings.read().unwrap().contains_key(hash)
    }

    /// Stores (replacing) the 54-cell SR array of a beatmap and drops the
    /// difficulty's query cache.
    pub fn set_star_ratings(&self, hash: MapHash, ratings: SrArray) {
        // lock order: sets before star_ratings
        let sets = self.sets.read().unwrap();
        if let Some(handle) = self.index.read().unwrap().get(&hash) {
            if let Some(diff) = sets
                .get(handle.set)
                .and_then(|set| set.difficulties.get(handle.diff))
            {
                diff.sr_query_cache.store(u64::MAX, Ordering::Relaxed);
            }
        }

        let mut map = self.star_ratings.write().unwrap();
        let entry = map.entry(hash).or_insert_with(|| Box::new([0.0; NUM_PRECALC_RATINGS]));
        **entry = ratings;
    }

    /// Copies out the SR array of a beatmap.
    pub fn star_ratings(&self, hash: &MapHash) -> Option<SrArray> {
        self.star_ratings.read().unwrap().get(hash).map(|b| **b)
    }

    /// One SR cell of a difficulty, via its query cache; invalid mod
    /// combinations fall back to the nomod rating.
    pub fn star_rating(&self, hash: &MapHash, flags: crate::mods::ModFlags, speed: f32) -> f32 {
        // lock order: sets before star_ratings
        let handle = match self.index.read().unwrap().get(hash) {
            Some(&handle) => handle,
            None => return 0.0,
        };
        let sets = self.sets.read().unwrap();
        let diff = match sets
            .get(handle.set)
            .and_then(|set| set.difficulties.get(handle.diff))
        {
            Some(diff) => diff,
            None => return 0.0,
        };

        let idx = precalc::index_of(flags, speed);
        if idx == precalc::INVALID_MOD_COMBO {
            return diff.stars_nomod;
        }

        let star_ratings = self.star_ratings.read().unwrap();
        diff.star_rating(idx, &star_ratings)
    }

    /// Nomod 1.0x star rating of a difficulty.
    pub fn stars_nomod(&self, hash: &MapHash) -> f32 {
        self.star_rating(hash, crate::mods::ModFlags::empty(), 1.0)
    }

    /// Stores a persisted override row.
    pub fn set_overrides(&self, hash: MapHash, overrides: MapOverrides) {
        self.overrides.write().unwrap().insert(hash, overrides);
    }

    /// Reads a persisted override row.
    pub fn overrides(&self, hash: &MapHash) -> Option<MapOverrides> {
        self.overrides.read().unwrap().get(hash).copied()
    }

    /// Appends a score.
    pub fn insert_score(&self, score: FinishedScore) {
        self.scores
            .write()
            .unwrap()
            .entry(score.beatmap_hash)
            .or_default()
            .push(score);
        self.scores_changed.store(true, Ordering::Release);
    }

    /// Runs a closure over the whole score table.
    pub fn with_scores<R>(&self, f: impl FnOnce(&HashMap<MapHash, Vec<FinishedScore>>) -> R) -> R {
        f(&self.scores.read().unwrap())
    }

    /// Runs a closure over the whole score table mutably.
    pub fn with_scores_mut<R>(
        &self,
        f: impl FnOnce(&mut HashMap<MapHash, Vec<FinishedScore>>) -> R,
    ) -> R {
        f(&mut self.scores.write().unwrap())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diff(hash: u64, ar: f32, length: u32) -> BeatmapDifficulty {
        let mut d = BeatmapDifficulty::new(MapHash::from_u64(hash), "a.osu", "folder/");
        d.ar = ar;
        d.length_ms = length;
        d
    }

    #[test]
    fn representative_values_are_idempotent() {
        let mut set = BeatmapSet::new(vec![diff(1, 9.0, 90_000), diff(2, 8.0, 120_000)]);
        set.update_representative_values();
        let ar = set.ar;
        let length = set.length_ms;
        set.update_representative_values();
        assert_eq!(set.ar, ar);
        assert_eq!(set.length_ms, length);
        assert_eq!(set.ar, 9.0);
        assert_eq!(set.length_ms, 120_000);
    }

    #[test]
    fn add_set_indexes_difficulties() {
        let db = Database::new();
        let set_idx = db.add_set(BeatmapSet::new(vec![diff(7, 9.0, 1000)]));
        assert_eq!(set_idx, 0);
        assert_eq!(db.parent_set_of(&MapHash::from_u64(7)), Some(0));
        assert_eq!(
            db.with_difficulty(&MapHash::from_u64(7), |d| d.set_index),
            Some(Some(0))
        );
    }

    #[test]
    fn sr_query_prefers_array_over_nomod_fallback() {
        let db = Database::new();
        db.add_set(BeatmapSet::new(vec![diff(9, 9.0, 1000)]));
        let hash = MapHash::from_u64(9);

        db.with_difficulty_mut(&hash, |d| d.stars_nomod = 4.5);
        assert!((db.stars_nomod(&hash) - 4.5).abs() < 1e-6);

        let mut ratings = [0.0f32; NUM_PRECALC_RATINGS];
        ratings[NOMOD_1X_INDEX] = 5.25;
        db.set_star_ratings(hash, ratings);
        assert!((db.stars_nomod(&hash) - 5.25).abs() < 1e-6);
    }

    #[test]
    fn score_needs_recalc_rules() {
        let mut score = FinishedScore {
            ppv2_version: 10,
            ppv2_score: 100.0,
            score: 1000,
            ..FinishedScore::default()
        };
        assert!(!score.needs_recalc(10));
        assert!(score.needs_recalc(11));
        score.ppv2_score = 0.0;
        assert!(score.needs_recalc(10));
    }
}
