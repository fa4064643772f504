//! The async pp cache used while browsing songs: a mod-parameter to
//! result memo filled by one low-priority worker thread.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

use crate::batch::MapFileProvider;
use crate::beatmap::parse_beatmap;
use crate::cancel::{StopSource, StopToken};
use crate::diff::{
    calculate_star_diff, load_difficulty_objects, DifficultyAttributes, DifficultyInput,
    LoadedDifficultyObjects, StarCalcParams,
};
use crate::mods::{ModFlags, ModParams, Mods};
use crate::options::Options;
use crate::pp::{calculate_pp, ScoreParams};

/// The difficulty/pp bundle the UI consumes.
#[derive(Clone, Debug, Default)]
pub struct PpResult {
    /// Total star rating.
    pub total_stars: f64,
    /// Aim stars.
    pub aim_stars: f64,
    /// Slider factor of the aim rating.
    pub aim_slider_factor: f64,
    /// Difficult aim slider count.
    pub difficult_aim_sliders: f64,
    /// Difficult aim strain count.
    pub difficult_aim_strains: f64,
    /// Speed stars.
    pub speed_stars: f64,
    /// Speed note count.
    pub speed_notes: f64,
    /// Difficult speed strain count.
    pub difficult_speed_strains: f64,
    /// Performance points.
    pub pp: f64,

    /// Aim peak strains (for graphs).
    pub aim_strains: Vec<f64>,
    /// Speed peak strains (for graphs).
    pub speed_strains: Vec<f64>,
}

impl PpResult {
    /// The sentinel returned while a query is still being computed.
    pub fn not_ready() -> PpResult {
        PpResult {
            total_stars: -1.0,
            aim_stars: -1.0,
            aim_slider_factor: -1.0,
            difficult_aim_sliders: 0.0,
            difficult_aim_strains: 0.0,
            speed_stars: -1.0,
            speed_notes: -1.0,
            difficult_speed_strains: 0.0,
            pp: -1.0,
            aim_strains: Vec::new(),
            speed_strains: Vec::new(),
        }
    }

    /// Whether this is the not-yet-computed sentinel.
    pub fn is_ready(&self) -> bool {
        self.pp >= 0.0
    }

    fn from_attributes(attributes: &DifficultyAttributes) -> PpResult {
        PpResult {
            aim_stars: attributes.aim_difficulty,
            aim_slider_factor: attributes.slider_factor,
            difficult_aim_sliders: attributes.aim_difficult_slider_count,
            difficult_aim_strains: attributes.aim_difficult_strain_count,
            speed_stars: attributes.speed_difficulty,
            speed_notes: attributes.speed_note_count,
            difficult_speed_strains: attributes.speed_difficult_strain_count,
            ..PpResult::default()
        }
    }
}

/// One pp query: the difficulty tuple plus the score-side inputs.
#[derive(Clone, Debug, PartialEq)]
pub struct PpCalcRequest {
    /// Mod bitfield.
    pub mod_flags: ModFlags,
    /// Speed multiplier.
    pub speed_override: f32,
    /// Resolved AR.
    pub ar: f32,
    /// Resolved CS.
    pub cs: f32,
    /// Resolved OD.
    pub od: f32,
    /// Resolved HP.
    pub hp: f32,

    /// Combo reached (negative = full combo).
    pub combo_max: i32,
    /// Miss count.
    pub num_misses: i32,
    /// 300 count (negative = everything else).
    pub num_300s: i32,
    /// 100 count.
    pub num_100s: i32,
    /// 50 count.
    pub num_50s: i32,

    /// Classic total score for miss estimation.
    pub legacy_total_score: u32,
    /// Legacy-import marker.
    pub is_legacy_import: bool,
}

impl PpCalcRequest {
    /// A full-combo SS request for a mod selection.
    pub fn perfect(mods: &Mods, ar: f32, cs: f32, od: f32, hp: f32) -> PpCalcRequest {
        PpCalcRequest {
            mod_flags: mods.flags,
            speed_override: mods.speed,
            ar,
            cs,
            od,
            hp,
            combo_max: -1,
            num_misses: 0,
            num_300s: -1,
            num_100s: 0,
            num_50s: 0,
            legacy_total_score: 0,
            is_legacy_import: false,
        }
    }
}

/// The map the cache currently serves.
#[derive(Clone, Debug, PartialEq)]
pub struct ActiveMap {
    /// Path to the .osu file.
    pub file_path: String,
    /// Number of circles.
    pub num_circles: i32,
    /// Number of sliders.
    pub num_sliders: i32,
    /// Number of spinners.
    pub num_spinners: i32,
}

struct CacheShared {
    work: Mutex<Vec<PpCalcRequest>>,
    work_cond: Condvar,
    cache: Mutex<Vec<(PpCalcRequest, PpResult)>>,
    active_map: Mutex<Option<ActiveMap>>,
    // bumped on every map change; stale worker results are discarded
    generation: AtomicU64,
}

// hitobject cache entry: the expensive geometry build keyed on the
// parameters that invalidate it
struct HitObjectCacheEntry {
    speed: f32,
    ar: f32,
    cs: f32,
    diffres: Option<LoadedDifficultyObjects>,
}

impl HitObjectCacheEntry {
    fn matches(&self, speed: f32, ar: f32, cs: f32) -> bool {
        self.speed == speed && self.ar == ar && self.cs == cs
    }
}

// info cache entry: difficulty attributes keyed on the full tuple
struct InfoCacheEntry {
    params: ModParams,
    info: PpResult,
    attributes: DifficultyAttributes,
}

/// Asynchronous pp/SR cache for the currently active beatmap.
///
/// Queries return the cached result when present, otherwise a `-1`
/// sentinel while the worker computes it. Changing the active map clears
/// every cache; clearing the map stops the worker.
pub struct AsyncPpCache {
    shared: Arc<CacheShared>,
    options: Options,
    file_provider: Arc<MapFileProvider>,
    worker: Option<JoinHandle<()>>,
    stop: StopSource,
}

impl AsyncPpCache {
    /// A cache reading map files from disk.
    pub fn new(options: Options) -> AsyncPpCache {
        Self::with_file_provider(options, Arc::new(|path: &str| std::fs::read(path).ok()))
    }

    /// A cache with custom file I/O.
    pub fn with_file_provider(options: Options, file_provider: Arc<MapFileProvider>) -> AsyncPpCache {
        AsyncPpCache {
            shared: Arc::new(CacheShared {
                work: Mutex::new(Vec::new()),
                work_cond: Condvar::new(),
                cache: Mutex::new(Vec::new()),
                active_map: Mutex::new(None),
                generation: AtomicU64::new(0),
            }),
            options,
            file_provider,
            worker: None,
            stop: StopSource::new(),
        }
    }

    /// Switches the active beatmap: clears the caches, and starts or
    /// stops the worker as the map appears or goes away.
    pub fn set_map(&mut self, new_map: Option<ActiveMap>) {
        let had_map = {
            let mut active = self.shared.active_map.lock().unwrap();
            if *active == new_map {
                return;
            }
            let had_map = active.is_some();
            *active = new_map.clone();
            had_map
        };

        self.shared.generation.fetch_add(1, Ordering::AcqRel);

        if had_map {
            self.clear_caches();
        }

        if !had_map && new_map.is_some() {
            let shared = Arc::clone(&self.shared);
            let options = self.options;
            let file_provider = Arc::clone(&self.file_provider);
            self.stop = StopSource::new();
            let token = self.stop.token();
            self.worker = Some(std::thread::spawn(move || {
                run_worker(shared, options, file_provider, token);
            }));
        } else if had_map && new_map.is_none() {
            self.stop.request_stop();
            self.shared.work_cond.notify_all();
            if let Some(worker) = self.worker.take() {
                let _ = worker.join();
            }
        }
    }

    fn clear_caches(&self) {
        let mut work = self.shared.work.lock().unwrap();
        let mut cache = self.shared.cache.lock().unwrap();
        work.clear();
        cache.clear();
    }

    /// Returns the cached result for a request, or enqueues it and
    /// returns the sentinel.
    pub fn query(&self, request: &PpCalcRequest) -> PpResult {
        {
            let cache = self.shared.cache.lock().unwrap();
            if let Some((_, info)) = cache.iter().find(|(r, _)| r == request) {
                return info.clone();
            }
        }

        {
            let mut work = self.shared.work.lock().unwrap();
            if !work.iter().any(|w| w == request) {
                work.push(request.clone());
                self.shared.work_cond.notify_one();
            }
        }

        PpResult::not_ready()
    }
}

impl Drop for AsyncPpCache {
    fn drop(&mut self) {
        self.stop.request_stop();
        self.shared.work_cond.notify_all();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn run_worker(
    shared: Arc<CacheShared>,
    options: Options,
    file_provider: Arc<MapFileProvider>,
    token: StopToken,
) {
    // both inner caches are worker-local; a generation bump on map change
    // invalidates them wholesale
    let mut local_generation = shared.generation.load(Ordering::Acquire);
    let mut ho_cache: Vec<HitObjectCacheEntry> = Vec::new();
    let mut inf_cache: Vec<InfoCacheEntry> = Vec::new();

    loop {
        let request = {
            let mut work = shared.work.lock().unwrap();
            loop {
                if token.stop_requested() {
                    return;
                }
                if !work.is_empty() {
                    break work.remove(0);
                }
                work = shared.work_cond.wait(work).unwrap();
            }
        };

        // work items are specific to the current map
        let (map, generation) = {
            let map = shared.active_map.lock().unwrap().clone();
            (map, shared.generation.load(Ordering::Acquire))
        };
        let map = match map {
            Some(map) => map,
            None => continue,
        };

        if generation != local_generation {
            ho_cache.clear();
            inf_cache.clear();
            local_generation = generation;
        }

        // skip if a concurrent query already cached it
        {
            let cache = shared.cache.lock().unwrap();
            if cache.iter().any(|(r, _)| r == &request) {
                continue;
            }
        }

        if token.stop_requested() {
            return;
        }

        // find or compute hitobjects
        let ho_idx = match ho_cache
            .iter()
            .position(|e| e.matches(request.speed_override, request.ar, request.cs))
        {
            Some(idx) => idx,
            None => {
                let data = file_provider(&map.file_path).unwrap_or_default();
                let diffres = parse_beatmap(&data, &map.file_path, &token)
                    .ok()
                    .and_then(|mut primitives| {
                        load_difficulty_objects(
                            &mut primitives,
                            request.ar,
                            request.cs,
                            request.speed_override,
                            false,
                            &token,
                            &options,
                        )
                        .ok()
                    });

                if token.stop_requested() {
                    return;
                }

                // failures are cached too, so they aren't retried
                ho_cache.push(HitObjectCacheEntry {
                    speed: request.speed_override,
                    ar: request.ar,
                    cs: request.cs,
                    diffres,
                });
                ho_cache.len() - 1
            }
        };

        let diffres = match ho_cache[ho_idx].diffres.as_mut() {
            Some(diffres) => diffres,
            None => continue,
        };

        let params = ModParams {
            ar: request.ar,
            cs: request.cs,
            od: request.od,
            hp: request.hp,
            speed: request.speed_override,
            hidden: request.mod_flags.contains(ModFlags::Hidden),
            relax: request.mod_flags.contains(ModFlags::Relax),
            autopilot: request.mod_flags.contains(ModFlags::Autopilot),
            touch_device: request.mod_flags.contains(ModFlags::TouchDevice),
        };

        // find or compute difficulty info
        let inf_idx = match inf_cache.iter().position(|e| e.params == params) {
            Some(idx) => idx,
            None => {
                if token.stop_requested() {
                    return;
                }

                let input = DifficultyInput::from_params(
                    &params,
                    diffres.total_break_duration,
                    diffres.playable_length,
                );

                let mut attributes = DifficultyAttributes::default();
                let mut diffobj_cache = Vec::new();
                let mut aim_strains = Vec::new();
                let mut speed_strains = Vec::new();

                let total_stars = calculate_star_diff(StarCalcParams {
                    cached_diff_objects: &mut diffobj_cache,
                    attributes: &mut attributes,
                    hit_objects: &mut diffres.objects,
                    input,
                    out_aim_strains: Some(&mut aim_strains),
                    out_speed_strains: Some(&mut speed_strains),
                    incremental: None,
                    up_to_object_index: -1,
                    cancel: token.clone(),
                    out_raw_difficulty: None,
                    force_fill_diffobj_cache: false,
                    options,
                });

                if token.stop_requested() {
                    return;
                }

                let mut info = PpResult::from_attributes(&attributes);
                info.total_stars = total_stars;
                info.aim_strains = aim_strains;
                info.speed_strains = speed_strains;

                inf_cache.push(InfoCacheEntry {
                    params,
                    info,
                    attributes,
                });
                inf_cache.len() - 1
            }
        };

        if token.stop_requested() {
            return;
        }

        let entry = &mut inf_cache[inf_idx];
        let pp = calculate_pp(ScoreParams {
            attributes: entry.attributes.clone(),
            mod_flags: request.mod_flags,
            timescale: request.speed_override as f64,
            ar: request.ar as f64,
            od: request.od as f64,
            num_hit_objects: map.num_circles + map.num_sliders + map.num_spinners,
            num_circles: map.num_circles,
            num_sliders: map.num_sliders,
            num_spinners: map.num_spinners,
            max_possible_combo: diffres.total_max_combo() as i32,
            combo: request.combo_max,
            misses: request.num_misses,
            c300: request.num_300s,
            c100: request.num_100s,
            c50: request.num_50s,
            legacy_total_score: request.legacy_total_score,
            is_legacy_import: request.is_legacy_import,
        });
        entry.info.pp = pp;

        // publish, unless the map changed under us
        if shared.generation.load(Ordering::Acquire) == local_generation {
            let mut cache = shared.cache.lock().unwrap();
            cache.push((request, entry.info.clone()));
        }
    }
}
