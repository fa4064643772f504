//! The batch recalculator.
//!
//! - Groups all work by beatmap hash so each .osu file is loaded exactly once
//! - Within each beatmap, groups scores by mod parameters (AR/CS/OD/speed/...)
//!   so difficulty attributes are calculated once per unique parameter set
//! - Pre-calculates star ratings for 54 common mod combinations per beatmap
//!   (9 speeds x 6 mod combos: None, HR, HD, EZ, HD|HR, HD|EZ)

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crate::beatmap::{parse_beatmap, PrimitiveContainer};
use crate::cancel::{StopSource, StopToken};
use crate::database::{Database, FinishedScore, MapHash};
use crate::diff::{
    calculate_star_diff, load_difficulty_objects, recompute_star_rating, DiffObject,
    DifficultyAttributes, DifficultyInput, RawDifficultyValues, StarCalcParams,
    PP_ALGORITHM_VERSION,
};
use crate::mods::ModParams;
use crate::options::Options;
use crate::pp::{calculate_pp, ScoreParams};
use crate::precalc::{self, SrArray, NUM_PRECALC_RATINGS};
use crate::timing::get_bpm;

/// Reads beatmap bytes for a path; overridable so embedders (and tests)
/// control file I/O.
pub type MapFileProvider = dyn Fn(&str) -> Option<Vec<u8>> + Send + Sync;

/// Metadata a worker needs about one beatmap, detached from the database.
#[derive(Clone, Debug)]
struct MapMeta {
    hash: MapHash,
    file_path: String,
    ar: f32,
    cs: f32,
    od: f32,
    hp: f32,
}

struct ScoreWork {
    score: FinishedScore,
    params: ModParams,
}

/// All work for a single beatmap: optional map recalc plus zero or more
/// scores.
struct WorkItem {
    map: MapMeta,
    needs_map_calc: bool,
    scores: Vec<ScoreWork>,
}

struct MapResult {
    hash: MapHash,
    length_ms: u32,
    nb_circles: u32,
    nb_sliders: u32,
    nb_spinners: u32,
    star_ratings: SrArray,
    min_bpm: i32,
    max_bpm: i32,
    avg_bpm: i32,
}

struct ScoreResult {
    score_id: u64,
    beatmap_hash: MapHash,
    pp: f64,
    total_stars: f64,
    aim_stars: f64,
    speed_stars: f64,
}

/// Per-worker mutable state, so the expensive allocations are reused
/// across work items.
struct WorkerContext {
    diffobj_cache: Vec<DiffObject>,
}

#[derive(Default)]
struct ResultBuffers {
    map_results: Vec<MapResult>,
    score_results: Vec<ScoreResult>,
}

struct Shared {
    scores_processed: AtomicU32,
    scores_total: AtomicU32,
    maps_processed: AtomicU32,
    maps_total: AtomicU32,
    workqueue_ready: AtomicBool,
    did_work: AtomicBool,
    errored_count: AtomicU32,
    next_work_index: AtomicU32,
    results: Mutex<ResultBuffers>,
}

impl Default for Shared {
    fn default() -> Self {
        Shared {
            scores_processed: AtomicU32::new(0),
            scores_total: AtomicU32::new(0),
            maps_processed: AtomicU32::new(0),
            maps_total: AtomicU32::new(0),
            workqueue_ready: AtomicBool::new(false),
            did_work: AtomicBool::new(false),
            errored_count: AtomicU32::new(0),
            next_work_index: AtomicU32::new(0),
            results: Mutex::new(ResultBuffers::default()),
        }
    }
}

/// Recalculates stale star ratings and pp across the whole database on a
/// background worker pool.
pub struct BatchRecalc {
    db: Arc<Database>,
    options: Options,
    file_provider: Arc<MapFileProvider>,
    shared: Arc<Shared>,
    stop: StopSource,
    coordinator: Option<JoinHandle<()>>,
}

impl BatchRecalc {
    /// A recalculator over a database, reading map files from disk.
    pub fn new(db: Arc<Database>, options: Options) -> BatchRecalc {
        Self::with_file_provider(db, options, Arc::new(|path: &str| std::fs::read(path).ok()))
    }

    /// A recalculator with custom file I/O.
    pub fn with_file_provider(
        db: Arc<Database>,
        options: Options,
        file_provider: Arc<MapFileProvider>,
    ) -> BatchRecalc {
        BatchRecalc {
            db,
            options,
            file_provider,
            shared: Arc::new(Shared::default()),
            stop: StopSource::new(),
            coordinator: None,
        }
    }

    /// Launches the coordinator, which builds the work queue off-main and
    /// dispatches workers. Non-blocking.
    pub fn start(&mut self) {
        self.abort();

        self.shared = Arc::new(Shared::default());
        self.stop = StopSource::new();

        let db = Arc::clone(&self.db);
        let shared = Arc::clone(&self.shared);
        let file_provider = Arc::clone(&self.file_provider);
        let options = self.options;
        let token = self.stop.token();

        self.coordinator = Some(std::thread::spawn(move || {
            coordinator(db, shared, file_provider, options, token);
        }));
    }

    /// Requests a stop and joins the workers; when this returns, no
    /// further result application happens.
    pub fn abort(&mut self) {
        let coordinator = match self.coordinator.take() {
            Some(coordinator) => coordinator,
            None => return,
        };

        self.stop.request_stop();
        let _ = coordinator.join();

        self.shared.scores_total.store(0, Ordering::Relaxed);
        self.shared.maps_total.store(0, Ordering::Relaxed);
        self.shared.maps_processed.store(0, Ordering::Relaxed);
        self.shared.scores_processed.store(0, Ordering::Relaxed);
        self.shared.workqueue_ready.store(false, Ordering::Release);

        let mut results = self.shared.results.lock().unwrap();
        results.map_results.clear();
        results.score_results.clear();
    }

    /// Whether the coordinator is running with a built queue.
    pub fn running(&self) -> bool {
        self.shared.workqueue_ready.load(Ordering::Acquire) && self.coordinator.is_some()
    }

    /// Total maps queued for recalculation.
    pub fn maps_total(&self) -> u32 {
        self.shared.maps_total.load(Ordering::Acquire)
    }

    /// Maps finished so far.
    pub fn maps_processed(&self) -> u32 {
        self.shared.maps_processed.load(Ordering::Acquire)
    }

    /// Total scores queued for recalculation.
    pub fn scores_total(&self) -> u32 {
        self.shared.scores_total.load(Ordering::Acquire)
    }

    /// Scores finished so far.
    pub fn scores_processed(&self) -> u32 {
        self.shared.scores_processed.load(Ordering::Acquire)
    }

    /// Whether every queued map and score has been processed.
    pub fn is_finished(&self) -> bool {
        let processed = self.maps_processed() + self.scores_processed();
        let total = self.maps_total() + self.scores_total();
        self.shared.workqueue_ready.load(Ordering::Acquire) && processed >= total
    }

    /// Whether a finished run actually recalculated something (one-shot).
    pub fn did_actual_work(&self) -> bool {
        self.shared.did_work.swap(false, Ordering::SeqCst)
    }

    /// Called once per frame on the main thread: drains pending results
    /// into the database (skipping the tick if the buffer is contended)
    /// and returns `false` once all work is finished.
    pub fn tick_main(&self) -> bool {
        if !self.running() {
            return true;
        }

        // sample completion before draining: when this reads finished,
        // every result is already in the buffer, so the drain below gets
        // the last of them and the final tick applies everything
        let finished = self.is_finished();

        let (pending_maps, pending_scores) = {
            let lock = match self.shared.results.try_lock() {
                Ok(lock) => lock,
                Err(_) => return true,
            };
            let mut lock = lock;
            (
                std::mem::take(&mut lock.map_results),
                std::mem::take(&mut lock.score_results),
            )
        };

        // apply map results
        if !pending_maps.is_empty() {
            let mut unique_parents: HashSet<usize> = HashSet::with_capacity(pending_maps.len());

            for res in &pending_maps {
                let overrides = self.db.with_difficulty_mut(&res.hash, |map| {
                    // only override existing values when the result is
                    // non-zero, otherwise keep what's there
                    if res.nb_circles > 0 {
                        map.num_circles = res.nb_circles as i32;
                    }
                    if res.nb_sliders > 0 {
                        map.num_sliders = res.nb_sliders as i32;
                    }
                    if res.nb_spinners > 0 {
                        map.num_spinners = res.nb_spinners as i32;
                    }
                    if res.length_ms > 0 {
                        map.length_ms = res.length_ms;
                    }
                    let calculated_sr = res.star_ratings[precalc::NOMOD_1X_INDEX];
                    if calculated_sr > 0.0 {
                        map.stars_nomod = calculated_sr;
                    }
                    if res.min_bpm != 0 {
                        map.min_bpm = res.min_bpm;
                    }
                    if res.max_bpm != 0 {
                        map.max_bpm = res.max_bpm;
                    }
                    if res.avg_bpm != 0 {
                        map.most_common_bpm = res.avg_bpm;
                    }
                    map.ppv2_version = PP_ALGORITHM_VERSION;

                    map.is_external.then(|| map.get_overrides())
                });

                if let Some(Some(overrides)) = overrides {
                    self.db.set_overrides(res.hash, overrides);
                }

                if let Some(set) = self.db.parent_set_of(&res.hash) {
                    unique_parents.insert(set);
                }
            }

            for res in &pending_maps {
                self.db.set_star_ratings(res.hash, res.star_ratings);
            }

            self.db.update_parent_sets(unique_parents);
        }

        // apply score results
        if !pending_scores.is_empty() {
            let mut any_updated = false;
            self.db.with_scores_mut(|scores| {
                for res in &pending_scores {
                    let scorevec = match scores.get_mut(&res.beatmap_hash) {
                        Some(scorevec) => scorevec,
                        None => continue,
                    };
                    if let Some(score) = scorevec.iter_mut().find(|s| s.id == res.score_id) {
                        score.ppv2_version = PP_ALGORITHM_VERSION;
                        score.ppv2_score = res.pp;
                        score.ppv2_total_stars = res.total_stars;
                        score.ppv2_aim_stars = res.aim_stars;
                        score.ppv2_speed_stars = res.speed_stars;
                        any_updated = true;
                    }
                }
            });
            if any_updated {
                self.db.scores_changed.store(true, Ordering::Release);
            }
        }

        !finished
    }
}

impl Drop for BatchRecalc {
    fn drop(&mut self) {
        self.abort();
    }
}

/// Maps needing a map-calc: stale algorithm version, no stored nomod SR,
/// or a missing 54-cell table.
fn collect_outdated_difficulties(
    db: &Database,
    token: &StopToken,
    out: &mut Vec<MapMeta>,
) {
    db.for_each_difficulty(|diff| {
        if token.stop_requested() {
            return;
        }
        // stars_nomod <= 0 may redundantly retry maps that failed before,
        // which is desirable when the failure was a since-fixed bug
        if diff.ppv2_version < PP_ALGORITHM_VERSION
            || diff.stars_nomod <= 0.0
            || !db.has_star_ratings(&diff.hash)
        {
            out.push(MapMeta {
                hash: diff.hash,
                file_path: diff.file_path.clone(),
                ar: diff.ar,
                cs: diff.cs,
                od: diff.od,
                hp: diff.hp,
            });
        }
    });
}

/// Builds the work queue on the coordinator thread; iterating 100k+
/// scores is O(n) and must not block the main thread.
fn build_work_queue(db: &Database, shared: &Shared, token: &StopToken) -> Vec<WorkItem> {
    let mut work_by_hash: HashMap<MapHash, WorkItem> = HashMap::new();

    let mut pending_diffs = Vec::new();
    collect_outdated_difficulties(db, token, &mut pending_diffs);
    if token.stop_requested() {
        return Vec::new();
    }

    shared
        .maps_total
        .store(pending_diffs.len() as u32, Ordering::Relaxed);

    for meta in pending_diffs {
        work_by_hash.insert(
            meta.hash,
            WorkItem {
                map: meta,
                needs_map_calc: true,
                scores: Vec::new(),
            },
        );
    }

    // find all scores needing a pp recalc, grouped by beatmap
    let mut score_count = 0u32;
    db.with_scores(|scores| {
        for (hash, scorevec) in scores {
            if token.stop_requested() {
                return;
            }

            for score in scorevec {
                if !score.needs_recalc(PP_ALGORITHM_VERSION) {
                    continue;
                }

                let meta = match work_by_hash.get(hash) {
                    Some(item) => Some(item.map.clone()),
                    None => db.with_difficulty(hash, |diff| MapMeta {
                        hash: diff.hash,
                        file_path: diff.file_path.clone(),
                        ar: diff.ar,
                        cs: diff.cs,
                        od: diff.od,
                        hp: diff.hp,
                    }),
                };
                let meta = match meta {
                    Some(meta) => meta,
                    None => continue,
                };

                let item = work_by_hash.entry(*hash).or_insert_with(|| WorkItem {
                    map: meta.clone(),
                    needs_map_calc: false,
                    scores: Vec::new(),
                });

                let params = ModParams::resolve(&score.mods, meta.ar, meta.cs, meta.od, meta.hp);
                item.scores.push(ScoreWork {
                    score: score.clone(),
                    params,
                });
                score_count += 1;
            }
        }
    });

    shared.scores_total.store(score_count, Ordering::Relaxed);

    let mut work_queue: Vec<WorkItem> = work_by_hash.into_values().collect();

    // maps carrying scores go first so scores recalculate early instead of
    // being spread across all maps
    work_queue.sort_by_key(|item| item.scores.is_empty());

    work_queue
}

fn coordinator(
    db: Arc<Database>,
    shared: Arc<Shared>,
    file_provider: Arc<MapFileProvider>,
    options: Options,
    token: StopToken,
) {
    shared.errored_count.store(0, Ordering::Relaxed);

    let work_queue = build_work_queue(&db, &shared, &token);
    shared.workqueue_ready.store(true, Ordering::Release);

    if token.stop_requested() {
        return;
    }

    let initial_size = work_queue.len() as u32;

    debug!(
        "DB recalculator: {} work items ({} maps, {} scores)",
        initial_size,
        shared.maps_total.load(Ordering::Relaxed),
        shared.scores_total.load(Ordering::Relaxed)
    );

    // thread count: don't bother parallelizing small queues, and leave
    // headroom for the main thread on big ones
    let nb_threads = if initial_size < 1000 {
        1
    } else {
        let nb_cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let max_threads = if nb_cpus <= 2 { nb_cpus } else { nb_cpus - 1 };
        let mut threads = options.batch_threads.clamp(0, max_threads);
        if threads == 0 {
            // the real core count is unknown with SMT, so halve it
            threads = ((nb_cpus - 1) / 2).max(1);
        }
        threads.min(initial_size as usize).max(1)
    };

    shared.next_work_index.store(0, Ordering::Relaxed);

    let work_queue: Arc<Vec<Mutex<WorkItem>>> =
        Arc::new(work_queue.into_iter().map(Mutex::new).collect());

    {
        let mut workers = Vec::with_capacity(nb_threads);
        for _ in 0..nb_threads {
            let shared = Arc::clone(&shared);
            let work_queue = Arc::clone(&work_queue);
            let file_provider = Arc::clone(&file_provider);
            let token = token.clone();
            workers.push(std::thread::spawn(move || {
                worker(shared, work_queue, file_provider, options, token);
            }));
        }
        for worker in workers {
            let _ = worker.join();
        }
    }

    let finished = {
        let processed = shared.maps_processed.load(Ordering::Relaxed)
            + shared.scores_processed.load(Ordering::Relaxed);
        let total = shared.maps_total.load(Ordering::Relaxed)
            + shared.scores_total.load(Ordering::Relaxed);
        processed >= total
    };

    if (!token.stop_requested() || finished)
        && shared.errored_count.load(Ordering::Relaxed) < initial_size
    {
        debug!(
            "DB recalculator: failed to recalculate {}/{}",
            shared.errored_count.load(Ordering::Relaxed),
            initial_size
        );
        shared.did_work.store(true, Ordering::Release);
    }

    // just in case
    shared
        .maps_processed
        .store(shared.maps_total.load(Ordering::Relaxed), Ordering::Release);
    shared.scores_processed.store(
        shared.scores_total.load(Ordering::Relaxed),
        Ordering::Release,
    );
}

fn worker(
    shared: Arc<Shared>,
    work_queue: Arc<Vec<Mutex<WorkItem>>>,
    file_provider: Arc<MapFileProvider>,
    options: Options,
    token: StopToken,
) {
    let mut ctx = WorkerContext {
        diffobj_cache: Vec::new(),
    };

    let queue_size = work_queue.len() as u32;
    while !token.stop_requested() {
        let idx = shared.next_work_index.fetch_add(1, Ordering::Relaxed);
        if idx >= queue_size {
            break;
        }

        let mut item = work_queue[idx as usize].lock().unwrap();
        process_work_item(&mut item, &shared, &*file_provider, &options, &token, &mut ctx);
    }
}

fn process_work_item(
    item: &mut WorkItem,
    shared: &Shared,
    file_provider: &MapFileProvider,
    options: &Options,
    token: &StopToken,
    ctx: &mut WorkerContext,
) {
    // load primitive objects once for this beatmap
    let data = file_provider(&item.map.file_path).unwrap_or_default();
    let mut primitives = match parse_beatmap(&data, &item.map.file_path, token) {
        Ok(primitives) => primitives,
        Err(err) => {
            if token.stop_requested() {
                return;
            }
            let failed_scores = item.scores.len() as u32;
            shared
                .errored_count
                .fetch_add(failed_scores, Ordering::Relaxed);
            debug!(
                "{}: loadPrimitiveObjects map hash {} map path {}",
                err, item.map.hash, item.map.file_path
            );
            if item.needs_map_calc {
                shared.errored_count.fetch_add(1, Ordering::Relaxed);
                let mut results = shared.results.lock().unwrap();
                results.map_results.push(MapResult {
                    hash: item.map.hash,
                    length_ms: 0,
                    nb_circles: 0,
                    nb_sliders: 0,
                    nb_spinners: 0,
                    star_ratings: [0.0; NUM_PRECALC_RATINGS],
                    min_bpm: 0,
                    max_bpm: 0,
                    avg_bpm: 0,
                });
                drop(results);
                shared.maps_processed.fetch_add(1, Ordering::Relaxed);
            }
            shared
                .scores_processed
                .fetch_add(failed_scores, Ordering::Relaxed);
            return;
        }
    };

    if item.needs_map_calc {
        process_map_calc(item, shared, options, token, ctx, &mut primitives);
    }

    if token.stop_requested() {
        return;
    }

    // scores grouped by mod parameters share one difficulty calculation;
    // later loadDifficultyHitObjects calls skip the slider timing pass
    if !item.scores.is_empty() {
        let mut score_groups: HashMap<ModParams, Vec<usize>> = HashMap::new();
        for (i, sw) in item.scores.iter().enumerate() {
            score_groups.entry(sw.params).or_default().push(i);
        }

        for (params, group) in score_groups {
            if token.stop_requested() {
                return;
            }
            process_score_group(item, &params, &group, &mut primitives, shared, options, token, ctx);
        }
    }

    // free memory from processed scores
    item.scores.clear();
    item.scores.shrink_to_fit();
}

fn process_map_calc(
    item: &WorkItem,
    shared: &Shared,
    options: &Options,
    token: &StopToken,
    ctx: &mut WorkerContext,
    primitives: &mut PrimitiveContainer,
) {
    let mut result = MapResult {
        hash: item.map.hash,
        length_ms: 0,
        nb_circles: primitives.hitcircles.len() as u32,
        nb_sliders: primitives.sliders.len() as u32,
        nb_spinners: primitives.spinners.len() as u32,
        star_ratings: [0.0; NUM_PRECALC_RATINGS],
        min_bpm: 0,
        max_bpm: 0,
        avg_bpm: 0,
    };

    // AR/CS/OD/HP variant: (multiplier for AR/OD/HP, multiplier for CS,
    // mod combo indices for [hidden=false, hidden=true])
    const VARIANTS: [(f32, f32, [usize; 2]); 3] = [
        (1.0, 1.0, [0, 2]), // BASE: None, HD
        (1.4, 1.3, [1, 4]), // HR: HR, HD|HR
        (0.5, 0.5, [3, 5]), // EZ: EZ, HD|EZ
    ];

    for (variant_idx, &(ar_od_hp_mul, cs_mul, combo_idx)) in VARIANTS.iter().enumerate() {
        if token.stop_requested() {
            return;
        }

        let ar = (item.map.ar * ar_od_hp_mul).clamp(0.0, 10.0);
        let cs = (item.map.cs * cs_mul).clamp(0.0, 10.0);
        let od = (item.map.od * ar_od_hp_mul).clamp(0.0, 10.0);
        let hp = (item.map.hp * ar_od_hp_mul).clamp(0.0, 10.0);

        // build the difficulty objects once at 1.0x for this AR/CS
        // variant; construction, sorting and stacking are all
        // speed-independent and only the timing fields get rescaled below
        let mut diffres =
            match load_difficulty_objects(primitives, ar, cs, 1.0, false, token, options) {
                Ok(diffres) => diffres,
                Err(err) => {
                    if token.stop_requested() {
                        return;
                    }
                    debug!(
                        "{}: loadDifficultyHitObjects map hash {} map path {}",
                        err, item.map.hash, item.map.file_path
                    );
                    continue;
                }
            };

        if variant_idx == 0 {
            result.length_ms = diffres.playable_length;
        }

        for (speed_idx, &speed) in precalc::SPEEDS.iter().enumerate() {
            if token.stop_requested() {
                return;
            }

            diffres.rescale_to_speed(speed);

            // HD=0: full calculation, keeping the raw difficulty values
            let params = ModParams {
                ar,
                cs,
                od,
                hp,
                speed,
                ..ModParams::default()
            };
            let mut input = DifficultyInput::from_params(
                &params,
                diffres.total_break_duration,
                diffres.playable_length,
            );

            let mut attributes = DifficultyAttributes::default();
            let mut raw = RawDifficultyValues::default();

            let flat_idx = speed_idx * precalc::NUM_MOD_COMBOS + combo_idx[0];
            result.star_ratings[flat_idx] = calculate_star_diff(StarCalcParams {
                cached_diff_objects: &mut ctx.diffobj_cache,
                attributes: &mut attributes,
                hit_objects: &mut diffres.objects,
                input,
                out_aim_strains: None,
                out_speed_strains: None,
                incremental: None,
                up_to_object_index: -1,
                cancel: token.clone(),
                out_raw_difficulty: Some(&mut raw),
                force_fill_diffobj_cache: false,
                options: *options,
            }) as f32;

            if token.stop_requested() {
                return;
            }

            // HD=1: the strains are hidden-invariant, so only the rating
            // transform reruns on the cached raw values
            let hd_flat_idx = speed_idx * precalc::NUM_MOD_COMBOS + combo_idx[1];
            input.hidden = true;
            result.star_ratings[hd_flat_idx] =
                recompute_star_rating(&raw, diffres.objects.len() as u32, &input) as f32;

            ctx.diffobj_cache.clear();
        }
    }

    if result.star_ratings[precalc::NOMOD_1X_INDEX] <= 0.0 {
        shared.errored_count.fetch_add(1, Ordering::Relaxed);
    }

    if token.stop_requested() {
        return;
    }

    if !primitives.timingpoints.is_empty() {
        let bpm = get_bpm(&primitives.timingpoints);
        result.min_bpm = bpm.min;
        result.max_bpm = bpm.max;
        result.avg_bpm = bpm.most_common;
    }

    {
        let mut results = shared.results.lock().unwrap();
        results.map_results.push(result);
    }
    shared.maps_processed.fetch_add(1, Ordering::Relaxed);
}

#[allow(clippy::too_many_arguments)]
fn process_score_group(
    item: &WorkItem,
    params: &ModParams,
    group: &[usize],
    primitives: &mut PrimitiveContainer,
    shared: &Shared,
    options: &Options,
    token: &StopToken,
    ctx: &mut WorkerContext,
) {
    if group.is_empty() {
        return;
    }

    let mut diffres = match load_difficulty_objects(
        primitives,
        params.ar,
        params.cs,
        params.speed,
        false,
        token,
        options,
    ) {
        Ok(diffres) => diffres,
        Err(err) => {
            if token.stop_requested() {
                return;
            }
            let failed = group.len() as u32;
            shared.errored_count.fetch_add(failed, Ordering::Relaxed);
            debug!(
                "{}: loadDifficultyHitObjects map hash {} map path {}",
                err, item.map.hash, item.map.file_path
            );
            shared.scores_processed.fetch_add(failed, Ordering::Relaxed);
            return;
        }
    };

    let input = DifficultyInput::from_params(
        params,
        diffres.total_break_duration,
        diffres.playable_length,
    );

    let mut attributes = DifficultyAttributes::default();

    let total_stars = calculate_star_diff(StarCalcParams {
        cached_diff_objects: &mut ctx.diffobj_cache,
        attributes: &mut attributes,
        hit_objects: &mut diffres.objects,
        input,
        out_aim_strains: None,
        out_speed_strains: None,
        incremental: None,
        up_to_object_index: -1,
        cancel: token.clone(),
        out_raw_difficulty: None,
        force_fill_diffobj_cache: false,
        options: *options,
    });
    ctx.diffobj_cache.clear();

    if token.stop_requested() {
        return;
    }

    // pp for each score in the group from the shared attributes
    let mut group_results = Vec::with_capacity(group.len());

    for &score_idx in group {
        let score = &item.scores[score_idx].score;

        let pp = calculate_pp(ScoreParams {
            attributes: attributes.clone(),
            mod_flags: score.mods.flags,
            timescale: score.mods.speed as f64,
            ar: params.ar as f64,
            od: params.od as f64,
            num_hit_objects: primitives.num_objects() as i32,
            num_circles: primitives.hitcircles.len() as i32,
            num_sliders: primitives.sliders.len() as i32,
            num_spinners: primitives.spinners.len() as i32,
            max_possible_combo: diffres.total_max_combo() as i32,
            combo: score.combo_max,
            misses: score.num_misses,
            c300: score.num_300s,
            c100: score.num_100s,
            c50: score.num_50s,
            legacy_total_score: score.score as u32,
            is_legacy_import: score.is_legacy_import,
        });

        if pp <= 0.0 {
            shared.errored_count.fetch_add(1, Ordering::Relaxed);
        }

        group_results.push(ScoreResult {
            score_id: score.id,
            beatmap_hash: score.beatmap_hash,
            pp,
            total_stars,
            aim_stars: attributes.aim_difficulty,
            speed_stars: attributes.speed_difficulty,
        });
    }

    {
        let mut results = shared.results.lock().unwrap();
        results.score_results.append(&mut group_results);
    }
    shared
        .scores_processed
        .fetch_add(group.len() as u32, Ordering::Relaxed);
}
