//! The live (in-play) star/pp calculator.
//!
//! A lazy promise over a single closure that captures the current beatmap
//! path, the live score snapshot and the most recent hit-object index.
//! Results are tagged with the index that produced them; the caller
//! compares against its current index and treats mismatches as stale.
//! Enqueueing replaces any still-pending closure, so there is never more
//! than one in flight and one queued.

use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

use crate::batch::MapFileProvider;
use crate::beatmap::parse_beatmap;
use crate::cancel::StopToken;
use crate::diff::{
    calculate_star_diff, load_difficulty_objects, DiffObject, DifficultyAttributes,
    DifficultyInput, LoadedDifficultyObjects, StarCalcParams,
};
use crate::mods::{ModFlags, Mods};
use crate::options::Options;
use crate::pp::{calculate_pp, ScoreParams};
use crate::ppcache::PpResult;

/// A single-worker, latest-wins promise: enqueueing a new closure drops
/// any not-yet-started one, and `try_get` hands out the newest finished
/// result.
pub struct LazyPromise<T: Send + 'static> {
    inner: Arc<PromiseInner<T>>,
    worker: Option<JoinHandle<()>>,
}

struct PromiseState<T> {
    #[allow(clippy::type_complexity)]
    pending: Option<Box<dyn FnOnce() -> T + Send>>,
    result: Option<T>,
    shutdown: bool,
}

struct PromiseInner<T> {
    state: Mutex<PromiseState<T>>,
    cond: Condvar,
}

impl<T: Send + 'static> LazyPromise<T> {
    /// Creates the promise and its worker thread.
    pub fn new() -> LazyPromise<T> {
        let inner = Arc::new(PromiseInner {
            state: Mutex::new(PromiseState {
                pending: None,
                result: None,
                shutdown: false,
            }),
            cond: Condvar::new(),
        });

        let worker_inner = Arc::clone(&inner);
        let worker = std::thread::spawn(move || loop {
            let job = {
                let mut state = worker_inner.state.lock().unwrap();
                loop {
                    if state.shutdown {
                        return;
                    }
                    if let Some(job) = state.pending.take() {
                        break job;
                    }
                    state = worker_inner.cond.wait(state).unwrap();
                }
            };

            let value = job();

            let mut state = worker_inner.state.lock().unwrap();
            state.result = Some(value);
        });

        LazyPromise {
            inner,
            worker: Some(worker),
        }
    }

    /// Queues a closure, replacing any queued-but-not-started one.
    pub fn enqueue(&self, job: impl FnOnce() -> T + Send + 'static) {
        let mut state = self.inner.state.lock().unwrap();
        state.pending = Some(Box::new(job));
        self.inner.cond.notify_one();
    }

    /// Takes the most recent finished result, if a new one is available.
    pub fn try_get(&self) -> Option<T> {
        self.inner.state.lock().unwrap().result.take()
    }
}

impl<T: Send + 'static> Default for LazyPromise<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + 'static> Drop for LazyPromise<T> {
    fn drop(&mut self) {
        {
            let mut state = self.inner.state.lock().unwrap();
            state.shutdown = true;
            state.pending = None;
        }
        self.inner.cond.notify_all();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

/// A snapshot of the live play state, taken once per frame.
#[derive(Clone, Debug, Default)]
pub struct LiveScoreState {
    /// Path of the playing beatmap; empty disables calculation.
    pub osu_file_path: String,

    /// Current classic total score.
    pub legacy_total_score: u64,

    /// Resolved circle size.
    pub cs: f32,
    /// Resolved approach rate.
    pub ar: f32,
    /// Resolved HP drain.
    pub hp: f32,
    /// Resolved overall difficulty.
    pub od: f32,
    /// Speed multiplier.
    pub speed_multiplier: f32,

    /// Index of the most recently finished hit object, -1 before the
    /// first one.
    pub current_hit_object: i32,
    /// Circles seen so far.
    pub num_circles: i32,
    /// Sliders seen so far.
    pub num_sliders: i32,
    /// Spinners seen so far.
    pub num_spinners: i32,

    /// Highest combo reached.
    pub highest_combo: i32,
    /// Miss count.
    pub num_misses: i32,
    /// 300 count.
    pub num_300s: i32,
    /// 100 count.
    pub num_100s: i32,
    /// 50 count.
    pub num_50s: i32,

    /// Active mods.
    pub mods: Mods,
}

struct LazyPpRes {
    res: PpResult,
    calc_index: i32,
}

impl Default for LazyPpRes {
    fn default() -> Self {
        LazyPpRes {
            res: PpResult::not_ready(),
            calc_index: -1,
        }
    }
}

// rebuilt only when the beatmap path or a difficulty-affecting parameter
// changes; score-only updates reuse the geometry
#[derive(Default)]
struct ParamCache {
    path: String,
    ar: f32,
    cs: f32,
    speed_multiplier: f32,
    diffres: Option<LoadedDifficultyObjects>,
    diffobj_cache: Vec<DiffObject>,
}

/// Per-play lazy star/pp calculator.
///
/// Designed so most of the heavy lifting happens off-thread inside the
/// promise invocation; [`LiveCalc::update`] is cheap enough to call per
/// frame.
pub struct LiveCalc {
    promise: LazyPromise<LazyPpRes>,
    param_cache: Arc<Mutex<ParamCache>>,

    live_stars: f32,
    live_pp: f32,

    last_calculated: i32,
    last_queued: i32,

    calculated_valid: bool,
    queued_valid: bool,

    options: Options,
    file_provider: Arc<MapFileProvider>,
}

impl LiveCalc {
    /// A live calculator reading map files from disk.
    pub fn new(options: Options) -> LiveCalc {
        Self::with_file_provider(options, Arc::new(|path: &str| std::fs::read(path).ok()))
    }

    /// A live calculator with custom file I/O.
    pub fn with_file_provider(options: Options, file_provider: Arc<MapFileProvider>) -> LiveCalc {
        LiveCalc {
            promise: LazyPromise::new(),
            param_cache: Arc::new(Mutex::new(ParamCache::default())),
            live_stars: 0.0,
            live_pp: 0.0,
            last_calculated: -1,
            last_queued: -1,
            calculated_valid: false,
            queued_valid: false,
            options,
            file_provider,
        }
    }

    /// Stars as of the last finished calculation.
    pub fn stars(&self) -> f32 {
        self.live_stars
    }

    /// pp as of the last finished calculation.
    pub fn pp(&self) -> f32 {
        self.live_pp
    }

    /// Whether the published value matches the given hit-object index.
    pub fn is_current_for(&self, index: i32) -> bool {
        self.calculated_valid && self.last_calculated == index
    }

    fn needs_update(&self, cur_index: i32) -> bool {
        !self.calculated_valid || (cur_index != self.last_calculated && cur_index >= 0)
    }

    fn needs_queue(&mut self, cur_index: i32) -> bool {
        let was_invalid = !self.queued_valid;
        if was_invalid {
            // only force the queue once
            self.queued_valid = true;
        }
        was_invalid || (cur_index != self.last_queued && cur_index >= 0)
    }

    fn update_calc_res(&mut self, cur_index: i32, result: &LazyPpRes) {
        self.calculated_valid = result.calc_index == cur_index;
        self.last_calculated = result.calc_index;

        self.live_pp = result.res.pp as f32;
        self.live_stars = result.res.total_stars as f32;
    }

    /// Drops all published values, e.g. on retry or map change.
    pub fn invalidate(&mut self) {
        self.last_calculated = -1;
        self.last_queued = -1;
        self.calculated_valid = false;
        self.queued_valid = false;

        self.live_pp = 0.0;
        self.live_stars = 0.0;
    }

    /// Publishes any finished result and queues a recalculation when the
    /// hit-object index moved.
    pub fn update(&mut self, snapshot: &LiveScoreState) {
        let cur_index = snapshot.current_hit_object;

        if !self.needs_update(cur_index) {
            return;
        }

        // pick up the most recent result first
        if let Some(result) = self.promise.try_get() {
            self.update_calc_res(cur_index, &result);
        }

        if !self.needs_queue(cur_index) {
            return;
        }

        self.last_queued = cur_index;

        let p = snapshot.clone();
        let cache = Arc::clone(&self.param_cache);
        let options = self.options;
        let file_provider = Arc::clone(&self.file_provider);

        self.promise.enqueue(move || {
            let mut result = LazyPpRes::default();

            if p.osu_file_path.is_empty() {
                return result;
            }

            let mut cache = cache.lock().unwrap();

            // rebuild the geometry as necessary
            if cache.path != p.osu_file_path
                || cache.ar != p.ar
                || cache.cs != p.cs
                || cache.speed_multiplier != p.speed_multiplier
            {
                cache.path = p.osu_file_path.clone();
                cache.ar = p.ar;
                cache.cs = p.cs;
                cache.speed_multiplier = p.speed_multiplier;
                cache.diffobj_cache.clear();

                let data = file_provider(&p.osu_file_path).unwrap_or_default();
                cache.diffres = parse_beatmap(&data, &p.osu_file_path, &StopToken::none())
                    .ok()
                    .and_then(|mut primitives| {
                        load_difficulty_objects(
                            &mut primitives,
                            p.ar,
                            p.cs,
                            p.speed_multiplier,
                            false,
                            &StopToken::none(),
                            &options,
                        )
                        .ok()
                    });
            }

            let ParamCache {
                diffres,
                diffobj_cache,
                ..
            } = &mut *cache;
            let diffres = match diffres.as_mut() {
                Some(diffres) => diffres,
                None => return result,
            };

            let hidden = p.mods.has(ModFlags::Hidden);
            let relax = p.mods.has(ModFlags::Relax);
            let autopilot = p.mods.has(ModFlags::Autopilot);
            let touch_device = p.mods.has(ModFlags::TouchDevice);
            let autoplay = p.mods.has(ModFlags::Autoplay);

            let input = DifficultyInput {
                cs: p.cs,
                hp: p.hp,
                ar: p.ar,
                od: p.od,
                hidden,
                relax,
                autopilot,
                touch_device,
                speed_multiplier: p.speed_multiplier,
                break_duration: diffres.total_break_duration,
                playable_length: diffres.playable_length,
            };

            let mut attributes = DifficultyAttributes::default();
            let mut aim_strains = Vec::new();
            let mut speed_strains = Vec::new();

            result.res.total_stars = calculate_star_diff(StarCalcParams {
                cached_diff_objects: diffobj_cache,
                attributes: &mut attributes,
                hit_objects: &mut diffres.objects,
                input,
                out_aim_strains: Some(&mut aim_strains),
                out_speed_strains: Some(&mut speed_strains),
                incremental: None,
                up_to_object_index: p.current_hit_object,
                cancel: StopToken::none(),
                out_raw_difficulty: None,
                force_fill_diffobj_cache: true,
                options,
            });

            result.res.aim_stars = attributes.aim_difficulty;
            result.res.aim_slider_factor = attributes.slider_factor;
            result.res.difficult_aim_sliders = attributes.aim_difficult_slider_count;
            result.res.difficult_aim_strains = attributes.aim_difficult_strain_count;
            result.res.speed_stars = attributes.speed_difficulty;
            result.res.speed_notes = attributes.speed_note_count;
            result.res.difficult_speed_strains = attributes.speed_difficult_strain_count;
            result.res.aim_strains = aim_strains;
            result.res.speed_strains = speed_strains;

            let mut score_params = ScoreParams {
                attributes,
                mod_flags: p.mods.flags,
                timescale: p.mods.speed as f64,
                ar: p.ar as f64,
                od: p.od as f64,
                num_hit_objects: p.current_hit_object,
                num_circles: p.num_circles,
                num_sliders: p.num_sliders,
                num_spinners: p.num_spinners,
                max_possible_combo: diffres.max_combo_at(p.current_hit_object.max(0) as usize)
                    as i32,
                combo: p.highest_combo,
                misses: p.num_misses,
                c300: p.num_300s,
                c100: p.num_100s,
                c50: p.num_50s,
                legacy_total_score: p.legacy_total_score as u32,
                is_legacy_import: false,
            };

            // for autoplay, ignore reality and calculate the maximum pp of
            // a perfect play up to this point; this keeps the value sane
            // after seeking
            if autoplay {
                score_params.combo = score_params.max_possible_combo;
                score_params.c300 = score_params.num_hit_objects;
                score_params.c100 = 0;
                score_params.c50 = 0;
                score_params.misses = 0;
                score_params.legacy_total_score = 0;
            }

            result.res.pp = calculate_pp(score_params);
            result.calc_index = p.current_hit_object;

            debug!(
                "live pp: {:.2}pp {:.2}* at object {}",
                result.res.pp, result.res.total_stars, result.calc_index
            );

            result
        });
    }
}
