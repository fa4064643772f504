//! The difficulty pipeline: difficulty hit objects, stacking, strains and
//! the star rating entry points.

pub mod attributes;
pub mod object;
pub mod rating;
pub mod skills;

use crate::beatmap::{PrimitiveContainer, SliderScoringTime};
use crate::cancel::StopToken;
use crate::errors::LoadError;
use crate::math::Point;
use crate::options::{Options, LAZY_CURVE_SLIDER_THRESHOLD};
use crate::rules;
use crate::spline::{CurveKind, Spline};

pub use self::attributes::{
    DifficultyAttributes, DifficultyInput, IncrementalState, RawDifficultyValues, Skill, NUM_SKILLS,
};
pub use self::object::DiffObject;

/// Version stamp of the difficulty/pp algorithm; stored values computed
/// with an older stamp are stale.
pub const PP_ALGORITHM_VERSION: u32 = 20251008;

use self::object::{
    compute_slider_cursor, end_cursor_position, StrainScratch, ASSUMED_SLIDER_RADIUS,
    MAXIMUM_SLIDER_RADIUS, NORMALIZED_RADIUS,
};
use self::rating::{
    calculate_score_v1_attributes, compute_aim_rating, compute_speed_rating, difficulty_rating,
    mechanical_difficulty_rating, total_stars_from_skills,
};
use self::skills::calculate_difficulty;

/// The kind of a difficulty hit object; the declaration order is the sort
/// tie-break order.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum HitObjectKind {
    /// A hit circle.
    Circle,
    /// A spinner.
    Spinner,
    /// A slider.
    Slider,
}

/// The generalized hit object all star/pp calculations run on; it
/// encompasses every object type for simplicity.
#[derive(Clone, Debug)]
pub struct DifficultyHitObject {
    /// Object kind.
    pub kind: HitObjectKind,
    /// Position with stacking applied.
    pub pos: Point<f32>,
    /// Position before stacking.
    pub original_pos: Point<f32>,

    /// Start time in milliseconds, speed-adjusted.
    pub time: i32,
    /// Start time before any speed adjustment.
    pub base_time: i32,
    /// End time in milliseconds, speed-adjusted.
    pub end_time: i32,
    /// End time before any speed adjustment.
    pub base_end_time: i32,

    /// Slider scoring events, speed-adjusted.
    pub scoring_times: Vec<SliderScoringTime>,
    /// One-way traversal time, speed-adjusted.
    pub span_duration: f32,
    /// Declared body length in osu!pixels.
    pub pixel_length: f32,
    /// Slider repeat count.
    pub repeats: i32,
    /// Curve-type letter for lazily materialized curves.
    pub curve_type: char,

    /// The slider body, possibly lazily materialized.
    pub curve: Option<Spline>,

    /// Stack count; positive stacks shift up-left.
    pub stack: i32,

    base_span_duration: f32,
    base_scoring_times: Vec<f32>,

    scheduled_curve_alloc: bool,
    scheduled_curve_alloc_control_points: Vec<Point<f32>>,
    scheduled_curve_alloc_stack_offset: f32,
}

impl DifficultyHitObject {
    /// A hit circle.
    pub fn circle(pos: Point<f32>, time: i32) -> DifficultyHitObject {
        Self::basic(pos, time, time, HitObjectKind::Circle)
    }

    fn basic(pos: Point<f32>, time: i32, end_time: i32, kind: HitObjectKind) -> DifficultyHitObject {
        DifficultyHitObject {
            kind,
            pos,
            original_pos: pos,
            time,
            base_time: time,
            end_time,
            base_end_time: end_time,
            scoring_times: Vec::new(),
            span_duration: 0.0,
            pixel_length: 0.0,
            repeats: 0,
            curve_type: '\0',
            curve: None,
            stack: 0,
            base_span_duration: 0.0,
            base_scoring_times: Vec::new(),
            scheduled_curve_alloc: false,
            scheduled_curve_alloc_control_points: Vec::new(),
            scheduled_curve_alloc_stack_offset: 0.0,
        }
    }

    /// A spinner.
    pub fn spinner_at(pos: Point<f32>, time: i32, end_time: i32) -> DifficultyHitObject {
        Self::basic(pos, time, end_time, HitObjectKind::Spinner)
    }

    /// A slider; the curve is either built now or deferred until the
    /// preprocessor needs it (at the cost of keeping the control points).
    #[allow(clippy::too_many_arguments)]
    pub fn slider(
        pos: Point<f32>,
        time: i32,
        end_time: i32,
        span_duration: f32,
        curve_type: char,
        control_points: &[Point<f32>],
        pixel_length: f32,
        scoring_times: Vec<SliderScoringTime>,
        repeats: i32,
        calculate_curve_in_constructor: bool,
    ) -> DifficultyHitObject {
        let base_scoring_times = scoring_times.iter().map(|st| st.time).collect();

        let mut obj = DifficultyHitObject {
            kind: HitObjectKind::Slider,
            pos,
            original_pos: pos,
            time,
            base_time: time,
            end_time,
            base_end_time: end_time,
            scoring_times,
            span_duration,
            pixel_length,
            repeats,
            curve_type,
            curve: None,
            stack: 0,
            base_span_duration: span_duration,
            base_scoring_times,
            scheduled_curve_alloc: false,
            scheduled_curve_alloc_control_points: Vec::new(),
            scheduled_curve_alloc_stack_offset: 0.0,
        };

        if control_points.len() > 1 {
            if calculate_curve_in_constructor {
                // precomputing all curves is faster for normal maps; only
                // pathological slider counts go through the lazy path
                obj.curve = Some(Spline::from_control(
                    CurveKind::from_letter(curve_type),
                    control_points,
                    pixel_length,
                ));
            } else {
                obj.scheduled_curve_alloc = true;
                obj.scheduled_curve_alloc_control_points = control_points.to_vec();
            }
        }

        obj
    }

    /// Object duration in milliseconds; clamped non-negative because of
    /// one particular Aspire map.
    #[inline]
    pub fn duration(&self) -> i32 {
        (self.end_time - self.time).max(0)
    }

    /// Whether this slider defers curve creation.
    #[inline]
    pub fn has_scheduled_curve(&self) -> bool {
        self.scheduled_curve_alloc
    }

    /// Materializes a scheduled curve, respecting any stacking applied so
    /// far.
    pub fn build_scheduled_curve(&mut self) {
        let mut curve = Spline::from_control(
            CurveKind::from_letter(self.curve_type),
            &self.scheduled_curve_alloc_control_points,
            self.pixel_length,
        );
        curve.update_stack_position(self.stack as f32 * self.scheduled_curve_alloc_stack_offset);
        self.curve = Some(curve);
    }

    /// Drops a lazily materialized curve again.
    pub fn release_scheduled_curve(&mut self) {
        if self.scheduled_curve_alloc {
            self.curve = None;
        }
    }

    /// Shifts the stacked position (and curve) by `stack * stack_offset`.
    pub fn update_stack_position(&mut self, stack_offset: f32) {
        self.scheduled_curve_alloc_stack_offset = stack_offset;

        let shift = self.stack as f32 * stack_offset;
        self.pos = self.original_pos - Point::new(shift, shift);

        if let Some(curve) = self.curve.as_mut() {
            curve.update_stack_position(shift);
        }
    }

    /// Span progress at an absolute time; `raw` skips the repeat fold.
    pub fn get_t(&self, time_ms: i32, raw: bool) -> f32 {
        let t = (time_ms - self.time) as f32 / self.span_duration;
        if raw {
            t
        } else {
            let floor = t.floor();
            if (floor as i32) % 2 == 0 {
                t - floor
            } else {
                floor + 1.0 - t
            }
        }
    }

    /// The un-stacked position at a point in time; used by the stacking
    /// algorithms.
    pub fn original_raw_pos_at(&self, time_ms: i32) -> Point<f32> {
        let curve = match (self.kind, self.curve.as_ref()) {
            (HitObjectKind::Slider, Some(curve)) => curve,
            _ => return self.original_pos,
        };

        if time_ms <= self.time {
            curve.original_point_at(0.0)
        } else if time_ms >= self.end_time {
            if self.repeats % 2 == 0 {
                curve.original_point_at(0.0)
            } else {
                curve.original_point_at(1.0)
            }
        } else {
            curve.original_point_at(self.get_t(time_ms, false))
        }
    }

    /// Re-derives every speed-dependent field from its base copy; calling
    /// this repeatedly with different multipliers never loses precision.
    pub fn rescale_to_speed(&mut self, speed: f32) {
        let inv = 1.0 / speed as f64;
        self.time = (self.base_time as f64 * inv) as i32;
        self.end_time = (self.base_end_time as f64 * inv) as i32;
        self.span_duration = (self.base_span_duration as f64 * inv) as f32;
        for (st, &base) in self.scoring_times.iter_mut().zip(&self.base_scoring_times) {
            st.time = (base as f64 * inv) as f32;
        }
    }
}

/// The result of building difficulty hit objects for one beatmap.
#[derive(Debug, Default)]
pub struct LoadedDifficultyObjects {
    /// Sorted, stacked, speed-adjusted difficulty hit objects.
    pub objects: Vec<DifficultyHitObject>,

    /// First-object to last-object span (speed-independent).
    pub playable_length: u32,
    /// Sum of break durations.
    pub total_break_duration: u32,

    max_combo_at_index: Vec<u32>,
}

impl LoadedDifficultyObjects {
    /// The beatmap's maximum combo.
    pub fn total_max_combo(&self) -> u32 {
        self.max_combo_at_index.last().copied().unwrap_or(0)
    }

    /// The cumulative maximum combo after playing up to (and including)
    /// the object at `index`.
    pub fn max_combo_at(&self, index: usize) -> u32 {
        self.max_combo_at_index
            .get(index)
            .copied()
            .unwrap_or_else(|| self.total_max_combo())
    }

    /// Rescales all speed-dependent time fields in place.
    pub fn rescale_to_speed(&mut self, speed: f32) {
        for obj in &mut self.objects {
            obj.rescale_to_speed(speed);
        }
    }
}

/// Builds the sorted difficulty-hit-object array from primitives: slider
/// timing, object construction, sorting, stacking, speed rescale and the
/// cumulative max-combo table.
///
/// `inaccurate` skips curves, stacking and per-object combo for cheap
/// bulk pre-scans.
pub fn load_difficulty_objects(
    container: &mut PrimitiveContainer,
    ar: f32,
    cs: f32,
    speed_multiplier: f32,
    inaccurate: bool,
    dead: &StopToken,
    options: &Options,
) -> Result<LoadedDifficultyObjects, LoadError> {
    let mut result = LoadedDifficultyObjects {
        total_break_duration: container.total_break_duration,
        ..LoadedDifficultyObjects::default()
    };

    // slider timing only needs to happen once per container
    if !container.slider_times_calculated {
        crate::beatmap::calculate_slider_times_clicks_ticks(
            container.version,
            &mut container.sliders,
            &container.timingpoints,
            container.slider_multiplier,
            container.slider_tick_rate,
            dead,
        )?;
        container.slider_times_calculated = true;
    }

    result
        .objects
        .reserve(container.hitcircles.len() + container.sliders.len() + container.spinners.len());

    for circle in &container.hitcircles {
        result.objects.push(DifficultyHitObject::circle(
            Point::new(circle.x as f32, circle.y as f32),
            circle.time,
        ));
    }

    let calculate_curve_in_constructor = container.sliders.len() < LAZY_CURVE_SLIDER_THRESHOLD;
    for slider in &container.sliders {
        if dead.stop_requested() {
            return Err(LoadError::LoadInterrupted);
        }

        if !inaccurate {
            result.objects.push(DifficultyHitObject::slider(
                Point::new(slider.x as f32, slider.y as f32),
                slider.time,
                slider.time + slider.slider_time as i32,
                slider.slider_time_without_repeats,
                slider.curve_type,
                &slider.points,
                slider.pixel_length,
                slider.scoring_times.clone(),
                slider.repeat,
                calculate_curve_in_constructor,
            ));
        } else {
            // curve and scoring times are irrelevant for the rough path
            result.objects.push(DifficultyHitObject::slider(
                Point::new(slider.x as f32, slider.y as f32),
                slider.time,
                slider.time + slider.slider_time as i32,
                slider.slider_time_without_repeats,
                slider.curve_type,
                &[],
                slider.pixel_length,
                Vec::new(),
                slider.repeat,
                false,
            ));
        }
    }

    for spinner in &container.spinners {
        result.objects.push(DifficultyHitObject::spinner_at(
            Point::new(spinner.x as f32, spinner.y as f32),
            spinner.time,
            spinner.end_time,
        ));
    }

    if dead.stop_requested() {
        return Err(LoadError::LoadInterrupted);
    }

    // sort by time, kind, x, y (a strict total order, so ties are stable)
    result.objects.sort_by(|a, b| {
        a.time
            .cmp(&b.time)
            .then(a.kind.cmp(&b.kind))
            .then(a.pos.x.total_cmp(&b.pos.x))
            .then(a.pos.y.total_cmp(&b.pos.y))
    });

    if dead.stop_requested() {
        return Err(LoadError::LoadInterrupted);
    }

    // stacking must happen before the speed multiplier is applied
    if options.stars_stacking && !inaccurate {
        apply_stacking(
            &mut result.objects,
            container.version,
            container.stack_leniency,
            ar,
            cs,
            dead,
        )?;
    }

    // apply speed multiplier
    if speed_multiplier != 1.0 && speed_multiplier > 0.0 {
        for obj in &mut result.objects {
            if dead.stop_requested() {
                return Err(LoadError::LoadInterrupted);
            }
            obj.rescale_to_speed(speed_multiplier);
        }
    }

    if !result.objects.is_empty() {
        result.playable_length = (result.objects.last().unwrap().base_end_time
            - result.objects[0].base_time)
            .max(0) as u32;
    }

    // cumulative max combo per object
    if !inaccurate && !result.objects.is_empty() {
        result.max_combo_at_index.reserve(result.objects.len());
        let mut running_combo = 0u32;
        for obj in &result.objects {
            running_combo += match obj.kind {
                HitObjectKind::Slider => 1 + obj.scoring_times.len() as u32,
                _ => 1,
            };
            result.max_combo_at_index.push(running_combo);
        }
    } else {
        // rough path: only the total, scoring times are empty
        let mut total_combo = (container.hitcircles.len() + container.spinners.len()) as u32;
        for slider in &container.sliders {
            let repeats = (slider.repeat - 1).max(0) as u32;
            total_combo += 2 + repeats + (repeats + 1) * slider.ticks.len() as u32;
        }
        result.max_combo_at_index.push(total_combo);
    }

    if result.objects.is_empty() {
        return Err(LoadError::NoObjects);
    }

    Ok(result)
}

const STACK_LENIENCE: f32 = 3.0;

fn apply_stacking(
    objects: &mut [DifficultyHitObject],
    version: i32,
    stack_leniency: f32,
    ar: f32,
    cs: f32,
    dead: &StopToken,
) -> Result<(), LoadError> {
    let raw_hit_circle_diameter = rules::raw_hit_circle_diameter(cs);
    let approach_time = rules::approach_time_for_stacking(ar);

    if version > 5 {
        // peppy's algorithm
        for i in (0..objects.len()).rev() {
            let mut n = i as i32;
            let mut obj_i = i;

            if objects[obj_i].stack != 0 || objects[obj_i].kind == HitObjectKind::Spinner {
                continue;
            }

            match objects[obj_i].kind {
                HitObjectKind::Circle => {
                    loop {
                        n -= 1;
                        if n < 0 {
                            break;
                        }
                        let n = n as usize;

                        if objects[n].kind == HitObjectKind::Spinner {
                            continue;
                        }

                        if objects[obj_i].time as f32 - (approach_time * stack_leniency)
                            > objects[n].end_time as f32
                        {
                            break;
                        }

                        let n_end_time = objects[n].time + objects[n].duration();
                        let n_end_position = objects[n].original_raw_pos_at(n_end_time);
                        let i_start_position =
                            objects[obj_i].original_raw_pos_at(objects[obj_i].time);

                        if objects[n].duration() != 0
                            && (n_end_position - i_start_position).magnitude() < STACK_LENIENCE
                        {
                            let offset = objects[obj_i].stack - objects[n].stack + 1;
                            for j in (n + 1)..=i {
                                let j_start = objects[j].original_raw_pos_at(objects[j].time);
                                if (n_end_position - j_start).magnitude() < STACK_LENIENCE {
                                    objects[j].stack -= offset;
                                }
                            }

                            break;
                        }

                        let n_start_position = objects[n].original_raw_pos_at(objects[n].time);
                        if (n_start_position - i_start_position).magnitude() < STACK_LENIENCE {
                            let stack = objects[obj_i].stack;
                            objects[n].stack = stack + 1;
                            obj_i = n;
                        }
                    }
                }
                HitObjectKind::Slider => {
                    loop {
                        n -= 1;
                        if n < 0 {
                            break;
                        }
                        let n = n as usize;

                        if objects[n].kind == HitObjectKind::Spinner {
                            continue;
                        }

                        if objects[obj_i].time as f32 - (approach_time * stack_leniency)
                            > objects[n].time as f32
                        {
                            break;
                        }

                        let n_pos = if objects[n].duration() != 0 {
                            objects[n].original_raw_pos_at(objects[n].time + objects[n].duration())
                        } else {
                            objects[n].original_raw_pos_at(objects[n].time)
                        };
                        let i_start_position =
                            objects[obj_i].original_raw_pos_at(objects[obj_i].time);

                        if (n_pos - i_start_position).magnitude() < STACK_LENIENCE {
                            let stack = objects[obj_i].stack;
                            objects[n].stack = stack + 1;
                            obj_i = n;
                        }
                    }
                }
                HitObjectKind::Spinner => {}
            }
        }
    } else {
        // old stacking algorithm for old beatmaps
        for i in 0..objects.len() {
            let is_slider = objects[i].kind == HitObjectKind::Slider;

            if objects[i].stack != 0 && !is_slider {
                continue;
            }

            let mut start_time = objects[i].time + objects[i].duration();
            let mut slider_stack = 0;

            for j in (i + 1)..objects.len() {
                if objects[j].time as f32 - (approach_time * stack_leniency) > start_time as f32 {
                    break;
                }

                // the start position of the hitobject, or the position at
                // the end of the path if it's a slider
                let position2 = if is_slider {
                    objects[i].original_raw_pos_at(objects[i].time + objects[i].duration())
                } else {
                    objects[i].original_raw_pos_at(objects[i].time)
                };

                let j_start = objects[j].original_raw_pos_at(objects[j].time);
                let i_start = objects[i].original_raw_pos_at(objects[i].time);

                if (j_start - i_start).magnitude() < STACK_LENIENCE {
                    objects[i].stack += 1;
                    start_time = objects[j].time + objects[j].duration();
                } else if (j_start - position2).magnitude() < STACK_LENIENCE {
                    // bump notes down and right, rather than up and left
                    slider_stack += 1;
                    objects[j].stack -= slider_stack;
                    start_time = objects[j].time + objects[j].duration();
                }
            }
        }
    }

    // update hitobject positions
    let stack_offset =
        raw_hit_circle_diameter / 128.0 / rules::BROKEN_GAMEFIELD_ROUNDING_ALLOWANCE * 6.4;
    for obj in objects.iter_mut() {
        if dead.stop_requested() {
            return Err(LoadError::LoadInterrupted);
        }

        if obj.curve.is_some() && obj.stack != 0 {
            obj.update_stack_position(stack_offset);
        }
    }

    Ok(())
}

/// Inputs and outputs of one star-rating calculation.
pub struct StarCalcParams<'a> {
    /// Reusable per-object strain arena; pass the same vector across
    /// calculations to amortize allocation and enable incremental reuse.
    pub cached_diff_objects: &'a mut Vec<DiffObject>,

    /// Attribute output.
    pub attributes: &'a mut DifficultyAttributes,

    /// The sorted difficulty hit objects, mutable for lazy curve
    /// management.
    pub hit_objects: &'a mut [DifficultyHitObject],

    /// Beatmap settings and mods.
    pub input: DifficultyInput,

    /// Receives the aim peak strains when set.
    pub out_aim_strains: Option<&'a mut Vec<f64>>,
    /// Receives the speed peak strains when set.
    pub out_speed_strains: Option<&'a mut Vec<f64>>,

    /// Per-skill incremental state for per-object recalculation.
    pub incremental: Option<&'a mut [IncrementalState; NUM_SKILLS]>,

    /// Only evaluate up to this object index (inclusive); negative means
    /// all objects.
    pub up_to_object_index: i32,

    /// Cancellation; a triggered token yields 0 stars.
    pub cancel: StopToken,

    /// Receives the raw pre-rating difficulty values when set.
    pub out_raw_difficulty: Option<&'a mut RawDifficultyValues>,

    /// Ignore `up_to_object_index` for the cache fill, expecting future
    /// calls with larger indices ("pseudo-incremental").
    pub force_fill_diffobj_cache: bool,

    /// Engine tunables.
    pub options: Options,
}

/// Computes the star rating (and attributes) for prepared difficulty hit
/// objects.
pub fn calculate_star_diff(params: StarCalcParams<'_>) -> f64 {
    let StarCalcParams {
        cached_diff_objects,
        attributes,
        hit_objects,
        input,
        out_aim_strains,
        out_speed_strains,
        mut incremental,
        up_to_object_index,
        cancel,
        out_raw_difficulty,
        force_fill_diffobj_cache,
        options,
    } = params;

    // osu! returns 0 stars for single-object maps unless that object is a slider
    if hit_objects.len() < 2 {
        match hit_objects.first() {
            None => return 0.0,
            Some(obj) if obj.kind != HitObjectKind::Slider => return 0.0,
            Some(_) => {}
        }
    }

    // CS is clamped because the engine allows CS beyond the point where
    // the diameter would go negative
    let circle_radius = rules::raw_hit_circle_radius(input.cs.clamp(0.0, 12.142));
    let hit_window_300 = 2.0
        * rules::adjust_hit_window(rules::od_to_300_hit_window_ms(input.od as f64))
        / input.speed_multiplier as f64;

    let radius_scaling_factor = NORMALIZED_RADIUS / circle_radius;
    let small_circle_bonus = (1.0 + (30.0 - circle_radius as f64) / 40.0).max(1.0);

    let num_diff_objects = if up_to_object_index < 0 {
        hit_objects.len()
    } else {
        (up_to_object_index as usize + 1).min(hit_objects.len())
    };

    let cache_size = if force_fill_diffobj_cache {
        hit_objects.len()
    } else {
        num_diff_objects
    };

    let is_using_cached = cached_diff_objects.len() >= cache_size;

    if !is_using_cached {
        cached_diff_objects.clear();
        cached_diff_objects.reserve(cache_size);
        for (i, ho) in hit_objects.iter().enumerate().take(cache_size) {
            if cancel.stop_requested() {
                return 0.0;
            }
            cached_diff_objects.push(DiffObject::new(
                ho,
                i,
                radius_scaling_factor,
                small_circle_bonus,
            ));
        }
    }

    // angles and travel/jump distances come before strains
    if !is_using_cached {
        for i in 1..cache_size {
            if cancel.stop_requested() {
                return 0.0;
            }

            // delay curve creation to when it's needed (1)
            if hit_objects[i - 1].has_scheduled_curve() && hit_objects[i - 1].curve.is_none() {
                hit_objects[i - 1].build_scheduled_curve();
            }

            if hit_objects[i].kind == HitObjectKind::Slider {
                let (dcur, ho) = (&mut cached_diff_objects[i], &hit_objects[i]);
                compute_slider_cursor(dcur, ho, circle_radius, &options);
                dcur.travel_distance = dcur.lazy_travel_dist
                    * (1.0 + (dcur.repeats - 1) as f64 / 2.5).powf(1.0 / 2.5);
                dcur.travel_time = dcur.lazy_travel_time.max(25.0);
            }

            // no jumping to or from spinners
            if hit_objects[i].kind == HitObjectKind::Spinner
                || hit_objects[i - 1].kind == HitObjectKind::Spinner
            {
                continue;
            }

            let last_cursor_position = end_cursor_position(
                &mut cached_diff_objects[i - 1],
                &hit_objects[i - 1],
                circle_radius,
                &options,
            );

            let cur_strain_time = (hit_objects[i].time - hit_objects[i - 1].time).max(25) as f64;

            {
                let cur = &mut cached_diff_objects[i];
                cur.jump_distance = (cur.norm_start
                    - last_cursor_position.scale(radius_scaling_factor))
                .magnitude() as f64;
                cur.min_jump_distance = cur.jump_distance;
                cur.min_jump_time = cur_strain_time;
            }

            if hit_objects[i - 1].kind == HitObjectKind::Slider {
                let last_travel = cached_diff_objects[i - 1].lazy_travel_time.max(25.0);

                // the curve can be absent when the control point list was
                // degenerate, which is fine and correct
                let tail_pos = match hit_objects[i - 1].curve.as_ref() {
                    Some(curve) => {
                        curve.point_at(if hit_objects[i - 1].repeats % 2 == 1 { 1.0 } else { 0.0 })
                    }
                    None => hit_objects[i - 1].pos,
                };
                let tail_jump_dist =
                    tail_pos.distance(hit_objects[i].pos) * radius_scaling_factor;

                let cur = &mut cached_diff_objects[i];
                cur.min_jump_time = (cur_strain_time - last_travel).max(25.0);
                cur.min_jump_distance = ((cur.min_jump_distance as f32
                    - (MAXIMUM_SLIDER_RADIUS - ASSUMED_SLIDER_RADIUS))
                    .min(tail_jump_dist - MAXIMUM_SLIDER_RADIUS)
                    .max(0.0)) as f64;
            }

            // angles need two non-spinner objects behind the current one
            if i > 1 {
                if hit_objects[i - 2].kind == HitObjectKind::Spinner {
                    continue;
                }

                let last_last_cursor_position = end_cursor_position(
                    &mut cached_diff_objects[i - 2],
                    &hit_objects[i - 2],
                    circle_radius,
                    &options,
                );

                // and also immediately delete afterwards (2): the trivial
                // sliding window keeps the last two curves alive, they
                // drop with the objects anyway
                if i > 2 {
                    hit_objects[i - 3].release_scheduled_curve();
                }

                let v1 = last_last_cursor_position - hit_objects[i - 1].pos;
                let v2 = hit_objects[i].pos - last_cursor_position;

                let dot = v1.dot(v2) as f64;
                let det = (v1.x * v2.y) as f64 - (v1.y * v2.x) as f64;

                cached_diff_objects[i].angle = det.atan2(dot).abs();
            }
        }
    }

    // calculate strains
    if !is_using_cached {
        let mut scratch = StrainScratch::default();
        for i in 1..cache_size {
            if cancel.stop_requested() {
                return 0.0;
            }

            let (before, rest) = cached_diff_objects.split_at_mut(i);
            let before: &[DiffObject] = before;
            let (cur, after) = rest.split_first_mut().expect("non-empty tail");
            let next_time = if i + 1 < cache_size {
                Some(after[0].time)
            } else {
                None
            };

            cur.calculate_strains(
                &before[i - 1],
                next_time,
                before,
                hit_window_300,
                input.autopilot,
                &mut scratch,
            );
        }
    }

    // weigh strains into the three raw difficulty values; aim-no-sliders
    // runs first so its difficult-strain attributes can be captured before
    // the full aim pass overwrites them
    let dobjs = &cached_diff_objects[..];

    let aim_no_sliders = calculate_difficulty(
        Skill::AimNoSliders,
        dobjs,
        num_diff_objects,
        incremental.as_deref_mut().map(|s| &mut s[Skill::AimNoSliders as usize]),
        None,
        Some(&mut *attributes),
    );

    let speed = calculate_difficulty(
        Skill::Speed,
        dobjs,
        num_diff_objects,
        incremental.as_deref_mut().map(|s| &mut s[Skill::Speed as usize]),
        out_speed_strains,
        Some(&mut *attributes),
    );

    // at this point the aim attributes hold the aim-no-sliders values,
    // which is what the top-weighted ratio wants; the full aim pass below
    // replaces them
    let aim_top_weighted_slider_factor = attributes.aim_top_weighted_slider_factor
        / (attributes.aim_difficult_strain_count - attributes.aim_top_weighted_slider_factor)
            .max(1.0);
    let speed_top_weighted_slider_factor = attributes.speed_top_weighted_slider_factor
        / (attributes.speed_difficult_strain_count - attributes.speed_top_weighted_slider_factor)
            .max(1.0);

    let aim = calculate_difficulty(
        Skill::AimSliders,
        dobjs,
        num_diff_objects,
        incremental.as_deref_mut().map(|s| &mut s[Skill::AimSliders as usize]),
        out_aim_strains,
        Some(&mut *attributes),
    );

    attributes.slider_factor = if aim > 0.0 {
        difficulty_rating(aim_no_sliders) / difficulty_rating(aim)
    } else {
        1.0
    };

    let mechanical = mechanical_difficulty_rating(aim, speed);

    // AR and OD are scaled by rate before the rating transforms
    let adj_ar = rules::ar_with_speed(input.ar as f64, input.speed_multiplier as f64);
    let adj_od = rules::adjust_od_by_clock_rate(input.od as f64, input.speed_multiplier as f64);

    if let Some(raw) = out_raw_difficulty {
        *raw = RawDifficultyValues {
            aim_no_sliders,
            aim,
            speed,
        };
    }

    let aim_rating = compute_aim_rating(
        aim,
        num_diff_objects as u32,
        adj_ar,
        adj_od,
        mechanical,
        attributes.slider_factor,
        &input,
    );
    let speed_rating = compute_speed_rating(
        speed,
        num_diff_objects as u32,
        adj_ar,
        adj_od,
        mechanical,
        &input,
    );

    calculate_score_v1_attributes(attributes, hit_objects, &input, up_to_object_index);

    attributes.aim_difficulty = aim_rating;
    attributes.speed_difficulty = speed_rating;

    attributes.aim_top_weighted_slider_factor = aim_top_weighted_slider_factor;
    attributes.speed_top_weighted_slider_factor = speed_top_weighted_slider_factor;

    total_stars_from_skills(aim_rating, speed_rating)
}

/// Recomputes the star rating from cached raw values; see
/// [`rating::recompute_star_rating`].
pub fn recompute_star_rating(
    raw: &RawDifficultyValues,
    num_diff_objects: u32,
    input: &DifficultyInput,
) -> f64 {
    rating::recompute_star_rating(raw, num_diff_objects, input)
}
