//! Slider body geometry.
//!
//! A [`Spline`] is the sampled polyline of a slider body, generated from
//! the curve-type letter and the control points. The difficulty engine
//! only ever asks for positions along the body via [`Spline::point_at`],
//! which maps span progress `t ∈ [0, 1]` onto arc length; the mapping is
//! monotone in `t`, and the stacked variant differs from the original one
//! by exactly the stack translation.

mod bezier;

use ordered_float::NotNan;

use crate::math::{Math, Point};

use self::bezier::{create_singlebezier, P};

const CATMULL_DETAIL: usize = 50;

/// The kind of curve a slider body follows.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CurveKind {
    /// Straight line segments.
    Linear,
    /// A circular arc through 3 points.
    Perfect,
    /// Bezier curve(s), split at repeated anchors.
    Bezier,
    /// Catmull-Rom spline (ancient maps).
    Catmull,
}

impl CurveKind {
    /// Maps the curve-type letter from the beatmap file; anything
    /// unrecognized is treated as bezier.
    pub fn from_letter(letter: char) -> CurveKind {
        match letter {
            'L' => CurveKind::Linear,
            'P' => CurveKind::Perfect,
            'C' => CurveKind::Catmull,
            _ => CurveKind::Bezier,
        }
    }
}

/// The sampled body of one slider.
#[derive(Clone, Debug)]
pub struct Spline {
    /// Sampled points, un-stacked.
    spline_points: Vec<P>,

    /// Cumulative arc lengths; indices correspond to `spline_points`.
    /// NotNan because they are binary-searched.
    cumulative_lengths: Vec<NotNan<f64>>,

    /// The pixel length the slider asked for (not necessarily the walked
    /// length; short bezier bodies stay short).
    pixel_length: f64,

    /// Current stack translation, subtracted on both axes.
    stack_offset: f64,
}

impl Spline {
    /// Builds the spline for a slider from its curve kind, control points
    /// and pixel length.
    pub fn from_control(kind: CurveKind, control_points: &[Point<f32>], pixel_length: f32) -> Spline {
        let pixel_length = pixel_length.max(0.0) as f64;

        let mut kind = kind;
        let mut points = control_points
            .iter()
            .map(|p| P::new(p.x as f64, p.y as f64))
            .collect::<Vec<_>>();

        // degenerate paths get padded so every branch has two points
        if points.is_empty() {
            points.push(P::default());
        }
        if points.len() == 1 {
            let head = points[0];
            points.push(head);
        }

        // a perfect curve needs exactly 3 points; 2 points are always linear
        if points.len() == 2 || (kind == CurveKind::Perfect && points.len() != 3) {
            kind = CurveKind::Linear;
        }

        // 3 collinear points degenerate to a line through first and last
        if kind == CurveKind::Perfect && Math::is_line(points[0], points[1], points[2]) {
            kind = CurveKind::Linear;
            points.remove(1);
        }

        let mut spline_points = match kind {
            CurveKind::Linear => Self::build_linear(&points, pixel_length),
            CurveKind::Perfect => Self::build_perfect(&points, pixel_length),
            CurveKind::Bezier => Self::build_bezier(&points, pixel_length),
            CurveKind::Catmull => Self::build_catmull(&points),
        };

        if spline_points.is_empty() {
            spline_points.push(points[0]);
        }
        if spline_points.len() < 2 {
            spline_points.push(spline_points[0]);
        }

        let mut cumulative_lengths = Vec::with_capacity(spline_points.len());
        let mut curr = 0.0;
        cumulative_lengths.push(NotNan::new(curr).unwrap());
        for points in spline_points.windows(2) {
            let dist = points[0].distance(points[1]);
            if dist.is_finite() {
                curr += dist;
            }
            cumulative_lengths.push(NotNan::new(curr).unwrap());
        }

        Spline {
            spline_points,
            cumulative_lengths,
            pixel_length,
            stack_offset: 0.0,
        }
    }

    fn build_linear(points: &[P], pixel_length: f64) -> Vec<P> {
        let start = points[0];
        let end = if points[0].distance(points[1]) > 0.0 {
            Math::point_on_line(points[0], points[1], pixel_length)
        } else {
            points[1]
        };
        vec![start, end]
    }

    fn build_perfect(points: &[P], pixel_length: f64) -> Vec<P> {
        let (p1, p2, p3) = (points[0], points[1], points[2]);
        let (center, radius) = Math::circumcircle(p1, p2, p3);
        if !radius.is_finite() || radius <= 0.0 || pixel_length <= 0.0 {
            return vec![p1];
        }

        // find the angles of the start, mid and end of the slider on the circle
        let t0 = (center.y - p1.y).atan2(p1.x - center.x);
        let mut mid = (center.y - p2.y).atan2(p2.x - center.x);
        let mut t1 = (center.y - p3.y).atan2(p3.x - center.x);

        while mid < t0 {
            mid += std::f64::consts::TAU;
        }
        while t1 < t0 {
            t1 += std::f64::consts::TAU;
        }
        if mid > t1 {
            t1 -= std::f64::consts::TAU;
        }

        // walk the arc for exactly pixel_length of circumference
        let direction_unit = (t1 - t0) / (t1 - t0).abs();
        let new_t1 = t0 + direction_unit * (pixel_length / radius);

        let mut t = t0;
        let mut c = Vec::new();
        loop {
            if !((new_t1 >= t0 && t < new_t1) || (new_t1 < t0 && t > new_t1)) {
                break;
            }

            let rel = P::new(t.cos() * radius, -t.sin() * radius);
            c.push(center + rel);

            t += (new_t1 - t0) / pixel_length;
        }
        c
    }

    fn build_bezier(points: &[P], pixel_length: f64) -> Vec<P> {
        let mut idx = 0;
        let mut whole: Vec<P> = Vec::new();
        let mut cumul_length = 0.0;
        let mut last_circ: Option<P> = None;

        let mut check_push = |whole: &mut Vec<P>, point: P| -> bool {
            match last_circ {
                Some(circ) => {
                    let distance = circ.distance(point);
                    if cumul_length + distance < pixel_length {
                        whole.push(point);
                        cumul_length += distance;
                        last_circ = Some(point);
                        true
                    } else {
                        // cut the body at exactly pixel_length
                        let push_amt = pixel_length - cumul_length;
                        let new_end = Math::point_on_line(circ, point, push_amt);
                        whole.push(new_end);
                        last_circ = Some(new_end);
                        false
                    }
                }
                None => {
                    whole.push(point);
                    last_circ = Some(point);
                    true
                }
            }
        };

        let mut push_segment = |whole: &mut Vec<P>, segment: &[P]| -> bool {
            let mut spline = Vec::new();
            create_singlebezier(&mut spline, segment);
            if spline.is_empty() {
                return true;
            }

            match whole.last() {
                Some(&last) if spline[0] == last => {}
                _ => {
                    if !check_push(whole, spline[0]) {
                        return false;
                    }
                }
            }

            for pair in spline.windows(2) {
                if pair[0] != pair[1] && !check_push(whole, pair[1]) {
                    return false;
                }
            }
            true
        };

        // split the curve at repeated ("red") anchors
        'outer: {
            for i in 1..points.len() {
                if points[i] == points[i - 1] {
                    if !push_segment(&mut whole, &points[idx..i]) {
                        break 'outer;
                    }
                    idx = i;
                }
            }
            push_segment(&mut whole, &points[idx..]);
        }

        whole
    }

    fn build_catmull(points: &[P]) -> Vec<P> {
        let mut path = Vec::with_capacity((points.len() - 1) * CATMULL_DETAIL * 2);

        for j in 0..points.len() - 1 {
            let v1 = if j > 0 { points[j - 1] } else { points[0] };
            let v2 = points[j];
            let v3 = if j + 1 < points.len() {
                points[j + 1]
            } else {
                v2 + (v2 - v1)
            };
            let v4 = if j + 2 < points.len() {
                points[j + 2]
            } else {
                v3 + (v3 - v2)
            };

            for c in 0..CATMULL_DETAIL {
                path.push(Math::catmull_find_point(
                    v1,
                    v2,
                    v3,
                    v4,
                    c as f64 / CATMULL_DETAIL as f64,
                ));
                path.push(Math::catmull_find_point(
                    v1,
                    v2,
                    v3,
                    v4,
                    (c + 1) as f64 / CATMULL_DETAIL as f64,
                ));
            }
        }

        path
    }

    /// The pixel length this slider declared.
    pub fn pixel_length(&self) -> f32 {
        self.pixel_length as f32
    }

    /// Replaces the stack translation applied to [`Spline::point_at`].
    pub fn update_stack_position(&mut self, stack_mul_stack_offset: f32) {
        self.stack_offset = stack_mul_stack_offset as f64;
    }

    /// Position at span progress `t ∈ [0, 1]`, with stacking applied.
    pub fn point_at(&self, t: f32) -> Point<f32> {
        let p = self.original_point_at_f64(t);
        Point::new(
            (p.x - self.stack_offset) as f32,
            (p.y - self.stack_offset) as f32,
        )
    }

    /// Position at span progress `t ∈ [0, 1]`, without stacking.
    pub fn original_point_at(&self, t: f32) -> Point<f32> {
        let p = self.original_point_at_f64(t);
        Point::new(p.x as f32, p.y as f32)
    }

    fn original_point_at_f64(&self, t: f32) -> P {
        let total = self.cumulative_lengths.last().unwrap().into_inner();
        self.point_at_length((t as f64).clamp(0.0, 1.0) * total)
    }

    /// Position after traveling `length` osu!pixels along the body.
    fn point_at_length(&self, length: f64) -> P {
        let length_notnan = NotNan::new(length.max(0.0)).unwrap();
        match self.cumulative_lengths.binary_search(&length_notnan) {
            Ok(idx) => self.spline_points[idx],

            Err(idx) => {
                let n = self.spline_points.len();
                if idx == 0 {
                    return self.spline_points[0];
                } else if idx >= n {
                    return self.spline_points[n - 1];
                }

                // no sampled point at this exact length, interpolate the
                // two surrounding ones
                let (len1, len2) = (
                    self.cumulative_lengths[idx - 1].into_inner(),
                    self.cumulative_lengths[idx].into_inner(),
                );
                let (p1, p2) = (self.spline_points[idx - 1], self.spline_points[idx]);
                if len2 <= len1 {
                    return p1;
                }
                let proportion = (length - len1) / (len2 - len1);
                (p2 - p1) * P::new(proportion, proportion) + p1
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::collection::vec;
    use proptest::prelude::*;
    use proptest::proptest;

    use super::{CurveKind, Spline};
    use crate::math::Point;

    fn p(x: f32, y: f32) -> Point<f32> {
        Point::new(x, y)
    }

    #[test]
    fn linear_endpoints() {
        let spline = Spline::from_control(CurveKind::Linear, &[p(0.0, 0.0), p(100.0, 0.0)], 100.0);
        let start = spline.original_point_at(0.0);
        let end = spline.original_point_at(1.0);
        assert!((start.x - 0.0).abs() < 1e-3 && (end.x - 100.0).abs() < 1e-3);
    }

    #[test]
    fn linear_extends_past_last_control_point() {
        let spline = Spline::from_control(CurveKind::Linear, &[p(0.0, 0.0), p(100.0, 0.0)], 150.0);
        assert!((spline.original_point_at(1.0).x - 150.0).abs() < 1e-3);
    }

    #[test]
    fn stacked_point_differs_by_offset() {
        let mut spline = Spline::from_control(CurveKind::Linear, &[p(0.0, 0.0), p(100.0, 0.0)], 100.0);
        spline.update_stack_position(6.4);
        let original = spline.original_point_at(0.5);
        let stacked = spline.point_at(0.5);
        assert!((original.x - stacked.x - 6.4).abs() < 1e-3);
        assert!((original.y - stacked.y - 6.4).abs() < 1e-3);
    }

    #[test]
    fn zero_length_slider_stays_at_head() {
        let spline = Spline::from_control(CurveKind::Bezier, &[p(32.0, 32.0), p(32.0, 32.0)], 0.0);
        let point = spline.original_point_at(1.0);
        assert!((point.x - 32.0).abs() < 1e-3);
    }

    #[test]
    fn perfect_curve_midpoint_is_off_the_chord() {
        let spline = Spline::from_control(
            CurveKind::Perfect,
            &[p(0.0, 0.0), p(50.0, 50.0), p(100.0, 0.0)],
            157.0,
        );
        let mid = spline.original_point_at(0.5);
        assert!(mid.y > 25.0);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 16,
            timeout: 3000,
            ..ProptestConfig::default()
        })]
        #[test]
        fn point_at_is_monotone_and_total(
            control in vec((0..512i32, 0..384i32), 2..8),
            pixel_length in 1.0f32..600.0,
        ) {
            let control = control
                .into_iter()
                .map(|(x, y)| p(x as f32, y as f32))
                .collect::<Vec<_>>();

            for kind in [CurveKind::Linear, CurveKind::Perfect, CurveKind::Bezier, CurveKind::Catmull] {
                let spline = Spline::from_control(kind, &control, pixel_length);
                for i in 0..=10 {
                    let t = i as f32 / 10.0;
                    let pt = spline.original_point_at(t);
                    prop_assert!(pt.x.is_finite() && pt.y.is_finite());
                }
                // the endpoints are stable under repeated queries
                prop_assert_eq!(spline.original_point_at(1.0), spline.original_point_at(1.0));
            }
        }
    }
}
