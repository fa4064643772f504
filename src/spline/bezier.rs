use crate::math::Point;

pub type P = Point<f64>;

// squared flatness threshold, matching the client's 0.25px tolerance
const TOLERANCE_SQ: f64 = 0.25 * 0.25;

/// A segment is flat enough once every interior control point sits within
/// tolerance of the chord through its neighbors.
fn is_flat_enough(segment: &[P]) -> bool {
    segment
        .windows(3)
        .all(|w| (w[0] - w[1] * P::new(2.0, 2.0) + w[2]).length_squared() <= TOLERANCE_SQ)
}

/// Scratch space for the subdivision steps, sized once per curve.
struct Flattener {
    left: Vec<P>,
    right: Vec<P>,
    midpoints: Vec<P>,
}

impl Flattener {
    fn new(count: usize) -> Flattener {
        Flattener {
            // the left buffer doubles as the joined half-curve in emit()
            left: vec![P::default(); count * 2 - 1],
            right: vec![P::default(); count],
            midpoints: vec![P::default(); count],
        }
    }

    /// De Casteljau split of `segment` at t = 0.5 into the left and right
    /// scratch buffers.
    fn subdivide(&mut self, segment: &[P]) {
        let count = segment.len();
        self.midpoints[..count].copy_from_slice(segment);

        for i in 0..count {
            self.left[i] = self.midpoints[0];
            self.right[count - i - 1] = self.midpoints[count - i - 1];

            for j in 0..count - i - 1 {
                self.midpoints[j] =
                    (self.midpoints[j] + self.midpoints[j + 1]) / P::new(2.0, 2.0);
            }
        }
    }

    /// Flattens one flat-enough segment into curve samples: split once
    /// more, join the halves, and average neighboring control points.
    fn emit(&mut self, segment: &[P], output: &mut Vec<P>) {
        let count = segment.len();
        self.subdivide(segment);

        // stitch the right half behind the left one so the smoothing pass
        // runs over a single buffer
        for i in 1..count {
            self.left[count - 1 + i] = self.right[i];
        }

        output.push(segment[0]);

        for i in 1..count - 1 {
            let index = 2 * i;
            let smoothed = (self.left[index] * P::new(2.0, 2.0)
                + self.left[index - 1]
                + self.left[index + 1])
                * P::new(0.25, 0.25);
            output.push(smoothed);
        }
    }
}

/// The bezier flattening algorithm as implemented by osu!.
///
/// An iterative form of De Casteljau's algorithm: segments are split in
/// half until [`is_flat_enough`] passes, then lerp'd into `output`.
pub fn create_singlebezier(output: &mut Vec<P>, control_points: &[P]) {
    let count = control_points.len();
    if count == 0 {
        return;
    }

    let mut flattener = Flattener::new(count);

    // depth-first, left child on top so samples come out in curve order
    let mut pending: Vec<Vec<P>> = vec![control_points.to_vec()];
    while let Some(segment) = pending.pop() {
        if is_flat_enough(&segment) {
            flattener.emit(&segment, output);
            continue;
        }

        flattener.subdivide(&segment);
        pending.push(flattener.right[..count].to_vec());
        pending.push(flattener.left[..count].to_vec());
    }

    output.push(control_points[count - 1]);
}
