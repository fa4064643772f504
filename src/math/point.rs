use std::ops::{Add, Div, Mul, Sub};

use num::{cast, Float, NumCast};

/// Represents a 2D point (or any pair of objects).
///
/// Arithmetic between points is element-wise; use [`Point::scale`] for
/// scalar multiplication.
#[allow(missing_docs)]
#[derive(Clone, Copy, Default, Debug, Display, PartialEq, Eq, Hash)]
#[display(fmt = "({}, {})", "x", "y")]
pub struct Point<T> {
    pub x: T,
    pub y: T,
}

impl<T> Point<T> {
    /// Create a new point
    pub fn new(x: T, y: T) -> Point<T> {
        Point { x, y }
    }
}

impl<T: Add<Output = T>> Add for Point<T> {
    type Output = Point<T>;

    fn add(self, other: Point<T>) -> Point<T> {
        Point::new(self.x + other.x, self.y + other.y)
    }
}

impl<T: Sub<Output = T>> Sub for Point<T> {
    type Output = Point<T>;

    fn sub(self, other: Point<T>) -> Point<T> {
        Point::new(self.x - other.x, self.y - other.y)
    }
}

impl<T: Mul<Output = T>> Mul for Point<T> {
    type Output = Point<T>;

    fn mul(self, other: Point<T>) -> Point<T> {
        Point::new(self.x * other.x, self.y * other.y)
    }
}

impl<T: Div<Output = T>> Div for Point<T> {
    type Output = Point<T>;

    fn div(self, other: Point<T>) -> Point<T> {
        Point::new(self.x / other.x, self.y / other.y)
    }
}

impl<T: Copy + NumCast> Point<T> {
    /// Converts this point to a floating point point
    #[inline]
    pub fn to_float<U: Float>(&self) -> Option<Point<U>> {
        Some(Point::new(cast(self.x)?, cast(self.y)?))
    }
}

impl<T: Float> Point<T> {
    /// Calculates the Euclidean distance between 2 points.
    #[inline]
    pub fn distance(&self, other: Point<T>) -> T {
        (other - *self).magnitude()
    }

    /// Calculates the magnitude of the vector.
    #[inline]
    pub fn magnitude(&self) -> T {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    /// Calculates the squared magnitude of the vector.
    #[inline]
    pub fn length_squared(&self) -> T {
        self.x * self.x + self.y * self.y
    }

    /// Dot product with another vector.
    #[inline]
    pub fn dot(&self, other: Point<T>) -> T {
        self.x * other.x + self.y * other.y
    }

    /// Scales the vector by a scalar.
    #[inline]
    pub fn scale(&self, by: T) -> Point<T> {
        Point::new(self.x * by, self.y * by)
    }
}
