use std::ops::{Add, AddAssign, Div, Index, IndexMut, Mul, Sub};

pub use kurbo::{Affine, Point, Vec2};

/// Integer 2D vector used for texture sizes, texel coordinates and dispatch extents.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    serde::Serialize,
    serde::Deserialize,
)]
pub struct Int2 {
    /// Horizontal component.
    pub x: i32,
    /// Vertical component.
    pub y: i32,
}

impl Int2 {
    /// `(0, 0)`.
    pub const ZERO: Self = Self::new(0, 0);
    /// `(1, 1)`.
    pub const ONE: Self = Self::new(1, 1);

    /// Construct from components.
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Both components set to `v`.
    pub const fn splat(v: i32) -> Self {
        Self::new(v, v)
    }

    /// Return `true` when either component is not positive.
    pub fn is_empty(self) -> bool {
        self.x <= 0 || self.y <= 0
    }

    /// Number of texels covered by an extent of this size; zero for empty extents.
    pub fn area(self) -> usize {
        if self.is_empty() {
            return 0;
        }
        (self.x as usize).saturating_mul(self.y as usize)
    }

    /// Swap the two components.
    pub fn transposed(self) -> Self {
        Self::new(self.y, self.x)
    }

    /// Component-wise division rounding up, for work-group counts.
    pub fn div_ceil(self, rhs: Self) -> Self {
        Self::new(
            div_ceil_i32(self.x, rhs.x.max(1)),
            div_ceil_i32(self.y, rhs.y.max(1)),
        )
    }

    /// Component-wise maximum.
    pub fn max(self, rhs: Self) -> Self {
        Self::new(self.x.max(rhs.x), self.y.max(rhs.y))
    }

    /// Component-wise minimum.
    pub fn min(self, rhs: Self) -> Self {
        Self::new(self.x.min(rhs.x), self.y.min(rhs.y))
    }

    /// Return `true` when `texel` lies inside `[0, self)`.
    pub fn contains(self, texel: Int2) -> bool {
        texel.x >= 0 && texel.y >= 0 && texel.x < self.x && texel.y < self.y
    }

    /// Floating point view of this vector.
    pub fn to_vec2(self) -> Vec2 {
        Vec2::new(f64::from(self.x), f64::from(self.y))
    }
}

fn div_ceil_i32(a: i32, b: i32) -> i32 {
    if a <= 0 {
        return 0;
    }
    (a + b - 1) / b
}

impl Add for Int2 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Int2 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<i32> for Int2 {
    type Output = Self;

    fn mul(self, rhs: i32) -> Self {
        Self::new(self.x * rhs, self.y * rhs)
    }
}

impl Div<i32> for Int2 {
    type Output = Self;

    fn div(self, rhs: i32) -> Self {
        Self::new(self.x / rhs, self.y / rhs)
    }
}

/// Four floats: a color, a padded vector or a broadcast scalar.
///
/// Float results keep their value in the first component; textures of a single channel read
/// back as `(v, 0, 0, 1)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Float4(pub [f32; 4]);

impl Float4 {
    /// All zero; the value of invalid results.
    pub const ZERO: Self = Self([0.0; 4]);
    /// All one.
    pub const ONE: Self = Self([1.0; 4]);

    /// Construct from components.
    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self([x, y, z, w])
    }

    /// All components set to `v`.
    pub const fn splat(v: f32) -> Self {
        Self([v; 4])
    }

    /// Opaque color from rgb.
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self([r, g, b, 1.0])
    }

    /// First component, the value of float results.
    pub fn x(self) -> f32 {
        self.0[0]
    }

    /// Alpha (fourth) component.
    pub fn w(self) -> f32 {
        self.0[3]
    }

    /// The first three components.
    pub fn xyz(self) -> [f32; 3] {
        [self.0[0], self.0[1], self.0[2]]
    }

    /// Replace the fourth component.
    pub fn with_w(self, w: f32) -> Self {
        Self([self.0[0], self.0[1], self.0[2], w])
    }

    /// Apply `f` to every component.
    pub fn map(self, f: impl Fn(f32) -> f32) -> Self {
        Self(self.0.map(f))
    }

    /// Component-wise maximum.
    pub fn max(self, rhs: Self) -> Self {
        Self(std::array::from_fn(|i| self.0[i].max(rhs.0[i])))
    }

    /// Component-wise minimum.
    pub fn min(self, rhs: Self) -> Self {
        Self(std::array::from_fn(|i| self.0[i].min(rhs.0[i])))
    }

    /// Linear interpolation `self + (rhs - self) * t`.
    pub fn lerp(self, rhs: Self, t: f32) -> Self {
        Self(std::array::from_fn(|i| {
            self.0[i] + (rhs.0[i] - self.0[i]) * t
        }))
    }

    /// Largest absolute component-wise difference to `rhs`.
    pub fn max_abs_diff(self, rhs: Self) -> f32 {
        (0..4)
            .map(|i| (self.0[i] - rhs.0[i]).abs())
            .fold(0.0, f32::max)
    }
}

impl From<f32> for Float4 {
    fn from(v: f32) -> Self {
        Self::new(v, v, v, v)
    }
}

impl From<[f32; 4]> for Float4 {
    fn from(v: [f32; 4]) -> Self {
        Self(v)
    }
}

impl Index<usize> for Float4 {
    type Output = f32;

    fn index(&self, i: usize) -> &f32 {
        &self.0[i]
    }
}

impl IndexMut<usize> for Float4 {
    fn index_mut(&mut self, i: usize) -> &mut f32 {
        &mut self.0[i]
    }
}

impl Add for Float4 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(std::array::from_fn(|i| self.0[i] + rhs.0[i]))
    }
}

impl AddAssign for Float4 {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sub for Float4 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(std::array::from_fn(|i| self.0[i] - rhs.0[i]))
    }
}

impl Mul for Float4 {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        Self(std::array::from_fn(|i| self.0[i] * rhs.0[i]))
    }
}

impl Mul<f32> for Float4 {
    type Output = Self;

    fn mul(self, rhs: f32) -> Self {
        self.map(|v| v * rhs)
    }
}

impl Div<f32> for Float4 {
    type Output = Self;

    fn div(self, rhs: f32) -> Self {
        self.map(|v| v / rhs)
    }
}

/// Axis-aligned integer rectangle `[min, max)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct IntRect {
    /// Inclusive lower corner.
    pub min: Int2,
    /// Exclusive upper corner.
    pub max: Int2,
}

impl IntRect {
    /// Construct from corners.
    pub const fn new(min: Int2, max: Int2) -> Self {
        Self { min, max }
    }

    /// Rectangle at the origin with the given size.
    pub const fn from_size(size: Int2) -> Self {
        Self::new(Int2::ZERO, size)
    }

    /// Extent of the rectangle; negative extents collapse to zero.
    pub fn size(self) -> Int2 {
        (self.max - self.min).max(Int2::ZERO)
    }

    /// Intersection with `other`, possibly empty.
    pub fn intersect(self, other: IntRect) -> IntRect {
        let min = self.min.max(other.min);
        let max = self.max.min(other.max).max(min);
        IntRect::new(min, max)
    }

    /// Return `true` when the rectangle covers no texel.
    pub fn is_empty(self) -> bool {
        self.size().is_empty()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
