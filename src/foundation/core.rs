use crate::foundation::error::{CelError, CelResult};

pub use kurbo::{Affine, Point, Rect, Vec2};

/// Linear-space color with four `f32` channels.
///
/// Surfaces store colors alpha-premultiplied.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Color {
    /// Red channel.
    pub r: f32,
    /// Green channel.
    pub g: f32,
    /// Blue channel.
    pub b: f32,
    /// Alpha channel.
    pub a: f32,
}

impl Color {
    /// Fully transparent black.
    pub const TRANSPARENT: Self = Self {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 0.0,
    };

    /// Construct from straight (non-premultiplied) channels.
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Premultiply color channels by alpha.
    pub fn premultiplied(self) -> Self {
        Self {
            r: self.r * self.a,
            g: self.g * self.a,
            b: self.b * self.a,
            a: self.a,
        }
    }
}

/// Frames-per-second represented as a rational `num/den`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Fps {
    /// Numerator (frames).
    pub num: u32,
    /// Denominator (seconds), must be non-zero.
    pub den: u32,
}

impl Fps {
    /// Create a validated FPS value.
    pub fn new(num: u32, den: u32) -> CelResult<Self> {
        if den == 0 {
            return Err(CelError::geometry("Fps den must be > 0"));
        }
        if num == 0 {
            return Err(CelError::geometry("Fps num must be > 0"));
        }
        Ok(Self { num, den })
    }

    /// Convert to floating-point FPS.
    pub fn as_f64(self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }

    /// Duration of one frame as an exact rational time.
    pub fn frame_duration(self) -> Time {
        Time::new(i64::from(self.den), i64::from(self.num))
    }
}

fn gcd(mut a: u128, mut b: u128) -> u128 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a.max(1)
}

/// Exact rational time in seconds.
///
/// Timeline positions are rebuilt as `base ± k·Δ` on every scheduling pass,
/// so frame keys must compare equal across passes. Values are kept
/// normalized: `den > 0`, `gcd(|num|, den) == 1`, and zero is `0/1`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Time {
    num: i64,
    den: i64,
}

impl Time {
    /// Time zero.
    pub const ZERO: Self = Self { num: 0, den: 1 };

    /// Construct `num/den` seconds. A zero denominator yields `Time::ZERO`.
    pub fn new(num: i64, den: i64) -> Self {
        Self::reduce(i128::from(num), i128::from(den))
    }

    /// Whole seconds.
    pub fn from_secs(secs: i64) -> Self {
        Self { num: secs, den: 1 }
    }

    fn reduce(mut num: i128, mut den: i128) -> Self {
        if den == 0 {
            return Self::ZERO;
        }
        if den < 0 {
            num = -num;
            den = -den;
        }
        let g = gcd(num.unsigned_abs(), den as u128) as i128;
        Self {
            num: (num / g) as i64,
            den: (den / g) as i64,
        }
    }

    /// True for exactly zero.
    pub fn is_zero(self) -> bool {
        self.num == 0
    }

    /// Seconds as `f64`, for weights and diagnostics only.
    pub fn as_secs_f64(self) -> f64 {
        self.num as f64 / self.den as f64
    }

    /// `self` scaled by an integer factor.
    pub fn scaled(self, k: i64) -> Self {
        Self::reduce(i128::from(self.num) * i128::from(k), i128::from(self.den))
    }

    /// Exact ratio `self / step` when `step` is non-zero, floored.
    pub fn div_floor(self, step: Time) -> i64 {
        if step.is_zero() {
            return 0;
        }
        let num = i128::from(self.num) * i128::from(step.den);
        let den = i128::from(self.den) * i128::from(step.num);
        let (num, den) = if den < 0 { (-num, -den) } else { (num, den) };
        let q = num.div_euclid(den);
        q as i64
    }

    /// Exact ratio `self / step` as `f64`.
    pub fn div_f64(self, step: Time) -> f64 {
        self.as_secs_f64() / step.as_secs_f64()
    }
}

impl std::ops::Add for Time {
    type Output = Time;

    fn add(self, rhs: Time) -> Time {
        Time::reduce(
            i128::from(self.num) * i128::from(rhs.den) + i128::from(rhs.num) * i128::from(self.den),
            i128::from(self.den) * i128::from(rhs.den),
        )
    }
}

impl std::ops::Sub for Time {
    type Output = Time;

    fn sub(self, rhs: Time) -> Time {
        self + Time {
            num: -rhs.num,
            den: rhs.den,
        }
    }
}

impl Ord for Time {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        let a = i128::from(self.num) * i128::from(other.den);
        let b = i128::from(other.num) * i128::from(self.den);
        a.cmp(&b)
    }
}

impl PartialOrd for Time {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Key of one cached frame: a timeline position rendered at a specific
/// viewport size.
///
/// Ordering is lexicographic `(time, width, height)`.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct FrameId {
    /// Timeline position.
    pub time: Time,
    /// Viewport width in pixels.
    pub width: u32,
    /// Viewport height in pixels.
    pub height: u32,
}

impl FrameId {
    /// Construct a frame key.
    pub fn new(time: Time, width: u32, height: u32) -> Self {
        Self {
            time,
            width,
            height,
        }
    }

    /// Same viewport, different timeline position.
    pub fn at_time(self, time: Time) -> Self {
        Self { time, ..self }
    }
}

/// One entry of the onion-skin draw list: a frame and its compositing alpha.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameDesc {
    /// Frame to draw.
    pub id: FrameId,
    /// Compositing alpha, normalized so the stack sums to at most 1.
    pub alpha: f32,
}

impl FrameDesc {
    /// Construct a draw-list entry.
    pub fn new(id: FrameId, alpha: f32) -> Self {
        Self { id, alpha }
    }
}
