use smallvec::SmallVec;

/// List of pixel rectangles, small enough to stay inline for the common
/// "viewport minus a few tiles" case.
pub type RectList = SmallVec<[RectInt; 8]>;

/// Axis-aligned integer pixel rectangle, half-open: `[minx, maxx) × [miny, maxy)`.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct RectInt {
    pub minx: i32,
    pub miny: i32,
    pub maxx: i32,
    pub maxy: i32,
}

impl RectInt {
    /// Construct from corner coordinates.
    pub fn new(minx: i32, miny: i32, maxx: i32, maxy: i32) -> Self {
        Self {
            minx,
            miny,
            maxx,
            maxy,
        }
    }

    /// Construct from origin and size.
    pub fn from_wh(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self::new(x, y, x + w, y + h)
    }

    pub fn width(self) -> i32 {
        self.maxx - self.minx
    }

    pub fn height(self) -> i32 {
        self.maxy - self.miny
    }

    /// True when the rectangle has positive area.
    pub fn is_valid(self) -> bool {
        self.minx < self.maxx && self.miny < self.maxy
    }

    /// Intersection; may be degenerate.
    pub fn intersect(self, other: Self) -> Self {
        Self {
            minx: self.minx.max(other.minx),
            miny: self.miny.max(other.miny),
            maxx: self.maxx.min(other.maxx),
            maxy: self.maxy.min(other.maxy),
        }
    }

    /// True when the intersection has positive area.
    pub fn intersects(self, other: Self) -> bool {
        self.intersect(other).is_valid()
    }

    /// True when `other` lies entirely inside `self`.
    pub fn contains(self, other: Self) -> bool {
        self.minx <= other.minx
            && self.miny <= other.miny
            && self.maxx >= other.maxx
            && self.maxy >= other.maxy
    }

    /// Translate by whole pixels.
    pub fn translated(self, dx: i32, dy: i32) -> Self {
        Self::new(self.minx + dx, self.miny + dy, self.maxx + dx, self.maxy + dy)
    }

    /// Grow outward to the surrounding `step`-aligned grid cell.
    pub fn snapped_out(self, step: i32) -> Self {
        Self {
            minx: int_floor(self.minx, step),
            miny: int_floor(self.miny, step),
            maxx: int_ceil(self.maxx, step),
            maxy: int_ceil(self.maxy, step),
        }
    }

    /// Byte size of a 4-byte-per-pixel image covering this rectangle.
    pub fn image_size(self) -> u64 {
        if !self.is_valid() {
            return 0;
        }
        4 * self.width() as u64 * self.height() as u64
    }
}

/// Largest multiple of `base` that is `<= x`.
pub fn int_floor(x: i32, base: i32) -> i32 {
    let m = x % base;
    if m < 0 {
        x - base - m
    } else if m > 0 {
        x - m
    } else {
        x
    }
}

/// Smallest multiple of `base` that is `>= x`.
pub fn int_ceil(x: i32, base: i32) -> i32 {
    let m = x % base;
    if m > 0 {
        x + base - m
    } else if m < 0 {
        x - m
    } else {
        x
    }
}

/// Remove `sub` from every rectangle in `rects`.
///
/// Each affected rectangle is replaced by up to four fragments (top,
/// bottom, left, right strips). Fragment order is deterministic.
pub fn rects_subtract(rects: &mut RectList, sub: RectInt) {
    if !sub.is_valid() {
        return;
    }
    let mut out = RectList::new();
    for &r in rects.iter() {
        if !r.intersects(sub) {
            out.push(r);
            continue;
        }
        let top = RectInt::new(r.minx, r.miny, r.maxx, sub.miny.min(r.maxy));
        if top.is_valid() {
            out.push(top);
        }
        let bottom = RectInt::new(r.minx, sub.maxy.max(r.miny), r.maxx, r.maxy);
        if bottom.is_valid() {
            out.push(bottom);
        }
        let mid_miny = r.miny.max(sub.miny);
        let mid_maxy = r.maxy.min(sub.maxy);
        let left = RectInt::new(r.minx, mid_miny, sub.minx.min(r.maxx), mid_maxy);
        if left.is_valid() {
            out.push(left);
        }
        let right = RectInt::new(sub.maxx.max(r.minx), mid_miny, r.maxx, mid_maxy);
        if right.is_valid() {
            out.push(right);
        }
    }
    *rects = out;
}

fn try_merge(a: RectInt, b: RectInt) -> Option<RectInt> {
    if a.contains(b) {
        return Some(a);
    }
    if b.contains(a) {
        return Some(b);
    }
    // same column span, touching or overlapping rows
    if a.minx == b.minx && a.maxx == b.maxx && a.miny <= b.maxy && b.miny <= a.maxy {
        return Some(RectInt::new(
            a.minx,
            a.miny.min(b.miny),
            a.maxx,
            a.maxy.max(b.maxy),
        ));
    }
    // same row span, touching or overlapping columns
    if a.miny == b.miny && a.maxy == b.maxy && a.minx <= b.maxx && b.minx <= a.maxx {
        return Some(RectInt::new(
            a.minx.min(b.minx),
            a.miny,
            a.maxx.max(b.maxx),
            a.maxy,
        ));
    }
    None
}

/// Merge rectangles whose union is itself a rectangle, until no pair merges.
pub fn rects_merge(rects: &mut RectList) {
    let mut merged = true;
    while merged {
        merged = false;
        'outer: for i in 0..rects.len() {
            for j in (i + 1)..rects.len() {
                if let Some(u) = try_merge(rects[i], rects[j]) {
                    rects[i] = u;
                    rects.remove(j);
                    merged = true;
                    break 'outer;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    #[test]
    fn snapping_covers_negative_coordinates() {
        assert_eq!(int_floor(-5, 64), -64);
        assert_eq!(int_ceil(-5, 64), 0);
        assert_eq!(int_floor(65, 64), 64);
        assert_eq!(int_ceil(65, 64), 128);
        assert_eq!(int_floor(64, 64), 64);
        assert_eq!(int_ceil(64, 64), 64);

        let r = RectInt::new(-5, 3, 70, 64).snapped_out(64);
        assert_eq!(r, RectInt::new(-64, 0, 128, 64));
    }

    #[test]
    fn subtract_carves_a_hole_into_four_fragments() {
        let mut rects: RectList = smallvec![RectInt::new(0, 0, 100, 100)];
        rects_subtract(&mut rects, RectInt::new(25, 25, 75, 75));
        assert_eq!(rects.len(), 4);
        let total: i64 = rects
            .iter()
            .map(|r| i64::from(r.width()) * i64::from(r.height()))
            .sum();
        assert_eq!(total, 100 * 100 - 50 * 50);
        for r in &rects {
            assert!(!r.intersects(RectInt::new(25, 25, 75, 75)));
        }
    }

    #[test]
    fn subtract_of_disjoint_rect_is_noop() {
        let mut rects: RectList = smallvec![RectInt::new(0, 0, 10, 10)];
        rects_subtract(&mut rects, RectInt::new(20, 20, 30, 30));
        assert_eq!(rects.as_slice(), &[RectInt::new(0, 0, 10, 10)]);
    }

    #[test]
    fn merge_rebuilds_split_rows() {
        let mut rects: RectList = smallvec![
            RectInt::new(0, 0, 100, 25),
            RectInt::new(0, 75, 100, 100),
            RectInt::new(0, 25, 100, 75),
        ];
        rects_merge(&mut rects);
        assert_eq!(rects.as_slice(), &[RectInt::new(0, 0, 100, 100)]);
    }

    #[test]
    fn merge_keeps_non_rectangular_unions_apart() {
        let mut rects: RectList = smallvec![RectInt::new(0, 0, 10, 10), RectInt::new(10, 5, 20, 15)];
        rects_merge(&mut rects);
        assert_eq!(rects.len(), 2);
    }

    #[test]
    fn image_size_is_4_bytes_per_pixel() {
        assert_eq!(RectInt::from_wh(0, 0, 64, 64).image_size(), 4 * 64 * 64);
        assert_eq!(RectInt::new(5, 5, 5, 64).image_size(), 0);
    }
}
