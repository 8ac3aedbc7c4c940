use kurbo::{Affine, Point};

use crate::foundation::core::Color;
use crate::foundation::rect::RectInt;
use crate::rasterize::polyspan::{Polyspan, WindingStyle};
use crate::surface::{BlendMethod, Surface};

/// One subpath-building primitive, with points in user space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ContourChunk {
    /// Close the current subpath.
    Close,
    /// Start a new subpath at `p1`.
    Move(Point),
    /// Straight segment to `p1`.
    Line(Point),
    /// Quadratic segment to `p1` with control `pp0`.
    Conic { p1: Point, pp0: Point },
    /// Cubic segment to `p1` with controls `pp0` and `pp1`.
    Cubic { p1: Point, pp0: Point, pp1: Point },
}

/// A 2D vector path plus the styling the contour renderer needs.
#[derive(Clone, Debug)]
pub struct Contour {
    pub chunks: Vec<ContourChunk>,
    pub invert: bool,
    pub antialias: bool,
    pub winding: WindingStyle,
    pub color: Color,
}

impl Contour {
    /// An empty, non-inverted, antialiased contour.
    pub fn new(color: Color) -> Self {
        Self {
            chunks: Vec::new(),
            invert: false,
            antialias: true,
            winding: WindingStyle::default(),
            color,
        }
    }

    pub fn move_to(&mut self, p: Point) -> &mut Self {
        self.chunks.push(ContourChunk::Move(p));
        self
    }

    pub fn line_to(&mut self, p: Point) -> &mut Self {
        self.chunks.push(ContourChunk::Line(p));
        self
    }

    pub fn conic_to(&mut self, p: Point, control: Point) -> &mut Self {
        self.chunks.push(ContourChunk::Conic { p1: p, pp0: control });
        self
    }

    pub fn cubic_to(&mut self, p: Point, c0: Point, c1: Point) -> &mut Self {
        self.chunks.push(ContourChunk::Cubic {
            p1: p,
            pp0: c0,
            pp1: c1,
        });
        self
    }

    pub fn close(&mut self) -> &mut Self {
        self.chunks.push(ContourChunk::Close);
        self
    }
}

/// Feed a chunk list through `matrix` into a polyspan.
pub fn build_polyspan(chunks: &[ContourChunk], matrix: Affine, out: &mut Polyspan) {
    for chunk in chunks {
        match *chunk {
            ContourChunk::Close => out.close(),
            ContourChunk::Move(p1) => {
                let p = matrix * p1;
                out.move_to(p.x, p.y);
            }
            ContourChunk::Line(p1) => {
                let p = matrix * p1;
                out.line_to(p.x, p.y);
            }
            ContourChunk::Conic { p1, pp0 } => {
                let p = matrix * p1;
                let c = matrix * pp0;
                out.conic_to(p.x, p.y, c.x, c.y);
            }
            ContourChunk::Cubic { p1, pp0, pp1 } => {
                let p = matrix * p1;
                let c0 = matrix * pp0;
                let c1 = matrix * pp1;
                out.cubic_to(p.x, p.y, c0.x, c0.y, c1.x, c1.y);
            }
        }
    }
}

/// Render a sorted polyspan onto a surface.
///
/// Scans the sorted marks once; the pen visits each pixel at most once per
/// call, and the output is independent of mark insertion order given an
/// equal sort.
#[allow(clippy::too_many_arguments)]
pub fn render_polyspan(
    surface: &mut Surface,
    polyspan: &Polyspan,
    invert: bool,
    antialias: bool,
    winding: WindingStyle,
    color: Color,
    opacity: f32,
    blend: BlendMethod,
) {
    debug_assert!(polyspan.is_sorted() || polyspan.covers().is_empty());

    let window = polyspan.window();
    let covers = polyspan.covers();
    let mut pen = surface.pen(color, opacity, blend);

    if covers.is_empty() {
        if invert && window.is_valid() {
            pen.move_to(window.minx, window.miny);
            pen.put_block(window.height(), window.width());
        }
        return;
    }

    let mut x = covers[0].x;
    let mut y = covers[0].y;

    // fill the area above the first mark, then the strip to its left
    if invert {
        pen.move_to(window.minx, window.miny);
        pen.put_block(y - window.miny, window.width());
        let l = x - window.minx;
        pen.move_to(window.minx, y);
        if l > 0 {
            pen.put_hline(l);
        }
    }

    let mut cover = 0.0f64;
    let n = covers.len();
    let mut i = 0;

    while i < n {
        y = covers[i].y;
        x = covers[i].x;
        pen.move_to(x, y);

        let mut area = covers[i].area;
        cover += covers[i].cover;
        i += 1;

        // accumulate every mark on this pixel
        while i < n && covers[i].y == y && covers[i].x == x {
            area += covers[i].area;
            cover += covers[i].cover;
            i += 1;
        }

        // draw the pixel from its covered area
        if area != 0.0 {
            let mut alpha = Polyspan::extract_alpha(cover - area, winding);
            if invert {
                alpha = 1.0 - alpha;
            }
            if antialias {
                if alpha > 0.0 {
                    pen.put_value_alpha(alpha as f32);
                }
            } else if alpha >= 0.5 {
                pen.put_value();
            }
            pen.inc_x();
            x += 1;
        }

        if i == n {
            break;
        }

        // no more live pixels on this row
        if covers[i].y != y {
            if invert {
                pen.put_hline(window.maxx - x);
                pen.move_to(window.minx, covers[i].y);
                pen.put_hline(covers[i].x - window.minx);
            }
            cover = 0.0;
            continue;
        }

        // span to the next mark from the running cover
        if x < covers[i].x {
            let mut alpha = Polyspan::extract_alpha(cover, winding);
            if invert {
                alpha = 1.0 - alpha;
            }
            if antialias {
                if alpha > 0.0 {
                    pen.put_hline_alpha(covers[i].x - x, alpha as f32);
                }
            } else if alpha >= 0.5 {
                pen.put_hline(covers[i].x - x);
            }
        }
    }

    // rest of the last row, and every row below
    if invert {
        pen.put_hline(window.maxx - x);
        pen.move_to(window.minx, y + 1);
        pen.put_block(window.maxy - y - 1, window.width());
    }
}

/// Scan-convert and blit a chunk list in one step: polyspan over the full
/// surface, transform, sort, render. Returns the touched pixel rectangle
/// for the non-inverted case, empty otherwise.
#[allow(clippy::too_many_arguments)]
pub fn render_contour(
    surface: &mut Surface,
    chunks: &[ContourChunk],
    invert: bool,
    antialias: bool,
    winding: WindingStyle,
    matrix: Affine,
    color: Color,
    opacity: f32,
    blend: BlendMethod,
) -> RectInt {
    let mut polyspan = Polyspan::new(0, 0, surface.width() as i32, surface.height() as i32);
    build_polyspan(chunks, matrix, &mut polyspan);
    polyspan.sort_marks();
    render_polyspan(
        surface, &polyspan, invert, antialias, winding, color, opacity, blend,
    );
    if invert {
        RectInt::default()
    } else {
        polyspan.calc_bounds()
    }
}
