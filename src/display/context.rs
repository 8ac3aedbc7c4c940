use crate::display::argb::ArgbImage;
use crate::foundation::rect::RectInt;

/// Compositing operator for [`PixelContext`] writes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Operator {
    /// Premultiplied source-over.
    #[default]
    SourceOver,
    /// Saturating additive.
    Add,
}

fn mul_div255(x: u16, y: u16) -> u8 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u8
}

/// Minimal 2D drawing context over an [`ArgbImage`]: translation, one clip
/// rectangle, solid sources, image paints, 1-pixel strokes with optional
/// dashes. Covers exactly what the canvas compositor consumes.
pub struct PixelContext<'a> {
    image: &'a mut ArgbImage,
    dx: i32,
    dy: i32,
    clip: Option<RectInt>,
    operator: Operator,
    source: [u8; 4],
    dash: Option<(i32, i32)>,
    saved: Vec<ContextState>,
}

#[derive(Clone, Copy)]
struct ContextState {
    dx: i32,
    dy: i32,
    clip: Option<RectInt>,
    operator: Operator,
    source: [u8; 4],
    dash: Option<(i32, i32)>,
}

impl<'a> PixelContext<'a> {
    /// Wrap an image with identity transform, no clip, source-over, and an
    /// opaque black source.
    pub fn new(image: &'a mut ArgbImage) -> Self {
        let source = pack_premul(image, 0.0, 0.0, 0.0, 1.0);
        Self {
            image,
            dx: 0,
            dy: 0,
            clip: None,
            operator: Operator::SourceOver,
            source,
            dash: None,
            saved: Vec::new(),
        }
    }

    /// Push the drawing state (transform, clip, operator, source, dash).
    pub fn save(&mut self) {
        self.saved.push(ContextState {
            dx: self.dx,
            dy: self.dy,
            clip: self.clip,
            operator: self.operator,
            source: self.source,
            dash: self.dash,
        });
    }

    /// Pop the drawing state pushed by the matching [`save`](Self::save).
    pub fn restore(&mut self) {
        if let Some(s) = self.saved.pop() {
            self.dx = s.dx;
            self.dy = s.dy;
            self.clip = s.clip;
            self.operator = s.operator;
            self.source = s.source;
            self.dash = s.dash;
        }
    }

    /// Shift subsequent user coordinates by whole pixels.
    pub fn translate(&mut self, dx: i32, dy: i32) {
        self.dx += dx;
        self.dy += dy;
    }

    pub fn set_operator(&mut self, operator: Operator) {
        self.operator = operator;
    }

    /// Set a solid source from straight (non-premultiplied) channels.
    pub fn set_source_rgba(&mut self, r: f32, g: f32, b: f32, a: f32) {
        self.source = pack_premul(self.image, r, g, b, a);
    }

    /// Dash pattern for strokes: `on` lit pixels, `off` skipped, repeating.
    pub fn set_dash(&mut self, on: i32, off: i32) {
        self.dash = (on > 0 && off > 0).then_some((on, off));
    }

    pub fn clear_dash(&mut self) {
        self.dash = None;
    }

    /// Intersect the clip with a rectangle in user coordinates.
    pub fn clip_rect(&mut self, rect: RectInt) {
        let dev = rect.translated(self.dx, self.dy);
        self.clip = Some(match self.clip {
            Some(c) => c.intersect(dev),
            None => dev,
        });
    }

    pub fn reset_clip(&mut self) {
        self.clip = None;
    }

    fn blend_at(&mut self, x: i32, y: i32, src: [u8; 4]) {
        if let Some(c) = self.clip {
            if x < c.minx || y < c.miny || x >= c.maxx || y >= c.maxy {
                return;
            }
        }
        let dst = self.image.pixel(x, y);
        let ai = self.image.layout().alpha_index();
        let out = match self.operator {
            Operator::SourceOver => {
                let inv = 255 - u16::from(src[ai]);
                let mut out = [0u8; 4];
                for i in 0..4 {
                    out[i] = src[i].saturating_add(mul_div255(u16::from(dst[i]), inv));
                }
                out
            }
            Operator::Add => {
                let mut out = [0u8; 4];
                for i in 0..4 {
                    out[i] = dst[i].saturating_add(src[i]);
                }
                out
            }
        };
        self.image.set_pixel(x, y, out);
    }

    fn scaled_source(src: [u8; 4], alpha: f32) -> [u8; 4] {
        let k = ((alpha.clamp(0.0, 1.0) * 255.0) + 0.5) as u16;
        let mut out = [0u8; 4];
        for i in 0..4 {
            out[i] = mul_div255(u16::from(src[i]), k);
        }
        out
    }

    /// Fill a rectangle (user coordinates) with the current source.
    pub fn fill_rect(&mut self, rect: RectInt) {
        let dev = rect.translated(self.dx, self.dy);
        let src = self.source;
        for y in dev.miny..dev.maxy {
            for x in dev.minx..dev.maxx {
                self.blend_at(x, y, src);
            }
        }
    }

    /// Stroke a 1-pixel rectangle outline, honoring the dash pattern.
    pub fn stroke_rect(&mut self, rect: RectInt) {
        if !rect.is_valid() {
            return;
        }
        let mut phase = 0;
        phase = self.dashed_hline(rect.minx, rect.maxx, rect.miny, phase);
        phase = self.dashed_vline(rect.maxx - 1, rect.miny + 1, rect.maxy, phase);
        phase = self.dashed_hline_rev(rect.minx, rect.maxx - 1, rect.maxy - 1, phase);
        self.dashed_vline_rev(rect.minx, rect.miny + 1, rect.maxy - 1, phase);
    }

    /// Stroke a 1-pixel line between two user-space points.
    pub fn stroke_line(&mut self, x0: i32, y0: i32, x1: i32, y1: i32) {
        let steps = (x1 - x0).abs().max((y1 - y0).abs());
        let src = self.source;
        if steps == 0 {
            self.blend_at(x0 + self.dx, y0 + self.dy, src);
            return;
        }
        for i in 0..=steps {
            let t = f64::from(i) / f64::from(steps);
            let x = x0 + ((f64::from(x1 - x0) * t).round() as i32);
            let y = y0 + ((f64::from(y1 - y0) * t).round() as i32);
            self.blend_at(x + self.dx, y + self.dy, src);
        }
    }

    fn dash_on(&self, phase: i32) -> bool {
        match self.dash {
            None => true,
            Some((on, off)) => phase % (on + off) < on,
        }
    }

    fn dashed_hline(&mut self, x0: i32, x1: i32, y: i32, mut phase: i32) -> i32 {
        let src = self.source;
        for x in x0..x1 {
            if self.dash_on(phase) {
                self.blend_at(x + self.dx, y + self.dy, src);
            }
            phase += 1;
        }
        phase
    }

    fn dashed_hline_rev(&mut self, x0: i32, x1: i32, y: i32, mut phase: i32) -> i32 {
        let src = self.source;
        for x in (x0..x1).rev() {
            if self.dash_on(phase) {
                self.blend_at(x + self.dx, y + self.dy, src);
            }
            phase += 1;
        }
        phase
    }

    fn dashed_vline(&mut self, x: i32, y0: i32, y1: i32, mut phase: i32) -> i32 {
        let src = self.source;
        for y in y0..y1 {
            if self.dash_on(phase) {
                self.blend_at(x + self.dx, y + self.dy, src);
            }
            phase += 1;
        }
        phase
    }

    fn dashed_vline_rev(&mut self, x: i32, y0: i32, y1: i32, mut phase: i32) -> i32 {
        let src = self.source;
        for y in (y0..y1).rev() {
            if self.dash_on(phase) {
                self.blend_at(x + self.dx, y + self.dy, src);
            }
            phase += 1;
        }
        phase
    }

    /// Paint another image positioned at `(x, y)` in user coordinates.
    pub fn paint_image(&mut self, img: &ArgbImage, x: i32, y: i32) {
        self.paint_image_with_alpha(img, x, y, 1.0);
    }

    /// Paint another image scaled by `alpha`.
    pub fn paint_image_with_alpha(&mut self, img: &ArgbImage, x: i32, y: i32, alpha: f32) {
        let ox = x + self.dx;
        let oy = y + self.dy;
        for sy in 0..img.height() as i32 {
            for sx in 0..img.width() as i32 {
                let src = Self::scaled_source(img.pixel(sx, sy), alpha);
                self.blend_at(ox + sx, oy + sy, src);
            }
        }
    }

    /// Paint the current solid source over a rectangle, scaled by `alpha`.
    pub fn paint_rect_with_alpha(&mut self, rect: RectInt, alpha: f32) {
        let dev = rect.translated(self.dx, self.dy);
        let src = Self::scaled_source(self.source, alpha);
        for y in dev.miny..dev.maxy {
            for x in dev.minx..dev.maxx {
                self.blend_at(x, y, src);
            }
        }
    }
}

fn pack_premul(image: &ArgbImage, r: f32, g: f32, b: f32, a: f32) -> [u8; 4] {
    let a = a.clamp(0.0, 1.0);
    let q = |v: f32| ((v.clamp(0.0, 1.0) * a * 255.0) + 0.5) as u8;
    let ab = ((a * 255.0) + 0.5) as u8;
    match image.layout() {
        crate::display::argb::PixelLayout::Argb => [ab, q(r), q(g), q(b)],
        crate::display::argb::PixelLayout::Bgra => [q(b), q(g), q(r), ab],
    }
}
