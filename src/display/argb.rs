use crate::foundation::core::Color;
use crate::foundation::error::{CelError, CelResult};
use crate::foundation::gamma::Gamma;
use crate::foundation::rect::RectInt;
use crate::surface::Surface;

/// Byte order of an 8-bit premultiplied ARGB pixel in memory, chosen once
/// at startup from host endianness.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum PixelLayout {
    /// Alpha in the first byte, then R, G, B (big-endian hosts).
    Argb,
    /// B, G, R, then alpha in the last byte (little-endian hosts).
    Bgra,
}

impl PixelLayout {
    /// The layout the host compositor expects.
    pub fn host() -> Self {
        if cfg!(target_endian = "big") {
            Self::Argb
        } else {
            Self::Bgra
        }
    }

    /// Byte index of the alpha channel.
    pub fn alpha_index(self) -> usize {
        match self {
            Self::Argb => 0,
            Self::Bgra => 3,
        }
    }

    fn pack(self, r: u8, g: u8, b: u8, a: u8) -> [u8; 4] {
        match self {
            Self::Argb => [a, r, g, b],
            Self::Bgra => [b, g, r, a],
        }
    }
}

/// 8-bit premultiplied ARGB32 image, the display compositor's pixel type.
#[derive(Clone, Debug)]
pub struct ArgbImage {
    width: u32,
    height: u32,
    layout: PixelLayout,
    data: Vec<u8>,
}

impl ArgbImage {
    /// Allocate a transparent image.
    pub fn new(width: u32, height: u32, layout: PixelLayout) -> Self {
        Self {
            width,
            height,
            layout,
            data: vec![0; 4 * width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn layout(&self) -> PixelLayout {
        self.layout
    }

    /// Raw pixel bytes, row-major, 4 bytes per pixel.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Raw bytes of one pixel; `[0; 4]` outside the image.
    pub fn pixel(&self, x: i32, y: i32) -> [u8; 4] {
        match self.index(x, y) {
            Some(i) => [
                self.data[i],
                self.data[i + 1],
                self.data[i + 2],
                self.data[i + 3],
            ],
            None => [0; 4],
        }
    }

    /// Alpha byte at a pixel; 0 outside the image.
    pub fn alpha(&self, x: i32, y: i32) -> u8 {
        match self.index(x, y) {
            Some(i) => self.data[i + self.layout.alpha_index()],
            None => 0,
        }
    }

    pub(crate) fn set_pixel(&mut self, x: i32, y: i32, px: [u8; 4]) {
        if let Some(i) = self.index(x, y) {
            self.data[i..i + 4].copy_from_slice(&px);
        }
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return None;
        }
        Some(4 * (y as usize * self.width as usize + x as usize))
    }

    /// Pack a premultiplied color through the gamma curve.
    pub(crate) fn pack_color(&self, c: Color, gamma: &Gamma) -> [u8; 4] {
        let a = ((c.a * 255.0 + 0.5).clamp(0.0, 255.0)) as u8;
        self.layout
            .pack(gamma.encode_r(c.r), gamma.encode_g(c.g), gamma.encode_b(c.b), a)
    }
}

/// Convert a linear premultiplied surface to the display pixel format.
///
/// `surface` must match the requested dimensions exactly; a missing or
/// mismatched surface yields the diagnostic tile (diagonal cross, solid
/// border, inner dashed border) so the failure is visible on screen.
pub fn convert(
    surface: Option<&Surface>,
    width: i32,
    height: i32,
    layout: PixelLayout,
    gamma: &Gamma,
) -> ArgbImage {
    assert!(width > 0 && height > 0, "tile size must be positive");

    let mut image = ArgbImage::new(width as u32, height as u32, layout);
    if let Err(err) = convert_pixels(&mut image, surface, gamma) {
        tracing::warn!(%err, "tile conversion failed, painting diagnostic");
        paint_diagnostic(&mut image);
    }
    image
}

fn convert_pixels(
    image: &mut ArgbImage,
    surface: Option<&Surface>,
    gamma: &Gamma,
) -> CelResult<()> {
    let Some(s) = surface else {
        return Err(CelError::surface_unavailable("no surface pixels to read"));
    };
    if s.width() != image.width() || s.height() != image.height() {
        return Err(CelError::size_mismatch(format!(
            "surface is {}x{}, tile wants {}x{}",
            s.width(),
            s.height(),
            image.width(),
            image.height()
        )));
    }

    for y in 0..image.height() {
        let row = s.row(y);
        for (x, c) in row.iter().enumerate() {
            let px = image.pack_color(*c, gamma);
            image.set_pixel(x as i32, y as i32, px);
        }
    }
    Ok(())
}

/// Diagonal cross plus solid and dashed borders, for tiles whose render
/// failed.
fn paint_diagnostic(image: &mut ArgbImage) {
    use crate::display::context::PixelContext;

    let w = image.width() as i32;
    let h = image.height() as i32;
    let mut ctx = PixelContext::new(image);
    ctx.set_source_rgba(0.0, 0.0, 0.0, 1.0);

    ctx.stroke_line(0, 0, w, h);
    ctx.stroke_line(w, 0, 0, h);
    ctx.stroke_rect(RectInt::new(0, 0, w, h));

    ctx.set_dash(2, 2);
    ctx.stroke_rect(RectInt::new(4, 4, w - 4, h - 4));
}
