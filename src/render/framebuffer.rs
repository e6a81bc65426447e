use std::io::Write;

use crate::sky::{Canvas, Rgb};

type Pixel = (f32, f32, f32);

// Dimmest share of a circle's alpha given to its centre pixel, so a star
// smaller than a pixel still shows.
const MIN_DOT_COVERAGE: f32 = 0.5;

pub struct Framebuffer {
    width: usize,
    height: usize,
    // World units per pixel.
    scale: f32,
    background: Pixel,
    // What `clear` resets to: the background plus anything painted under the scene.
    base: Vec<Pixel>,
    pixels: Vec<Pixel>,
}

fn to_pixel(color: Rgb) -> Pixel {
    (color.0 as f32, color.1 as f32, color.2 as f32)
}

fn quantize(pixel: Pixel) -> Rgb {
    (
        pixel.0.round().clamp(0.0, 255.0) as u8,
        pixel.1.round().clamp(0.0, 255.0) as u8,
        pixel.2.round().clamp(0.0, 255.0) as u8,
    )
}

fn mix(pixel: &mut Pixel, color: Pixel, alpha: f32) {
    let alpha = alpha.clamp(0.0, 1.0);
    pixel.0 += (color.0 - pixel.0) * alpha;
    pixel.1 += (color.1 - pixel.1) * alpha;
    pixel.2 += (color.2 - pixel.2) * alpha;
}

impl Framebuffer {
    pub fn new(width: usize, height: usize, scale: f32, background: Rgb) -> Self {
        let background = to_pixel(background);
        Self {
            width,
            height,
            scale,
            background,
            base: vec![background; width * height],
            pixels: vec![background; width * height],
        }
    }

    pub fn resize(&mut self, width: usize, height: usize) {
        self.width = width;
        self.height = height;
        self.base = vec![self.background; width * height];
        self.pixels = vec![self.background; width * height];
    }

    #[cfg(test)]
    pub fn width(&self) -> usize {
        self.width
    }

    #[cfg(test)]
    pub fn height(&self) -> usize {
        self.height
    }

    pub fn world_size(&self) -> (f32, f32) {
        (self.width as f32 * self.scale, self.height as f32 * self.scale)
    }

    #[cfg(test)]
    pub fn pixel(&self, x: usize, y: usize) -> Option<Rgb> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(quantize(self.pixels[y * self.width + x]))
    }

    // Rebuilds the base layer: background, then whatever `shade` returns
    // for each pixel blended on top.
    pub fn repaint_base(&mut self, mut shade: impl FnMut(usize, usize) -> Option<(Rgb, f32)>) {
        for y in 0..self.height {
            for x in 0..self.width {
                let pixel = &mut self.base[y * self.width + x];
                *pixel = self.background;
                if let Some((color, alpha)) = shade(x, y) {
                    mix(pixel, to_pixel(color), alpha);
                }
            }
        }
    }

    fn blend(&mut self, x: i32, y: i32, color: Pixel, alpha: f32) {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height || alpha <= 0.0 {
            return;
        }
        let idx = y as usize * self.width + x as usize;
        mix(&mut self.pixels[idx], color, alpha);
    }

    fn to_surface(&self, x: f32, y: f32) -> (f32, f32) {
        (x / self.scale, y / self.scale)
    }

    // Background paints the top pixel of a cell, `▄` in the foreground colour the bottom one
    pub fn encode(&self, out: &mut Vec<u8>) -> std::io::Result<()> {
        out.extend_from_slice(b"\x1b[H");

        let mut prev_top: Option<Rgb> = None;
        let mut prev_bot: Option<Rgb> = None;

        for y in (0..self.height).step_by(2) {
            for x in 0..self.width {
                let top_idx = y * self.width + x;
                let bot_idx = if y + 1 < self.height {
                    (y + 1) * self.width + x
                } else {
                    top_idx
                };

                let top = quantize(self.pixels[top_idx]);
                let bot = quantize(self.pixels[bot_idx]);

                if prev_top != Some(top) {
                    write!(out, "\x1b[48;2;{};{};{}m", top.0, top.1, top.2)?;
                    prev_top = Some(top);
                }
                if prev_bot != Some(bot) {
                    write!(out, "\x1b[38;2;{};{};{}m", bot.0, bot.1, bot.2)?;
                    prev_bot = Some(bot);
                }

                out.extend_from_slice("▄".as_bytes());
            }
            out.extend_from_slice(b"\x1b[0m");
            prev_top = None;
            prev_bot = None;
            if y + 2 < self.height {
                out.extend_from_slice(b"\r\n");
            }
        }
        Ok(())
    }
}

impl Canvas for Framebuffer {
    fn clear(&mut self) {
        self.pixels.copy_from_slice(&self.base);
    }

    fn fill_circle(&mut self, x: f32, y: f32, radius: f32, color: Rgb, alpha: f32) {
        let (cx, cy) = self.to_surface(x, y);
        let r = radius / self.scale;
        let color = to_pixel(color);

        let center = (cx.floor() as i32, cy.floor() as i32);
        if r < 0.5 {
            let coverage = (r * 2.0).max(MIN_DOT_COVERAGE);
            self.blend(center.0, center.1, color, alpha * coverage);
            return;
        }

        let reach = r.ceil() as i32 + 1;
        for py in center.1 - reach..=center.1 + reach {
            for px in center.0 - reach..=center.0 + reach {
                let dx = px as f32 + 0.5 - cx;
                let dy = py as f32 + 0.5 - cy;
                let dist = (dx * dx + dy * dy).sqrt();
                // Antialiased edge over one pixel
                let coverage = (r + 0.5 - dist).clamp(0.0, 1.0);
                self.blend(px, py, color, alpha * coverage);
            }
        }
    }

    fn radial_glow(&mut self, x: f32, y: f32, inner_radius: f32, outer_radius: f32, color: Rgb, alpha: f32) {
        let (cx, cy) = self.to_surface(x, y);
        let inner = inner_radius / self.scale;
        let outer = outer_radius / self.scale;
        if outer <= 0.0 || outer <= inner {
            return;
        }
        let color = to_pixel(color);

        let reach = outer.ceil() as i32;
        let (ix, iy) = (cx.floor() as i32, cy.floor() as i32);
        for py in iy - reach..=iy + reach {
            for px in ix - reach..=ix + reach {
                let dx = px as f32 + 0.5 - cx;
                let dy = py as f32 + 0.5 - cy;
                let dist = (dx * dx + dy * dy).sqrt();
                if dist >= outer {
                    continue;
                }
                let falloff = if dist <= inner {
                    1.0
                } else {
                    1.0 - (dist - inner) / (outer - inner)
                };
                self.blend(px, py, color, alpha * falloff * falloff);
            }
        }
    }

    fn stroke_line(&mut self, from: (f32, f32), to: (f32, f32), width: f32, color: Rgb, alpha: f32) {
        let (x0, y0) = self.to_surface(from.0, from.1);
        let (x1, y1) = self.to_surface(to.0, to.1);
        let color = to_pixel(color);
        // Lines are thinner than a pixel at any sensible scale; width only dims them
        let alpha = alpha * (width / self.scale * 4.0).clamp(0.5, 1.0);

        let steps = (x1 - x0).abs().max((y1 - y0).abs()).ceil().max(1.0) as i32;
        let mut last = None;
        for i in 0..=steps {
            let t = i as f32 / steps as f32;
            let px = (x0 + (x1 - x0) * t).floor() as i32;
            let py = (y0 + (y1 - y0) * t).floor() as i32;
            if last == Some((px, py)) {
                continue;
            }
            last = Some((px, py));
            self.blend(px, py, color, alpha);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit(fb: &Framebuffer) -> usize {
        (0..fb.height())
            .flat_map(|y| (0..fb.width()).map(move |x| (x, y)))
            .filter(|&(x, y)| fb.pixel(x, y) != Some((0, 0, 0)))
            .count()
    }

    #[test]
    fn world_size_follows_scale() {
        let fb = Framebuffer::new(80, 48, 8.0, (0, 0, 0));
        assert_eq!(fb.world_size(), (640.0, 384.0));
    }

    #[test]
    fn tiny_star_still_lights_one_pixel() {
        let mut fb = Framebuffer::new(10, 10, 8.0, (0, 0, 0));
        fb.fill_circle(20.0, 20.0, 0.3, (255, 255, 255), 1.0);

        assert_eq!(lit(&fb), 1);
        let (r, g, b) = fb.pixel(2, 2).expect("in bounds");
        assert_eq!((r, g, b), (128, 128, 128));
    }

    #[test]
    fn large_circle_covers_its_area() {
        let mut fb = Framebuffer::new(20, 20, 1.0, (0, 0, 0));
        fb.fill_circle(10.0, 10.0, 3.0, (255, 0, 0), 1.0);

        assert_eq!(fb.pixel(10, 10), Some((255, 0, 0)));
        assert_eq!(fb.pixel(0, 0), Some((0, 0, 0)));
        let area = lit(&fb);
        assert!((25..=45).contains(&area), "area = {area}");
    }

    #[test]
    fn glow_fades_outwards() {
        let mut fb = Framebuffer::new(40, 40, 1.0, (0, 0, 0));
        fb.radial_glow(20.0, 20.0, 1.0, 10.0, (0, 0, 255), 1.0);

        let center = fb.pixel(20, 20).map(|c| c.2).unwrap_or_default();
        let mid = fb.pixel(25, 20).map(|c| c.2).unwrap_or_default();
        let edge = fb.pixel(29, 20).map(|c| c.2).unwrap_or_default();
        assert!(center > mid && mid > edge, "{center} {mid} {edge}");
        assert_eq!(fb.pixel(35, 20), Some((0, 0, 0)));
    }

    #[test]
    fn line_touches_both_endpoints_and_clips() {
        let mut fb = Framebuffer::new(16, 16, 1.0, (0, 0, 0));
        fb.stroke_line((1.0, 1.0), (40.0, 8.0), 4.0, (0, 255, 0), 1.0);

        assert_eq!(fb.pixel(1, 1), Some((0, 255, 0)));
        assert!(lit(&fb) >= 14);
    }

    #[test]
    fn clear_restores_base_layer() {
        let mut fb = Framebuffer::new(4, 4, 1.0, (10, 10, 10));
        fb.repaint_base(|x, _| (x == 0).then_some(((110, 10, 10), 1.0)));
        fb.fill_circle(2.0, 2.0, 1.0, (255, 255, 255), 1.0);
        fb.clear();

        assert_eq!(fb.pixel(0, 3), Some((110, 10, 10)));
        assert_eq!(fb.pixel(2, 2), Some((10, 10, 10)));
    }

    #[test]
    fn encodes_half_blocks_with_colour_runs() {
        let mut fb = Framebuffer::new(3, 4, 1.0, (0, 0, 0));
        fb.fill_circle(0.5, 1.5, 0.4, (255, 0, 0), 1.0);

        let mut out = Vec::new();
        fb.encode(&mut out).expect("write to vec");
        let text = String::from_utf8(out).expect("utf8");

        assert!(text.starts_with("\x1b[H"));
        assert_eq!(text.matches('▄').count(), 6);
        assert_eq!(text.matches("\r\n").count(), 1);
        assert_eq!(text.matches("\x1b[0m").count(), 2);
        // Red bottom pixel in the first cell, then the colour changes back once
        assert!(text.contains("\x1b[38;2;204;0;0m"));
        assert_eq!(text.matches("\x1b[38;2;0;0;0m").count(), 2);
    }

    #[test]
    fn resize_resets_both_layers() {
        let mut fb = Framebuffer::new(4, 4, 2.0, (5, 5, 5));
        fb.resize(6, 2);
        assert_eq!((fb.width(), fb.height()), (6, 2));
        assert_eq!(fb.pixel(5, 1), Some((5, 5, 5)));
        assert_eq!(fb.pixel(6, 0), None);
    }
}
