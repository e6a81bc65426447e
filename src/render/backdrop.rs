use noise::{NoiseFn, Perlin};

use super::Framebuffer;
use crate::sky::palette::blend;
use crate::sky::Rgb;

const NEBULA_COLORS: [Rgb; 2] = [(70, 40, 120), (30, 70, 130)];
const DRIFT_SPEED: f64 = 0.03;
const MAX_ALPHA: f32 = 0.22;
// The cloud moves slowly, so the layer is only recomputed a few times a second
const REPAINT_INTERVAL: f32 = 0.25;

pub struct Backdrop {
    noise: Perlin,
    time: f64,
    since_repaint: f32,
    dirty: bool,
}

impl Backdrop {
    pub fn new(seed: u32) -> Self {
        Self {
            noise: Perlin::new(seed),
            time: 0.0,
            since_repaint: 0.0,
            dirty: true,
        }
    }

    pub fn update(&mut self, dt: f32) {
        self.time += dt as f64;
        self.since_repaint += dt;
        if self.since_repaint >= REPAINT_INTERVAL {
            self.dirty = true;
        }
    }

    pub fn invalidate(&mut self) {
        self.dirty = true;
    }

    // Intensity of the cloud at pixel `(x, y)`, in `0..=1`.
    fn density(&self, x: usize, y: usize) -> f32 {
        let t = self.time * DRIFT_SPEED;
        let nx = x as f64 * 0.02;
        let ny = y as f64 * 0.02;

        let broad = self.noise.get([nx, ny, t]);
        let detail = self.noise.get([nx * 3.0, ny * 3.0, t + 50.0]) * 0.35;
        ((broad + detail) as f32 - 0.15).clamp(0.0, 1.0)
    }

    fn hue(&self, x: usize, y: usize) -> Rgb {
        let mix = (self.noise.get([x as f64 * 0.01, y as f64 * 0.01, 200.0]) * 0.5 + 0.5) as f32;
        blend(NEBULA_COLORS[0], NEBULA_COLORS[1], mix)
    }

    pub fn paint(&mut self, framebuffer: &mut Framebuffer) {
        if !self.dirty {
            return;
        }
        self.dirty = false;
        self.since_repaint = 0.0;

        framebuffer.repaint_base(|x, y| {
            let density = self.density(x, y);
            (density > 0.0).then(|| (self.hue(x, y), density * MAX_ALPHA))
        });
    }
}
