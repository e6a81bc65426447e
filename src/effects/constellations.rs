use crossterm::event::{Event, MouseButton, MouseEvent, MouseEventKind};
use log::{debug, info};
use std::io::Write;

use super::Effect;
use crate::config::Options;
use crate::render::{Backdrop, Framebuffer};
use crate::sky::Universe;

const POINTER_IDLE_TIMEOUT: f32 = 2.0;

pub struct ConstellationEffect {
    universe: Universe,
    framebuffer: Framebuffer,
    backdrop: Option<Backdrop>,
    scale: f32,
    // None while the pointer is away
    pointer_idle: Option<f32>,
    output_buf: Vec<u8>,
}

impl ConstellationEffect {
    pub fn new(width: usize, height: usize, options: &Options) -> Self {
        let mut rng = match options.seed {
            Some(seed) => fastrand::Rng::with_seed(seed),
            None => fastrand::Rng::new(),
        };
        let backdrop = options.nebula.then(|| Backdrop::new(rng.u32(..)));

        let framebuffer = Framebuffer::new(width, height, options.scale, crate::get_bg_color());
        let (world_width, world_height) = framebuffer.world_size();
        let mut universe = Universe::new(options.config.clone(), world_width, world_height, rng);
        universe.init();
        debug!("surface {width}x{height} px, world {world_width:.0}x{world_height:.0}");

        Self {
            universe,
            framebuffer,
            backdrop,
            scale: options.scale,
            pointer_idle: None,
            output_buf: Vec::with_capacity(width * height * 20),
        }
    }

    fn to_world(&self, column: u16, row: u16) -> (f32, f32) {
        (
            (column as f32 + 0.5) * self.scale,
            (row as f32 * 2.0 + 1.0) * self.scale,
        )
    }

    fn write_overlay(&mut self) -> std::io::Result<()> {
        let stats = self.universe.stats();

        self.output_buf.extend_from_slice(b"\x1b[1;2H");
        self.output_buf.extend_from_slice(b"\x1b[38;2;220;220;230m");
        write!(self.output_buf, "Stars created: {}", stats.total_stars_created)?;

        self.output_buf.extend_from_slice(b"\x1b[2;2H");
        write!(self.output_buf, "Constellations: {}", stats.active_constellations)?;

        self.output_buf.extend_from_slice(b"\x1b[3;2H");
        write!(self.output_buf, "Alive: {}", stats.alive)?;

        self.output_buf.extend_from_slice(b"\x1b[0m");
        Ok(())
    }
}

impl Effect for ConstellationEffect {
    fn update(&mut self, dt: f32) {
        if let Some(idle) = self.pointer_idle.as_mut() {
            *idle += dt;
            if *idle > POINTER_IDLE_TIMEOUT {
                self.pointer_idle = None;
                self.universe.pointer_left();
            }
        }

        if let Some(backdrop) = self.backdrop.as_mut() {
            backdrop.update(dt);
        }
        self.universe.update(dt);
    }

    fn render<W: Write>(&mut self, out: &mut W) -> std::io::Result<()> {
        if let Some(backdrop) = self.backdrop.as_mut() {
            backdrop.paint(&mut self.framebuffer);
        }
        self.universe.render(&mut self.framebuffer);

        self.output_buf.clear();
        self.framebuffer.encode(&mut self.output_buf)?;
        self.write_overlay()?;

        out.write_all(&self.output_buf)?;
        out.flush()?;
        Ok(())
    }

    fn handle_event(&mut self, event: &Event) {
        match event {
            Event::Mouse(MouseEvent { kind, column, row, .. }) => {
                let (x, y) = self.to_world(*column, *row);
                match kind {
                    MouseEventKind::Moved => self.universe.pointer_moved(x, y),
                    MouseEventKind::Drag(MouseButton::Left) => self.universe.pointer_dragged(x, y),
                    MouseEventKind::Down(MouseButton::Left) => {
                        self.universe.pointer_moved(x, y);
                        self.universe.pointer_clicked(x, y);
                    }
                    _ => return,
                }
                self.pointer_idle = Some(0.0);
            }
            Event::FocusLost => {
                self.pointer_idle = None;
                self.universe.pointer_left();
            }
            _ => {}
        }
    }

    fn resize(&mut self, width: usize, height: usize) {
        self.framebuffer.resize(width, height);
        let (world_width, world_height) = self.framebuffer.world_size();
        self.universe.surface_resized(world_width, world_height);
        if let Some(backdrop) = self.backdrop.as_mut() {
            backdrop.invalidate();
        }
        self.output_buf.clear();
        info!("resized to {width}x{height} px, world {:?}", self.universe.bounds());
    }
}

impl Drop for ConstellationEffect {
    fn drop(&mut self) {
        info!(
            "{} stars created, {} alive, {} constellations active",
            self.universe.total_stars_created(),
            self.universe.star_count(),
            self.universe.active_constellations()
        );
    }
}
