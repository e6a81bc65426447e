mod constellation;

use std::collections::HashSet;
use std::f32::consts::PI;

use log::{debug, trace};

use super::arena::{StarArena, StarId};
use super::canvas::Canvas;
use super::scheduler::Scheduler;
use super::star::{random_max_size, Star};
use crate::config::Config;

pub use constellation::ConstellationId;
use constellation::Task;

#[derive(Debug, Clone, Copy, Default)]
struct Pointer {
    x: f32,
    y: f32,
    over_surface: bool,
}

// Counters for display. Refreshed on notable events and occasionally on a
// tick, so they can lag the live values slightly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub total_stars_created: u64,
    pub active_constellations: usize,
    pub alive: usize,
}

pub struct Universe {
    config: Config,
    width: f32,
    height: f32,
    stars: StarArena,
    rng: fastrand::Rng,
    now: f64,
    star_generation_timer: f32,
    pointer: Pointer,
    scheduler: Scheduler<Task>,
    total_stars_created: u64,
    active_constellations: HashSet<ConstellationId>,
    next_constellation: u64,
    stats: Stats,
}

impl Universe {
    pub fn new(config: Config, width: f32, height: f32, rng: fastrand::Rng) -> Self {
        Self {
            config,
            width,
            height,
            stars: StarArena::new(),
            rng,
            now: 0.0,
            star_generation_timer: 0.0,
            pointer: Pointer::default(),
            scheduler: Scheduler::new(),
            total_stars_created: 0,
            active_constellations: HashSet::new(),
            next_constellation: 0,
            stats: Stats::default(),
        }
    }

    pub fn init(&mut self) {
        for _ in 0..self.config.initial_stars {
            self.create_random_star();
        }
        self.refresh_stats();
        debug!("universe initialised with {} stars", self.stars.len());
    }

    pub fn bounds(&self) -> (f32, f32) {
        (self.width, self.height)
    }

    pub fn stats(&self) -> Stats {
        self.stats
    }

    pub fn star_count(&self) -> usize {
        self.stars.len()
    }

    pub fn total_stars_created(&self) -> u64 {
        self.total_stars_created
    }

    pub fn active_constellations(&self) -> usize {
        self.active_constellations.len()
    }

    fn refresh_stats(&mut self) {
        self.stats = Stats {
            total_stars_created: self.total_stars_created,
            active_constellations: self.active_constellations.len(),
            alive: self.stars.len(),
        };
    }

    fn at_capacity(&self) -> bool {
        self.stars.len() >= self.config.max_stars
    }

    // Adds an already-built star. Dropped at capacity.
    pub fn insert_star(&mut self, star: Star) -> Option<StarId> {
        if self.at_capacity() {
            trace!("population at capacity, dropping spawn");
            return None;
        }
        self.total_stars_created += 1;
        Some(self.stars.insert(star))
    }

    fn spawn(&mut self, x: f32, y: f32, bright_chance: f32) -> Option<StarId> {
        let max_size = random_max_size(&mut self.rng, bright_chance);
        let star = Star::new(x, y, Some(max_size), self.now, &mut self.rng);
        self.insert_star(star)
    }

    pub fn create_random_star(&mut self) -> Option<StarId> {
        if self.at_capacity() {
            return None;
        }
        let x = self.rng.f32() * self.width;
        let y = self.rng.f32() * self.height;
        self.spawn(x, y, self.config.bright_star_chance)
    }

    // Spawns a star somewhere within the stimulus radius of `(x, y)`.
    // Points that land off the surface are discarded, not clamped.
    pub fn create_star_near_position(&mut self, x: f32, y: f32) -> Option<StarId> {
        if self.at_capacity() {
            return None;
        }

        let radius = self.rng.f32() * self.config.stimulus_radius;
        let angle = self.rng.f32() * PI * 2.0;
        let star_x = x + angle.cos() * radius;
        let star_y = y + angle.sin() * radius;

        if star_x < 0.0 || star_x > self.width || star_y < 0.0 || star_y > self.height {
            return None;
        }

        self.spawn(star_x, star_y, self.config.stimulus_bright_chance)
    }

    // Active, near-mature stars within `radius` of `(x, y)`.
    pub fn find_nearby_stars(&self, x: f32, y: f32, radius: f32) -> Vec<StarId> {
        self.stars
            .iter()
            .filter(|(_, star)| {
                star.is_active && star.is_near_mature() && star.distance_to_point(x, y) <= radius
            })
            .map(|(id, _)| id)
            .collect()
    }

    // Seeds a constellation from the qualifying star nearest to `(x, y)`.
    // Returns the seed, or `None` when no star qualifies.
    pub fn handle_click(&mut self, x: f32, y: f32) -> Option<StarId> {
        let seed = self
            .find_nearby_stars(x, y, self.config.constellation_seed_radius)
            .into_iter()
            .filter_map(|id| self.stars.get(id).map(|star| (id, star.distance_to_point(x, y))))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(id, _)| id)?;

        let constellation = self.begin_constellation(seed);
        debug!("constellation {constellation:?} seeded from {seed:?} at ({x:.0}, {y:.0})");
        self.refresh_stats();
        Some(seed)
    }

    pub fn pointer_moved(&mut self, x: f32, y: f32) {
        self.pointer = Pointer {
            x,
            y,
            over_surface: true,
        };
    }

    // Touch-style drag: moves the pointer and sometimes sprinkles a star.
    pub fn pointer_dragged(&mut self, x: f32, y: f32) {
        self.pointer_moved(x, y);
        if self.rng.f32() < self.config.drag_spawn_chance {
            self.create_star_near_position(x, y);
        }
    }

    pub fn pointer_left(&mut self) {
        self.pointer.over_surface = false;
    }

    pub fn pointer_clicked(&mut self, x: f32, y: f32) -> Option<StarId> {
        self.handle_click(x, y)
    }

    // Only future spawns see the new bounds.
    pub fn surface_resized(&mut self, width: f32, height: f32) {
        self.width = width;
        self.height = height;
    }

    fn advance_clock(&mut self, dt_ms: f64) {
        self.now += dt_ms;
        while let Some(task) = self.scheduler.pop_due(self.now) {
            self.run_task(task);
        }
    }

    // One simulation tick of `dt` seconds.
    pub fn update(&mut self, dt: f32) {
        self.advance_clock(dt as f64 * 1000.0);

        self.star_generation_timer += 1.0;
        if self.star_generation_timer >= 15.0 / self.config.star_generation_rate {
            self.create_random_star();
            self.star_generation_timer = 0.0;
        }

        let pointer = self.pointer;
        if pointer.over_surface && self.rng.f32() < self.config.stimulus_spawn_chance {
            self.create_star_near_position(pointer.x, pointer.y);
        }

        if self.rng.f32() < self.config.ambient_spawn_chance {
            self.create_random_star();
        }

        let pruned = self.stars.retain(|star| star.is_active);
        if pruned > 0 {
            trace!("pruned {pruned} dead stars");
        }

        let floor = self.config.max_stars as f32 * self.config.population_floor_ratio;
        if (self.stars.len() as f32) < floor && self.rng.f32() < self.config.population_floor_chance {
            self.create_random_star();
        }

        let now = self.now;
        let acceleration_radius = self.config.acceleration_radius;
        for (_, star) in self.stars.iter_mut() {
            let accelerated =
                pointer.over_surface && star.distance_to_point(pointer.x, pointer.y) < acceleration_radius;
            star.advance(now, accelerated);
        }
        self.step_connections();

        if self.rng.f32() < self.config.stats_refresh_chance {
            self.refresh_stats();
        }
    }

    // Clears `canvas` and draws every active star with its connections.
    // Spent connections and edges to removed peers are pruned here; nothing
    // else changes.
    pub fn render(&mut self, canvas: &mut impl Canvas) {
        canvas.clear();

        for id in self.stars.ids() {
            let Some(star) = self.stars.get(id) else {
                continue;
            };
            if star.size <= 0.0 || !star.is_active {
                continue;
            }
            star.draw_body(canvas);
            self.draw_connections(id, canvas);
        }
    }

    // Fades move once per tick, and only towards peers that are still shining
    fn step_connections(&mut self) {
        for id in self.stars.ids() {
            let Some(star) = self.stars.get_mut(id) else {
                continue;
            };
            if star.connections.is_empty() {
                continue;
            }
            let mut connections = std::mem::take(&mut star.connections);
            for connection in &mut connections {
                if self.stars.active(connection.peer).is_some() {
                    connection.step();
                }
            }
            if let Some(star) = self.stars.get_mut(id) {
                star.connections = connections;
            }
        }
    }

    fn draw_connections(&mut self, id: StarId, canvas: &mut impl Canvas) {
        let Some(star) = self.stars.get_mut(id) else {
            return;
        };
        if star.connections.is_empty() {
            return;
        }
        let origin = (star.x, star.y);
        let own_opacity = star.display_opacity;
        let mut connections = std::mem::take(&mut star.connections);

        connections.retain(|connection| {
            // The peer was removed from the population, so the edge can never be drawn again
            let Some(peer) = self.stars.get(connection.peer) else {
                return false;
            };
            if peer.is_active && connection.opacity > 0.0 {
                canvas.stroke_line(
                    origin,
                    (peer.x, peer.y),
                    connection.line_width(),
                    connection.color,
                    connection.line_alpha(own_opacity, peer.display_opacity),
                );
            }
            !connection.is_spent()
        });

        if let Some(star) = self.stars.get_mut(id) {
            star.connections = connections;
        }
    }
}

#[cfg(test)]
impl Universe {
    pub fn star(&self, id: StarId) -> Option<&Star> {
        self.stars.get(id)
    }

    pub fn stars(&self) -> impl Iterator<Item = (StarId, &Star)> {
        self.stars.iter()
    }

    pub fn pending_tasks(&self) -> usize {
        self.scheduler.len()
    }
}
