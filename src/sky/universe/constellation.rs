// Deferred steps re-check liveness when they fire: a star may die between
// scheduling and firing.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use log::{debug, trace};

use super::Universe;
use crate::sky::arena::StarId;
use crate::sky::palette::{random_constellation_color, Rgb};

const CONNECT_STAGGER_MS: f64 = 80.0;
const CONNECT_JITTER_MS: f64 = 60.0;
const EXTEND_DELAY_MIN_MS: f64 = 20.0;
const EXTEND_JITTER_MS: f64 = 40.0;
const FADE_DELAY_MIN_MS: f64 = 8_000.0;
const FADE_JITTER_MS: f64 = 10_000.0;
const CASCADE_BASE_MS: f64 = 300.0;
const CASCADE_JITTER_MS: f64 = 600.0;
const CASCADE_STAGGER_MS: f64 = 80.0;
const CLEANUP_DELAY_MS: f64 = 4_000.0;
const RELEASE_DELAY_MS: f64 = 6_000.0;

// Identifies one build-and-fade cycle for the active-constellation counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConstellationId(u64);

// Stars already claimed by one traversal. Shared by every continuation of
// that traversal so branches never re-enter a star.
type Visited = Rc<RefCell<HashSet<StarId>>>;

pub(crate) enum Task {
    Connect {
        seed: StarId,
        target: StarId,
        color: Rgb,
        depth: u32,
        visited: Visited,
        constellation: ConstellationId,
    },
    Extend {
        star: StarId,
        color: Rgb,
        depth: u32,
        visited: Visited,
        constellation: ConstellationId,
    },
    Fade {
        star: StarId,
        color: Rgb,
        constellation: ConstellationId,
    },
    Cleanup {
        star: StarId,
    },
    Release {
        constellation: ConstellationId,
    },
}

impl Universe {
    // Starts a new constellation at `seed` in a random palette colour.
    pub(super) fn begin_constellation(&mut self, seed: StarId) -> ConstellationId {
        let color = random_constellation_color(&mut self.rng);
        let constellation = ConstellationId(self.next_constellation);
        self.next_constellation += 1;
        self.active_constellations.insert(constellation);

        let visited = Visited::default();
        self.build_constellation(seed, color, &visited, 0, constellation);
        constellation
    }

    // Connects `seed` to its nearest unvisited neighbours after staggered
    // delays, and schedules the seed's fade.
    pub(super) fn build_constellation(
        &mut self,
        seed: StarId,
        color: Rgb,
        visited: &Visited,
        depth: u32,
        constellation: ConstellationId,
    ) {
        if depth > self.config.max_depth || visited.borrow().contains(&seed) {
            return;
        }
        let Some(seed_star) = self.stars.active(seed) else {
            return;
        };
        visited.borrow_mut().insert(seed);

        let edge_radius = self.config.constellation_edge_radius;
        let mut candidates: Vec<(StarId, f32)> = {
            let visited = visited.borrow();
            self.stars
                .iter()
                .filter(|(id, star)| *id != seed && star.is_active && !visited.contains(id))
                .map(|(id, star)| (id, seed_star.distance_to(star)))
                .filter(|(_, distance)| *distance < edge_radius)
                .collect()
        };

        let fan_out = 4u32.saturating_sub(depth / 3).max(1) as usize;
        let connection_count = candidates.len().min(self.rng.usize(0..=1) + fan_out);

        candidates.sort_by(|a, b| a.1.total_cmp(&b.1));
        for (target, _) in candidates.into_iter().take(connection_count) {
            let delay = depth as f64 * CONNECT_STAGGER_MS + self.rng.f64() * CONNECT_JITTER_MS;
            self.scheduler.schedule(
                self.now + delay,
                Task::Connect {
                    seed,
                    target,
                    color,
                    depth,
                    visited: Rc::clone(visited),
                    constellation,
                },
            );
        }

        let fade_delay = FADE_DELAY_MIN_MS + self.rng.f64() * FADE_JITTER_MS;
        self.scheduler.schedule(
            self.now + fade_delay,
            Task::Fade {
                star: seed,
                color,
                constellation,
            },
        );
    }

    pub(super) fn connect(&mut self, a: StarId, b: StarId, color: Rgb) {
        if let Some(star) = self.stars.get_mut(a) {
            star.add_connection(b, color);
        }
        if let Some(star) = self.stars.get_mut(b) {
            star.add_connection(a, color);
        }
    }

    // Starts dissolving `star`'s connections of `color` and spreads the fade
    // to the peers those connections lead to.
    pub(super) fn fade_constellation(&mut self, star_id: StarId, color: Rgb, constellation: ConstellationId) {
        self.scheduler.schedule(
            self.now + RELEASE_DELAY_MS,
            Task::Release { constellation },
        );

        let Some(star) = self.stars.get_mut(star_id).filter(|star| star.is_active) else {
            return;
        };

        let mut cascade = Vec::new();
        let mut peers = Vec::new();
        for connection in star.connections.iter_mut().filter(|c| c.color == color) {
            if connection.is_fading_in() {
                cascade.push(connection.peer);
            }
            connection.begin_fade();
            peers.push(connection.peer);
        }

        debug!(
            "{constellation:?} fading at {star_id:?}: {} connections, {} onward",
            peers.len(),
            cascade.len()
        );

        for peer in peers {
            let mirror = self
                .stars
                .get_mut(peer)
                .filter(|peer| peer.is_active)
                .and_then(|peer| peer.connection_mut(star_id, color));
            if let Some(mirror) = mirror {
                mirror.begin_fade();
            }
        }

        for (index, peer) in cascade.into_iter().enumerate() {
            let delay = CASCADE_BASE_MS + self.rng.f64() * CASCADE_JITTER_MS + index as f64 * CASCADE_STAGGER_MS;
            self.scheduler.schedule(
                self.now + delay,
                Task::Fade {
                    star: peer,
                    color,
                    constellation,
                },
            );
        }

        self.scheduler
            .schedule(self.now + CLEANUP_DELAY_MS, Task::Cleanup { star: star_id });
    }

    pub(super) fn run_task(&mut self, task: Task) {
        match task {
            Task::Connect {
                seed,
                target,
                color,
                depth,
                visited,
                constellation,
            } => {
                if self.stars.active(seed).is_none() || self.stars.active(target).is_none() {
                    trace!("skipping connection {seed:?} -> {target:?}: endpoint gone");
                    return;
                }
                self.connect(seed, target, color);

                let continue_chance = (0.9 - depth as f32 * 0.05).max(0.3);
                if self.rng.f32() < continue_chance {
                    let delay = EXTEND_DELAY_MIN_MS + self.rng.f64() * EXTEND_JITTER_MS;
                    self.scheduler.schedule(
                        self.now + delay,
                        Task::Extend {
                            star: target,
                            color,
                            depth: depth + 1,
                            visited,
                            constellation,
                        },
                    );
                }
            }
            Task::Extend {
                star,
                color,
                depth,
                visited,
                constellation,
            } => self.build_constellation(star, color, &visited, depth, constellation),
            Task::Fade {
                star,
                color,
                constellation,
            } => self.fade_constellation(star, color, constellation),
            Task::Cleanup { star } => {
                if let Some(star) = self.stars.get_mut(star) {
                    if !star.prune_connections() {
                        star.clear_membership_if_unconnected();
                    }
                }
            }
            Task::Release { constellation } => {
                if self.active_constellations.remove(&constellation) {
                    debug!("constellation {constellation:?} dissolved");
                    self.refresh_stats();
                }
            }
        }
    }
}
