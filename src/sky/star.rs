use std::f32::consts::PI;

use super::arena::StarId;
use super::canvas::Canvas;
use super::palette::{Rgb, STAR_WHITE};

// Lifecycle fraction spent growing/shining before the fade begins
const FADE_START: f64 = 0.8;
const ACCELERATED_GROWTH: f32 = 5.0;

pub const CONNECTION_TARGET_OPACITY: f32 = 0.5;
pub const CONNECTION_FADE_IN_SPEED: f32 = 0.08;
pub const CONNECTION_FADE_OUT_SPEED: f32 = 0.015;
// Floor on the per-frame opacity step so a connection never stalls short of its target
const MIN_FADE_STEP: f32 = 0.006;

// One directed, coloured edge held on a star. Its mirror lives on the peer.
#[derive(Debug, Clone, PartialEq)]
pub struct Connection {
    pub peer: StarId,
    pub color: Rgb,
    pub opacity: f32,
    pub target_opacity: f32,
    pub fade_speed: f32,
}

impl Connection {
    fn new(peer: StarId, color: Rgb) -> Self {
        Self {
            peer,
            color,
            opacity: 0.0,
            target_opacity: CONNECTION_TARGET_OPACITY,
            fade_speed: CONNECTION_FADE_IN_SPEED,
        }
    }

    // Moves `opacity` one tick closer to `target_opacity`.
    pub fn step(&mut self) {
        if self.opacity < self.target_opacity {
            let step = self.fade_speed.max(MIN_FADE_STEP);
            self.opacity = (self.opacity + step).min(self.target_opacity);
        } else if self.opacity > self.target_opacity {
            let step = (self.fade_speed * 0.8).max(MIN_FADE_STEP);
            self.opacity = (self.opacity - step).max(self.target_opacity);
        }
    }

    pub fn begin_fade(&mut self) {
        self.target_opacity = 0.0;
        self.fade_speed = CONNECTION_FADE_OUT_SPEED;
    }

    pub fn is_fading_in(&self) -> bool {
        self.target_opacity > 0.0
    }

    pub fn is_spent(&self) -> bool {
        self.opacity <= 0.0 && self.target_opacity <= 0.0
    }

    pub fn line_alpha(&self, own_display_opacity: f32, peer_display_opacity: f32) -> f32 {
        own_display_opacity.min(peer_display_opacity) * self.opacity * 0.7
    }

    pub fn line_width(&self) -> f32 {
        1.0 + self.opacity * 1.2
    }
}

// Draws a `max_size`: mostly dim stars, with an occasional bright one.
pub fn random_max_size(rng: &mut fastrand::Rng, bright_chance: f32) -> f32 {
    if rng.f32() < bright_chance {
        rng.f32() * 2.0 + 2.0 // 2.0-4.0
    } else {
        rng.f32() * 1.5 + 0.5 // 0.5-2.0
    }
}

#[derive(Debug, Clone)]
pub struct Star {
    pub x: f32,
    pub y: f32,
    pub original_x: f32,
    pub original_y: f32,

    pub size: f32,
    pub max_size: f32,
    pub growth_rate: f32,
    pub opacity: f32,
    pub display_opacity: f32,
    pub is_active: bool,

    twinkle_speed: f32,
    twinkle_timer: f32,

    move_speed: f32,
    move_angle: f32,
    move_range: f32,

    pub birth_time: f64,
    pub lifespan: f64,
    pub fade_out_time: f64,

    pub connections: Vec<Connection>,
    pub is_part_of_constellation: bool,
    pub constellation_color: Option<Rgb>,
}

impl Star {
    // A newborn star at `(x, y)`. Without an explicit `max_size` one is
    // drawn with the default 5% bright-star chance.
    pub fn new(x: f32, y: f32, max_size: Option<f32>, now: f64, rng: &mut fastrand::Rng) -> Self {
        let max_size = max_size.unwrap_or_else(|| random_max_size(rng, 0.05));
        let growth_rate = rng.f32() * 0.03 + 0.01;

        let twinkle_speed = rng.f32() * 0.02 + 0.01;
        let twinkle_timer = rng.f32() * PI * 2.0;

        // Small stars drift a little faster and further
        let move_speed = (rng.f32() * 0.08 + 0.02) * if max_size < 1.5 { 1.5 } else { 1.0 };
        let move_angle = rng.f32() * PI * 2.0;
        let move_range = (5.0 / max_size).max(1.5);

        let lifespan = rng.f64() * 15_000.0 + 15_000.0;

        Self {
            x,
            y,
            original_x: x,
            original_y: y,
            size: 0.0,
            max_size,
            growth_rate,
            opacity: 0.0,
            display_opacity: 0.0,
            is_active: true,
            twinkle_speed,
            twinkle_timer,
            move_speed,
            move_angle,
            move_range,
            birth_time: now,
            lifespan,
            fade_out_time: now + lifespan * FADE_START,
            connections: Vec::new(),
            is_part_of_constellation: false,
            constellation_color: None,
        }
    }

    pub fn is_fading(&self, now: f64) -> bool {
        now > self.fade_out_time
    }

    // Close enough to full size to take part in a constellation.
    pub fn is_near_mature(&self) -> bool {
        self.size > self.max_size * 0.7
    }

    // One tick of lifecycle, drift and twinkle.
    pub fn advance(&mut self, now: f64, accelerated: bool) {
        if !self.is_active {
            return;
        }

        if self.is_fading(now) {
            let fade_duration = self.lifespan * (1.0 - FADE_START);
            let progress = ((now - self.fade_out_time) / fade_duration) as f32;

            if progress >= 1.0 {
                self.is_active = false;
                self.size = 0.0;
                self.opacity = 0.0;
                self.display_opacity = 0.0;
                return;
            }

            self.opacity = (1.0 - progress).max(0.0);
        } else {
            let multiplier = if accelerated { ACCELERATED_GROWTH } else { 1.0 };
            self.size = (self.size + self.growth_rate * multiplier).min(self.max_size);
            self.opacity = (self.size / self.max_size).min(1.0);
        }

        self.move_angle += self.move_speed * 0.01;
        self.x = self.original_x + self.move_angle.cos() * self.move_range;
        self.y = self.original_y + self.move_angle.sin() * self.move_range;

        self.twinkle_timer += self.twinkle_speed;
        let twinkle = self.twinkle_timer.sin() * 0.2 + 0.8;
        self.display_opacity = (self.opacity * twinkle).clamp(0.0, 1.0);
    }

    pub fn distance_to(&self, other: &Star) -> f32 {
        self.distance_to_point(other.x, other.y)
    }

    pub fn distance_to_point(&self, x: f32, y: f32) -> f32 {
        let dx = self.x - x;
        let dy = self.y - y;
        (dx * dx + dy * dy).sqrt()
    }

    // Adds a connection unless one with the same peer and colour exists.
    // Returns whether a connection was added.
    pub fn add_connection(&mut self, peer: StarId, color: Rgb) -> bool {
        if self.connection(peer, color).is_some() {
            return false;
        }

        self.connections.push(Connection::new(peer, color));
        self.is_part_of_constellation = true;
        self.constellation_color = Some(color);
        true
    }

    pub fn connection(&self, peer: StarId, color: Rgb) -> Option<&Connection> {
        self.connections.iter().find(|c| c.peer == peer && c.color == color)
    }

    pub fn connection_mut(&mut self, peer: StarId, color: Rgb) -> Option<&mut Connection> {
        self.connections.iter_mut().find(|c| c.peer == peer && c.color == color)
    }

    // Drops spent connections. Returns whether any remain.
    pub fn prune_connections(&mut self) -> bool {
        self.connections.retain(|c| !c.is_spent());
        !self.connections.is_empty()
    }

    // Drops the constellation tint once no connections remain.
    pub fn clear_membership_if_unconnected(&mut self) {
        if self.connections.is_empty() {
            self.is_part_of_constellation = false;
            self.constellation_color = None;
        }
    }

    pub fn body_color(&self) -> Rgb {
        match self.constellation_color {
            Some(color) if self.is_part_of_constellation => color,
            _ => STAR_WHITE,
        }
    }

    pub fn draw_body(&self, canvas: &mut impl Canvas) {
        if self.size <= 0.0 || !self.is_active {
            return;
        }

        let color = self.body_color();
        canvas.fill_circle(self.x, self.y, self.size, color, self.display_opacity);

        if self.size > 1.0 {
            canvas.radial_glow(
                self.x,
                self.y,
                self.size * 0.5,
                self.size * 3.0,
                color,
                self.display_opacity * 0.3,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sky::arena::StarArena;
    use crate::sky::canvas::recording::{Op, RecordingCanvas};

    const TICK_MS: f64 = 1000.0 / 60.0;

    fn peer_ids(n: usize) -> Vec<StarId> {
        let mut rng = fastrand::Rng::with_seed(99);
        let mut arena = StarArena::new();
        (0..n)
            .map(|_| arena.insert(Star::new(0.0, 0.0, Some(1.0), 0.0, &mut rng)))
            .collect()
    }

    #[test]
    fn newborn_star_is_dark_and_active() {
        let mut rng = fastrand::Rng::with_seed(1);
        let star = Star::new(50.0, 60.0, None, 0.0, &mut rng);

        assert!(star.is_active);
        assert_eq!(star.size, 0.0);
        assert_eq!(star.opacity, 0.0);
        assert!(star.max_size >= 0.5 && star.max_size < 4.0);
        assert!(star.lifespan >= 15_000.0 && star.lifespan < 30_000.0);
        assert_eq!(star.fade_out_time, star.birth_time + star.lifespan * 0.8);
        assert!(star.move_range >= 1.5);
    }

    #[test]
    fn max_size_distribution_is_bimodal() {
        let mut rng = fastrand::Rng::with_seed(2);
        let draws: Vec<f32> = (0..10_000).map(|_| random_max_size(&mut rng, 0.05)).collect();
        let bright = draws.iter().filter(|&&s| s >= 2.0).count();

        assert!(draws.iter().all(|&s| (0.5..4.0).contains(&s)));
        assert!(bright > 300 && bright < 700, "bright = {bright}");
    }

    #[test]
    fn size_grows_monotonically_until_fade() {
        let mut rng = fastrand::Rng::with_seed(3);
        let mut star = Star::new(0.0, 0.0, Some(2.0), 0.0, &mut rng);
        let mut now = 0.0;
        let mut last_size = 0.0;

        while !star.is_fading(now + TICK_MS) {
            now += TICK_MS;
            star.advance(now, false);
            assert!(star.size >= last_size);
            assert!(star.size <= star.max_size);
            assert!((0.0..=1.0).contains(&star.display_opacity));
            last_size = star.size;
        }
        assert_eq!(star.size, star.max_size);
        assert_eq!(star.opacity, 1.0);
    }

    #[test]
    fn opacity_falls_during_fade_and_star_dies() {
        let mut rng = fastrand::Rng::with_seed(4);
        let mut star = Star::new(0.0, 0.0, Some(1.0), 0.0, &mut rng);
        let mut now = 0.0;
        let mut last_opacity = f32::MAX;

        while star.is_active {
            now += TICK_MS;
            star.advance(now, false);
            if star.is_fading(now) {
                assert!(star.opacity <= last_opacity);
                last_opacity = star.opacity;
            }
            assert!(now <= star.lifespan * 1.05, "star outlived its lifespan");
        }
        assert_eq!(star.opacity, 0.0);
        assert_eq!(star.size, 0.0);
    }

    #[test]
    fn every_star_terminates_within_lifespan() {
        for seed in 0..50 {
            let mut rng = fastrand::Rng::with_seed(seed);
            let mut star = Star::new(0.0, 0.0, None, 0.0, &mut rng);
            let deadline = star.lifespan * 1.05;
            let mut now = 0.0;
            while star.is_active && now <= deadline {
                now += TICK_MS;
                star.advance(now, seed % 2 == 0);
            }
            assert!(!star.is_active, "seed {seed} still active at {now}");
        }
    }

    #[test]
    fn accelerated_growth_is_faster() {
        let mut rng = fastrand::Rng::with_seed(5);
        let mut slow = Star::new(0.0, 0.0, Some(4.0), 0.0, &mut rng);
        let mut fast = slow.clone();

        slow.advance(TICK_MS, false);
        fast.advance(TICK_MS, true);
        assert!((fast.size - slow.size * 5.0).abs() < 1e-5);
    }

    #[test]
    fn fading_star_still_drifts() {
        let mut rng = fastrand::Rng::with_seed(6);
        let mut star = Star::new(100.0, 100.0, Some(1.0), 0.0, &mut rng);
        let now = star.fade_out_time + 1.0;
        let before = (star.x, star.y, star.move_angle);

        star.advance(now, false);
        assert!(star.is_active);
        assert!(star.move_angle > before.2);
        assert!(star.distance_to_point(star.original_x, star.original_y) <= star.move_range + 1e-3);
    }

    #[test]
    fn add_connection_is_idempotent() {
        let ids = peer_ids(2);
        let mut rng = fastrand::Rng::with_seed(7);
        let mut star = Star::new(0.0, 0.0, Some(1.0), 0.0, &mut rng);

        assert!(star.add_connection(ids[0], (1, 2, 3)));
        assert!(!star.add_connection(ids[0], (1, 2, 3)));
        assert_eq!(star.connections.len(), 1);

        // A different colour to the same peer is a separate edge
        assert!(star.add_connection(ids[0], (4, 5, 6)));
        assert!(star.add_connection(ids[1], (4, 5, 6)));
        assert_eq!(star.connections.len(), 3);
        assert!(star.is_part_of_constellation);
        assert_eq!(star.constellation_color, Some((4, 5, 6)));

        let conn = &star.connections[0];
        assert_eq!(conn.opacity, 0.0);
        assert_eq!(conn.target_opacity, 0.5);
        assert_eq!(conn.fade_speed, 0.08);
    }

    #[test]
    fn connection_chases_target_with_minimum_step() {
        let ids = peer_ids(1);
        let mut conn = Connection::new(ids[0], (0, 0, 0));
        conn.step();
        assert!((conn.opacity - 0.08).abs() < 1e-6);
        for _ in 0..10 {
            conn.step();
        }
        assert_eq!(conn.opacity, 0.5);

        conn.begin_fade();
        conn.step();
        // Fade-out steps at 0.8 * fade_speed
        assert!((conn.opacity - (0.5 - 0.012)).abs() < 1e-6);
        let mut frames = 1;
        while conn.opacity > 0.0 {
            let before = conn.opacity;
            conn.step();
            assert!(conn.opacity < before);
            frames += 1;
        }
        assert!(conn.is_spent());
        assert!(frames < 100);
    }

    #[test]
    fn prune_and_membership_reset() {
        let ids = peer_ids(2);
        let mut rng = fastrand::Rng::with_seed(8);
        let mut star = Star::new(0.0, 0.0, Some(1.0), 0.0, &mut rng);
        star.add_connection(ids[0], (9, 9, 9));
        star.add_connection(ids[1], (9, 9, 9));
        star.connections[0].begin_fade();

        assert!(star.prune_connections());
        assert_eq!(star.connections.len(), 1);
        star.clear_membership_if_unconnected();
        assert!(star.is_part_of_constellation);

        star.connections[0].begin_fade();
        assert!(!star.prune_connections());
        star.clear_membership_if_unconnected();
        assert!(!star.is_part_of_constellation);
        assert_eq!(star.constellation_color, None);
        assert_eq!(star.body_color(), STAR_WHITE);
    }

    #[test]
    fn draw_body_glows_only_for_large_stars() {
        let mut rng = fastrand::Rng::with_seed(9);
        let mut star = Star::new(10.0, 10.0, Some(3.0), 0.0, &mut rng);

        let mut canvas = RecordingCanvas::default();
        star.draw_body(&mut canvas);
        assert!(canvas.ops.is_empty(), "unborn star must not draw");

        star.size = 0.8;
        star.display_opacity = 0.5;
        star.draw_body(&mut canvas);
        assert_eq!(canvas.ops.len(), 1);

        star.size = 2.0;
        star.draw_body(&mut canvas);
        assert_eq!(canvas.ops.len(), 3);
        match &canvas.ops[2] {
            Op::Glow { outer_radius, alpha, .. } => {
                assert_eq!(*outer_radius, 6.0);
                assert!((alpha - 0.15).abs() < 1e-6);
            }
            other => panic!("expected glow, got {other:?}"),
        }
    }
}
