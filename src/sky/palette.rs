// 8-bit RGB triple. Compared by value, so two connections drawn from the
// same palette entry share a colour.
pub type Rgb = (u8, u8, u8);

pub const STAR_WHITE: Rgb = (255, 255, 255);

pub const CONSTELLATION_COLORS: [Rgb; 7] = [
    (100, 200, 255), // Celestial blue
    (255, 150, 100), // Warm orange
    (200, 100, 255), // Mystic purple
    (100, 255, 150), // Aurora green
    (255, 100, 150), // Cosmic pink
    (255, 255, 100), // Solar yellow
    (150, 150, 255), // Nebula violet
];

pub fn random_constellation_color(rng: &mut fastrand::Rng) -> Rgb {
    CONSTELLATION_COLORS[rng.usize(0..CONSTELLATION_COLORS.len())]
}

// Linear blend from `base` towards `color` by `t` in `[0, 1]`.
pub fn blend(base: Rgb, color: Rgb, t: f32) -> Rgb {
    let t = t.clamp(0.0, 1.0);
    (
        (base.0 as f32 * (1.0 - t) + color.0 as f32 * t) as u8,
        (base.1 as f32 * (1.0 - t) + color.1 as f32 * t) as u8,
        (base.2 as f32 * (1.0 - t) + color.2 as f32 * t) as u8,
    )
}
