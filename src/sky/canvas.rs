use super::palette::Rgb;

// A 2D drawing surface in world coordinates.
// Alphas are in `[0, 1]` and composite over whatever is already drawn.
pub trait Canvas {
    fn clear(&mut self);
    fn fill_circle(&mut self, x: f32, y: f32, radius: f32, color: Rgb, alpha: f32);
    // Soft disc: full `alpha` inside `inner_radius`, falling to transparent
    // at `outer_radius`.
    fn radial_glow(
        &mut self,
        x: f32,
        y: f32,
        inner_radius: f32,
        outer_radius: f32,
        color: Rgb,
        alpha: f32,
    );
    fn stroke_line(&mut self, from: (f32, f32), to: (f32, f32), width: f32, color: Rgb, alpha: f32);
}

#[cfg(test)]
pub(crate) mod recording {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    pub enum Op {
        Clear,
        Circle { x: f32, y: f32, radius: f32, color: Rgb, alpha: f32 },
        Glow { x: f32, y: f32, outer_radius: f32, color: Rgb, alpha: f32 },
        Line { from: (f32, f32), to: (f32, f32), width: f32, color: Rgb, alpha: f32 },
    }

    // Canvas double that records every call.
    #[derive(Default)]
    pub struct RecordingCanvas {
        pub ops: Vec<Op>,
    }

    impl RecordingCanvas {
        pub fn circles(&self) -> usize {
            self.ops.iter().filter(|op| matches!(op, Op::Circle { .. })).count()
        }

        pub fn lines(&self) -> Vec<&Op> {
            self.ops.iter().filter(|op| matches!(op, Op::Line { .. })).collect()
        }
    }

    impl Canvas for RecordingCanvas {
        fn clear(&mut self) {
            self.ops.push(Op::Clear);
        }

        fn fill_circle(&mut self, x: f32, y: f32, radius: f32, color: Rgb, alpha: f32) {
            self.ops.push(Op::Circle { x, y, radius, color, alpha });
        }

        fn radial_glow(
            &mut self,
            x: f32,
            y: f32,
            _inner_radius: f32,
            outer_radius: f32,
            color: Rgb,
            alpha: f32,
        ) {
            self.ops.push(Op::Glow { x, y, outer_radius, color, alpha });
        }

        fn stroke_line(&mut self, from: (f32, f32), to: (f32, f32), width: f32, color: Rgb, alpha: f32) {
            self.ops.push(Op::Line { from, to, width, color, alpha });
        }
    }
}
