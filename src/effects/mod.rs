use crossterm::event::Event;
use std::io::Write;

pub mod constellations;

pub trait Effect {
    fn update(&mut self, dt: f32);
    fn render<W: Write>(&mut self, out: &mut W) -> std::io::Result<()>;
    fn handle_event(&mut self, _event: &Event) {}
    // Pixels, so rows count twice
    fn resize(&mut self, width: usize, height: usize);
}
