pub mod arena;
pub mod canvas;
pub mod palette;
pub mod scheduler;
pub mod star;
pub mod universe;

pub use canvas::Canvas;
pub use palette::Rgb;
pub use universe::Universe;
