pub mod backdrop;
pub mod framebuffer;

pub use backdrop::Backdrop;
pub use framebuffer::Framebuffer;
