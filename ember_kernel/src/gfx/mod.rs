mod framebuffer;
mod types;

pub use framebuffer::{framebuffer, force_unlock, get, init, Framebuffer};
pub use types::{Color, Dimension, Position};
