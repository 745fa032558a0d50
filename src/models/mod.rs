pub mod common;
pub mod edit;
pub mod events;
pub mod image;

pub use common::*;
pub use edit::*;
pub use events::*;
pub use image::*;
