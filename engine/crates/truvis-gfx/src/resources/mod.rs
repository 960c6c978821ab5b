pub mod buffer;
pub mod handles;
pub mod texture;
