pub mod media;
pub mod sessions;
