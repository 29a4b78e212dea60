pub mod quality;
pub mod summary;
