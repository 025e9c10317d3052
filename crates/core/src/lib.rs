//! Pure domain logic shared by the persistence, pipeline, and API crates.

pub mod browser;
pub mod catalog;
pub mod downloader;
pub mod error;
pub mod ffmpeg;
pub mod hashing;
pub mod intent;
pub mod media;
pub mod scenario;
pub mod subprocess;
pub mod template;
pub mod types;
pub mod uploads;
