pub mod asset;
pub mod conversation;
pub mod job;
pub mod status;
