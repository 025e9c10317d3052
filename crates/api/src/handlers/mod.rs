pub mod catalog;
pub mod history;
pub mod jobs;
pub mod process;
pub mod scenarios;
