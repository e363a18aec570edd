pub mod convert;
pub mod download;
pub mod events;
pub mod formats;
pub mod health;
pub mod jobs;
pub mod upload;
