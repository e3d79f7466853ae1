pub mod api;
pub mod archive;
pub mod config;
pub mod download;
pub mod mime;
pub mod search;
pub mod state;
