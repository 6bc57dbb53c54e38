// rivalscan: competitor content aggregation for Instagram and YouTube
//
// This is the library root. Each module corresponds to a stage of the
// analysis pipeline or one of its surfaces.

pub mod config;
pub mod error;
pub mod models;
pub mod output;
pub mod pipeline;
pub mod scoring;
pub mod sources;
pub mod status;
pub mod text;

#[cfg(feature = "web")]
pub mod web;
