//! Song catalog: the remote song list and the track model

pub mod api;
pub mod models;

pub use api::*;
pub use models::*;
