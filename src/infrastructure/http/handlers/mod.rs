//! HTTP Handlers

mod health;
mod job;
mod ping;

pub use health::*;
pub use job::*;
pub use ping::*;
