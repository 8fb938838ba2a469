//! Infrastructure Adapters
//!
//! 六边形架构的适配器实现

pub mod reference;
pub mod transcoder;

pub use reference::*;
pub use transcoder::*;
