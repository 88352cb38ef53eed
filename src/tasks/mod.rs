//! Background Tasks Module
//!
//! # Tasks
//! - Cache sweep: purges expired cache entries at a fixed interval

mod sweep;

pub use sweep::spawn_sweep_task;
