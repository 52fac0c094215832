#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]

pub mod db;
pub mod delta;
pub mod entities;
pub mod events;
pub mod framework;
pub mod processors;
pub mod recorder;
pub mod season;
pub mod sink;
