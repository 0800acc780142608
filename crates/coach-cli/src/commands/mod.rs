pub mod config;
pub mod daemon;
pub mod helpers;
pub mod session;
pub mod simulate;
