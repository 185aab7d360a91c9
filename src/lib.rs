#![cfg_attr(not(test), no_std)]

mod ema;
pub use ema::*;
mod filter;
pub use filter::*;
mod monitor;
pub use monitor::*;

#[cfg(test)]
pub mod testing;
