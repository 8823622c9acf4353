//! Door access controller core: sensor fusion, access control and the timing
//! state machines that drive the lock and display backlight.
//!
//! Architecture:
//! - Sampling (`sampler`): 50 Hz ultrasonic + PIR sampling fed by the echo ISR
//!   (`capture`), pushed through a bounded queue to `fusion`.
//! - Identity (`tag_reader` -> `access`): RFID polling feeding the access
//!   decision machine through a bounded queue.
//! - Actuation (`lock`, `display`): tasks that render the shared state.
//! - Timing (`timers`): lock-relock and backlight-off countdowns.
//!
//! Cross-task state lives in [`shared::SharedState`]; every mutation happens
//! inside a critical section together with the timer rearm it implies.
//!
//! The crate is hardware-agnostic: peripherals are reached through the traits
//! in [`drivers`] and `embedded-hal`. The ESP32 firmware in `main.rs` supplies
//! the concrete types.

#![cfg_attr(not(test), no_std)]

pub mod access;
pub mod bus;
pub mod capture;
pub mod config;
pub mod display;
pub mod doorbell;
pub mod drivers;
pub mod error;
pub mod fusion;
pub mod lock;
pub mod sampler;
pub mod shared;
pub mod tag_reader;
pub mod timers;
pub mod uid;
pub mod window;

pub use error::Error;
