//! The controller's collaborators, one per stage of a request.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ (controller) ──▶ service ──▶ deliver
//! (drop/pick)  validate      (HTTP POST)   (save to disk)
//! ```
//!
//! 1. [`input`]   — turn drag/drop/pick events into at most one file
//! 2. [`service`] — the remote conversion call; the only network I/O
//! 3. [`deliver`] — name and save the converted payload
//!
//! `service` and `deliver` are trait seams so the controller can be tested
//! without a network or a file system.

pub mod deliver;
pub mod input;
pub mod service;
