//! # DSP Core
//!
//! The real-time part of the plugin, independent of nih-plug's plugin
//! traits:
//!
//! - **`circular_buffer`**: fixed-capacity multi-channel storage with
//!   wrap-around block reads, writes and adds.
//! - **`tempo_sync`**: turns a note division and a tempo into samples.
//! - **`parameters`**: the per-block parameter snapshot.
//! - **`delay_line`**: the feedback delay itself, built on the three above.

pub mod circular_buffer;
pub mod delay_line;
pub mod parameters;
pub mod tempo_sync;
