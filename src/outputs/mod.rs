//! Output generation.
//!
//! # Submodules
//!
//! - [`json`]: ranks the digest and writes it, its archive copy and the buzz snapshot
//!
//! # Output Structure
//!
//! ```text
//! base_dir/
//! ├── today_news.json                         # current digest
//! ├── morning_buzz.json                       # current buzz snapshot
//! └── archive/
//!     └── morning_sensing_2026-10-18.json     # one per calendar date
//! ```

pub mod json;
