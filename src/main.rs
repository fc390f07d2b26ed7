//! # Region Map Entry Point
//!
//! Calls into the library's `run()` function, which renders and reloads a small
//! demo map.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --release -- [config.json]
//! ```

fn main() {
    region_map::run();
}
