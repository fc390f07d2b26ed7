//! # Core Module
//!
//! Shared resource containers used to hand state between the controller thread
//! and the background worker.
//!
//! ## Key Components
//! - `MtResource`: Thread-safe reference-counted resource with read-write locking.
//!   Used for state the worker touches, such as the region cache.
//! - `StResource`: Single-threaded reference-counted resource with interior mutability.
//!   Used for controller-only state, such as the published tile cache.
//!
//! ## Usage
//! ```rust
//! use region_map::core::{MtResource, StResource};
//!
//! let counter = MtResource::new(0);
//! *counter.get_mut() += 1;
//! assert_eq!(*counter.get(), 1);
//!
//! let names = StResource::new(Vec::<String>::new());
//! names.get_mut().push("tile".to_string());
//! assert_eq!(names.get().len(), 1);
//! ```

pub mod mt_resource;
pub mod st_resource;

pub use mt_resource::MtResource;
pub use st_resource::StResource;
