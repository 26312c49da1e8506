//! Synchronization and collection types shared across the crate.

pub use parking_lot::{Condvar, Mutex, MutexGuard};

pub use std::sync::{Arc, Weak};

pub use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicU8, AtomicUsize, Ordering};

pub use hashbrown::HashMap;
