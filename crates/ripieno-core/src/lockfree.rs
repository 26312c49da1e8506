//! Atomic scalars shared between control threads and the render thread.
//!
//! Parameter values and node timestamps are written from one side and read
//! from the other without taking either graph lock.

use crate::compat::{AtomicBool, Ordering};
use atomic_float::{AtomicF32, AtomicF64};

macro_rules! atomic_cell {
    ($(#[$meta:meta])* $name:ident, $inner:ty, $scalar:ty, $default:expr) => {
        $(#[$meta])*
        #[derive(Debug)]
        #[repr(align(64))]
        pub struct $name {
            value: $inner,
        }

        impl $name {
            pub fn new(value: $scalar) -> Self {
                Self {
                    value: <$inner>::new(value),
                }
            }

            #[inline]
            pub fn get(&self) -> $scalar {
                self.value.load(Ordering::Acquire)
            }

            #[inline]
            pub fn get_relaxed(&self) -> $scalar {
                self.value.load(Ordering::Relaxed)
            }

            #[inline]
            pub fn set(&self, value: $scalar) {
                self.value.store(value, Ordering::Release);
            }

            #[inline]
            pub fn swap(&self, value: $scalar) -> $scalar {
                self.value.swap(value, Ordering::AcqRel)
            }
        }

        impl Clone for $name {
            fn clone(&self) -> Self {
                Self::new(self.get())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new($default)
            }
        }
    };
}

atomic_cell!(
    /// Parameter value cell: intrinsic value on the control side, final
    /// computed value on the render side.
    AtomicFloat,
    AtomicF32,
    f32,
    0.0
);

atomic_cell!(
    /// Context-time cell, in seconds. Nodes use `-1.0` for "never".
    AtomicDouble,
    AtomicF64,
    f64,
    0.0
);

atomic_cell!(
    /// Lifecycle flag.
    AtomicFlag,
    AtomicBool,
    bool,
    false
);

impl AtomicFlag {
    /// Sets the flag, returning `true` if this call changed it.
    #[inline]
    pub fn raise(&self) -> bool {
        !self.swap(true)
    }
}
