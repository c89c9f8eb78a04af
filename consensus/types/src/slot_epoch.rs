//! The `Slot` and `Epoch` types are defined as newtypes over u64 to enforce type-safety between
//! the two concepts.
//!
//! Both types permit conversion, comparison and math operations with `u64`, however specifically
//! not with each other: mixing slots and epochs in arithmetic is almost always a programming
//! error and the compiler should catch it. Conversions between the two go through
//! `Slot::epoch` / `Epoch::start_slot`, which require the caller to supply the slots-per-epoch
//! constant explicitly.
//!
//! All math operations are saturating, they never wrap.

use serde_derive::{Deserialize, Serialize};
use ssz::{Decode, DecodeError, Encode};
use std::fmt;
use std::ops::{Add, AddAssign, Rem, Sub, SubAssign};

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Slot(u64);

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Epoch(u64);

macro_rules! impl_common {
    ($main: ident) => {
        impl $main {
            pub const fn new(value: u64) -> $main {
                $main(value)
            }

            pub fn as_u64(&self) -> u64 {
                self.0
            }

            pub fn as_usize(&self) -> usize {
                self.0 as usize
            }
        }

        impl From<u64> for $main {
            fn from(value: u64) -> $main {
                $main(value)
            }
        }

        impl From<$main> for u64 {
            fn from(value: $main) -> u64 {
                value.0
            }
        }

        impl PartialEq<u64> for $main {
            fn eq(&self, other: &u64) -> bool {
                self.0 == *other
            }
        }

        impl PartialOrd<u64> for $main {
            fn partial_cmp(&self, other: &u64) -> Option<std::cmp::Ordering> {
                Some(self.0.cmp(other))
            }
        }

        impl Add<u64> for $main {
            type Output = $main;

            fn add(self, other: u64) -> $main {
                $main(self.0.saturating_add(other))
            }
        }

        impl AddAssign<u64> for $main {
            fn add_assign(&mut self, other: u64) {
                self.0 = self.0.saturating_add(other);
            }
        }

        impl Sub<u64> for $main {
            type Output = $main;

            fn sub(self, other: u64) -> $main {
                $main(self.0.saturating_sub(other))
            }
        }

        impl SubAssign<u64> for $main {
            fn sub_assign(&mut self, other: u64) {
                self.0 = self.0.saturating_sub(other);
            }
        }

        impl Rem<u64> for $main {
            type Output = u64;

            fn rem(self, modulus: u64) -> u64 {
                self.0 % modulus
            }
        }

        impl fmt::Display for $main {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl Encode for $main {
            fn is_ssz_fixed_len() -> bool {
                <u64 as Encode>::is_ssz_fixed_len()
            }

            fn ssz_fixed_len() -> usize {
                <u64 as Encode>::ssz_fixed_len()
            }

            fn ssz_bytes_len(&self) -> usize {
                self.0.ssz_bytes_len()
            }

            fn ssz_append(&self, buf: &mut Vec<u8>) {
                self.0.ssz_append(buf)
            }
        }

        impl Decode for $main {
            fn is_ssz_fixed_len() -> bool {
                <u64 as Decode>::is_ssz_fixed_len()
            }

            fn ssz_fixed_len() -> usize {
                <u64 as Decode>::ssz_fixed_len()
            }

            fn from_ssz_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
                Ok($main(u64::from_ssz_bytes(bytes)?))
            }
        }
    };
}

impl_common!(Slot);
impl_common!(Epoch);

impl Slot {
    /// Returns the epoch this slot belongs to.
    pub fn epoch(self, slots_per_epoch: u64) -> Epoch {
        Epoch(self.0 / slots_per_epoch)
    }
}

impl Epoch {
    /// Returns the first slot of this epoch.
    pub fn start_slot(self, slots_per_epoch: u64) -> Slot {
        Slot(self.0.saturating_mul(slots_per_epoch))
    }
}
