// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//! `ember_bitflags!`: small bitmask newtypes for masks the GL API passes around.

/// Declares a `Copy` newtype over an integer with named flag constants.
///
/// The generated type supports `|`, `|=`, membership tests and toggling.
/// Its `Debug` output lists the set flag names.
#[macro_export]
#[doc(hidden)]
macro_rules! ember_bitflags {
    (
        $(#[$attr:meta])*
        $vis:vis struct $name:ident: $ty:ty {
            $(
                $(#[$flag_attr:meta])*
                const $flag_name:ident = $flag_value:expr;
            )*
        }
    ) => {
        $(#[$attr])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
        $vis struct $name($ty);

        impl $name {
            /// No flag set.
            pub const EMPTY: Self = Self(0);

            $(
                $(#[$flag_attr])*
                pub const $flag_name: Self = Self($flag_value);
            )*

            /// Whether no flag is set.
            pub const fn is_empty(self) -> bool {
                self.0 == 0
            }

            /// Whether every flag of `other` is set in `self`.
            pub const fn contains(self, other: Self) -> bool {
                self.0 & other.0 == other.0
            }

            /// Sets or clears the flags of `other`.
            pub fn set(&mut self, other: Self, on: bool) {
                if on {
                    self.0 |= other.0;
                } else {
                    self.0 &= !other.0;
                }
            }
        }

        impl core::ops::BitOr for $name {
            type Output = Self;

            fn bitor(self, rhs: Self) -> Self {
                Self(self.0 | rhs.0)
            }
        }

        impl core::ops::BitOrAssign for $name {
            fn bitor_assign(&mut self, rhs: Self) {
                self.0 |= rhs.0;
            }
        }

        impl core::fmt::Debug for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                let mut set = f.debug_set();
                $(
                    if self.contains(Self::$flag_name) {
                        set.entry(&format_args!("{}", stringify!($flag_name)));
                    }
                )*
                set.finish()
            }
        }
    };
}

#[cfg(test)]
mod tests {
    ember_bitflags! {
        struct Planes: u8 {
            const RED = 1;
            const GREEN = 1 << 1;
            const BLUE = 1 << 2;
        }
    }

    #[test]
    fn empty_contains_nothing() {
        assert!(Planes::EMPTY.is_empty());
        assert!(!Planes::EMPTY.contains(Planes::RED));
        assert_eq!(Planes::default(), Planes::EMPTY);
    }

    #[test]
    fn union_and_membership() {
        let mut planes = Planes::RED;
        planes |= Planes::BLUE;
        assert!(planes.contains(Planes::RED | Planes::BLUE));
        assert!(!planes.contains(Planes::GREEN));
        assert_eq!(format!("{planes:?}"), "{RED, BLUE}");
    }

    #[test]
    fn set_toggles_only_the_given_flags() {
        let mut planes = Planes::RED | Planes::GREEN;
        planes.set(Planes::GREEN, false);
        assert_eq!(planes, Planes::RED);
        planes.set(Planes::BLUE, true);
        assert_eq!(planes, Planes::RED | Planes::BLUE);
        planes.set(Planes::RED | Planes::BLUE, false);
        assert!(planes.is_empty());
    }
}
