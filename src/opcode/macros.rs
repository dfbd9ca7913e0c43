//! This module contains useful macros for working with opcodes.

/// Defines the [`crate::opcode::Opcode`] enum from a table of the opcodes that
/// have a single fixed byte value, adding the families that are parameterised
/// by a count (`PUSH`, `DUP`, `SWAP` and `LOG`) and a catch-all for undefined
/// bytes.
///
/// It also generates the lookups between the fixed variants, their byte values
/// and their mnemonics.
macro_rules! opcodes {
    ($($variant:ident = $byte:literal, $name:literal;)*) => {
        /// An EVM opcode.
        #[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
        pub enum Opcode {
            $(
                #[doc = concat!("The `", $name, "` opcode.")]
                $variant,
            )*

            /// `PUSHN`, pushing `N` immediate bytes (`PUSH0` pushes zero).
            Push(u8),

            /// `DUPN`, duplicating the `N`th stack item.
            Dup(u8),

            /// `SWAPN`, swapping the top of the stack with the item `N` below
            /// it.
            Swap(u8),

            /// `LOGN`, emitting a log with `N` topics.
            Log(u8),

            /// A byte value with no defined opcode.
            Unknown(u8),
        }

        impl Opcode {
            fn from_fixed_byte(byte: u8) -> Option<Self> {
                match byte {
                    $($byte => Some(Self::$variant),)*
                    _ => None,
                }
            }

            fn from_fixed_name(name: &str) -> Option<Self> {
                match name {
                    $($name => Some(Self::$variant),)*
                    _ => None,
                }
            }

            fn fixed_byte(self) -> u8 {
                match self {
                    $(Self::$variant => $byte,)*
                    Self::Push(_) | Self::Dup(_) | Self::Swap(_) | Self::Log(_) => {
                        unreachable!("Parameterised opcodes have no fixed byte")
                    }
                    Self::Unknown(byte) => byte,
                }
            }

            fn fixed_name(self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)*
                    Self::Push(_) | Self::Dup(_) | Self::Swap(_) | Self::Log(_) => {
                        unreachable!("Parameterised opcodes have no fixed name")
                    }
                    Self::Unknown(_) => "UNKNOWN",
                }
            }
        }
    };
}

// Export it scoped
pub(crate) use opcodes;
