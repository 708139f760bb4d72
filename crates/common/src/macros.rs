/// Generates 32 byte hash newtype-wrappers around [H256](primitive_types::H256).
///
/// The wrappers serialize as `0x` prefixed lowercase hex and display the same way, unlike
/// [H256](primitive_types::H256) whose [Display](std::fmt::Display) abbreviates the value.
///
/// Usage:
///     `hash_newtypes!(X1, X2, ..)`
macro_rules! hash_newtypes {
    ($head:ident, $($tail:ident),+ $(,)?) => {
        crate::macros::hash_newtypes!($head);
        crate::macros::hash_newtypes!($($tail),+);
    };

    ($target:ident $(,)?) => {
        #[serde_with::serde_as]
        #[derive(
            Copy, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord,
            serde::Serialize, serde::Deserialize,
        )]
        pub struct $target(#[serde_as(as = "wayfarer_serde::HexBytes")] pub primitive_types::H256);

        #[allow(unused)]
        impl $target {
            pub const ZERO: Self = Self(primitive_types::H256([0u8; 32]));

            pub const fn from_bytes(bytes: [u8; 32]) -> Self {
                Self(primitive_types::H256(bytes))
            }

            pub fn from_hex_str(s: &str) -> Result<Self, wayfarer_serde::HexError> {
                wayfarer_serde::decode_prefixed_array::<32>(s).map(Self::from_bytes)
            }

            pub fn as_bytes(&self) -> &[u8] {
                self.0.as_bytes()
            }
        }

        impl std::fmt::Display for $target {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&wayfarer_serde::encode_prefixed(self.0))
            }
        }

        crate::macros::fmt::thin_debug!($target);
    };
}

pub(crate) use hash_newtypes;

pub(super) mod fmt {
    /// Adds a thin Debug implementation, which skips `X(H256(debug))` as `X(display)`.
    macro_rules! thin_debug {
        ($target:ty) => {
            impl std::fmt::Debug for $target {
                fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    write!(fmt, "{}({})", stringify!($target), self)
                }
            }
        };
    }

    pub(crate) use thin_debug;
}
