//! Internal macros.
//!
//! `zerocopy_accessors!` generates getter/setter pairs for header fields
//! stored as little-endian wrapper types, so the on-disk structs read like
//! plain structs at the call site:
//!
//! ```ignore
//! impl NodeHeader {
//!     zerocopy_accessors! {
//!         num_keys: u32,
//!         root_block: u32,
//!     }
//! }
//!
//! // Generates:
//! // pub fn num_keys(&self) -> u32 { self.num_keys.get() }
//! // pub fn set_num_keys(&mut self, val: u32) { self.num_keys = U32::new(val); }
//! ```

/// Generates getter and setter methods for zerocopy little-endian fields.
#[macro_export]
macro_rules! zerocopy_accessors {
    (@impl $field:ident, u32) => {
        ::paste::paste! {
            #[inline]
            pub fn $field(&self) -> u32 {
                self.$field.get()
            }

            #[inline]
            pub fn [<set_ $field>](&mut self, val: u32) {
                self.$field = ::zerocopy::little_endian::U32::new(val);
            }
        }
    };
    ($($field:ident : $ty:tt),* $(,)?) => {
        $(
            $crate::zerocopy_accessors!(@impl $field, $ty);
        )*
    };
}
