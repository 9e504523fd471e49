//! Fixed-arity heterogeneous records (spec §4.1).
//!
//! The original C++ implementation gets compile-time attribute access from
//! variadic templates (`StreamElementTraits.hpp`, `TupleFactoryTraits.hpp`).
//! Rust has no variadic generics, so — per §9's guidance — we generate one
//! struct per arity actually needed. `define_tuple!` below is invoked once
//! per arity; each invocation spells out its own field names, which is also
//! what makes `getAttribute<I>` a plain, compile-time-checked field access
//! (`tup.a0`) instead of a runtime index.

use crate::element::null_bitmap::NullBitmap;
use crate::element::wire::WireAttribute;
use crate::error::PipeError;

/// Implemented by every generated `TupleN`. Mirrors the compile-time
/// contract of §4.1: `numAttributes()`, the null bitmap, and the wire
/// format (discriminator handled by the caller, see `element::wire_format`).
pub trait Tuple: Clone + Send + Sync + 'static {
    const NUM_ATTRIBUTES: usize;

    fn is_null(&self, i: usize) -> bool;
    fn set_null(&mut self, i: usize, value: bool);
    fn null_bitmap(&self) -> &NullBitmap;

    fn encode_attributes(&self, out: &mut Vec<u8>);
    fn decode_attributes(bitmap: NullBitmap, input: &mut &[u8]) -> Result<Self, PipeError>
    where
        Self: Sized;
}

macro_rules! define_tuple {
    ($name:ident, [$($field:ident : $ty:ident @ $idx:literal),+ $(,)?]) => {
        #[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
        pub struct $name<$($ty: Clone + Send + Sync + WireAttribute + 'static),+> {
            $(pub $field: $ty,)+
            null_bitmap: NullBitmap,
        }

        impl<$($ty: Clone + Send + Sync + WireAttribute + 'static),+> $name<$($ty),+> {
            #[allow(clippy::too_many_arguments)]
            pub fn new($($field: $ty),+) -> Self {
                Self {
                    $($field,)+
                    null_bitmap: NullBitmap::new(Self::NUM_ATTRIBUTES),
                }
            }
        }

        impl<$($ty: Clone + Send + Sync + WireAttribute + 'static),+> Tuple for $name<$($ty),+> {
            const NUM_ATTRIBUTES: usize = define_tuple!(@count $($field)+);

            fn is_null(&self, i: usize) -> bool {
                self.null_bitmap.get(i)
            }

            fn set_null(&mut self, i: usize, value: bool) {
                self.null_bitmap.set(i, value);
            }

            fn null_bitmap(&self) -> &NullBitmap {
                &self.null_bitmap
            }

            fn encode_attributes(&self, out: &mut Vec<u8>) {
                $(self.$field.encode(out);)+
            }

            fn decode_attributes(bitmap: NullBitmap, input: &mut &[u8]) -> Result<Self, PipeError> {
                $(let $field = <$ty as WireAttribute>::decode(input)?;)+
                Ok(Self { $($field,)+ null_bitmap: bitmap })
            }
        }

        impl<$($ty: Clone + Send + Sync + WireAttribute + 'static + PartialEq),+> PartialEq
            for $name<$($ty),+>
        {
            fn eq(&self, other: &Self) -> bool {
                $(
                    {
                        let a_null = self.is_null($idx);
                        let b_null = other.is_null($idx);
                        if a_null && b_null {
                            // both null: ignore the value
                        } else if a_null != b_null || self.$field != other.$field {
                            return false;
                        }
                    }
                )+
                true
            }
        }
    };

    (@count) => { 0 };
    (@count $head:ident $($tail:ident)*) => { 1 + define_tuple!(@count $($tail)*) };
}

define_tuple!(Tuple1, [a0: T0 @ 0]);
define_tuple!(Tuple2, [a0: T0 @ 0, a1: T1 @ 1]);
define_tuple!(Tuple3, [a0: T0 @ 0, a1: T1 @ 1, a2: T2 @ 2]);
define_tuple!(Tuple4, [a0: T0 @ 0, a1: T1 @ 1, a2: T2 @ 2, a3: T3 @ 3]);
define_tuple!(Tuple5, [a0: T0 @ 0, a1: T1 @ 1, a2: T2 @ 2, a3: T3 @ 3, a4: T4 @ 4]);
define_tuple!(
    Tuple6,
    [a0: T0 @ 0, a1: T1 @ 1, a2: T2 @ 2, a3: T3 @ 3, a4: T4 @ 4, a5: T5 @ 5]
);
define_tuple!(
    Tuple7,
    [a0: T0 @ 0, a1: T1 @ 1, a2: T2 @ 2, a3: T3 @ 3, a4: T4 @ 4, a5: T5 @ 5, a6: T6 @ 6]
);
define_tuple!(
    Tuple8,
    [a0: T0 @ 0, a1: T1 @ 1, a2: T2 @ 2, a3: T3 @ 3, a4: T4 @ 4, a5: T5 @ 5, a6: T6 @ 6, a7: T7 @ 7]
);
define_tuple!(
    Tuple9,
    [a0: T0 @ 0, a1: T1 @ 1, a2: T2 @ 2, a3: T3 @ 3, a4: T4 @ 4, a5: T5 @ 5, a6: T6 @ 6, a7: T7 @ 7,
     a8: T8 @ 8]
);
define_tuple!(
    Tuple10,
    [a0: T0 @ 0, a1: T1 @ 1, a2: T2 @ 2, a3: T3 @ 3, a4: T4 @ 4, a5: T5 @ 5, a6: T6 @ 6, a7: T7 @ 7,
     a8: T8 @ 8, a9: T9 @ 9]
);
define_tuple!(
    Tuple11,
    [a0: T0 @ 0, a1: T1 @ 1, a2: T2 @ 2, a3: T3 @ 3, a4: T4 @ 4, a5: T5 @ 5, a6: T6 @ 6, a7: T7 @ 7,
     a8: T8 @ 8, a9: T9 @ 9, a10: T10 @ 10]
);
define_tuple!(
    Tuple12,
    [a0: T0 @ 0, a1: T1 @ 1, a2: T2 @ 2, a3: T3 @ 3, a4: T4 @ 4, a5: T5 @ 5, a6: T6 @ 6, a7: T7 @ 7,
     a8: T8 @ 8, a9: T9 @ 9, a10: T10 @ 10, a11: T11 @ 11]
);
define_tuple!(
    Tuple13,
    [a0: T0 @ 0, a1: T1 @ 1, a2: T2 @ 2, a3: T3 @ 3, a4: T4 @ 4, a5: T5 @ 5, a6: T6 @ 6, a7: T7 @ 7,
     a8: T8 @ 8, a9: T9 @ 9, a10: T10 @ 10, a11: T11 @ 11, a12: T12 @ 12]
);
define_tuple!(
    Tuple14,
    [a0: T0 @ 0, a1: T1 @ 1, a2: T2 @ 2, a3: T3 @ 3, a4: T4 @ 4, a5: T5 @ 5, a6: T6 @ 6, a7: T7 @ 7,
     a8: T8 @ 8, a9: T9 @ 9, a10: T10 @ 10, a11: T11 @ 11, a12: T12 @ 12, a13: T13 @ 13]
);
define_tuple!(
    Tuple15,
    [a0: T0 @ 0, a1: T1 @ 1, a2: T2 @ 2, a3: T3 @ 3, a4: T4 @ 4, a5: T5 @ 5, a6: T6 @ 6, a7: T7 @ 7,
     a8: T8 @ 8, a9: T9 @ 9, a10: T10 @ 10, a11: T11 @ 11, a12: T12 @ 12, a13: T13 @ 13,
     a14: T14 @ 14]
);
define_tuple!(
    Tuple16,
    [a0: T0 @ 0, a1: T1 @ 1, a2: T2 @ 2, a3: T3 @ 3, a4: T4 @ 4, a5: T5 @ 5, a6: T6 @ 6, a7: T7 @ 7,
     a8: T8 @ 8, a9: T9 @ 9, a10: T10 @ 10, a11: T11 @ 11, a12: T12 @ 12, a13: T13 @ 13,
     a14: T14 @ 14, a15: T15 @ 15]
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_ignores_agreed_nulls() {
        let mut a = Tuple2::new(1i64, "x".to_string());
        let mut b = Tuple2::new(1i64, "y".to_string());
        a.set_null(1, true);
        b.set_null(1, true);
        assert_eq!(a, b, "both null on attribute 1, value should be ignored");

        b.set_null(1, false);
        assert_ne!(a, b, "disagreeing null flags must not compare equal");
    }

    #[test]
    fn wire_round_trip() {
        let t = Tuple3::new(7i32, 3.5f64, "hi".to_string());
        let mut buf = Vec::new();
        t.encode_attributes(&mut buf);
        let decoded =
            Tuple3::<i32, f64, String>::decode_attributes(t.null_bitmap().clone(), &mut buf.as_slice())
                .unwrap();
        assert_eq!(t, decoded);
    }
}
