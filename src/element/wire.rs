//! Per-attribute wire encoding (spec §4.1 / §6): fixed-width little-endian
//! for numeric types, length-prefixed bytes for strings.

use crate::error::PipeError;

pub trait WireAttribute: Sized {
    fn encode(&self, out: &mut Vec<u8>);
    fn decode(input: &mut &[u8]) -> Result<Self, PipeError>;
}

fn take<'a>(input: &mut &'a [u8], n: usize) -> Result<&'a [u8], PipeError> {
    if input.len() < n {
        return Err(PipeError::Parse("truncated attribute bytes".to_string()));
    }
    let (head, tail) = input.split_at(n);
    *input = tail;
    Ok(head)
}

macro_rules! impl_wire_numeric {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl WireAttribute for $ty {
                fn encode(&self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_le_bytes());
                }

                fn decode(input: &mut &[u8]) -> Result<Self, PipeError> {
                    let bytes = take(input, std::mem::size_of::<$ty>())?;
                    Ok(<$ty>::from_le_bytes(bytes.try_into().unwrap()))
                }
            }
        )+
    };
}

impl_wire_numeric!(i8, i16, i32, i64, u8, u16, u32, u64, f32, f64);

impl WireAttribute for bool {
    fn encode(&self, out: &mut Vec<u8>) {
        out.push(if *self { 1 } else { 0 });
    }

    fn decode(input: &mut &[u8]) -> Result<Self, PipeError> {
        Ok(take(input, 1)?[0] != 0)
    }
}

/// Encodes absence as a single `0` byte, presence as `1` followed by the
/// inner value — used by aggregates whose empty-window identity is "no
/// value" (`Min`, `Max`, `Avg`'s `DivZero`, …) so their result can still
/// flow through the same attribute/wire machinery as every other column.
impl<T: WireAttribute> WireAttribute for Option<T> {
    fn encode(&self, out: &mut Vec<u8>) {
        match self {
            Some(v) => {
                out.push(1);
                v.encode(out);
            }
            None => out.push(0),
        }
    }

    fn decode(input: &mut &[u8]) -> Result<Self, PipeError> {
        match take(input, 1)?[0] {
            0 => Ok(None),
            _ => Ok(Some(T::decode(input)?)),
        }
    }
}

impl WireAttribute for String {
    fn encode(&self, out: &mut Vec<u8>) {
        let bytes = self.as_bytes();
        out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
        out.extend_from_slice(bytes);
    }

    fn decode(input: &mut &[u8]) -> Result<Self, PipeError> {
        let len = u32::decode(input)? as usize;
        let bytes = take(input, len)?;
        String::from_utf8(bytes.to_vec()).map_err(|e| PipeError::Parse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_string() {
        let mut buf = Vec::new();
        "hello".to_string().encode(&mut buf);
        let mut slice = buf.as_slice();
        assert_eq!(String::decode(&mut slice).unwrap(), "hello");
        assert!(slice.is_empty());
    }

    #[test]
    fn round_trips_numeric() {
        let mut buf = Vec::new();
        42i64.encode(&mut buf);
        (-1.5f64).encode(&mut buf);
        let mut slice = buf.as_slice();
        assert_eq!(i64::decode(&mut slice).unwrap(), 42);
        assert_eq!(f64::decode(&mut slice).unwrap(), -1.5);
    }
}
