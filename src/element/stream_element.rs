use std::sync::Arc;

use crate::element::tuple::Tuple;
use crate::element::wire::WireAttribute;
use crate::element::NullBitmap;
use crate::error::PipeError;
use crate::timestamp::Timestamp;

const DISCRIMINATOR_NORMAL: u8 = 0x00;
const DISCRIMINATOR_PUNCTUATION: u8 = 0x01;

/// A shared-ownership, reference-counted stream element (spec §3, "shared
/// reference count so the same element may be forwarded to many
/// subscribers without copying"). `Arc` plays the role the original fills
/// with an intrusive `boost::intrusive_ptr` — per §9 that pointer type is an
/// optimization, not a contract; the contract is "shared, non-mutating
/// after publish".
#[derive(Clone, Debug)]
pub struct StreamElement<T: Tuple> {
    inner: Arc<Inner<T>>,
}

#[derive(Debug)]
struct Inner<T: Tuple> {
    tuple: T,
    timestamp: Timestamp,
}

impl<T: Tuple> StreamElement<T> {
    pub fn new(tuple: T, timestamp: Timestamp) -> Self {
        Self {
            inner: Arc::new(Inner { tuple, timestamp }),
        }
    }

    /// Alias for [`Self::new`] matching the original's `makeTuplePtr(...)`
    /// naming (spec §9's "Heterogeneous tuples" note).
    pub fn make(tuple: T, timestamp: Timestamp) -> Self {
        Self::new(tuple, timestamp)
    }

    pub fn tuple(&self) -> &T {
        &self.inner.tuple
    }

    pub fn timestamp(&self) -> Timestamp {
        self.inner.timestamp
    }

    pub fn with_timestamp(&self, timestamp: Timestamp) -> Self
    where
        T: Clone,
    {
        Self::new(self.inner.tuple.clone(), timestamp)
    }

    /// Serializes `discriminator | attr_0..N-1 | null_bitmap` per §6.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = vec![DISCRIMINATOR_NORMAL];
        self.inner.tuple.encode_attributes(&mut out);
        out.extend_from_slice(self.inner.tuple.null_bitmap().as_bytes());
        out
    }

    pub fn decode(bytes: &[u8], timestamp: Timestamp) -> Result<Self, PipeError>
    where
        T: DecodeBitmap,
    {
        let mut input = bytes;
        let discriminator = take_byte(&mut input)?;
        if discriminator != DISCRIMINATOR_NORMAL {
            return Err(PipeError::Parse(
                "expected Normal discriminator".to_string(),
            ));
        }
        let bitmap_len = T::NUM_ATTRIBUTES.div_ceil(8);
        // Attributes come first, then the bitmap: we must decode attributes
        // before we know the bitmap so we split from the tail.
        if input.len() < bitmap_len {
            return Err(PipeError::Parse("truncated null bitmap".to_string()));
        }
        let split = input.len() - bitmap_len;
        let (attr_bytes, bitmap_bytes) = input.split_at(split);
        let bitmap = NullBitmap::from_bytes(bitmap_bytes.to_vec());
        let mut attr_slice = attr_bytes;
        let tuple = T::decode_attributes(bitmap, &mut attr_slice)?;
        Ok(Self::new(tuple, timestamp))
    }
}

/// Helper so `decode` can name `T::NUM_ATTRIBUTES` without repeating the
/// full `Tuple` bound list at every call site.
pub trait DecodeBitmap: Tuple {}
impl<T: Tuple> DecodeBitmap for T {}

fn take_byte(input: &mut &[u8]) -> Result<u8, PipeError> {
    if input.is_empty() {
        return Err(PipeError::Parse("empty buffer".to_string()));
    }
    let b = input[0];
    *input = &input[1..];
    Ok(b)
}

impl<T: Tuple + PartialEq> PartialEq for StreamElement<T> {
    fn eq(&self, other: &Self) -> bool {
        self.inner.tuple == other.inner.tuple
    }
}

#[allow(dead_code)]
fn _assert_wire_attribute_usable<A: WireAttribute>() {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::tuple::Tuple2;

    #[test]
    fn round_trips_through_wire_format() {
        let mut t = Tuple2::new(42i64, "hello".to_string());
        t.set_null(1, false);
        let e = StreamElement::new(t, 123);
        let bytes = e.encode();
        let decoded = StreamElement::<Tuple2<i64, String>>::decode(&bytes, e.timestamp()).unwrap();
        assert_eq!(e, decoded);
        assert_eq!(decoded.timestamp(), 123);
    }
}
