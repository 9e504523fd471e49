//! `batch(n)` (spec §4.3): accumulates `n` input elements then emits one
//! element whose sole attribute is the vector of accumulated
//! `(element, outdated)` pairs.

use std::sync::Arc;

use crate::channel::{InputChannel, OutputChannel, PunctuationInputChannel, PunctuationOutputChannel};
use crate::element::{NullBitmap, StreamElement, Tuple};
use crate::error::PipeError;
use crate::operator::traits::{forwarding_punctuation_input, UnaryTransform};

/// The single-attribute output tuple of [`Batch`]: a fixed-size run of
/// `(element, outdated)` pairs of the upstream element type `T`.
#[derive(Clone)]
pub struct BatchedTuple<T: Tuple> {
    pub items: Vec<(T, bool)>,
    null_bitmap: NullBitmap,
}

impl<T: Tuple> BatchedTuple<T> {
    fn new(items: Vec<(T, bool)>) -> Self {
        Self {
            items,
            null_bitmap: NullBitmap::new(1),
        }
    }
}

impl<T: Tuple> Tuple for BatchedTuple<T> {
    const NUM_ATTRIBUTES: usize = 1;

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
        out.extend_from_slice(&(self.items.len() as u32).to_le_bytes());
        for (item, outdated) in &self.items {
            out.push(if *outdated { 1 } else { 0 });
            item.encode_attributes(out);
            out.extend_from_slice(item.null_bitmap().as_bytes());
        }
    }

    fn decode_attributes(bitmap: NullBitmap, input: &mut &[u8]) -> Result<Self, PipeError> {
        if input.len() < 4 {
            return Err(PipeError::Parse("truncated batch length".to_string()));
        }
        let (len_bytes, rest) = input.split_at(4);
        let len = u32::from_le_bytes(len_bytes.try_into().unwrap()) as usize;
        *input = rest;
        let mut items = Vec::with_capacity(len);
        let bitmap_len = T::NUM_ATTRIBUTES.div_ceil(8);
        for _ in 0..len {
            if input.is_empty() {
                return Err(PipeError::Parse("truncated batch item".to_string()));
            }
            let outdated = input[0] != 0;
            *input = &input[1..];
            if input.len() < bitmap_len {
                return Err(PipeError::Parse("truncated batch item bitmap".to_string()));
            }
            // attribute bytes precede the bitmap for each item, and we do
            // not know their length up front, so decode greedily and let
            // the item's own decoder consume exactly what it needs, then
            // split off the trailing bitmap.
            let item_bitmap = NullBitmap::from_bytes(input[input.len() - bitmap_len..].to_vec());
            let mut body = &input[..input.len() - bitmap_len];
            let before = body.len();
            let item = T::decode_attributes(item_bitmap, &mut body)?;
            let consumed = before - body.len();
            *input = &input[consumed..];
            items.push((item, outdated));
        }
        Ok(Self {
            items,
            null_bitmap: bitmap,
        })
    }
}

pub struct Batch<T: Tuple> {
    input: InputChannel<T>,
    output: OutputChannel<BatchedTuple<T>>,
    punct_out: Arc<PunctuationOutputChannel>,
}

impl<T: Tuple> Batch<T> {
    pub fn new(n: usize) -> Arc<Self> {
        assert!(n > 0, "batch size must be positive");
        let output = OutputChannel::one_to_many();
        let downstream = output.clone();
        let mut buffer: Vec<(T, bool)> = Vec::with_capacity(n);
        let mut last_ts = 0u64;
        let input = InputChannel::new(move |elem: StreamElement<T>, outdated| {
            last_ts = elem.timestamp();
            buffer.push((elem.tuple().clone(), outdated));
            if buffer.len() >= n {
                let batch = std::mem::replace(&mut buffer, Vec::with_capacity(n));
                downstream.publish(StreamElement::new(BatchedTuple::new(batch), last_ts), false);
            }
        });
        Arc::new(Self {
            input,
            output,
            punct_out: Arc::new(PunctuationOutputChannel::new()),
        })
    }

    pub fn punctuation_input(&self) -> PunctuationInputChannel {
        forwarding_punctuation_input(self.punct_out.clone())
    }
}

impl<T: Tuple> UnaryTransform<T, BatchedTuple<T>> for Batch<T> {
    fn input(&self) -> &InputChannel<T> {
        &self.input
    }
    fn output(&self) -> &OutputChannel<BatchedTuple<T>> {
        &self.output
    }
    fn punctuation_output(&self) -> &PunctuationOutputChannel {
        &self.punct_out
    }
}

impl<T: Tuple> crate::operator::traits::HasPunctuationOutput for Batch<T> {
    fn punctuation_output_channel(&self) -> Arc<PunctuationOutputChannel> {
        self.punct_out.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::connect;
    use crate::element::tuple::Tuple1;
    use parking_lot::Mutex;

    #[test]
    fn emits_after_n_elements() {
        let batch = Batch::<Tuple1<i64>>::new(3);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        let sink = InputChannel::new(move |e: StreamElement<BatchedTuple<Tuple1<i64>>>, _o| {
            let vals: Vec<i64> = e.tuple().items.iter().map(|(t, _)| t.a0).collect();
            s.lock().push(vals);
        });
        let _out_sub = connect(batch.output(), &sink).unwrap();
        let upstream = OutputChannel::one_to_one();
        let _in_sub = connect(&upstream, batch.input()).unwrap();
        for v in [1, 2, 3, 4, 5] {
            upstream.publish(StreamElement::new(Tuple1::new(v), 0), false);
        }
        assert_eq!(*seen.lock(), vec![vec![1, 2, 3]]);
    }

    #[test]
    fn round_trips_through_wire_format() {
        let batch = BatchedTuple::new(vec![(Tuple1::new(1i64), false), (Tuple1::new(2i64), true)]);
        let mut buf = Vec::new();
        batch.encode_attributes(&mut buf);
        let decoded =
            BatchedTuple::<Tuple1<i64>>::decode_attributes(batch.null_bitmap().clone(), &mut buf.as_slice())
                .unwrap();
        assert_eq!(decoded.items.len(), 2);
        assert_eq!(decoded.items[0].0.a0, 1);
        assert!(!decoded.items[0].1);
        assert_eq!(decoded.items[1].0.a0, 2);
        assert!(decoded.items[1].1);
    }
}
