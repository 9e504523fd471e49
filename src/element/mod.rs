//! The tuple/stream element model (spec §4.1, §3).

mod csv;
mod null_bitmap;
mod punctuation;
mod stream_element;
pub mod tuple;
mod wire;

pub use csv::{field_is_null, CsvExtractor};
pub use null_bitmap::NullBitmap;
pub use punctuation::{Punctuation, PunctuationKind, PunctuationPtr};
pub use stream_element::StreamElement;
pub use tuple::{
    Tuple, Tuple1, Tuple10, Tuple11, Tuple12, Tuple13, Tuple14, Tuple15, Tuple16, Tuple2, Tuple3,
    Tuple4, Tuple5, Tuple6, Tuple7, Tuple8, Tuple9,
};
pub use wire::WireAttribute;
