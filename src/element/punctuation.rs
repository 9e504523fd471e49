use std::sync::Arc;

use crate::error::PipeError;
use crate::table::TransactionId;
use crate::timestamp::Timestamp;

const DISCRIMINATOR_PUNCTUATION: u8 = 0x01;

/// Control signal travelling inline with data on a punctuation channel
/// (spec §3). The payload carried by `WindowExpired`/`SlideExpired` is left
/// empty — see SPEC_FULL.md §11.1 for why that divergence from the
/// original's unfinished `writeToStream` is intentional.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum PunctuationKind {
    EndOfStream,
    EndOfSubStream,
    WindowExpired,
    SlideExpired,
    TxBegin(TransactionId),
    TxCommit(TransactionId),
}

impl PunctuationKind {
    fn wire_tag(&self) -> u8 {
        match self {
            PunctuationKind::EndOfStream => 0,
            PunctuationKind::EndOfSubStream => 1,
            PunctuationKind::WindowExpired => 2,
            PunctuationKind::SlideExpired => 3,
            PunctuationKind::TxBegin(_) => 4,
            PunctuationKind::TxCommit(_) => 5,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Punctuation {
    pub kind: PunctuationKind,
    pub timestamp: Timestamp,
}

/// Punctuations are shared (spec §3) and forwarded by every operator that
/// does not consume them.
pub type PunctuationPtr = Arc<Punctuation>;

impl Punctuation {
    pub fn new(kind: PunctuationKind, timestamp: Timestamp) -> PunctuationPtr {
        Arc::new(Self { kind, timestamp })
    }

    pub fn end_of_stream(timestamp: Timestamp) -> PunctuationPtr {
        Self::new(PunctuationKind::EndOfStream, timestamp)
    }

    pub fn end_of_sub_stream(timestamp: Timestamp) -> PunctuationPtr {
        Self::new(PunctuationKind::EndOfSubStream, timestamp)
    }

    pub fn window_expired(timestamp: Timestamp) -> PunctuationPtr {
        Self::new(PunctuationKind::WindowExpired, timestamp)
    }

    pub fn slide_expired(timestamp: Timestamp) -> PunctuationPtr {
        Self::new(PunctuationKind::SlideExpired, timestamp)
    }

    pub fn tx_begin(tx: TransactionId, timestamp: Timestamp) -> PunctuationPtr {
        Self::new(PunctuationKind::TxBegin(tx), timestamp)
    }

    pub fn tx_commit(tx: TransactionId, timestamp: Timestamp) -> PunctuationPtr {
        Self::new(PunctuationKind::TxCommit(tx), timestamp)
    }

    /// Wire format per §6: `discriminator(0x01) | timestamp:u64 | kind:u8 | [txId:u64]`.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(18);
        out.push(DISCRIMINATOR_PUNCTUATION);
        out.extend_from_slice(&self.timestamp.to_le_bytes());
        out.push(self.kind.wire_tag());
        match self.kind {
            PunctuationKind::TxBegin(tx) | PunctuationKind::TxCommit(tx) => {
                out.extend_from_slice(&tx.to_le_bytes());
            }
            _ => {}
        }
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, PipeError> {
        if bytes.len() < 10 {
            return Err(PipeError::Parse("truncated punctuation".to_string()));
        }
        if bytes[0] != DISCRIMINATOR_PUNCTUATION {
            return Err(PipeError::Parse(
                "expected Punctuation discriminator".to_string(),
            ));
        }
        let timestamp = Timestamp::from_le_bytes(bytes[1..9].try_into().unwrap());
        let tag = bytes[9];
        let kind = match tag {
            0 => PunctuationKind::EndOfStream,
            1 => PunctuationKind::EndOfSubStream,
            2 => PunctuationKind::WindowExpired,
            3 => PunctuationKind::SlideExpired,
            4 | 5 => {
                if bytes.len() < 18 {
                    return Err(PipeError::Parse("truncated tx punctuation".to_string()));
                }
                let tx = TransactionId::from_le_bytes(bytes[10..18].try_into().unwrap());
                if tag == 4 {
                    PunctuationKind::TxBegin(tx)
                } else {
                    PunctuationKind::TxCommit(tx)
                }
            }
            other => return Err(PipeError::Parse(format!("unknown punctuation tag {other}"))),
        };
        Ok(Punctuation { kind, timestamp })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_tx_begin() {
        let p = Punctuation::tx_begin(7, 99);
        let bytes = p.encode();
        let decoded = Punctuation::decode(&bytes).unwrap();
        assert_eq!(*p, decoded);
    }

    #[test]
    fn round_trips_end_of_stream() {
        let p = Punctuation::end_of_stream(1);
        let decoded = Punctuation::decode(&p.encode()).unwrap();
        assert_eq!(*p, decoded);
    }
}
