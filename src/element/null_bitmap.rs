/// One bit per attribute, `ceil(n/8)` bytes, matching the wire format of
/// spec §4.1/§6.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct NullBitmap(Vec<u8>);

impl NullBitmap {
    pub fn new(num_attributes: usize) -> Self {
        Self(vec![0u8; num_attributes.div_ceil(8)])
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn get(&self, i: usize) -> bool {
        self.0[i / 8] & (1 << (i % 8)) != 0
    }

    pub fn set(&mut self, i: usize, value: bool) {
        if value {
            self.0[i / 8] |= 1 << (i % 8);
        } else {
            self.0[i / 8] &= !(1 << (i % 8));
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_bits() {
        let mut bm = NullBitmap::new(10);
        bm.set(0, true);
        bm.set(9, true);
        bm.set(4, true);
        assert!(bm.get(0));
        assert!(bm.get(9));
        assert!(bm.get(4));
        assert!(!bm.get(1));
        bm.set(0, false);
        assert!(!bm.get(0));
        assert_eq!(bm.as_bytes().len(), 2);
    }
}
