use rand::RngCore;

/// A generator that always yields the same word.
/// `ConstRng(0)` makes `Rng::random::<f64>()` return exactly 0, `ConstRng::MID` exactly 0.5.
pub struct ConstRng(pub u64);
impl ConstRng {
    pub const MID: ConstRng = ConstRng(1 << 63);
}
impl RngCore for ConstRng {
    fn next_u32(&mut self) -> u32 {
        self.0 as u32
    }
    fn next_u64(&mut self) -> u64 {
        self.0
    }
    fn fill_bytes(&mut self, dst: &mut [u8]) {
        let bytes = self.0.to_le_bytes();
        for (i, b) in dst.iter_mut().enumerate() {
            *b = bytes[i % 8];
        }
    }
}
