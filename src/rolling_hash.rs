/// Adler-32 style weak checksum over a sliding window.
///
/// `a` is the byte sum, `b` the sum of running `a` values; both are kept
/// modulo the largest 16-bit prime so the digest packs into a `u32`.
const MOD_ADLER: u32 = 65521;

#[derive(Debug, Clone, Copy)]
pub struct RollingHash {
    a: u32,
    b: u32,
    window: u32,
}

impl RollingHash {
    /// Hash a full window of bytes.
    pub fn over(window: &[u8]) -> Self {
        // Sum in u64 and reduce once at the end.
        let (a, b) = window.iter().fold((1u64, 0u64), |(a, b), &byte| {
            let a = a + byte as u64;
            (a, b + a)
        });
        Self {
            a: (a % MOD_ADLER as u64) as u32,
            b: (b % MOD_ADLER as u64) as u32,
            window: window.len() as u32,
        }
    }

    /// Slide the window one byte: `leaving` drops off the front, `entering` joins the back.
    pub fn roll(&mut self, leaving: u8, entering: u8) {
        let out = leaving as u32;
        let inc = entering as u32;

        self.a = (self.a + MOD_ADLER - out + inc) % MOD_ADLER;
        self.b = (self.b + MOD_ADLER - 1 + self.a - (out * self.window) % MOD_ADLER) % MOD_ADLER;
    }

    pub fn digest(&self) -> u32 {
        (self.b << 16) | self.a
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_window_same_digest() {
        let data = b"DUKE3D.GRP lump";
        assert_eq!(RollingHash::over(data).digest(), RollingHash::over(data).digest());
    }

    #[test]
    fn test_different_windows_differ() {
        assert_ne!(
            RollingHash::over(b"TILES000.ART").digest(),
            RollingHash::over(b"TILES001.ART").digest()
        );
    }

    #[test]
    fn test_roll_matches_fresh_hash() {
        let data: Vec<u8> = (0..=255u8).cycle().take(600).collect();
        let window = 64;

        let mut rolling = RollingHash::over(&data[..window]);
        for start in 1..=data.len() - window {
            rolling.roll(data[start - 1], data[start + window - 1]);
            let fresh = RollingHash::over(&data[start..start + window]);
            assert_eq!(rolling.digest(), fresh.digest(), "window at {start}");
        }
    }

    #[test]
    fn test_roll_over_high_bytes() {
        let data = [0xFFu8, 0xFF, 0x00, 0xFF, 0x01];
        let mut rolling = RollingHash::over(&data[..4]);
        rolling.roll(data[0], data[4]);
        assert_eq!(rolling.digest(), RollingHash::over(&data[1..]).digest());
    }
}
