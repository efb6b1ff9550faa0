use crate::time::Duration;

#[derive(Debug)]
pub(crate) struct Rand {
    state: u64,
}

impl Rand {
    pub(crate) const fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    pub(crate) fn rand_u32(&mut self) -> u32 {
        // sPCG32 from https://www.pcg-random.org/paper.html
        // see also https://nullprogram.com/blog/2017/09/21/
        const M: u64 = 0xbb2efcec3c39611d;
        const A: u64 = 0x7590ef39;

        let s = self.state.wrapping_mul(M).wrapping_add(A);
        self.state = s;

        let shift = 29 - (s >> 61);
        (s >> shift) as u32
    }

    pub(crate) fn rand_u64(&mut self) -> u64 {
        ((self.rand_u32() as u64) << 32) | self.rand_u32() as u64
    }

    /// A duration picked uniformly from `min..=max`.
    pub(crate) fn rand_duration(&mut self, min: Duration, max: Duration) -> Duration {
        if max <= min {
            return min;
        }
        let span = (max - min).total_micros();
        let offset = match span.checked_add(1) {
            Some(modulus) => self.rand_u64() % modulus,
            None => self.rand_u64(),
        };
        min + Duration::from_micros(offset)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_duration_in_range() {
        let mut rand = Rand::new(0x1234);
        let min = Duration::from_secs(1);
        let max = Duration::from_secs(2);
        for _ in 0..100 {
            let d = rand.rand_duration(min, max);
            assert!(d >= min && d <= max);
        }
    }

    #[test]
    fn test_duration_empty_range() {
        let mut rand = Rand::new(7);
        let d = Duration::from_millis(500);
        assert_eq!(rand.rand_duration(d, d), d);
        assert_eq!(rand.rand_duration(d, Duration::ZERO), d);
    }

    #[test]
    fn test_deterministic() {
        let mut a = Rand::new(42);
        let mut b = Rand::new(42);
        assert_eq!(a.rand_u64(), b.rand_u64());
    }
}
