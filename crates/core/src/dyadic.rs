/// A non-negative number `n * 2^p`, with `n` a `u64` mantissa and `p` a
/// signed exponent, used to compare ratios of integer products without
/// ever reaching for floating point or risking a `u64` overflow.
///
/// Ported from the fixed-point "per-kilo" arithmetic the weight nogood
/// manager needs: it only ever multiplies non-negative numbers together and
/// compares the results, so a full rational type would be overkill, but
/// plain `u64` multiplication overflows too easily once several weights and
/// vertex counts are chained. Deliberately has no `+`, `-`, `/`, or `==`:
/// like floating point, accuracy is lost on multiplication, so only `<` is
/// offered.
#[derive(Debug, Clone, Copy)]
pub struct DyadicFraction {
    mantissa: u64,
    exponent: i32,
}

impl DyadicFraction {
    pub fn new(x: u64) -> Self {
        DyadicFraction {
            mantissa: x,
            exponent: 0,
        }
    }

    /// Multiply in place by a plain integer.
    pub fn mult(&mut self, x: u64) -> &mut Self {
        let other = DyadicFraction::new(x);
        self.mult_fraction(&other)
    }

    /// Multiply in place by another dyadic fraction.
    pub fn mult_fraction(&mut self, other: &DyadicFraction) -> &mut Self {
        let (mut n1, mut p1) = (self.mantissa, self.exponent);
        let (mut n2, mut p2) = (other.mantissa, other.exponent);

        // Strip trailing zero bits from both mantissas first: these are
        // free to move into the exponent and shrink the eventual product
        // with no loss of precision.
        if n1 != 0 {
            let tz = n1.trailing_zeros();
            n1 >>= tz;
            p1 += tz as i32;
        }
        if n2 != 0 {
            let tz = n2.trailing_zeros();
            n2 >>= tz;
            p2 += tz as i32;
        }

        if n1 == 0 || n2 == 0 {
            self.mantissa = 0;
            self.exponent = 0;
            return self;
        }

        // If the product would still overflow 64 bits, shift the larger
        // mantissa down first, then split any further necessary shift
        // evenly between the two, so we lose as few bits as possible.
        let bits1 = 64 - n1.leading_zeros();
        let bits2 = 64 - n2.leading_zeros();
        let excess = (bits1 as i64 + bits2 as i64) - 64;
        if excess > 0 {
            let mut remaining = excess;
            let shift1 = remaining.min(bits1 as i64 - 1).max(0);
            n1 >>= shift1;
            p1 += shift1 as i32;
            remaining -= shift1;
            if remaining > 0 {
                let shift2 = remaining.min(bits2 as i64 - 1).max(0);
                n2 >>= shift2;
                p2 += shift2 as i32;
                remaining -= shift2;
            }
            // If there is still excess (both mantissas already tiny but
            // product still overflowed, which cannot actually happen once
            // both are stripped to <= 32 bits), fall back to shifting n1
            // harder; kept only as a safety net.
            if remaining > 0 {
                n1 >>= remaining.min(63) as u32;
                p1 += remaining as i32;
            }
        }

        self.mantissa = n1 * n2;
        self.exponent = p1 + p2;
        self
    }

    /// Multiply in place by `n / 1024`.
    pub fn mult_n_over_k(&mut self, n: u64) -> &mut Self {
        self.mult(n);
        self.exponent -= 10;
        self
    }

    /// Approximate value as an ordinary `f64`. For tests only: exact
    /// portability across platforms is not guaranteed (same caveat as any
    /// float).
    pub fn get_double(&self) -> f64 {
        (self.mantissa as f64) * 2f64.powi(self.exponent)
    }

    /// Approximate `log` of the value. For tests only; can stay accurate
    /// even when `get_double` under/overflows `f64` range.
    pub fn get_log(&self) -> f64 {
        if self.mantissa == 0 {
            f64::NEG_INFINITY
        } else {
            (self.mantissa as f64).ln() + (self.exponent as f64) * std::f64::consts::LN_2
        }
    }

    /// Exact, portable string representation (unlike `get_double`).
    pub fn repr(&self) -> String {
        format!("{}*2^{}", self.mantissa, self.exponent)
    }

    /// `self < other`, exact (no rounding: this is a comparison, not an
    /// arithmetic operation that could lose bits).
    ///
    /// No `<=` or `==` is offered, deliberately: like comparing floats,
    /// equality of two dyadic fractions built from different multiplication
    /// chains is rarely the question anyone actually wants to ask.
    pub fn less_than(&self, other: &DyadicFraction) -> bool {
        if self.mantissa == 0 {
            return other.mantissa != 0;
        }
        if other.mantissa == 0 {
            return false;
        }
        // Normalise exponents by shifting the smaller-exponent mantissa up,
        // bailing out to an exponent-only comparison if that shift would
        // itself overflow 64 bits (it cannot then change the outcome: the
        // value with the smaller exponent after such a huge shift is
        // necessarily still smaller).
        let bits1 = 64 - self.mantissa.leading_zeros();
        let bits2 = 64 - other.mantissa.leading_zeros();
        if self.exponent <= other.exponent {
            let shift = (other.exponent - self.exponent) as i64;
            if shift as u32 as i64 == shift && bits2 as i64 + shift <= 64 {
                return self.mantissa < (other.mantissa << shift as u32);
            }
            // other needed an unrepresentable upward shift to compare
            // mantissas directly: it is unambiguously the larger value.
            true
        } else {
            let shift = (self.exponent - other.exponent) as i64;
            if shift as u32 as i64 == shift && bits1 as i64 + shift <= 64 {
                return (self.mantissa << shift as u32) < other.mantissa;
            }
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn less_than_is_irreflexive() {
        let a = DyadicFraction::new(7);
        assert!(!a.less_than(&a));
    }

    #[test]
    fn less_than_is_antisymmetric() {
        let a = DyadicFraction::new(3);
        let b = DyadicFraction::new(9);
        assert!(a.less_than(&b));
        assert!(!b.less_than(&a));
    }

    #[test]
    fn mult_matches_plain_arithmetic_for_small_values() {
        let mut a = DyadicFraction::new(6);
        a.mult(7);
        assert!((a.get_double() - 42.0).abs() < 1e-9);
    }

    #[test]
    fn mult_n_over_k_divides_by_1024() {
        let mut a = DyadicFraction::new(2048);
        a.mult_n_over_k(512);
        // 2048 * 512 / 1024 == 1024
        assert!((a.get_double() - 1024.0).abs() < 1e-6);
    }

    #[test]
    fn mult_never_panics_near_u64_max() {
        let mut a = DyadicFraction::new(u64::MAX);
        a.mult_fraction(&DyadicFraction::new(u64::MAX));
        // Just must not overflow/panic; magnitude should roughly double in
        // bit-length.
        assert!(a.get_log() > 120.0);
    }

    #[test]
    fn zero_is_the_smallest_value() {
        let zero = DyadicFraction::new(0);
        let one = DyadicFraction::new(1);
        assert!(zero.less_than(&one));
        assert!(!one.less_than(&zero));
        assert!(!zero.less_than(&zero));
    }
}
