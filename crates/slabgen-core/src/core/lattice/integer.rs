/// Remainder with the sign of the divisor (floored division), so that
/// `a == floor_div(a, b) * b + floor_mod(a, b)` for any nonzero `b`.
#[inline]
pub fn floor_mod(a: i64, b: i64) -> i64 {
    ((a % b) + b) % b
}

/// Quotient rounded towards negative infinity.
#[inline]
pub fn floor_div(a: i64, b: i64) -> i64 {
    (a - floor_mod(a, b)) / b
}

/// Greatest common divisor, always non-negative. `gcd(0, 0) == 0`.
pub fn gcd(a: i64, b: i64) -> i64 {
    let (mut a, mut b) = (a.abs(), b.abs());
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// Extended Euclidean algorithm returning Bézout coefficients `(x, y)` such that
/// `a * x + b * y` equals a greatest common divisor of `a` and `b` (up to sign).
///
/// The recursion is unrolled: quotients are stacked on the way down and folded back on
/// the way up. The base cases are `b == 0 -> (1, 0)` and `a mod b == 0 -> (0, 1)`, with
/// floored division throughout, which fixes the sign convention of the coefficients.
pub fn ext_gcd(a: i64, b: i64) -> (i64, i64) {
    let mut quotients = Vec::new();
    let (mut a, mut b) = (a, b);
    let (mut x, mut y) = loop {
        if b == 0 {
            break (1, 0);
        }
        let remainder = floor_mod(a, b);
        if remainder == 0 {
            break (0, 1);
        }
        quotients.push(floor_div(a, b));
        (a, b) = (b, remainder);
    };
    while let Some(q) = quotients.pop() {
        (x, y) = (y, x - y * q);
    }
    (x, y)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recursive_ext_gcd(a: i64, b: i64) -> (i64, i64) {
        if b == 0 {
            (1, 0)
        } else if floor_mod(a, b) == 0 {
            (0, 1)
        } else {
            let (x, y) = recursive_ext_gcd(b, floor_mod(a, b));
            (y, x - y * floor_div(a, b))
        }
    }

    #[test]
    fn floor_division_follows_the_divisor_sign() {
        assert_eq!(floor_mod(5, -3), -1);
        assert_eq!(floor_mod(-5, 3), 1);
        assert_eq!(floor_div(5, -3), -2);
        assert_eq!(floor_div(-5, 3), -2);
        assert_eq!(floor_div(6, 3), 2);
    }

    #[test]
    fn gcd_is_non_negative() {
        assert_eq!(gcd(12, -18), 6);
        assert_eq!(gcd(-4, 0), 4);
        assert_eq!(gcd(0, 0), 0);
    }

    #[test]
    fn ext_gcd_base_cases() {
        assert_eq!(ext_gcd(7, 0), (1, 0));
        assert_eq!(ext_gcd(6, 3), (0, 1));
        assert_eq!(ext_gcd(0, 5), (0, 1));
    }

    #[test]
    fn ext_gcd_matches_the_recursive_definition() {
        for a in -12..=12 {
            for b in -12..=12 {
                assert_eq!(ext_gcd(a, b), recursive_ext_gcd(a, b), "a={a}, b={b}");
            }
        }
    }

    #[test]
    fn ext_gcd_returns_bezout_coefficients() {
        for (a, b) in [(3, 5), (12, 18), (-4, 7), (9, -6), (1, 1), (35, 64)] {
            let (x, y) = ext_gcd(a, b);
            assert_eq!((a * x + b * y).abs(), gcd(a, b), "a={a}, b={b}");
        }
    }
}
