//! Number theory primitives: random ranges, Miller-Rabin, prime search and
//! square-and-multiply exponentiation.
//!
//! Every randomised function draws from [`OsRng`] and has a `*_with`
//! twin that takes the generator explicitly, so tests can seed it.

use num_bigint::{BigUint, RandBigInt};
use num_traits::{One, Zero};
use rand::rngs::OsRng;
use rand::{CryptoRng, Rng};

use crate::error::{Error, Result};

/// Default number of Miller-Rabin witnesses (false positive rate ≤ 4⁻⁴⁰).
pub const DEFAULT_ROUNDS: u32 = 40;

/// Primes used for trial division before Miller-Rabin.
const SMALL_PRIMES: [u32; 25] = [
    2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53, 59, 61, 67, 71, 73, 79, 83, 89, 97,
];

/// Square of the first prime past [`SMALL_PRIMES`]. Below this, surviving
/// trial division proves primality.
const TRIAL_DIVISION_LIMIT: u32 = 101 * 101;

/// Floor on the number of candidates [`generate_prime`] will try.
const MIN_PRIME_ATTEMPTS: u64 = 10_000;

/// Returns a uniformly random integer in `[1, bound - 1]`.
pub fn random_below(bound: &BigUint) -> Result<BigUint> {
    random_in(&BigUint::one(), bound)
}

/// Returns a uniformly random integer in `[low, bound - 1]`.
pub fn random_in(low: &BigUint, bound: &BigUint) -> Result<BigUint> {
    random_in_with(&mut OsRng, low, bound)
}

/// [`random_in`] with an explicit generator.
pub fn random_in_with<R: Rng + CryptoRng + ?Sized>(
    rng: &mut R,
    low: &BigUint,
    bound: &BigUint,
) -> Result<BigUint> {
    if bound <= low {
        return Err(Error::Generation(format!("empty range [{low}, {bound})")));
    }
    Ok(rng.gen_biguint_range(low, bound))
}

/// Probabilistic primality test with `rounds` Miller-Rabin witnesses.
pub fn is_probable_prime(n: &BigUint, rounds: u32) -> bool {
    is_probable_prime_with(&mut OsRng, n, rounds)
}

/// [`is_probable_prime`] with an explicit generator.
pub fn is_probable_prime_with<R: Rng + CryptoRng + ?Sized>(
    rng: &mut R,
    n: &BigUint,
    rounds: u32,
) -> bool {
    if n < &BigUint::from(2u32) {
        return false;
    }
    for p in SMALL_PRIMES {
        if *n == BigUint::from(p) {
            return true;
        }
        if (n % p).is_zero() {
            return false;
        }
    }
    if n < &BigUint::from(TRIAL_DIVISION_LIMIT) {
        return true;
    }

    // n - 1 = 2^s * d with d odd
    let one = BigUint::one();
    let n_minus_1 = n - 1u32;
    let mut d = n_minus_1.clone();
    let mut s = 0u32;
    while (&d % 2u32).is_zero() {
        d >>= 1u32;
        s += 1;
    }

    let two = BigUint::from(2u32);
    'witness: for _ in 0..rounds {
        let a = rng.gen_biguint_range(&two, &n_minus_1);
        let mut x = mod_exp(&a, &d, n);
        if x == one || x == n_minus_1 {
            continue;
        }
        for _ in 1..s {
            x = &x * &x % n;
            if x == n_minus_1 {
                continue 'witness;
            }
        }
        return false;
    }
    true
}

/// Searches for a probable prime of exactly `bits` bits.
///
/// Candidates are random with the top and bottom bits forced, so each one
/// is odd and full length. Gives up with [`Error::Generation`] after
/// `max(100 * bits, 10 000)` candidates, which at any real size means the
/// random source is broken.
pub fn generate_prime(bits: u64, rounds: u32) -> Result<BigUint> {
    generate_prime_with(&mut OsRng, bits, rounds)
}

/// [`generate_prime`] with an explicit generator.
pub fn generate_prime_with<R: Rng + CryptoRng + ?Sized>(
    rng: &mut R,
    bits: u64,
    rounds: u32,
) -> Result<BigUint> {
    if bits < 2 {
        return Err(Error::Generation(format!(
            "cannot generate a {bits}-bit prime"
        )));
    }
    let top = BigUint::one() << (bits - 1);
    let attempts = bits.saturating_mul(100).max(MIN_PRIME_ATTEMPTS);
    for attempt in 1..=attempts {
        let mut candidate = rng.gen_biguint(bits);
        candidate |= &top;
        candidate |= BigUint::one();
        if is_probable_prime_with(rng, &candidate, rounds) {
            tracing::trace!(bits, attempt, "found probable prime");
            return Ok(candidate);
        }
    }
    Err(Error::Generation(format!(
        "no {bits}-bit prime after {attempts} candidates"
    )))
}

/// Computes `base^exponent mod modulus` by right-to-left square-and-multiply.
///
/// Intermediates never exceed `modulus²`. Returns 0 for a modulus of 0 or 1.
pub fn mod_exp(base: &BigUint, exponent: &BigUint, modulus: &BigUint) -> BigUint {
    if modulus.is_zero() || modulus.is_one() {
        return BigUint::zero();
    }
    let mut result = BigUint::one();
    let mut square = base % modulus;
    let mut exp = exponent.clone();
    while !exp.is_zero() {
        if (&exp % 2u32).is_one() {
            result = result * &square % modulus;
        }
        exp >>= 1u32;
        if !exp.is_zero() {
            square = &square * &square % modulus;
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use num_traits::ToPrimitive;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    fn big(n: u64) -> BigUint {
        BigUint::from(n)
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(0xd1ff1e)
    }

    #[test]
    fn mod_exp_small_literals() {
        assert_eq!(mod_exp(&big(2), &big(10), &big(1000)), big(24));
        assert_eq!(mod_exp(&big(5), &big(0), &big(7)), big(1));
        assert_eq!(mod_exp(&big(7), &big(3), &big(13)), big(5));
    }

    #[test]
    fn mod_exp_degenerate_moduli() {
        assert_eq!(mod_exp(&big(9), &big(0), &big(1)), big(0));
        assert_eq!(mod_exp(&big(9), &big(4), &big(0)), big(0));
        assert_eq!(mod_exp(&big(0), &big(5), &big(11)), big(0));
    }

    #[test]
    fn mod_exp_agrees_with_modpow_on_large_operands() {
        let mut rng = rng();
        let modulus = rng.gen_biguint(512) | BigUint::one();
        for _ in 0..8 {
            let base = rng.gen_biguint(600);
            let exp = rng.gen_biguint(512);
            assert_eq!(mod_exp(&base, &exp, &modulus), base.modpow(&exp, &modulus));
        }
    }

    #[test]
    fn exponentiation_commutes() {
        let mut rng = rng();
        let p = generate_prime_with(&mut rng, 128, DEFAULT_ROUNDS).unwrap();
        let g = random_in_with(&mut rng, &big(2), &p).unwrap();
        let a = random_in_with(&mut rng, &big(1), &p).unwrap();
        let b = random_in_with(&mut rng, &big(1), &p).unwrap();
        let ga = mod_exp(&g, &a, &p);
        let gb = mod_exp(&g, &b, &p);
        assert_eq!(mod_exp(&gb, &a, &p), mod_exp(&ga, &b, &p));
    }

    #[test]
    fn known_primes_pass() {
        let mut rng = rng();
        for p in [2, 3, 5, 7, 97, 101, 7919, 104_729, 2_147_483_647] {
            assert!(is_probable_prime_with(&mut rng, &big(p), 20), "{p}");
        }
        let m127 = (BigUint::one() << 127u32) - 1u32;
        assert!(is_probable_prime_with(&mut rng, &m127, 20));
    }

    #[test]
    fn known_composites_fail() {
        let mut rng = rng();
        for n in [0, 1, 4, 9, 100, 1001, 10_201, 104_730] {
            assert!(!is_probable_prime_with(&mut rng, &big(n), 20), "{n}");
        }
    }

    #[test]
    fn carmichael_numbers_fail() {
        // 561 and 41041 fall to trial division; the others have no factor
        // below 101 and must be caught by Miller-Rabin.
        let mut rng = rng();
        for n in [561, 41_041, 3_828_001, 56_052_361] {
            assert!(!is_probable_prime_with(&mut rng, &big(n), 20), "{n}");
        }
    }

    #[test]
    fn generated_primes_have_exact_bit_length() {
        let mut rng = rng();
        for bits in [2, 16, 64, 256] {
            let p = generate_prime_with(&mut rng, bits, DEFAULT_ROUNDS).unwrap();
            assert_eq!(p.bits(), bits);
            assert!(is_probable_prime_with(&mut rng, &p, DEFAULT_ROUNDS));
        }
    }

    #[test]
    fn generate_prime_rejects_tiny_sizes() {
        assert!(matches!(generate_prime(1, 10), Err(Error::Generation(_))));
        assert!(matches!(generate_prime(0, 10), Err(Error::Generation(_))));
    }

    #[test]
    fn random_in_respects_bounds() {
        let mut rng = rng();
        let bound = big(17);
        for _ in 0..500 {
            let x = random_in_with(&mut rng, &big(2), &bound).unwrap();
            assert!(x >= big(2) && x < bound);
        }
        assert_eq!(random_in_with(&mut rng, &big(2), &big(3)).unwrap(), big(2));
    }

    #[test]
    fn random_below_covers_whole_range() {
        let mut seen = [false; 7];
        let mut rng = rng();
        for _ in 0..500 {
            let x = random_in_with(&mut rng, &big(1), &big(7)).unwrap();
            let idx = x.to_usize().unwrap();
            seen[idx] = true;
        }
        assert_eq!(seen, [false, true, true, true, true, true, true]);
    }

    #[test]
    fn random_rejects_empty_range() {
        assert!(matches!(random_below(&big(1)), Err(Error::Generation(_))));
        assert!(matches!(random_below(&big(0)), Err(Error::Generation(_))));
        assert!(matches!(random_in(&big(5), &big(5)), Err(Error::Generation(_))));
        assert!(random_below(&big(2)).is_ok_and(|x| x == big(1)));
    }
}
