use rand::{Rng, seq::SliceRandom};

const LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const DIGITS: &[u8] = b"0123456789";

/// Random guest name: five distinct letters followed by three distinct digits.
pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> String {
    let mut letters = LETTERS.to_vec();
    let mut digits = DIGITS.to_vec();
    letters.shuffle(rng);
    digits.shuffle(rng);

    letters[..5]
        .iter()
        .chain(&digits[..3])
        .map(|byte| char::from(*byte))
        .collect()
}

/// Generate names until `taken` rejects none of them.
pub fn generate_unique<R, F>(rng: &mut R, taken: F) -> String
where
    R: Rng + ?Sized,
    F: Fn(&str) -> bool,
{
    loop {
        let candidate = generate(rng);
        if !taken(&candidate) {
            return candidate;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    #[test]
    fn generated_names_have_the_expected_shape() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..100 {
            let name = generate(&mut rng);
            assert_eq!(name.len(), 8);

            let (letters, digits) = name.split_at(5);
            assert!(letters.chars().all(|c| c.is_ascii_lowercase()));
            assert!(digits.chars().all(|c| c.is_ascii_digit()));
            assert_eq!(letters.chars().collect::<HashSet<_>>().len(), 5);
            assert_eq!(digits.chars().collect::<HashSet<_>>().len(), 3);
        }
    }

    #[test]
    fn unique_generation_skips_taken_names() {
        let mut rng = StdRng::seed_from_u64(9);
        let first = generate(&mut rng);

        let mut rng = StdRng::seed_from_u64(9);
        let name = generate_unique(&mut rng, |candidate| candidate == first);
        assert_ne!(name, first);
    }
}
