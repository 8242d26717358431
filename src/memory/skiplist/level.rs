use rand::Rng;

/// Draws the height of a new node: one level to start with, plus one more
/// for every consecutive heads from a fair coin, stopping at `max_level`.
///
/// P(height = k) = 2^-k for k < max_level, with the tail folded into
/// `max_level`.
pub fn random_height<R: Rng>(rng: &mut R, max_level: usize) -> usize {
    let mut height = 1;
    while height < max_level && rng.random_bool(0.5) {
        height += 1;
    }
    height
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use super::random_height;

    #[test]
    fn test_height_bounds() {
        let mut rng = StdRng::seed_from_u64(7);
        for max_level in 1..=8 {
            for _ in 0..1000 {
                let height = random_height(&mut rng, max_level);
                assert!(height >= 1);
                assert!(height <= max_level);
            }
        }
    }

    #[test]
    fn test_single_level() {
        let mut rng = StdRng::seed_from_u64(0);
        for _ in 0..100 {
            assert_eq!(random_height(&mut rng, 1), 1);
        }
    }

    #[test]
    fn test_deterministic_with_seed() {
        let mut rng_1 = StdRng::seed_from_u64(1234);
        let mut rng_2 = StdRng::seed_from_u64(1234);
        let heights_1: Vec<usize> = (0..64).map(|_| random_height(&mut rng_1, 12)).collect();
        let heights_2: Vec<usize> = (0..64).map(|_| random_height(&mut rng_2, 12)).collect();
        assert_eq!(heights_1, heights_2);
    }

    #[test]
    fn test_geometric_distribution() {
        let mut rng = StdRng::seed_from_u64(99);
        let samples = 100_000;
        let mut counts = [0usize; 5];
        for _ in 0..samples {
            counts[random_height(&mut rng, 4)] += 1;
        }
        // expect roughly 1/2, 1/4, 1/8 and the folded tail 1/8
        let share = |c: usize| c as f64 / samples as f64;
        assert_eq!(counts[0], 0);
        assert!((share(counts[1]) - 0.5).abs() < 0.02);
        assert!((share(counts[2]) - 0.25).abs() < 0.02);
        assert!((share(counts[3]) - 0.125).abs() < 0.02);
        assert!((share(counts[4]) - 0.125).abs() < 0.02);
    }
}
