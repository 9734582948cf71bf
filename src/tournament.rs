use rayon::prelude::*;
use tracing::info;

use crate::battle::{Battle, Score};
use crate::config::MarsConfig;
use crate::error::MatchError;
use crate::warrior::Warrior;

/// One warrior's line in the final table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Standing {
    /// Position of the warrior in the input.
    pub index: usize,
    pub name: String,
    pub score: Score,
}

impl Standing {
    pub fn points(&self) -> u32 {
        self.score.points()
    }
}

/// Seed for the battle between warriors `i` and `j`, so every pairing is
/// reproducible on its own regardless of scheduling order.
fn pair_seed(seed: u64, i: usize, j: usize) -> u64 {
    seed ^ ((i as u64) << 32 | j as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

/// Battle every unordered pair of warriors, in parallel, and rank them by
/// points. Equal points keep input order.
pub fn round_robin(
    config: &MarsConfig,
    warriors: &[Warrior],
    seed: u64,
) -> Result<Vec<Standing>, MatchError> {
    let pairs: Vec<(usize, usize)> = (0..warriors.len())
        .flat_map(|i| (i + 1..warriors.len()).map(move |j| (i, j)))
        .collect();

    let results = pairs
        .par_iter()
        .map(|&(i, j)| {
            let report =
                Battle::new(config, &[&warriors[i], &warriors[j]], pair_seed(seed, i, j)).run()?;
            Ok((i, j, report.scores[0], report.scores[1]))
        })
        .collect::<Result<Vec<_>, MatchError>>()?;

    let mut standings: Vec<Standing> = warriors
        .iter()
        .enumerate()
        .map(|(index, w)| Standing {
            index,
            name: w.name().to_string(),
            score: Score::default(),
        })
        .collect();
    for (i, j, a, b) in results {
        info!(
            first = %standings[i].name,
            second = %standings[j].name,
            first_points = a.points(),
            second_points = b.points(),
            "pairing finished"
        );
        standings[i].score.add(a);
        standings[j].score.add(b);
    }

    // Stable sort keeps input order among equal scores.
    standings.sort_by(|x, y| y.points().cmp(&x.points()));
    Ok(standings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::assemble;

    fn warrior(src: &str) -> Warrior {
        assemble(src, &MarsConfig::default()).unwrap().warrior
    }

    fn config() -> MarsConfig {
        MarsConfig {
            rounds: 2,
            max_cycles: 2000,
            ..Default::default()
        }
    }

    #[test]
    fn test_scores_and_order() {
        let warriors = vec![
            warrior(";name Bomb\ndat #0, #0"),
            warrior(";name Imp\nmov 0, 1"),
            warrior(";name Loop\njmp 0"),
        ];
        let standings = round_robin(&config(), &warriors, 1).unwrap();
        let names: Vec<&str> = standings.iter().map(|s| s.name.as_str()).collect();
        // Imp and Loop both beat Bomb and tie each other: 6 + 2 points each.
        assert_eq!(names, vec!["Imp", "Loop", "Bomb"]);
        assert_eq!(standings[0].points(), 8);
        assert_eq!(standings[1].points(), 8);
        assert_eq!(standings[2].points(), 0);
        assert_eq!(standings[2].score.losses, 4);
    }

    #[test]
    fn test_deterministic() {
        let warriors = vec![
            warrior("mov 0, 1"),
            warrior("add #4, 3\nmov 2, @2\njmp -2\ndat #0, #0"),
            warrior("spl 0\nmov 0, 1"),
        ];
        let a = round_robin(&config(), &warriors, 42).unwrap();
        let b = round_robin(&config(), &warriors, 42).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_fewer_than_two_warriors() {
        let warriors = vec![warrior("jmp 0")];
        let standings = round_robin(&config(), &warriors, 0).unwrap();
        assert_eq!(standings.len(), 1);
        assert_eq!(standings[0].points(), 0);
    }

    #[test]
    fn test_pair_seeds_differ() {
        assert_ne!(pair_seed(1, 0, 1), pair_seed(1, 0, 2));
        assert_ne!(pair_seed(1, 0, 1), pair_seed(1, 1, 0));
    }
}
