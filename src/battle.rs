use std::fmt;

use rand::Rng;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use tracing::info;

use crate::config::MarsConfig;
use crate::error::MatchError;
use crate::pspace::PSpace;
use crate::scheduler::{Match, MatchOutcome, WarriorState};
use crate::warrior::Warrior;

/// Random placements tried per warrior before falling back to even spacing.
const PLACEMENT_ATTEMPTS: usize = 1000;

/// Win/loss/tie tally of one warrior over a battle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Score {
    pub wins: u32,
    pub losses: u32,
    pub ties: u32,
}

impl Score {
    /// pMARS scoring: three points per win, one per tie.
    pub fn points(&self) -> u32 {
        self.wins * 3 + self.ties
    }

    pub fn add(&mut self, other: Score) {
        self.wins += other.wins;
        self.losses += other.losses;
        self.ties += other.ties;
    }
}

/// Result of every round of a battle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BattleReport {
    pub names: Vec<String>,
    pub scores: Vec<Score>,
    /// Outcome of each round, in order.
    pub rounds: Vec<MatchOutcome>,
    /// Load offset of every warrior, per round.
    pub placements: Vec<Vec<u32>>,
}

impl fmt::Display for BattleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, score)) in self.names.iter().zip(&self.scores).enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(
                f,
                "{name} scores {} ({} wins, {} losses, {} ties)",
                score.points(),
                score.wins,
                score.losses,
                score.ties
            )?;
        }
        Ok(())
    }
}

/// Several rounds between the same warriors, with their P-spaces carried
/// from one round to the next.
pub struct Battle<'a> {
    config: MarsConfig,
    warriors: Vec<&'a Warrior>,
    rng: SmallRng,
}

impl<'a> Battle<'a> {
    /// The configuration's warrior count is set to the number of warriors
    /// given, so placement is validated for exactly this battle.
    pub fn new(config: &MarsConfig, warriors: &[&'a Warrior], seed: u64) -> Self {
        Self {
            config: MarsConfig {
                warriors: warriors.len().max(1),
                ..config.clone()
            },
            warriors: warriors.to_vec(),
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// Load offsets for one round. The first warrior always sits at 0 and
    /// every pair of warriors is at least `min_distance` apart around the
    /// core.
    fn place(&mut self) -> Vec<u32> {
        let n = self.warriors.len();
        let size = self.config.core_size;
        let distance = self.config.min_distance;
        let mut offsets = vec![0];
        if n == 2 {
            offsets.push(distance + self.rng.gen_range(0..=size - 2 * distance));
            return offsets;
        }
        for _ in 1..n {
            let found = (0..PLACEMENT_ATTEMPTS).find_map(|_| {
                let candidate = self.rng.gen_range(0..size);
                offsets
                    .iter()
                    .all(|&o| circular_distance(o, candidate, size) >= distance)
                    .then_some(candidate)
            });
            match found {
                Some(offset) => offsets.push(offset),
                None => {
                    return (0..n as u64)
                        .map(|i| (i * u64::from(size) / n as u64) as u32)
                        .collect();
                }
            }
        }
        offsets
    }

    /// Fight every round and tally the results.
    pub fn run(&mut self) -> Result<BattleReport, MatchError> {
        if self.warriors.is_empty() {
            return Err(MatchError::NoWarriors);
        }
        self.config.validate()?;

        let n = self.warriors.len();
        let mut pspaces: Vec<PSpace> = (0..n)
            .map(|_| PSpace::new(self.config.pspace_size, self.config.core_size))
            .collect();
        let mut report = BattleReport {
            names: self.warriors.iter().map(|w| w.name().to_string()).collect(),
            scores: vec![Score::default(); n],
            rounds: Vec::with_capacity(self.config.rounds as usize),
            placements: Vec::with_capacity(self.config.rounds as usize),
        };

        for round in 0..self.config.rounds {
            let offsets = self.place();
            let placed: Vec<(&Warrior, u32)> =
                self.warriors.iter().copied().zip(offsets.iter().copied()).collect();
            let mut fight = Match::new(&self.config, &placed, pspaces)?;
            let outcome = fight.run();

            let results = round_results(&outcome, fight.warrior_states());
            for (score, result) in report.scores.iter_mut().zip(&results) {
                score.add(result.score);
            }
            pspaces = fight.into_pspaces();
            for (pspace, result) in pspaces.iter_mut().zip(&results) {
                pspace.set_last_result(result.pspace_result);
            }

            info!(round = round + 1, ?offsets, "{outcome}");
            report.rounds.push(outcome);
            report.placements.push(offsets);
        }
        Ok(report)
    }
}

struct RoundResult {
    score: Score,
    /// Value left in P-space cell 0 for the next round.
    pspace_result: u32,
}

/// Scores one round. Survivors of a tie share it; when everyone died in the
/// same final cycle, those warriors tie and the earlier casualties lose. The
/// P-space result is the number of survivors for a survivor and 0 otherwise.
fn round_results(outcome: &MatchOutcome, states: &[WarriorState]) -> Vec<RoundResult> {
    let survivors = outcome.survivors();
    states
        .iter()
        .map(|state| {
            let survived = survivors.contains(&state.id);
            let score = match outcome {
                MatchOutcome::Win { warrior, .. } if *warrior == state.id => Score {
                    wins: 1,
                    ..Default::default()
                },
                MatchOutcome::Win { .. } => Score {
                    losses: 1,
                    ..Default::default()
                },
                MatchOutcome::Tie { survivors, cycle } => {
                    let tied = if survivors.is_empty() {
                        state.died_at == Some(*cycle)
                    } else {
                        survived
                    };
                    if tied {
                        Score {
                            ties: 1,
                            ..Default::default()
                        }
                    } else {
                        Score {
                            losses: 1,
                            ..Default::default()
                        }
                    }
                }
            };
            RoundResult {
                score,
                pspace_result: if survived { survivors.len() as u32 } else { 0 },
            }
        })
        .collect()
}

fn circular_distance(a: u32, b: u32, size: u32) -> u32 {
    let d = a.abs_diff(b);
    d.min(size - d)
}
