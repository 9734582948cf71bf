use std::collections::VecDeque;
use std::fmt;

use tracing::{debug, info, trace};

use crate::config::MarsConfig;
use crate::core::Core;
use crate::error::MatchError;
use crate::executor::{Next, execute};
use crate::pspace::PSpace;
use crate::warrior::Warrior;

/// How a match ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    /// The warrior with this index is the only one left (or, in a solo run,
    /// lasted until the cycle limit).
    Win { warrior: usize, cycle: u32 },
    /// Everyone died, or the cycle limit was hit with several survivors.
    Tie { survivors: Vec<usize>, cycle: u32 },
}

impl MatchOutcome {
    pub fn cycle(&self) -> u32 {
        match self {
            Self::Win { cycle, .. } | Self::Tie { cycle, .. } => *cycle,
        }
    }

    pub fn winner(&self) -> Option<usize> {
        match self {
            Self::Win { warrior, .. } => Some(*warrior),
            Self::Tie { .. } => None,
        }
    }

    /// Indices of the warriors still running when the match ended.
    pub fn survivors(&self) -> Vec<usize> {
        match self {
            Self::Win { warrior, .. } => vec![*warrior],
            Self::Tie { survivors, .. } => survivors.clone(),
        }
    }
}

impl fmt::Display for MatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Win { warrior, cycle } => write!(f, "warrior {warrior} wins at cycle {cycle}"),
            Self::Tie { survivors, cycle } if survivors.is_empty() => {
                write!(f, "tie at cycle {cycle}, no survivors")
            }
            Self::Tie { survivors, cycle } => {
                write!(f, "tie at cycle {cycle}, survivors {survivors:?}")
            }
        }
    }
}

/// Per-warrior scheduling state.
#[derive(Debug, Clone)]
pub struct WarriorState {
    /// Index of the warrior in the order it was passed to [`Match::new`].
    pub id: usize,
    pub name: String,
    /// Program counters of the warrior's processes, in execution order.
    pub queue: VecDeque<u32>,
    pub alive: bool,
    /// The cycle (1-based) in which the last process died.
    pub died_at: Option<u32>,
    pub pspace: PSpace,
}

/// One match: a core, the warriors loaded into it and their process queues.
pub struct Match {
    core: Core,
    warriors: Vec<WarriorState>,
    max_cycles: u32,
    max_processes: usize,
    cycle: u32,
    outcome: Option<MatchOutcome>,
}

impl Match {
    /// Load each warrior at its offset and queue its starting processes.
    ///
    /// `pspaces` are handed to the warriors in order; warriors without one
    /// get a fresh P-space.
    pub fn new(
        config: &MarsConfig,
        warriors: &[(&Warrior, u32)],
        pspaces: Vec<PSpace>,
    ) -> Result<Self, MatchError> {
        config.validate()?;
        if warriors.is_empty() {
            return Err(MatchError::NoWarriors);
        }
        if warriors.len() > config.warriors {
            return Err(MatchError::TooManyWarriors {
                given: warriors.len(),
                allowed: config.warriors,
            });
        }

        let mut core = Core::new(config.core_size);
        let mut pspaces = pspaces.into_iter();
        let max_processes = config.max_processes as usize;
        let initial = (config.initial_processes.max(1) as usize).min(max_processes);
        let mut states = Vec::with_capacity(warriors.len());
        for (id, &(warrior, offset)) in warriors.iter().enumerate() {
            if warrior.len() > config.max_length as usize {
                return Err(MatchError::WarriorTooLong {
                    name: warrior.name().to_string(),
                    length: warrior.len(),
                    limit: config.max_length as usize,
                });
            }
            core.load(warrior, offset);
            let pc = core.add(offset, warrior.start);
            states.push(WarriorState {
                id,
                name: warrior.name().to_string(),
                queue: std::iter::repeat_n(pc, initial).collect(),
                alive: true,
                died_at: None,
                pspace: pspaces
                    .next()
                    .unwrap_or_else(|| PSpace::new(config.pspace_size, config.core_size)),
            });
        }

        Ok(Self {
            core,
            warriors: states,
            max_cycles: config.max_cycles,
            max_processes,
            cycle: 0,
            outcome: None,
        })
    }

    pub fn core(&self) -> &Core {
        &self.core
    }

    pub fn cycle(&self) -> u32 {
        self.cycle
    }

    pub fn warrior_states(&self) -> &[WarriorState] {
        &self.warriors
    }

    pub fn outcome(&self) -> Option<&MatchOutcome> {
        self.outcome.as_ref()
    }

    /// Give the P-spaces back, in warrior order, so they can outlive the
    /// match.
    pub fn into_pspaces(self) -> Vec<PSpace> {
        self.warriors.into_iter().map(|w| w.pspace).collect()
    }

    /// Run one full cycle: one step for every warrior still alive, in order.
    ///
    /// Returns the outcome once the match is over; further calls keep
    /// returning it without touching the core.
    pub fn step_cycle(&mut self) -> Option<MatchOutcome> {
        if let Some(outcome) = &self.outcome {
            return Some(outcome.clone());
        }

        for state in self.warriors.iter_mut().filter(|w| w.alive) {
            let Some(pc) = state.queue.pop_front() else {
                continue;
            };
            match execute(&mut self.core, &mut state.pspace, pc) {
                Next::Terminate => {}
                Next::Continue(next) => state.queue.push_back(next),
                Next::Split(next, target) => {
                    state.queue.push_back(next);
                    if state.queue.len() < self.max_processes {
                        state.queue.push_back(target);
                    }
                }
            }
            if state.queue.is_empty() {
                state.alive = false;
                state.died_at = Some(self.cycle + 1);
                debug!(warrior = state.id, name = %state.name, cycle = self.cycle, "warrior died");
            }
        }
        self.cycle += 1;
        trace!(cycle = self.cycle, "cycle complete");

        let outcome = self.check_outcome()?;
        info!(cycle = outcome.cycle(), "{outcome}");
        self.outcome = Some(outcome.clone());
        Some(outcome)
    }

    fn check_outcome(&self) -> Option<MatchOutcome> {
        let alive: Vec<usize> = self
            .warriors
            .iter()
            .filter(|w| w.alive)
            .map(|w| w.id)
            .collect();
        let cycle = self.cycle;
        let out_of_time = cycle >= self.max_cycles;

        if self.warriors.len() == 1 {
            return match alive.as_slice() {
                [] => Some(MatchOutcome::Tie {
                    survivors: Vec::new(),
                    cycle,
                }),
                [only] if out_of_time => Some(MatchOutcome::Win {
                    warrior: *only,
                    cycle,
                }),
                _ => None,
            };
        }

        match alive.as_slice() {
            [] => Some(MatchOutcome::Tie {
                survivors: Vec::new(),
                cycle,
            }),
            [only] => Some(MatchOutcome::Win {
                warrior: *only,
                cycle,
            }),
            _ if out_of_time => Some(MatchOutcome::Tie {
                survivors: alive,
                cycle,
            }),
            _ => None,
        }
    }

    /// Step until the match ends.
    pub fn run(&mut self) -> MatchOutcome {
        loop {
            if let Some(outcome) = self.step_cycle() {
                return outcome;
            }
        }
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::redcode::{AddressMode, Field, Instruction, Modifier, Opcode};
    use proptest::prelude::*;

    fn arb_instruction(size: u32) -> impl Strategy<Value = Instruction> {
        (
            0..Opcode::ALL.len(),
            0..Modifier::ALL.len(),
            0..AddressMode::ALL.len(),
            0..size,
            0..AddressMode::ALL.len(),
            0..size,
        )
            .prop_map(|(op, m, am, av, bm, bv)| {
                Instruction::new(
                    Opcode::ALL[op],
                    Modifier::ALL[m],
                    Field::new(AddressMode::ALL[am], av),
                    Field::new(AddressMode::ALL[bm], bv),
                )
            })
    }

    proptest! {
        #[test]
        fn fields_stay_in_core_range(
            a in prop::collection::vec(arb_instruction(200), 1..10),
            b in prop::collection::vec(arb_instruction(200), 1..10),
            cycles in 1usize..300,
        ) {
            let config = MarsConfig {
                core_size: 200,
                max_cycles: 2000,
                max_processes: 64,
                max_length: 10,
                min_distance: 10,
                pspace_size: 8,
                ..Default::default()
            };
            let wa = Warrior::new(a, 0);
            let wb = Warrior::new(b, 0);
            let mut m = Match::new(&config, &[(&wa, 0), (&wb, 100)], Vec::new()).unwrap();
            for _ in 0..cycles {
                if m.step_cycle().is_some() {
                    break;
                }
            }
            for cell in m.core().cells() {
                prop_assert!(cell.a.value < 200);
                prop_assert!(cell.b.value < 200);
            }
            for state in m.warrior_states() {
                prop_assert!(state.queue.len() <= 64);
                prop_assert!(state.queue.iter().all(|&pc| pc < 200));
                prop_assert_eq!(state.alive, !state.queue.is_empty());
            }
        }
    }
}
