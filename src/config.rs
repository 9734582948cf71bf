use crate::error::ConfigError;

/// Configuration shared by the assembler and the simulator.
///
/// The assembler needs it to reduce values modulo the core size and to
/// resolve the predefined constants (`CORESIZE`, `MAXCYCLES`, ...); the
/// simulator needs it for the limits of every match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarsConfig {
    /// Number of cells in the core.
    pub core_size: u32,
    /// Cycles before a match is declared a tie.
    pub max_cycles: u32,
    /// Maximum number of processes per warrior.
    pub max_processes: u32,
    /// Maximum number of instructions in a warrior.
    pub max_length: u32,
    /// Minimum distance between the first cells of two warriors.
    pub min_distance: u32,
    /// Number of warriors allowed in one match.
    pub warriors: usize,
    /// Number of rounds fought in a battle.
    pub rounds: u32,
    /// Processes each warrior starts with, all at its start offset.
    pub initial_processes: u32,
    /// Number of cells of private storage per warrior.
    pub pspace_size: u32,
}

impl Default for MarsConfig {
    fn default() -> Self {
        Self {
            core_size: 8000,
            max_cycles: 80_000,
            max_processes: 8000,
            max_length: 100,
            min_distance: 100,
            warriors: 2,
            rounds: 1,
            initial_processes: 1,
            pspace_size: 500, // core_size / 16
        }
    }
}

impl MarsConfig {
    /// Configuration for a given core size, with the other limits scaled the
    /// way pMARS scales its defaults.
    pub fn with_core_size(core_size: u32) -> Self {
        Self {
            core_size,
            max_processes: core_size,
            max_cycles: core_size.saturating_mul(10),
            pspace_size: (core_size / 16).max(1),
            ..Default::default()
        }
    }

    /// Reject configurations the simulator cannot run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.core_size == 0 {
            return Err(ConfigError::InvalidCoreSize);
        }
        if self.max_cycles == 0 {
            return Err(ConfigError::InvalidMaxCycles);
        }
        if self.max_processes == 0 {
            return Err(ConfigError::InvalidMaxProcesses);
        }
        if self.warriors == 0 {
            return Err(ConfigError::InvalidWarriorCount);
        }
        if self.pspace_size == 0 {
            return Err(ConfigError::InvalidPSpaceSize);
        }
        if self.max_length > self.min_distance {
            return Err(ConfigError::LengthExceedsDistance {
                max_length: self.max_length,
                min_distance: self.min_distance,
            });
        }
        if u64::from(self.min_distance) * self.warriors as u64 > u64::from(self.core_size) {
            return Err(ConfigError::CoreTooSmall {
                warriors: self.warriors,
                min_distance: self.min_distance,
                core_size: self.core_size,
            });
        }
        Ok(())
    }

    /// Reduce a signed value into `[0, core_size)`.
    pub fn normalize(&self, value: i64) -> u32 {
        value.rem_euclid(i64::from(self.core_size)) as u32
    }
}
