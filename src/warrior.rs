use std::fmt;

use crate::preprocess::Metadata;
use crate::redcode::Instruction;

/// An assembled warrior: the load file.
///
/// Field values are already reduced modulo the core size and stay relative
/// to the cell holding them, so the warrior can be copied anywhere in the
/// core unchanged. `start` is the entry point as an offset from the first
/// instruction.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Warrior {
    pub metadata: Metadata,
    pub instructions: Vec<Instruction>,
    pub start: u32,
}

impl Warrior {
    pub fn new(instructions: Vec<Instruction>, start: u32) -> Self {
        Self {
            metadata: Metadata::default(),
            instructions,
            start,
        }
    }

    /// The `;name` of the warrior, or `"Unknown"` as pMARS reports it.
    pub fn name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or("Unknown")
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

/// Writes the load file: metadata comments, `ORG`, then one instruction per
/// line. The output is itself valid Redcode.
impl fmt::Display for Warrior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(redcode) = &self.metadata.redcode {
            writeln!(f, ";{redcode}")?;
        }
        if let Some(name) = &self.metadata.name {
            writeln!(f, ";name {name}")?;
        }
        if let Some(author) = &self.metadata.author {
            writeln!(f, ";author {author}")?;
        }
        for line in &self.metadata.strategy {
            writeln!(f, ";strategy {line}")?;
        }
        write!(f, "{:<8} {}", "ORG", self.start)?;
        for instruction in &self.instructions {
            write!(f, "\n{instruction}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::redcode::{Field, Modifier, Opcode};

    #[test]
    fn test_load_file_format() {
        let mut warrior = Warrior::new(
            vec![
                Instruction::new(Opcode::Mov, Modifier::I, Field::direct(0), Field::direct(1)),
                Instruction::new(
                    Opcode::Dat,
                    Modifier::F,
                    Field::immediate(0),
                    Field::immediate(0),
                ),
            ],
            0,
        );
        warrior.metadata.name = Some("Imp".into());
        assert_eq!(
            warrior.to_string(),
            ";name Imp\nORG      0\nMOV.I   $     0, $     1\nDAT.F   #     0, #     0"
        );
    }

    #[test]
    fn test_unnamed_warrior() {
        let warrior = Warrior::default();
        assert_eq!(warrior.name(), "Unknown");
        assert!(warrior.is_empty());
        assert_eq!(warrior.to_string(), "ORG      0");
    }
}
