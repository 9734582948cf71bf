use std::fmt;

use crate::redcode::Instruction;
use crate::warrior::Warrior;

/// The circular memory every warrior of a match shares.
///
/// All addresses are reduced modulo the core size before indexing, so reads
/// and writes can never go out of bounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Core {
    cells: Vec<Instruction>,
    fill: Instruction,
}

impl Core {
    /// A core of `size` cells, each holding `DAT.F $0, $0`.
    pub fn new(size: u32) -> Self {
        Self::with_fill(size, Instruction::default())
    }

    /// A zero size yields a single-cell core; `MarsConfig::validate` is
    /// where a zero core size gets rejected.
    pub fn with_fill(size: u32, fill: Instruction) -> Self {
        Self {
            cells: vec![fill; size.max(1) as usize],
            fill,
        }
    }

    pub fn size(&self) -> u32 {
        self.cells.len() as u32
    }

    #[inline(always)]
    fn index(&self, address: u32) -> usize {
        (address % self.size()) as usize
    }

    /// `(a + b) mod size` without overflow.
    #[inline(always)]
    pub fn add(&self, a: u32, b: u32) -> u32 {
        ((u64::from(a) + u64::from(b)) % u64::from(self.size())) as u32
    }

    /// A copy of the cell at `address`.
    pub fn read(&self, address: u32) -> Instruction {
        self.cells[self.index(address)]
    }

    pub fn write(&mut self, address: u32, instruction: Instruction) {
        let idx = self.index(address);
        self.cells[idx] = instruction;
    }

    /// In-place access for field updates during execution.
    pub fn cell_mut(&mut self, address: u32) -> &mut Instruction {
        let idx = self.index(address);
        &mut self.cells[idx]
    }

    /// Copy a warrior into consecutive cells starting at `at`, wrapping
    /// around the end of the core. Field values are reduced modulo the core
    /// size, so a warrior assembled for a larger core still keeps every
    /// field in range.
    pub fn load(&mut self, warrior: &Warrior, at: u32) {
        let size = self.size();
        for (offset, instruction) in warrior.instructions.iter().enumerate() {
            let mut instruction = *instruction;
            instruction.a.value %= size;
            instruction.b.value %= size;
            let address = self.add(at, offset as u32);
            self.write(address, instruction);
        }
    }

    pub fn cells(&self) -> &[Instruction] {
        &self.cells
    }

    pub fn snapshot(&self) -> Vec<Instruction> {
        self.cells.clone()
    }
}

/// Dumps every cell that differs from the fill instruction, one per line,
/// prefixed with its address.
impl fmt::Display for Core {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (address, cell) in self.cells.iter().enumerate() {
            if *cell == self.fill {
                continue;
            }
            if !first {
                writeln!(f)?;
            }
            first = false;
            write!(f, "{address:>5}  {cell}")?;
        }
        Ok(())
    }
}
