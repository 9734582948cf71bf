//! Redcode instruction model: opcodes, modifiers, addressing modes and the
//! ICWS'94 default-modifier table.

use std::fmt;
use std::str::FromStr;

/// Redcode opcodes, including the P-space extension (`LDP`, `STP`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Opcode {
    #[default]
    Dat,
    Mov,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Jmp,
    Jmz,
    Jmn,
    Djn,
    Cmp,
    Seq,
    Sne,
    Slt,
    Spl,
    Nop,
    Ldp,
    Stp,
}

impl Opcode {
    pub const ALL: [Opcode; 19] = [
        Opcode::Dat,
        Opcode::Mov,
        Opcode::Add,
        Opcode::Sub,
        Opcode::Mul,
        Opcode::Div,
        Opcode::Mod,
        Opcode::Jmp,
        Opcode::Jmz,
        Opcode::Jmn,
        Opcode::Djn,
        Opcode::Cmp,
        Opcode::Seq,
        Opcode::Sne,
        Opcode::Slt,
        Opcode::Spl,
        Opcode::Nop,
        Opcode::Ldp,
        Opcode::Stp,
    ];

    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Dat => "DAT",
            Opcode::Mov => "MOV",
            Opcode::Add => "ADD",
            Opcode::Sub => "SUB",
            Opcode::Mul => "MUL",
            Opcode::Div => "DIV",
            Opcode::Mod => "MOD",
            Opcode::Jmp => "JMP",
            Opcode::Jmz => "JMZ",
            Opcode::Jmn => "JMN",
            Opcode::Djn => "DJN",
            Opcode::Cmp => "CMP",
            Opcode::Seq => "SEQ",
            Opcode::Sne => "SNE",
            Opcode::Slt => "SLT",
            Opcode::Spl => "SPL",
            Opcode::Nop => "NOP",
            Opcode::Ldp => "LDP",
            Opcode::Stp => "STP",
        }
    }

    /// Whether the instruction may be written with a single operand.
    pub fn allows_single_operand(self) -> bool {
        matches!(self, Opcode::Dat | Opcode::Jmp | Opcode::Spl | Opcode::Nop)
    }
}

impl FromStr for Opcode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Opcode::ALL
            .iter()
            .copied()
            .find(|op| op.mnemonic().eq_ignore_ascii_case(s))
            .ok_or(())
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.mnemonic())
    }
}

/// Instruction modifiers: which fields of the operands an opcode reads and
/// writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Modifier {
    A,
    B,
    AB,
    BA,
    #[default]
    F,
    X,
    I,
}

impl Modifier {
    pub const ALL: [Modifier; 7] = [
        Modifier::A,
        Modifier::B,
        Modifier::AB,
        Modifier::BA,
        Modifier::F,
        Modifier::X,
        Modifier::I,
    ];

    pub fn suffix(self) -> &'static str {
        match self {
            Modifier::A => "A",
            Modifier::B => "B",
            Modifier::AB => "AB",
            Modifier::BA => "BA",
            Modifier::F => "F",
            Modifier::X => "X",
            Modifier::I => "I",
        }
    }

    /// The modifier an instruction gets when the source omits it
    /// (ICWS'94 draft, A.2.1.2: ICWS'88 to ICWS'94 conversion).
    pub fn default_for(opcode: Opcode, a_mode: AddressMode, b_mode: AddressMode) -> Self {
        let column = if a_mode == AddressMode::Immediate {
            0
        } else if b_mode == AddressMode::Immediate {
            1
        } else {
            2
        };
        DEFAULT_MODIFIERS[opcode as usize][column]
    }
}

impl FromStr for Modifier {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Modifier::ALL
            .iter()
            .copied()
            .find(|m| m.suffix().eq_ignore_ascii_case(s))
            .ok_or(())
    }
}

impl fmt::Display for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.suffix())
    }
}

use Modifier as M;

/// Default modifiers indexed by `Opcode as usize`, then by operand class:
/// A immediate, B immediate (A not), neither immediate.
const DEFAULT_MODIFIERS: [[Modifier; 3]; 19] = [
    [M::F, M::F, M::F],  // DAT
    [M::AB, M::B, M::I], // MOV
    [M::AB, M::B, M::F], // ADD
    [M::AB, M::B, M::F], // SUB
    [M::AB, M::B, M::F], // MUL
    [M::AB, M::B, M::F], // DIV
    [M::AB, M::B, M::F], // MOD
    [M::B, M::B, M::B],  // JMP
    [M::B, M::B, M::B],  // JMZ
    [M::B, M::B, M::B],  // JMN
    [M::B, M::B, M::B],  // DJN
    [M::AB, M::B, M::I], // CMP
    [M::AB, M::B, M::I], // SEQ
    [M::AB, M::B, M::I], // SNE
    [M::AB, M::B, M::B], // SLT
    [M::B, M::B, M::B],  // SPL
    [M::B, M::B, M::B],  // NOP
    [M::AB, M::B, M::B], // LDP
    [M::AB, M::B, M::B], // STP
];

/// Operand addressing modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AddressMode {
    Immediate,
    #[default]
    Direct,
    IndirectA,
    IndirectB,
    PreDecA,
    PreDecB,
    PostIncA,
    PostIncB,
}

impl AddressMode {
    pub const ALL: [AddressMode; 8] = [
        AddressMode::Immediate,
        AddressMode::Direct,
        AddressMode::IndirectA,
        AddressMode::IndirectB,
        AddressMode::PreDecA,
        AddressMode::PreDecB,
        AddressMode::PostIncA,
        AddressMode::PostIncB,
    ];

    pub fn symbol(self) -> char {
        match self {
            AddressMode::Immediate => '#',
            AddressMode::Direct => '$',
            AddressMode::IndirectA => '*',
            AddressMode::IndirectB => '@',
            AddressMode::PreDecA => '{',
            AddressMode::PreDecB => '<',
            AddressMode::PostIncA => '}',
            AddressMode::PostIncB => '>',
        }
    }

    pub fn from_symbol(c: char) -> Option<Self> {
        AddressMode::ALL.iter().copied().find(|m| m.symbol() == c)
    }

    /// Modes that follow the A-field of the intermediate cell.
    pub fn uses_a_field(self) -> bool {
        matches!(
            self,
            AddressMode::IndirectA | AddressMode::PreDecA | AddressMode::PostIncA
        )
    }
}

impl fmt::Display for AddressMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// One operand: an addressing mode and a value in `[0, core_size)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Field {
    pub mode: AddressMode,
    pub value: u32,
}

impl Field {
    pub fn new(mode: AddressMode, value: u32) -> Self {
        Self { mode, value }
    }

    pub fn immediate(value: u32) -> Self {
        Self::new(AddressMode::Immediate, value)
    }

    pub fn direct(value: u32) -> Self {
        Self::new(AddressMode::Direct, value)
    }
}

/// A fully resolved instruction as stored in the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Instruction {
    pub opcode: Opcode,
    pub modifier: Modifier,
    pub a: Field,
    pub b: Field,
}

impl Instruction {
    pub fn new(opcode: Opcode, modifier: Modifier, a: Field, b: Field) -> Self {
        Self {
            opcode,
            modifier,
            a,
            b,
        }
    }
}

/// Formats one line of a load file, e.g. `MOV.I   $     0, $     1`.
impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = format!("{}.{}", self.opcode, self.modifier);
        write!(
            f,
            "{:<8}{}{:>6}, {}{:>6}",
            op, self.a.mode, self.a.value, self.b.mode, self.b.value
        )
    }
}
