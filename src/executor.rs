//! Execution of a single Redcode instruction, following the ICWS'94 draft
//! (section A.5) as implemented by pMARS.

use crate::core::Core;
use crate::pspace::PSpace;
use crate::redcode::{AddressMode, Field, Instruction, Modifier, Opcode};

/// What the scheduler should queue after one instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Next {
    /// The process dies (`DAT`, or division by zero).
    Terminate,
    /// The process continues at the given address.
    Continue(u32),
    /// `SPL`: the fall-through address, then the new process's address.
    Split(u32, u32),
}

/// A resolved operand: the absolute address it points at and a copy of the
/// instruction found there at evaluation time.
struct Operand {
    address: u32,
    register: Instruction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sel {
    A,
    B,
}

fn get(instruction: &Instruction, sel: Sel) -> u32 {
    match sel {
        Sel::A => instruction.a.value,
        Sel::B => instruction.b.value,
    }
}

fn set(instruction: &mut Instruction, sel: Sel, value: u32) {
    match sel {
        Sel::A => instruction.a.value = value,
        Sel::B => instruction.b.value = value,
    }
}

/// (source field of the A register, destination field of the B target) pairs
/// an arithmetic, move or comparison opcode works on.
fn field_pairs(modifier: Modifier) -> &'static [(Sel, Sel)] {
    match modifier {
        Modifier::A => &[(Sel::A, Sel::A)],
        Modifier::B => &[(Sel::B, Sel::B)],
        Modifier::AB => &[(Sel::A, Sel::B)],
        Modifier::BA => &[(Sel::B, Sel::A)],
        Modifier::F | Modifier::I => &[(Sel::A, Sel::A), (Sel::B, Sel::B)],
        Modifier::X => &[(Sel::A, Sel::B), (Sel::B, Sel::A)],
    }
}

/// Fields of the B operand that `JMZ`, `JMN` and `DJN` test.
fn tested_fields(modifier: Modifier) -> &'static [Sel] {
    match modifier {
        Modifier::A | Modifier::BA => &[Sel::A],
        Modifier::B | Modifier::AB => &[Sel::B],
        Modifier::F | Modifier::X | Modifier::I => &[Sel::A, Sel::B],
    }
}

/// The single field pair `LDP`/`STP` use; `.F`, `.X` and `.I` act like `.B`.
fn pspace_pair(modifier: Modifier) -> (Sel, Sel) {
    match modifier {
        Modifier::A => (Sel::A, Sel::A),
        Modifier::AB => (Sel::A, Sel::B),
        Modifier::BA => (Sel::B, Sel::A),
        Modifier::B | Modifier::F | Modifier::X | Modifier::I => (Sel::B, Sel::B),
    }
}

fn decrement(value: u32, size: u32) -> u32 {
    if value == 0 { size - 1 } else { value - 1 }
}

fn increment(value: u32, size: u32) -> u32 {
    if value + 1 >= size { 0 } else { value + 1 }
}

/// Resolve one operand of the instruction at `pc`, applying any
/// pre-decrement before and post-increment after reading the target.
fn evaluate(core: &mut Core, pc: u32, field: Field) -> Operand {
    let size = core.size();
    let address = match field.mode {
        AddressMode::Immediate => pc,
        AddressMode::Direct => core.add(pc, field.value),
        mode => {
            let pointer = core.add(pc, field.value);
            let cell = core.cell_mut(pointer);
            match mode {
                AddressMode::PreDecA => cell.a.value = decrement(cell.a.value, size),
                AddressMode::PreDecB => cell.b.value = decrement(cell.b.value, size),
                _ => {}
            }
            let offset = if mode.uses_a_field() {
                cell.a.value
            } else {
                cell.b.value
            };
            let address = core.add(pointer, offset);
            let register = core.read(address);
            let cell = core.cell_mut(pointer);
            match mode {
                AddressMode::PostIncA => cell.a.value = increment(cell.a.value, size),
                AddressMode::PostIncB => cell.b.value = increment(cell.b.value, size),
                _ => {}
            }
            return Operand { address, register };
        }
    };
    Operand {
        address,
        register: core.read(address),
    }
}

fn arithmetic(opcode: Opcode, b: u32, a: u32, size: u32) -> Option<u32> {
    let (b, a, m) = (u64::from(b), u64::from(a), u64::from(size));
    let value = match opcode {
        Opcode::Add => (b + a) % m,
        Opcode::Sub => (b + m - a) % m,
        Opcode::Mul => (b * a) % m,
        Opcode::Div => b.checked_div(a)?,
        Opcode::Mod => b.checked_rem(a)?,
        _ => unreachable!("not an arithmetic opcode"),
    };
    Some(value as u32)
}

/// Execute the instruction at `pc` and report where the process goes next.
///
/// The instruction register is copied before evaluating operands, and both
/// operand registers are copies, so self-modification during operand
/// evaluation follows the standard's ordering.
pub fn execute(core: &mut Core, pspace: &mut PSpace, pc: u32) -> Next {
    let size = core.size();
    let pc = pc % size;
    let ir = core.read(pc);
    let a = evaluate(core, pc, ir.a);
    let b = evaluate(core, pc, ir.b);
    let next = core.add(pc, 1);
    let skip = core.add(pc, 2);
    let ira = a.register;
    let irb = b.register;

    match ir.opcode {
        Opcode::Dat => Next::Terminate,

        Opcode::Mov => {
            let target = core.cell_mut(b.address);
            if ir.modifier == Modifier::I {
                *target = ira;
            } else {
                for &(src, dst) in field_pairs(ir.modifier) {
                    set(target, dst, get(&ira, src));
                }
            }
            Next::Continue(next)
        }

        Opcode::Add | Opcode::Sub | Opcode::Mul | Opcode::Div | Opcode::Mod => {
            let mut faulted = false;
            for &(src, dst) in field_pairs(ir.modifier) {
                match arithmetic(ir.opcode, get(&irb, dst), get(&ira, src), size) {
                    Some(value) => set(core.cell_mut(b.address), dst, value),
                    None => faulted = true,
                }
            }
            if faulted {
                Next::Terminate
            } else {
                Next::Continue(next)
            }
        }

        Opcode::Jmp => Next::Continue(a.address),

        Opcode::Jmz => {
            let zero = tested_fields(ir.modifier)
                .iter()
                .all(|&sel| get(&irb, sel) == 0);
            Next::Continue(if zero { a.address } else { next })
        }

        Opcode::Jmn => {
            let non_zero = tested_fields(ir.modifier)
                .iter()
                .any(|&sel| get(&irb, sel) != 0);
            Next::Continue(if non_zero { a.address } else { next })
        }

        Opcode::Djn => {
            let mut irb = irb;
            let target = core.cell_mut(b.address);
            for &sel in tested_fields(ir.modifier) {
                let in_core = decrement(get(target, sel), size);
                set(target, sel, in_core);
                let in_register = decrement(get(&irb, sel), size);
                set(&mut irb, sel, in_register);
            }
            let non_zero = tested_fields(ir.modifier)
                .iter()
                .any(|&sel| get(&irb, sel) != 0);
            Next::Continue(if non_zero { a.address } else { next })
        }

        Opcode::Cmp | Opcode::Seq | Opcode::Sne => {
            let equal = if ir.modifier == Modifier::I {
                ira == irb
            } else {
                field_pairs(ir.modifier)
                    .iter()
                    .all(|&(src, dst)| get(&ira, src) == get(&irb, dst))
            };
            let skip_next = if ir.opcode == Opcode::Sne { !equal } else { equal };
            Next::Continue(if skip_next { skip } else { next })
        }

        Opcode::Slt => {
            let less = field_pairs(ir.modifier)
                .iter()
                .all(|&(src, dst)| get(&ira, src) < get(&irb, dst));
            Next::Continue(if less { skip } else { next })
        }

        Opcode::Spl => Next::Split(next, a.address),

        Opcode::Nop => Next::Continue(next),

        Opcode::Ldp => {
            let (src, dst) = pspace_pair(ir.modifier);
            let value = pspace.get(get(&ira, src)) % size;
            set(core.cell_mut(b.address), dst, value);
            Next::Continue(next)
        }

        Opcode::Stp => {
            let (src, dst) = pspace_pair(ir.modifier);
            pspace.set(get(&irb, dst), get(&ira, src));
            Next::Continue(next)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::assemble;
    use crate::config::MarsConfig;

    const SIZE: u32 = 8000;

    /// Assemble `src` and load it at address 0 of a fresh core.
    fn setup(src: &str) -> (Core, PSpace) {
        let config = MarsConfig::default();
        let warrior = assemble(src, &config).unwrap().warrior;
        let mut core = Core::new(SIZE);
        core.load(&warrior, 0);
        (core, PSpace::new(config.pspace_size, SIZE))
    }

    fn run(src: &str) -> (Core, Next) {
        let (mut core, mut pspace) = setup(src);
        let next = execute(&mut core, &mut pspace, 0);
        (core, next)
    }

    #[test]
    fn test_dat_terminates() {
        let (_, next) = run("dat #0, #0");
        assert_eq!(next, Next::Terminate);
    }

    #[test]
    fn test_imp_copies_itself() {
        let (core, next) = run("mov 0, 1");
        assert_eq!(next, Next::Continue(1));
        assert_eq!(core.read(1), core.read(0));
    }

    #[test]
    fn test_mov_modifiers() {
        let (core, _) = run("mov.a 1, 2\ndat 5, 6\ndat 7, 8");
        assert_eq!((core.read(2).a.value, core.read(2).b.value), (5, 8));
        let (core, _) = run("mov.x 1, 2\ndat 5, 6\ndat 7, 8");
        assert_eq!((core.read(2).a.value, core.read(2).b.value), (6, 5));
        let (core, _) = run("mov.ab #9, 1\ndat 0, 0");
        assert_eq!(core.read(1).b.value, 9);
        let (core, _) = run("mov.ba 1, 2\ndat 5, 6\ndat 7, 8");
        assert_eq!((core.read(2).a.value, core.read(2).b.value), (6, 8));
    }

    #[test]
    fn test_immediate_operand_targets_self() {
        // MOV.I #1, 1 copies the instruction itself.
        let (core, _) = run("mov.i #1, 1");
        assert_eq!(core.read(1), core.read(0));
    }

    #[test]
    fn test_add_wraps() {
        let (core, next) = run("add.ab #10, 1\ndat 0, 7995");
        assert_eq!(next, Next::Continue(1));
        assert_eq!(core.read(1).b.value, 5);
    }

    #[test]
    fn test_sub_mul_and_f_modifier() {
        let (core, _) = run("sub.f 1, 2\ndat 3, 4\ndat 1, 10");
        assert_eq!((core.read(2).a.value, core.read(2).b.value), (7998, 6));
        let (core, _) = run("mul.x 1, 2\ndat 3, 4\ndat 5, 6");
        assert_eq!((core.read(2).a.value, core.read(2).b.value), (20, 18));
    }

    #[test]
    fn test_div_by_zero_terminates_but_writes_other_field() {
        let (core, next) = run("div.f 1, 2\ndat 0, 2\ndat 9, 9");
        assert_eq!(next, Next::Terminate);
        assert_eq!(core.read(2).a.value, 9);
        assert_eq!(core.read(2).b.value, 4);
    }

    #[test]
    fn test_mod() {
        let (core, next) = run("mod.ab #4, 1\ndat 0, 11");
        assert_eq!(next, Next::Continue(1));
        assert_eq!(core.read(1).b.value, 3);
    }

    #[test]
    fn test_jumps() {
        let (_, next) = run("jmp 5");
        assert_eq!(next, Next::Continue(5));
        let (_, next) = run("jmz 5, 1\ndat 0, 0");
        assert_eq!(next, Next::Continue(5));
        let (_, next) = run("jmz 5, 1\ndat 0, 1");
        assert_eq!(next, Next::Continue(1));
        let (_, next) = run("jmn.f 5, 1\ndat 1, 0");
        assert_eq!(next, Next::Continue(5));
        let (_, next) = run("jmz.f 5, 1\ndat 1, 0");
        assert_eq!(next, Next::Continue(1));
    }

    #[test]
    fn test_djn_decrements_before_testing() {
        let (core, next) = run("djn 3, 1\ndat 0, 2");
        assert_eq!(next, Next::Continue(3));
        assert_eq!(core.read(1).b.value, 1);
        let (core, next) = run("djn 3, 1\ndat 0, 1");
        assert_eq!(next, Next::Continue(1));
        assert_eq!(core.read(1).b.value, 0);
    }

    #[test]
    fn test_djn_f_decrements_both_fields() {
        let (core, next) = run("djn.f 3, 1\ndat 1, 5");
        assert_eq!((core.read(1).a.value, core.read(1).b.value), (0, 4));
        assert_eq!(next, Next::Continue(3));
        let (core, next) = run("djn.f 3, 1\ndat 1, 1");
        assert_eq!((core.read(1).a.value, core.read(1).b.value), (0, 0));
        assert_eq!(next, Next::Continue(1));
    }

    #[test]
    fn test_djn_immediate_b_decrements_self() {
        let (core, next) = run("djn 3, #2");
        assert_eq!(next, Next::Continue(3));
        assert_eq!(core.read(0).b.value, 1);
    }

    #[test]
    fn test_comparisons() {
        let (_, next) = run("seq 1, 2\ndat 1, 2\ndat 1, 2");
        assert_eq!(next, Next::Continue(2));
        let (_, next) = run("seq 1, 2\ndat 1, 2\nmov 1, 2");
        assert_eq!(next, Next::Continue(1));
        let (_, next) = run("sne 1, 2\ndat 1, 2\nmov 1, 2");
        assert_eq!(next, Next::Continue(2));
        let (_, next) = run("cmp.x 1, 2\ndat 1, 2\ndat 2, 1");
        assert_eq!(next, Next::Continue(2));
        let (_, next) = run("slt #3, 1\ndat 0, 4");
        assert_eq!(next, Next::Continue(2));
        let (_, next) = run("slt #4, 1\ndat 0, 4");
        assert_eq!(next, Next::Continue(1));
    }

    #[test]
    fn test_spl() {
        let (_, next) = run("spl 3");
        assert_eq!(next, Next::Split(1, 3));
    }

    #[test]
    fn test_nop() {
        let (_, next) = run("nop 0, 0");
        assert_eq!(next, Next::Continue(1));
    }

    #[test]
    fn test_predecrement_indirect() {
        // The B-field of cell 1 goes from 3 to 2, so the target is 1 + 2 = 3.
        let (core, _) = run("mov.ab #7, <1\ndat 0, 3");
        assert_eq!(core.read(1).b.value, 2);
        assert_eq!(core.read(3).b.value, 7);
    }

    #[test]
    fn test_postincrement_indirect() {
        let (core, _) = run("mov.ab #7, }1\ndat 2, 0");
        assert_eq!(core.read(1).a.value, 3);
        assert_eq!(core.read(3).b.value, 7);
    }

    #[test]
    fn test_a_indirect() {
        let (core, _) = run("mov.ab #7, *1\ndat 2, 5");
        assert_eq!(core.read(3).b.value, 7);
    }

    #[test]
    fn test_register_read_before_postincrement() {
        // The A operand points at cell 1 through its own B-field (offset 0),
        // so the copy is taken before the increment lands.
        let (core, _) = run("mov.i >1, 2\ndat 5, 0");
        assert_eq!(core.read(1).b.value, 1);
        assert_eq!(
            core.read(2),
            Instruction::new(Opcode::Dat, Modifier::F, Field::direct(5), Field::direct(0))
        );
    }

    #[test]
    fn test_predecrement_wraps() {
        let (core, _) = run("dat 0, <1\ndat 0, 0");
        assert_eq!(core.read(1).b.value, SIZE - 1);
    }

    #[test]
    fn test_pspace_round_trip() {
        let (mut core, mut pspace) = setup("stp.ab #42, #5\nldp.ab #5, 1\ndat 0, 0");
        assert_eq!(execute(&mut core, &mut pspace, 0), Next::Continue(1));
        assert_eq!(pspace.get(5), 42);
        assert_eq!(execute(&mut core, &mut pspace, 1), Next::Continue(2));
        assert_eq!(core.read(2).b.value, 42);
    }

    #[test]
    fn test_ldp_reads_last_result() {
        let (mut core, mut pspace) = setup("ldp.ab #0, 1\ndat 0, 0");
        execute(&mut core, &mut pspace, 0);
        assert_eq!(core.read(1).b.value, SIZE - 1);
    }
}
