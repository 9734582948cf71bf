//! Two-pass Redcode assembler.
//!
//! Pass 1 parses every expanded line, records label positions and collects
//! the instruction statements. Pass 2 evaluates operand expressions with
//! every label known, so forward references resolve, and produces the load
//! file.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::config::MarsConfig;
use crate::error::{AsmError, Location, Result};
use crate::expr::{self, EvalContext, Expr, predefined};
use crate::lexer::{Token, TokenKind, tokenize};
use crate::preprocess::{self, Expansion};
use crate::redcode::{AddressMode, Field, Instruction, Modifier, Opcode};
use crate::warrior::Warrior;

/// A non-fatal remark about the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub message: String,
    pub at: Location,
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.at, self.message)
    }
}

/// A successfully assembled warrior together with any warnings.
#[derive(Debug, Clone)]
pub struct Assembly {
    pub warrior: Warrior,
    pub warnings: Vec<Warning>,
}

struct Operand {
    mode: AddressMode,
    expr: Expr,
}

struct Statement {
    opcode: Opcode,
    modifier: Option<Modifier>,
    a: Operand,
    b: Option<Operand>,
    at: Location,
}

/// Resolves labels relative to the instruction being assembled.
struct LabelContext<'a> {
    labels: &'a HashMap<String, usize>,
    current: usize,
    config: &'a MarsConfig,
}

impl EvalContext for LabelContext<'_> {
    fn lookup(&self, name: &str) -> Option<i64> {
        if let Some(&target) = self.labels.get(name) {
            return Some(target as i64 - self.current as i64);
        }
        if name == "CURLINE" {
            return Some(self.current as i64);
        }
        predefined(name, self.config)
    }
}

fn is_reserved(token: &Token) -> bool {
    token.kind == TokenKind::Ident
        && (token.text.parse::<Opcode>().is_ok() || token.is_word("ORG") || token.is_word("END"))
}

fn parse_operand(tokens: &[Token], eol: Location) -> Result<Operand> {
    let first = tokens
        .first()
        .ok_or_else(|| AsmError::syntax("missing operand", eol))?;
    if first.kind == TokenKind::Punct {
        if let Some(mode) = first
            .text
            .chars()
            .next()
            .filter(|_| first.text.len() == 1)
            .and_then(AddressMode::from_symbol)
        {
            let expr = expr::parse(&tokens[1..], eol)?;
            return Ok(Operand { mode, expr });
        }
        if !matches!(first.text.as_str(), "-" | "+" | "(" | "!") {
            return Err(AsmError::UnknownAddressingMode {
                symbol: first.text.clone(),
                at: first.location(),
            });
        }
    }
    Ok(Operand {
        mode: AddressMode::Direct,
        expr: expr::parse(tokens, eol)?,
    })
}

/// Split operand tokens at commas outside parentheses.
fn split_operands(tokens: &[Token]) -> Vec<&[Token]> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, token) in tokens.iter().enumerate() {
        if token.is_punct("(") {
            depth += 1;
        } else if token.is_punct(")") {
            depth -= 1;
        } else if token.is_punct(",") && depth == 0 {
            parts.push(&tokens[start..i]);
            start = i + 1;
        }
    }
    parts.push(&tokens[start..]);
    parts
}

fn parse_instruction(tokens: &[Token], eol: Location) -> Result<Statement> {
    let op_token = &tokens[0];
    let opcode = op_token
        .text
        .parse::<Opcode>()
        .map_err(|_| AsmError::UnknownOpcode {
            name: op_token.text.clone(),
            at: op_token.location(),
        })?;

    let mut pos = 1;
    let mut modifier = None;
    if tokens.get(pos).is_some_and(|t| t.is_punct(".")) {
        let m = tokens
            .get(pos + 1)
            .ok_or_else(|| AsmError::syntax("missing modifier", eol))?;
        modifier = Some(m.text.parse::<Modifier>().map_err(|_| {
            AsmError::syntax(format!("unknown modifier '{}'", m.text), m.location())
        })?);
        pos += 2;
    }

    let rest = &tokens[pos..];
    if rest.is_empty() {
        return Err(AsmError::syntax(
            format!("{opcode} needs at least one operand"),
            eol,
        ));
    }
    let parts = split_operands(rest);
    let (a, b) = match parts.as_slice() {
        [a] => (parse_operand(a, eol)?, None),
        [a, b] => (parse_operand(a, eol)?, Some(parse_operand(b, eol)?)),
        _ => return Err(AsmError::syntax("too many operands", eol)),
    };

    Ok(Statement {
        opcode,
        modifier,
        a,
        b,
        at: op_token.location(),
    })
}

fn evaluate_field(operand: &Operand, ctx: &LabelContext, config: &MarsConfig) -> Result<Field> {
    let value = expr::eval(&operand.expr, ctx)?;
    Ok(Field::new(operand.mode, config.normalize(value)))
}

fn resolve(statement: &Statement, ctx: &LabelContext, config: &MarsConfig) -> Result<Instruction> {
    let a = evaluate_field(&statement.a, ctx, config)?;
    let (a, b) = match &statement.b {
        Some(b) => (a, evaluate_field(b, ctx, config)?),
        None if statement.opcode == Opcode::Dat => (Field::immediate(0), a),
        None if statement.opcode.allows_single_operand() => (a, Field::immediate(0)),
        None => {
            return Err(AsmError::syntax(
                format!("{} needs two operands", statement.opcode),
                statement.at,
            ));
        }
    };
    let modifier = statement
        .modifier
        .unwrap_or_else(|| Modifier::default_for(statement.opcode, a.mode, b.mode));
    Ok(Instruction::new(statement.opcode, modifier, a, b))
}

/// Assemble preprocessed lines into a warrior.
pub fn assemble_expansion(expansion: Expansion, config: &MarsConfig) -> Result<Assembly> {
    config.validate()?;
    let mut labels: HashMap<String, usize> = HashMap::new();
    let mut statements: Vec<Statement> = Vec::new();
    let mut start: Option<(Expr, Location)> = None;
    let mut warnings = Vec::new();

    let mut set_start = |expr: Expr, at: Location, warnings: &mut Vec<Warning>| {
        if start.is_some() {
            warnings.push(Warning {
                message: "start offset redefined; the later definition wins".into(),
                at,
            });
        }
        start = Some((expr, at));
    };

    for source in &expansion.lines {
        let tokens = tokenize(&source.text, source.line)?;
        let eol = Location::new(source.line, source.text.len() + 1);

        let mut pos = 0;
        let mut last_bare_label: Option<&Token> = None;
        while let Some(token) = tokens.get(pos) {
            if token.kind != TokenKind::Ident || is_reserved(token) {
                break;
            }
            if labels.insert(token.text.clone(), statements.len()).is_some() {
                return Err(AsmError::DuplicateLabel {
                    name: token.text.clone(),
                    at: token.location(),
                });
            }
            pos += 1;
            if tokens.get(pos).is_some_and(|t| t.is_punct(":")) {
                pos += 1;
                last_bare_label = None;
            } else {
                last_bare_label = Some(token);
            }
        }

        let Some(head) = tokens.get(pos) else {
            continue;
        };
        if head.kind != TokenKind::Ident {
            // A word that is neither a label nor an opcode, like `mvo 0, 1`.
            return Err(match last_bare_label {
                Some(label) => AsmError::UnknownOpcode {
                    name: label.text.clone(),
                    at: label.location(),
                },
                None => AsmError::syntax(format!("unexpected '{}'", head.text), head.location()),
            });
        }

        if head.is_word("ORG") {
            let expr = expr::parse(&tokens[pos + 1..], eol)?;
            set_start(expr, head.location(), &mut warnings);
        } else if head.is_word("END") {
            if pos + 1 < tokens.len() {
                let expr = expr::parse(&tokens[pos + 1..], eol)?;
                set_start(expr, head.location(), &mut warnings);
            }
            break;
        } else {
            statements.push(parse_instruction(&tokens[pos..], eol)?);
        }
    }

    if statements.is_empty() {
        return Err(AsmError::EmptyWarrior);
    }
    if statements.len() > config.max_length as usize {
        return Err(AsmError::WarriorTooLong {
            length: statements.len(),
            limit: config.max_length as usize,
        });
    }

    let mut instructions = Vec::with_capacity(statements.len());
    for (index, statement) in statements.iter().enumerate() {
        let ctx = LabelContext {
            labels: &labels,
            current: index,
            config,
        };
        instructions.push(resolve(statement, &ctx, config)?);
    }

    let start = match start {
        Some((expr, _)) => {
            let ctx = LabelContext {
                labels: &labels,
                current: 0,
                config,
            };
            config.normalize(expr::eval(&expr, &ctx)?)
        }
        None => 0,
    };

    for warning in &warnings {
        warn!(%warning, "assembler warning");
    }

    let warrior = Warrior {
        metadata: expansion.metadata,
        instructions,
        start,
    };
    debug!(
        name = warrior.name(),
        length = warrior.len(),
        start = warrior.start,
        "warrior assembled"
    );
    Ok(Assembly { warrior, warnings })
}

/// Expand and assemble Redcode source.
pub fn assemble(source: &str, config: &MarsConfig) -> Result<Assembly> {
    config.validate()?;
    let expansion = preprocess::expand(source, config)?;
    assemble_expansion(expansion, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;

    fn asm(src: &str) -> Warrior {
        assemble(src, &MarsConfig::default()).unwrap().warrior
    }

    fn asm_err(src: &str) -> AsmError {
        assemble(src, &MarsConfig::default()).unwrap_err()
    }

    fn lines(warrior: &Warrior) -> Vec<String> {
        warrior.instructions.iter().map(|i| i.to_string()).collect()
    }

    #[test]
    fn test_org_label_self_jump() {
        let warrior = asm("ORG start\nstart: JMP start");
        assert_eq!(warrior.start, 0);
        assert_eq!(warrior.len(), 1);
        assert_eq!(warrior.instructions[0].opcode, Opcode::Jmp);
        assert_eq!(warrior.instructions[0].a.value, 0);
        assert_eq!(warrior.instructions[0].b, Field::immediate(0));
    }

    #[test]
    fn test_dwarf() {
        let src = ";name Dwarf\n\
                   ;author A. K. Dewdney\n\
                   bomb  DAT   #0\n\
                   top   ADD   #4, bomb\n\
                         MOV   bomb, @bomb\n\
                         JMP   top\n\
                         END   top\n";
        let warrior = asm(src);
        assert_eq!(warrior.start, 1);
        assert_eq!(
            lines(&warrior),
            [
                "DAT.F   #     0, #     0",
                "ADD.AB  #     4, $  7999",
                "MOV.I   $  7998, @  7998",
                "JMP.B   $  7998, #     0",
            ]
        );
        assert_eq!(warrior.name(), "Dwarf");
    }

    #[test]
    fn test_forward_reference() {
        let warrior = asm("jmp target\nnop 0\ntarget dat 0, 0");
        assert_eq!(warrior.instructions[0].a.value, 2);
    }

    #[test]
    fn test_label_on_own_line_attaches_to_next() {
        let warrior = asm("jmp next\nnext\n  dat 0, 0");
        assert_eq!(warrior.instructions[0].a.value, 1);
    }

    #[test]
    fn test_multiple_labels() {
        let warrior = asm("a b: c dat a, c\njmp b");
        assert_eq!(warrior.instructions[0].a.value, 0);
        assert_eq!(warrior.instructions[1].a.value, 7999);
    }

    #[test]
    fn test_default_modes_and_modifiers() {
        let warrior = asm("mov 0, 1\nadd #1, 2\nsub 3, #4\nslt 1, 2\nseq <1, >2\nspl }1");
        assert_eq!(
            lines(&warrior),
            [
                "MOV.I   $     0, $     1",
                "ADD.AB  #     1, $     2",
                "SUB.B   $     3, #     4",
                "SLT.B   $     1, $     2",
                "SEQ.I   <     1, >     2",
                "SPL.B   }     1, #     0",
            ]
        );
    }

    #[test]
    fn test_explicit_modifier_kept() {
        let warrior = asm("mov.x *1, {2");
        assert_eq!(lines(&warrior), ["MOV.X   *     1, {     2"]);
    }

    #[test]
    fn test_predefined_constants_and_curline() {
        let warrior = asm("dat CORESIZE-1, CURLINE\ndat 0, CURLINE");
        assert_eq!(warrior.instructions[0].a.value, 7999);
        assert_eq!(warrior.instructions[0].b.value, 0);
        assert_eq!(warrior.instructions[1].b.value, 1);
    }

    #[test]
    fn test_negative_values_wrap() {
        let warrior = asm("jmp -1");
        assert_eq!(warrior.instructions[0].a.value, 7999);
        let warrior = asm("dat -8001");
        assert_eq!(warrior.instructions[0].b.value, 7999);
    }

    #[test]
    fn test_end_overrides_org_with_warning() {
        let assembly = assemble("ORG 1\nnop 0\nnop 0\nEND 0", &MarsConfig::default()).unwrap();
        assert_eq!(assembly.warrior.start, 0);
        assert_eq!(assembly.warnings.len(), 1);
    }

    #[test]
    fn test_start_wraps_modulo_core() {
        let warrior = asm("ORG -1\nnop 0");
        assert_eq!(warrior.start, 7999);
    }

    #[test]
    fn test_for_with_labels() {
        let warrior = asm("i FOR 3\nx&i dat i\nROF\njmp x02");
        assert_eq!(warrior.len(), 4);
        assert_eq!(warrior.instructions[1].b.value, 2);
        assert_eq!(warrior.instructions[3].a.value, 7998);
    }

    #[test]
    fn test_reassembly_is_identical() {
        let src = "step EQU 4\nloop add #step, bomb\nmov bomb, @bomb\njmp loop\nbomb dat 0\nend loop";
        let first = asm(src);
        let second = asm(src);
        assert_eq!(first, second);
        assert_eq!(first.to_string(), second.to_string());
    }

    #[test]
    fn test_load_file_reassembles() {
        let src = ";redcode-94\n;name Stone\nspl 0\nloop mov <-5, 10\nadd.ab #-3, loop\ndjn.f loop, <-7\nend loop";
        let first = asm(src);
        let second = asm(&first.to_string());
        assert_eq!(first, second);
    }

    #[test]
    fn test_duplicate_label() {
        assert_eq!(
            asm_err("x nop 0\nx nop 0"),
            AsmError::DuplicateLabel {
                name: "x".into(),
                at: Location::new(2, 1),
            }
        );
    }

    #[test]
    fn test_unresolved_symbol() {
        assert!(matches!(
            asm_err("jmp nowhere"),
            AsmError::UnresolvedSymbol { name, .. } if name == "nowhere"
        ));
    }

    #[test]
    fn test_unknown_opcode() {
        assert!(matches!(
            asm_err("mvo 0, 1"),
            AsmError::UnknownOpcode { name, .. } if name == "mvo"
        ));
    }

    #[test]
    fn test_unknown_modifier() {
        assert!(matches!(
            asm_err("mov.q 0, 1"),
            AsmError::AssemblySyntaxError { .. }
        ));
    }

    #[test]
    fn test_unknown_addressing_mode() {
        assert!(matches!(
            asm_err("mov %0, 1"),
            AsmError::UnknownAddressingMode { symbol, .. } if symbol == "%"
        ));
    }

    #[test]
    fn test_single_operand_rules() {
        let warrior = asm("dat 5");
        assert_eq!(warrior.instructions[0].a, Field::immediate(0));
        assert_eq!(warrior.instructions[0].b, Field::direct(5));
        assert!(matches!(
            asm_err("mov 0"),
            AsmError::AssemblySyntaxError { .. }
        ));
        assert!(matches!(
            asm_err("add 1, 2, 3"),
            AsmError::AssemblySyntaxError { .. }
        ));
    }

    #[test]
    fn test_operand_division_by_zero() {
        assert!(matches!(
            asm_err("dat 1/0"),
            AsmError::DivisionByZero { .. }
        ));
    }

    #[test]
    fn test_empty_and_too_long() {
        assert_eq!(asm_err("; nothing here\n"), AsmError::EmptyWarrior);
        assert_eq!(asm_err("ORG 0\nEND"), AsmError::EmptyWarrior);
        assert_eq!(
            asm_err("FOR 101\nnop 0\nROF"),
            AsmError::WarriorTooLong {
                length: 101,
                limit: 100,
            }
        );
    }

    #[test]
    fn test_parenthesised_operands() {
        let warrior = asm("mov (1+2)*3, -(4)");
        assert_eq!(warrior.instructions[0].a.value, 9);
        assert_eq!(warrior.instructions[0].b.value, 7996);
    }

    #[test]
    fn test_core_size_affects_reduction() {
        let config = MarsConfig::with_core_size(800);
        let warrior = assemble("jmp -1", &config).unwrap().warrior;
        assert_eq!(warrior.instructions[0].a.value, 799);
    }

    #[test]
    fn test_rejects_zero_core_size() {
        let config = MarsConfig {
            core_size: 0,
            ..Default::default()
        };
        assert_eq!(
            assemble("dat 0, 0", &config).unwrap_err(),
            AsmError::Config(ConfigError::InvalidCoreSize)
        );
    }

    #[test]
    fn test_deeply_nested_operand_is_an_error() {
        let src = format!("dat {}1{}", "(".repeat(300), ")".repeat(300));
        assert!(matches!(
            asm_err(&src),
            AsmError::AssemblySyntaxError { .. }
        ));
        let src = format!("dat {}1", "-".repeat(100_000));
        assert!(matches!(
            asm_err(&src),
            AsmError::AssemblySyntaxError { .. }
        ));
    }
}
