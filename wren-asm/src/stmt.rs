//! Statement parsing: one comment-stripped source line to a symbolic
//! statement, and lowering of statements to encodable instructions once the
//! label table is complete

use log::warn;
use wren_isa::{Instr, Register};

use crate::AsmErrorKind;

/// A jump, call, or memory-reference operand, possibly still symbolic
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum Target {
    /// Absolute address
    Addr(u16),
    /// Label reference, resolved in pass two
    Label(String),
}

/// A parsed statement whose targets may still be symbolic
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum Stmt {
    Nop,
    Hlt,
    Ret,
    LoadImm(Register, u16),
    LoadMem(Register, Target),
    Store(Target, Register),
    Mov(Register, Register),
    Push(Register),
    Pop(Register),
    Add(Register, Register),
    Addi(Register, u16),
    Sub(Register, Register),
    Subi(Register, u16),
    Mul(Register, Register),
    Div(Register, Register),
    Inc(Register),
    Dec(Register),
    And(Register, Register),
    Or(Register, Register),
    Xor(Register, Register),
    Not(Register),
    Shl(Register, u8),
    Shr(Register, u8),
    Cmp(Register, Register),
    Cmpi(Register, u16),
    Jmp(Target),
    Jz(Target),
    Jnz(Target),
    Jc(Target),
    Jnc(Target),
    Call(Target),
    In(Register, u16),
    Out(u16, Register),
}

impl Stmt {
    /// Encoded size in bytes
    ///
    /// Sizes are static per statement shape, which is what lets pass one
    /// assign label addresses before any target has resolved.
    pub(crate) fn size(&self) -> u16 {
        match self {
            Stmt::Nop | Stmt::Hlt | Stmt::Ret => 1,
            Stmt::Mov(..)
            | Stmt::Push(..)
            | Stmt::Pop(..)
            | Stmt::Add(..)
            | Stmt::Sub(..)
            | Stmt::Mul(..)
            | Stmt::Div(..)
            | Stmt::Inc(..)
            | Stmt::Dec(..)
            | Stmt::And(..)
            | Stmt::Or(..)
            | Stmt::Xor(..)
            | Stmt::Not(..)
            | Stmt::Cmp(..) => 2,
            Stmt::Shl(..)
            | Stmt::Shr(..)
            | Stmt::Jmp(..)
            | Stmt::Jz(..)
            | Stmt::Jnz(..)
            | Stmt::Jc(..)
            | Stmt::Jnc(..)
            | Stmt::Call(..) => 3,
            Stmt::LoadImm(..)
            | Stmt::LoadMem(..)
            | Stmt::Store(..)
            | Stmt::Addi(..)
            | Stmt::Subi(..)
            | Stmt::Cmpi(..)
            | Stmt::In(..)
            | Stmt::Out(..) => 4,
        }
    }

    /// Resolves any symbolic targets through `lookup` and lowers to the
    /// shared instruction type
    pub(crate) fn lower(
        self,
        lookup: &dyn Fn(&str) -> Option<u16>,
    ) -> Result<Instr, AsmErrorKind> {
        let resolve = |target: Target| match target {
            Target::Addr(addr) => Ok(addr),
            Target::Label(name) => {
                lookup(&name).ok_or(AsmErrorKind::UndefinedLabel(name))
            }
        };
        Ok(match self {
            Stmt::Nop => Instr::Nop,
            Stmt::Hlt => Instr::Hlt,
            Stmt::Ret => Instr::Ret,
            Stmt::LoadImm(r, imm) => Instr::LoadImm { reg: r.index(), imm },
            Stmt::LoadMem(r, t) => Instr::LoadMem {
                reg: r.index(),
                addr: resolve(t)?,
            },
            Stmt::Store(t, r) => Instr::Store {
                addr: resolve(t)?,
                reg: r.index(),
            },
            Stmt::Mov(d, s) => Instr::Mov {
                dst: d.index(),
                src: s.index(),
            },
            Stmt::Push(r) => Instr::Push { reg: r.index() },
            Stmt::Pop(r) => Instr::Pop { reg: r.index() },
            Stmt::Add(d, s) => Instr::Add {
                dst: d.index(),
                src: s.index(),
            },
            Stmt::Addi(r, imm) => Instr::Addi { reg: r.index(), imm },
            Stmt::Sub(d, s) => Instr::Sub {
                dst: d.index(),
                src: s.index(),
            },
            Stmt::Subi(r, imm) => Instr::Subi { reg: r.index(), imm },
            Stmt::Mul(d, s) => Instr::Mul {
                dst: d.index(),
                src: s.index(),
            },
            Stmt::Div(d, s) => Instr::Div {
                dst: d.index(),
                src: s.index(),
            },
            Stmt::Inc(r) => Instr::Inc { reg: r.index() },
            Stmt::Dec(r) => Instr::Dec { reg: r.index() },
            Stmt::And(d, s) => Instr::And {
                dst: d.index(),
                src: s.index(),
            },
            Stmt::Or(d, s) => Instr::Or {
                dst: d.index(),
                src: s.index(),
            },
            Stmt::Xor(d, s) => Instr::Xor {
                dst: d.index(),
                src: s.index(),
            },
            Stmt::Not(r) => Instr::Not { reg: r.index() },
            Stmt::Shl(r, amount) => Instr::Shl {
                reg: r.index(),
                amount,
            },
            Stmt::Shr(r, amount) => Instr::Shr {
                reg: r.index(),
                amount,
            },
            Stmt::Cmp(l, r) => Instr::Cmp {
                lhs: l.index(),
                rhs: r.index(),
            },
            Stmt::Cmpi(r, imm) => Instr::Cmpi { reg: r.index(), imm },
            Stmt::Jmp(t) => Instr::Jmp { addr: resolve(t)? },
            Stmt::Jz(t) => Instr::Jz { addr: resolve(t)? },
            Stmt::Jnz(t) => Instr::Jnz { addr: resolve(t)? },
            Stmt::Jc(t) => Instr::Jc { addr: resolve(t)? },
            Stmt::Jnc(t) => Instr::Jnc { addr: resolve(t)? },
            Stmt::Call(t) => Instr::Call { addr: resolve(t)? },
            Stmt::In(r, port) => Instr::In {
                reg: r.index(),
                port,
            },
            Stmt::Out(port, r) => Instr::Out {
                port,
                reg: r.index(),
            },
        })
    }
}

/// Registers and label references are case-folded; numeric literals and
/// bracketed memory references keep their spelling
fn normalize(arg: &str) -> String {
    if arg.starts_with(['0', '[']) {
        arg.to_string()
    } else {
        arg.to_ascii_uppercase()
    }
}

fn parse_register(arg: &str) -> Result<Register, AsmErrorKind> {
    Register::from_name(arg).ok_or_else(|| AsmErrorKind::InvalidRegister(arg.to_string()))
}

/// Parses a numeric literal: decimal (optionally negative, wrapping into 16
/// bits two's-complement) or `0x`/`0X` hex
///
/// Values outside the 16-bit range are truncated with a diagnostic rather
/// than silently.
fn parse_number(arg: &str, line: u32) -> Result<u16, AsmErrorKind> {
    let value = if let Some(hex) = arg.strip_prefix("0x").or_else(|| arg.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).ok().map(i64::from)
    } else {
        arg.parse::<i64>().ok()
    };
    let value = value.ok_or_else(|| AsmErrorKind::InvalidNumber(arg.to_string()))?;
    if !(-0x8000..=0xFFFF).contains(&value) {
        warn!("line {line}: numeric literal '{arg}' truncated to 16 bits");
    }
    Ok(value as u16)
}

/// Numeric parse first; anything else is a label reference
fn parse_target(arg: &str, line: u32) -> Target {
    match parse_number(arg, line) {
        Ok(addr) => Target::Addr(addr),
        Err(_) => Target::Label(arg.to_ascii_uppercase()),
    }
}

/// Parses the address expression between `[` and `]`
///
/// Text after the closing bracket is ignored.
fn parse_mem(arg: &str, line: u32) -> Result<Target, AsmErrorKind> {
    let inner = &arg[1..];
    let end = inner.find(']').ok_or(AsmErrorKind::MalformedMemoryOperand)?;
    Ok(parse_target(inner[..end].trim(), line))
}

/// Parses one statement (label prefix already stripped)
pub(crate) fn parse_stmt(text: &str, line: u32) -> Result<Stmt, AsmErrorKind> {
    let (mnemonic, args) = match text.split_once(char::is_whitespace) {
        Some((m, rest)) => (m, rest.trim()),
        None => (text, ""),
    };
    let mnemonic = mnemonic.to_ascii_uppercase();

    let (raw1, raw2) = match args.split_once(',') {
        Some((a, b)) => (a.trim(), b.trim()),
        None => (args, ""),
    };
    let arg1 = normalize(raw1);
    let arg2 = normalize(raw2);

    let stmt = match mnemonic.as_str() {
        "NOP" => Stmt::Nop,
        "HLT" => Stmt::Hlt,
        "RET" => Stmt::Ret,
        "LOAD" => {
            let reg = parse_register(&arg1)?;
            if arg2.starts_with('[') {
                Stmt::LoadMem(reg, parse_mem(&arg2, line)?)
            } else {
                Stmt::LoadImm(reg, parse_number(&arg2, line)?)
            }
        }
        "STORE" => {
            if !arg1.starts_with('[') {
                return Err(AsmErrorKind::BadStoreShape);
            }
            let target = parse_mem(&arg1, line)?;
            let reg = parse_register(&arg2)?;
            Stmt::Store(target, reg)
        }
        "MOV" => Stmt::Mov(parse_register(&arg1)?, parse_register(&arg2)?),
        "PUSH" => Stmt::Push(parse_register(&arg1)?),
        "POP" => Stmt::Pop(parse_register(&arg1)?),
        "ADD" => Stmt::Add(parse_register(&arg1)?, parse_register(&arg2)?),
        "ADDI" => Stmt::Addi(parse_register(&arg1)?, parse_number(&arg2, line)?),
        "SUB" => Stmt::Sub(parse_register(&arg1)?, parse_register(&arg2)?),
        "SUBI" => Stmt::Subi(parse_register(&arg1)?, parse_number(&arg2, line)?),
        "MUL" => Stmt::Mul(parse_register(&arg1)?, parse_register(&arg2)?),
        "DIV" => Stmt::Div(parse_register(&arg1)?, parse_register(&arg2)?),
        "INC" => Stmt::Inc(parse_register(&arg1)?),
        "DEC" => Stmt::Dec(parse_register(&arg1)?),
        "AND" => Stmt::And(parse_register(&arg1)?, parse_register(&arg2)?),
        "OR" => Stmt::Or(parse_register(&arg1)?, parse_register(&arg2)?),
        "XOR" => Stmt::Xor(parse_register(&arg1)?, parse_register(&arg2)?),
        "NOT" => Stmt::Not(parse_register(&arg1)?),
        "SHL" => Stmt::Shl(
            parse_register(&arg1)?,
            (parse_number(&arg2, line)? & 0xFF) as u8,
        ),
        "SHR" => Stmt::Shr(
            parse_register(&arg1)?,
            (parse_number(&arg2, line)? & 0xFF) as u8,
        ),
        "CMP" => Stmt::Cmp(parse_register(&arg1)?, parse_register(&arg2)?),
        "CMPI" => Stmt::Cmpi(parse_register(&arg1)?, parse_number(&arg2, line)?),
        "JMP" => Stmt::Jmp(parse_target(&arg1, line)),
        "JZ" => Stmt::Jz(parse_target(&arg1, line)),
        "JNZ" => Stmt::Jnz(parse_target(&arg1, line)),
        "JC" => Stmt::Jc(parse_target(&arg1, line)),
        "JNC" => Stmt::Jnc(parse_target(&arg1, line)),
        "CALL" => Stmt::Call(parse_target(&arg1, line)),
        "IN" => Stmt::In(parse_register(&arg1)?, parse_number(&arg2, line)?),
        "OUT" => Stmt::Out(parse_number(&arg1, line)?, parse_register(&arg2)?),
        _ => return Err(AsmErrorKind::UnknownInstruction(mnemonic)),
    };
    Ok(stmt)
}
