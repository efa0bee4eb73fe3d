// `.rp` text raster program and `.rp.ini` initial-register format.
// Grounded on `original_source/src/RastaConverter.cpp`'s
// `LoadRasterProgram`/`LoadRegInits`/`GetInstructionFromString`: a
// `lineN:` label starts a block, `lda|ldx|ldy $HH` / `sta|stx|sty REGNAME`
// lines are instructions, a line containing `cmp byt2` closes the block,
// and anything before the first label or not matching an instruction
// (comments, `nop` filler) is ignored.

use std::fmt::Write as _;

use crate::error::ProtocolError;
use crate::insn::{Instruction, Op, TargetRegister, TARGET_COUNT};
use crate::program::Picture;

/// Header fields written as `; Key: value` comment lines before the body.
#[derive(Debug, Clone, Default)]
pub struct RpHeader {
    pub evaluations: Option<u64>,
    pub input_name: Option<String>,
    pub cmd_line: Option<String>,
    pub seed: Option<u64>,
}

fn write_instruction(out: &mut String, insn: Instruction) {
    match insn.op() {
        Op::Lda => {
            let _ = writeln!(out, "    lda ${:02X}", insn.value());
        }
        Op::Ldx => {
            let _ = writeln!(out, "    ldx ${:02X}", insn.value());
        }
        Op::Ldy => {
            let _ = writeln!(out, "    ldy ${:02X}", insn.value());
        }
        Op::Sta | Op::Stx | Op::Sty => {
            let Some(target) = insn.target() else { return };
            let mnemonic = match insn.op() {
                Op::Sta => "sta",
                Op::Stx => "stx",
                Op::Sty => "sty",
                _ => unreachable!(),
            };
            let _ = writeln!(out, "    {mnemonic} {}", target.name());
        }
        Op::Nop => {
            let _ = writeln!(out, "    nop ; filler");
        }
    }
}

/// Serialize `picture` to the `.rp` text format.
pub fn write_rp(picture: &Picture, header: &RpHeader) -> String {
    let mut out = String::new();
    if let Some(evaluations) = header.evaluations {
        let _ = writeln!(out, "; Evaluations: {evaluations}");
    }
    if let Some(name) = &header.input_name {
        let _ = writeln!(out, "; InputName: {name}");
    }
    if let Some(cmd) = &header.cmd_line {
        let _ = writeln!(out, "; CmdLine: {cmd}");
    }
    if let Some(seed) = header.seed {
        let _ = writeln!(out, "; Seed: {seed}");
    }

    for (y, line) in picture.lines.iter().enumerate() {
        let _ = writeln!(out, "line{y}:");
        for &insn in line.instructions() {
            write_instruction(&mut out, insn);
        }
        let _ = writeln!(out, "    cmp byt2");
    }
    out
}

fn parse_value(token: &str) -> Result<u8, ProtocolError> {
    let hex = token.trim_start_matches('$');
    u8::from_str_radix(hex, 16)
        .map_err(|_| ProtocolError::Corrupt { what: "rp instruction", detail: format!("bad hex value '{token}'") })
}

/// Parse one non-label, non-terminator line into an instruction, if it
/// names one. Unrecognized lines (comments, blank, stray text) are `Ok(None)`.
fn parse_instruction_line(line: &str) -> Result<Option<Instruction>, ProtocolError> {
    let code = match line.find(';') {
        Some(idx) => &line[..idx],
        None => line,
    };
    let mut tokens = code.split_whitespace();
    let Some(mnemonic) = tokens.next() else { return Ok(None) };

    let insn = match mnemonic {
        "lda" | "ldx" | "ldy" => {
            let value_token = tokens
                .next()
                .ok_or_else(|| ProtocolError::Corrupt { what: "rp instruction", detail: format!("missing value in '{line}'") })?;
            let value = parse_value(value_token)?;
            let op = match mnemonic {
                "lda" => Op::Lda,
                "ldx" => Op::Ldx,
                _ => Op::Ldy,
            };
            Instruction::new(op, None, value)
        }
        "sta" | "stx" | "sty" => {
            let name_token = tokens
                .next()
                .ok_or_else(|| ProtocolError::Corrupt { what: "rp instruction", detail: format!("missing target in '{line}'") })?;
            let target = TargetRegister::from_name(name_token).ok_or_else(|| ProtocolError::Corrupt {
                what: "rp instruction",
                detail: format!("unknown target '{name_token}'"),
            })?;
            let op = match mnemonic {
                "sta" => Op::Sta,
                "stx" => Op::Stx,
                _ => Op::Sty,
            };
            // Stores carry no literal value in this text format — the
            // Executor resolves it from whichever register was last
            // loaded, so any placeholder value round-trips identically.
            Instruction::new(op, Some(target), 0)
        }
        _ => return Ok(None),
    };
    Ok(Some(insn))
}

/// Parse a `.rp` document into a fresh `Picture` with `height` lines.
/// Lines with no matching `lineN:` label, or with no `cmp byt2`
/// terminator, leave a trailing empty block rather than failing —
/// matching the original loader's tolerance for a short final line.
pub fn parse_rp(text: &str, height: usize) -> Result<(Picture, RpHeader), ProtocolError> {
    let mut picture = Picture::new(height);
    let mut header = RpHeader::default();
    let mut current_y: Option<usize> = None;
    let mut current: Vec<Instruction> = Vec::new();

    for raw_line in text.lines() {
        if let Some(rest) = raw_line.trim_start().strip_prefix("; Evaluations:") {
            header.evaluations = rest.trim().parse().ok();
            continue;
        }
        if let Some(rest) = raw_line.trim_start().strip_prefix("; InputName:") {
            header.input_name = Some(rest.trim().to_string());
            continue;
        }
        if let Some(rest) = raw_line.trim_start().strip_prefix("; CmdLine:") {
            header.cmd_line = Some(rest.trim().to_string());
            continue;
        }
        if let Some(rest) = raw_line.trim_start().strip_prefix("; Seed:") {
            header.seed = rest.trim().parse().ok();
            continue;
        }

        let trimmed = raw_line.trim();
        if let Some(label) = trimmed.strip_prefix("line") {
            if let Some(y_str) = label.strip_suffix(':') {
                if let Ok(y) = y_str.parse::<usize>() {
                    current_y = Some(y);
                    current.clear();
                    continue;
                }
            }
        }

        let Some(y) = current_y else { continue };

        if trimmed.contains("cmp byt2") {
            if y < picture.height() {
                picture.lines[y].set_instructions(std::mem::take(&mut current));
            }
            current_y = None;
            continue;
        }

        if let Some(insn) = parse_instruction_line(trimmed)? {
            current.push(insn);
        }
    }

    Ok((picture, header))
}

/// Serialize `mem_regs_init` as a flat LDA/STA-style program, per
/// spec.md §6 `<base>.rp.ini`.
pub fn write_rp_ini(mem_regs_init: &[u8; TARGET_COUNT]) -> String {
    let mut out = String::new();
    for target in TargetRegister::ALL {
        let value = mem_regs_init[target.index()];
        let _ = writeln!(out, "    lda ${value:02X}");
        let _ = writeln!(out, "    sta {}", target.name());
    }
    out
}

/// Parse a `.rp.ini` document: a flat LD/ST stream establishing
/// `mem_regs_init`, per `original_source`'s `LoadRegInits`.
pub fn parse_rp_ini(text: &str) -> Result<[u8; TARGET_COUNT], ProtocolError> {
    let mut mem_regs_init = [0u8; TARGET_COUNT];
    let mut a = 0u8;
    let mut x = 0u8;
    let mut y = 0u8;

    for raw_line in text.lines() {
        let trimmed = raw_line.trim();
        let Some(insn) = parse_instruction_line(trimmed)? else { continue };
        match insn.op() {
            Op::Lda => a = insn.value(),
            Op::Ldx => x = insn.value(),
            Op::Ldy => y = insn.value(),
            Op::Sta => {
                if let Some(t) = insn.target() {
                    mem_regs_init[t.index()] = a;
                }
            }
            Op::Stx => {
                if let Some(t) = insn.target() {
                    mem_regs_init[t.index()] = x;
                }
            }
            Op::Sty => {
                if let Some(t) = insn.target() {
                    mem_regs_init[t.index()] = y;
                }
            }
            Op::Nop => {}
        }
    }
    Ok(mem_regs_init)
}
