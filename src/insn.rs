// Instruction and target-register vocabulary.
//
// Packed 32-bit value `{op, target, value}`, grounded on
// `original_source/src/core/RasterInstruction.h`'s packed union (there a
// C union of `{instruction: u16, target: u8, value: u8}` compared and
// hashed as a raw `u32`). Rust has no anonymous unions for this without
// `unsafe`, so the packed encoding is done explicitly with shifts, which
// keeps `Instruction` a plain `Copy` value with the same equality and
// hashing behavior spec.md requires ("equality and hashing use the packed
// value").

use std::fmt;

/// The eight instruction opcodes the display-list VM understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Lda,
    Ldx,
    Ldy,
    Sta,
    Stx,
    Sty,
    Nop,
}

impl Op {
    /// Cycle cost: loads take 2 color cycles, stores take 4, NOP is free.
    pub fn cycles(self) -> u32 {
        match self {
            Op::Lda | Op::Ldx | Op::Ldy => 2,
            Op::Sta | Op::Stx | Op::Sty => 4,
            Op::Nop => 0,
        }
    }

    pub fn is_load(self) -> bool {
        matches!(self, Op::Lda | Op::Ldx | Op::Ldy)
    }

    pub fn is_store(self) -> bool {
        matches!(self, Op::Sta | Op::Stx | Op::Sty)
    }

    fn from_code(code: u8) -> Op {
        match code {
            0 => Op::Lda,
            1 => Op::Ldx,
            2 => Op::Ldy,
            3 => Op::Sta,
            4 => Op::Stx,
            5 => Op::Sty,
            _ => Op::Nop,
        }
    }

    fn code(self) -> u8 {
        match self {
            Op::Lda => 0,
            Op::Ldx => 1,
            Op::Ldy => 2,
            Op::Sta => 3,
            Op::Stx => 4,
            Op::Sty => 5,
            Op::Nop => 6,
        }
    }
}

/// The fixed T = 12 writable targets: background colors, sprite colors,
/// sprite horizontal positions. Concrete vocabulary supplementing
/// spec.md's abstract `TargetRegisters`, grounded on the register map
/// implied throughout `original_source` (`E_COLOR0..2`, `E_COLBAK`,
/// `E_COLPM0..3`, `E_HPOSP0..3`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetRegister {
    Color0,
    Color1,
    Color2,
    ColBak,
    ColPm0,
    ColPm1,
    ColPm2,
    ColPm3,
    HposP0,
    HposP1,
    HposP2,
    HposP3,
}

pub const TARGET_COUNT: usize = 12;

impl TargetRegister {
    pub const ALL: [TargetRegister; TARGET_COUNT] = [
        TargetRegister::Color0,
        TargetRegister::Color1,
        TargetRegister::Color2,
        TargetRegister::ColBak,
        TargetRegister::ColPm0,
        TargetRegister::ColPm1,
        TargetRegister::ColPm2,
        TargetRegister::ColPm3,
        TargetRegister::HposP0,
        TargetRegister::HposP1,
        TargetRegister::HposP2,
        TargetRegister::HposP3,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(i: usize) -> Option<TargetRegister> {
        TargetRegister::ALL.get(i).copied()
    }

    pub fn is_sprite_position(self) -> bool {
        matches!(
            self,
            TargetRegister::HposP0
                | TargetRegister::HposP1
                | TargetRegister::HposP2
                | TargetRegister::HposP3
        )
    }

    pub fn is_sprite_color(self) -> bool {
        matches!(
            self,
            TargetRegister::ColPm0
                | TargetRegister::ColPm1
                | TargetRegister::ColPm2
                | TargetRegister::ColPm3
        )
    }

    /// Sprite index (0..4) for sprite position/color targets.
    pub fn sprite_index(self) -> Option<usize> {
        match self {
            TargetRegister::HposP0 | TargetRegister::ColPm0 => Some(0),
            TargetRegister::HposP1 | TargetRegister::ColPm1 => Some(1),
            TargetRegister::HposP2 | TargetRegister::ColPm2 => Some(2),
            TargetRegister::HposP3 | TargetRegister::ColPm3 => Some(3),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TargetRegister::Color0 => "COLOR0",
            TargetRegister::Color1 => "COLOR1",
            TargetRegister::Color2 => "COLOR2",
            TargetRegister::ColBak => "COLBAK",
            TargetRegister::ColPm0 => "COLPM0",
            TargetRegister::ColPm1 => "COLPM1",
            TargetRegister::ColPm2 => "COLPM2",
            TargetRegister::ColPm3 => "COLPM3",
            TargetRegister::HposP0 => "HPOSP0",
            TargetRegister::HposP1 => "HPOSP1",
            TargetRegister::HposP2 => "HPOSP2",
            TargetRegister::HposP3 => "HPOSP3",
        }
    }

    pub fn from_name(name: &str) -> Option<TargetRegister> {
        TargetRegister::ALL
            .iter()
            .copied()
            .find(|t| t.name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for TargetRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// `STA`/`STX`/`STY` store with no target: the disabled sentinel used by
/// OnOff disabling to make a store inert without deleting it.
const NONE_TARGET: u8 = 0xFF;

/// A single packed display-list instruction: `{op, target, value}`.
/// Equality and hashing use the packed 32-bit value, per spec.md §3.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Instruction {
    packed: u32,
}

impl Instruction {
    pub fn new(op: Op, target: Option<TargetRegister>, value: u8) -> Self {
        let target_byte = target.map(|t| t.index() as u8).unwrap_or(NONE_TARGET);
        let packed = (op.code() as u32) | ((target_byte as u32) << 8) | ((value as u32) << 16);
        Instruction { packed }
    }

    pub fn nop() -> Self {
        Instruction::new(Op::Nop, None, 0)
    }

    pub fn op(self) -> Op {
        Op::from_code((self.packed & 0xFF) as u8)
    }

    pub fn target(self) -> Option<TargetRegister> {
        let byte = ((self.packed >> 8) & 0xFF) as u8;
        if byte == NONE_TARGET {
            None
        } else {
            TargetRegister::from_index(byte as usize)
        }
    }

    pub fn value(self) -> u8 {
        ((self.packed >> 16) & 0xFF) as u8
    }

    pub fn set_value(&mut self, value: u8) {
        *self = Instruction::new(self.op(), self.target(), value);
    }

    pub fn set_target(&mut self, target: Option<TargetRegister>) {
        *self = Instruction::new(self.op(), target, self.value());
    }

    /// Cycle cost of this instruction.
    pub fn cycles(self) -> u32 {
        self.op().cycles()
    }

    /// Rewrite a store whose target matches `target` into an inert
    /// no-target store sentinel, per spec.md §4.2 OnOff disabling.
    pub fn disable_target(&mut self, target: TargetRegister) {
        if self.op().is_store() && self.target() == Some(target) {
            self.set_target(None);
        }
    }

    pub fn packed(self) -> u32 {
        self.packed
    }
}

impl fmt::Debug for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instruction")
            .field("op", &self.op())
            .field("target", &self.target())
            .field("value", &self.value())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packed_equality_matches_field_equality() {
        let a = Instruction::new(Op::Lda, None, 0x12);
        let b = Instruction::new(Op::Lda, None, 0x12);
        assert_eq!(a, b);
        assert_eq!(a.packed(), b.packed());
    }

    #[test]
    fn store_disabling_clears_target_only_for_match() {
        let mut insn = Instruction::new(Op::Sta, Some(TargetRegister::ColBak), 0x10);
        insn.disable_target(TargetRegister::Color0);
        assert_eq!(insn.target(), Some(TargetRegister::ColBak));
        insn.disable_target(TargetRegister::ColBak);
        assert_eq!(insn.target(), None);
    }

    #[test]
    fn load_does_not_disable() {
        let mut insn = Instruction::new(Op::Lda, None, 0x10);
        let before = insn;
        insn.disable_target(TargetRegister::ColBak);
        assert_eq!(insn, before);
    }

    #[test]
    fn register_name_roundtrip() {
        for t in TargetRegister::ALL {
            assert_eq!(TargetRegister::from_name(t.name()), Some(t));
            assert_eq!(TargetRegister::from_name(&t.name().to_lowercase()), Some(t));
        }
    }

    #[test]
    fn cycles_match_opcode_class() {
        assert_eq!(Op::Lda.cycles(), 2);
        assert_eq!(Op::Sta.cycles(), 4);
        assert_eq!(Op::Nop.cycles(), 0);
    }
}
