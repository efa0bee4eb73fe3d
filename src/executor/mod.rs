// Program-execution engine: plays one scanline's instructions
// cycle-by-cycle over a virtual raster, grounded on
// `original_source/src/execution/Executor.cpp`'s main scan loop. The
// teacher's `Cpu::step`/`Ppu::step` cycle-stepping shape (advance a
// clock, apply effects, observe output) is the idiomatic-Rust model this
// follows, generalized from "one fixed hardware pipeline" to "one
// pluggable cost function" so the same loop serves both single- and
// dual-frame evaluation (spec.md §4.6/§4.7).

pub mod constants;
pub mod sprite;

use crate::arena::Arena;
use crate::insn::{Instruction, Op, TargetRegister, TARGET_COUNT};
use crate::insn_cache::InsnCache;
use crate::line_cache::{LineCache, LineCacheKey, LineResult};
use crate::onoff::OnOffMap;
use crate::program::{Line, Picture, RegisterState};
use constants::{
    end_x, first_x, screen_cycles, HAZARD_PENALTY, HAZARD_WINDOW, MAX_RESTARTS, SPRITE_COUNT,
    SPRITE_PRELUDE,
};
use sprite::SpriteState;

/// Per-pixel color cost, abstracting over single-frame (precomputed
/// error map lookup) and dual-frame (pair cost, spec.md §4.7) scoring so
/// the Executor's scan loop does not need to know which mode it is in.
/// `width` reports the picture's visible scanline width, since it too
/// varies with the image being reproduced.
pub trait PixelCost {
    fn cost(&self, palette_index: u8, y: usize, x: usize) -> f64;
    fn width(&self) -> usize;
}

/// Single-frame cost: a direct lookup into a precomputed error map.
pub struct SingleFrameCost<'a> {
    pub errors: &'a crate::color::ErrorMap,
}

impl PixelCost for SingleFrameCost<'_> {
    fn cost(&self, palette_index: u8, y: usize, x: usize) -> f64 {
        let idx = y * self.errors.width() + x;
        self.errors.distance(palette_index, idx) as f64
    }

    fn width(&self) -> usize {
        self.errors.width()
    }
}

/// Whole-picture execution result: total error plus one `LineResult` per
/// scanline, ready for caching or rendering.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub total_error: f64,
    pub lines: Vec<LineResult>,
}

/// Executes candidate programs against a cost function, consulting and
/// populating the shared caches as it goes.
#[derive(Default)]
pub struct Executor;

impl Executor {
    pub fn new() -> Self {
        Executor
    }

    /// Run every scanline of `picture`, applying `onoff` disabling first
    /// and consulting `line_cache`/`insn_cache` per spec.md §4.2
    /// "Caching discipline".
    pub fn execute<C: PixelCost>(
        &self,
        picture: &mut Picture,
        insn_cache: &mut InsnCache,
        line_cache: &mut LineCache,
        arena: &mut Arena,
        onoff: &OnOffMap,
        cost_fn: &C,
    ) -> ExecutionResult {
        let width = cost_fn.width() as i32;
        let mut state = picture_entry_state(picture);
        let mut total_error = 0.0;
        let mut lines = Vec::with_capacity(picture.height());

        for y in 0..picture.height() {
            apply_onoff(&mut picture.lines[y], onoff, y);

            let identity = picture.lines[y].identity().unwrap_or_else(|| {
                let handle = insn_cache.intern(picture.lines[y].instructions(), arena);
                picture.lines[y].set_identity(handle);
                handle
            });

            let key = LineCacheKey::new(state, identity);
            let result = if let Some(cached) = line_cache.find(&key) {
                cached.clone()
            } else {
                let instructions = insn_cache.sequence(identity).to_vec();
                let computed = run_line(&instructions, state, y, width, cost_fn);
                line_cache.insert(key, computed.clone(), arena);
                computed
            };

            total_error += result.line_error;
            state = result.exit_state;
            lines.push(result);
        }

        ExecutionResult { total_error, lines }
    }
}

fn picture_entry_state(picture: &Picture) -> RegisterState {
    let mut state = RegisterState::new();
    state.mem_regs = picture.mem_regs_init;
    state
}

/// Rewrite disabled-target `ST*` instructions to the inert sentinel, per
/// spec.md §4.2 "OnOff disabling". Only touches the line (and thus its
/// cached identity) when a disabled store actually appears on it.
fn apply_onoff(line: &mut Line, onoff: &OnOffMap, y: usize) {
    let disabled: Vec<TargetRegister> =
        TargetRegister::ALL.into_iter().filter(|&t| !onoff.is_enabled(y, t)).collect();
    if disabled.is_empty() {
        return;
    }
    let needs_change = line.instructions().iter().any(|insn| {
        insn.op().is_store() && insn.target().is_some_and(|t| disabled.contains(&t))
    });
    if !needs_change {
        return;
    }
    for insn in line.instructions_mut() {
        for &t in &disabled {
            insn.disable_target(t);
        }
    }
}

/// Apply OnOff's `mem_regs_init` zeroing for scanline-0 targets that are
/// OFF at the picture's first line.
pub fn apply_onoff_init(picture: &mut Picture, onoff: &OnOffMap) {
    for t in TargetRegister::ALL {
        if !onoff.is_enabled(0, t) {
            picture.mem_regs_init[t.index()] = 0;
        }
    }
}

#[derive(Clone, Copy)]
struct ScheduledEffect {
    offset: i32,
    insn: Instruction,
}

fn schedule(instructions: &[Instruction], width: i32) -> Vec<ScheduledEffect> {
    let mut clock = 0u32;
    let mut out = Vec::with_capacity(instructions.len());
    for &insn in instructions {
        let offset = screen_cycles(clock, width);
        out.push(ScheduledEffect { offset, insn });
        clock += insn.cycles();
    }
    out
}

/// One candidate winner for a pixel: either a background/ColBak register
/// or a sprite (with the pixel-in-sprite index needed to commit its bit
/// on a win).
enum Candidate {
    Register(TargetRegister),
    Sprite { index: usize, pixel_in_sprite: usize },
}

enum Attempt {
    Done(LineResult),
    Restart { sprite: usize, pixel_in_sprite: usize, updated_row_memory: [u8; SPRITE_COUNT] },
}

/// Run `instructions` from `entry`, restarting per spec.md's
/// "Restart-on-coverage" until the scanline settles or the bound is hit.
fn run_line<C: PixelCost>(
    instructions: &[Instruction],
    entry: RegisterState,
    y: usize,
    width: i32,
    cost_fn: &C,
) -> LineResult {
    let schedule_table = schedule(instructions, width);
    let entry_hpos = sprite_hpos(&entry);

    let mut row_memory = [0u8; SPRITE_COUNT];
    let mut attempt = 0u32;

    loop {
        match run_once(&schedule_table, entry, entry_hpos, row_memory, y, width, cost_fn) {
            Attempt::Done(result) => return result,
            Attempt::Restart { updated_row_memory, .. } => {
                row_memory = updated_row_memory;
                attempt += 1;
                if attempt > MAX_RESTARTS {
                    // Bounded by construction (spec.md §8): each restart
                    // strictly grows the 1-bit count of a 4*8-bit row
                    // memory, so this arm is unreachable in practice.
                    return match run_once(&schedule_table, entry, entry_hpos, row_memory, y, width, cost_fn) {
                        Attempt::Done(result) => result,
                        Attempt::Restart { .. } => unreachable!("restart bound exceeded"),
                    };
                }
            }
        }
    }
}

fn sprite_hpos(state: &RegisterState) -> [u8; SPRITE_COUNT] {
    [
        state.get(TargetRegister::HposP0),
        state.get(TargetRegister::HposP1),
        state.get(TargetRegister::HposP2),
        state.get(TargetRegister::HposP3),
    ]
}

fn run_once<C: PixelCost>(
    schedule_table: &[ScheduledEffect],
    entry: RegisterState,
    entry_hpos: [u8; SPRITE_COUNT],
    row_memory: [u8; SPRITE_COUNT],
    y: usize,
    width: i32,
    cost_fn: &C,
) -> Attempt {
    let mut sprites = SpriteState::new(entry_hpos);
    for i in 0..SPRITE_COUNT {
        for j in 0..8u32 {
            if row_memory[i] & (1 << j) != 0 {
                sprites.set_bit(i, j as usize);
            }
        }
    }

    let mut a = entry.a;
    let mut x = entry.x;
    let mut yr = entry.y;
    let mut mem_regs = entry.mem_regs;
    let mut line_error = 0.0f64;
    let mut color_row = vec![0u8; width as usize];
    let mut target_row: Vec<Option<TargetRegister>> = vec![None; width as usize];

    let mut next_effect = 0usize;

    for scan_x in first_x()..end_x(width) {
        while next_effect < schedule_table.len() && schedule_table[next_effect].offset < scan_x {
            let effect = schedule_table[next_effect];
            next_effect += 1;
            match effect.insn.op() {
                Op::Lda => a = effect.insn.value(),
                Op::Ldx => x = effect.insn.value(),
                Op::Ldy => yr = effect.insn.value(),
                Op::Sta | Op::Stx | Op::Sty => {
                    let Some(target) = effect.insn.target() else { continue };
                    let reg_value = match effect.insn.op() {
                        Op::Sta => a,
                        Op::Stx => x,
                        Op::Sty => yr,
                        _ => unreachable!(),
                    };
                    if target.is_sprite_position() {
                        let i = target.sprite_index().expect("sprite position has sprite index");
                        let old_hpos = mem_regs[target.index()];
                        let new_hpos = reg_value;
                        if hazard(old_hpos, new_hpos, effect.offset) && sprites.has_graphics(i) {
                            line_error += HAZARD_PENALTY;
                        }
                        sprites.move_start(i, old_hpos, new_hpos);
                    }
                    mem_regs[target.index()] = reg_value;
                }
                Op::Nop => {}
            }
        }

        let raw_hpos = scan_x + SPRITE_PRELUDE;
        if (0..256).contains(&raw_hpos) {
            let firing: Vec<usize> = sprites.starts_at(raw_hpos as u8).collect();
            for i in firing {
                sprites.start_shift(i, raw_hpos as u8);
            }
        }

        if !(0..width).contains(&scan_x) {
            continue;
        }
        let x_usize = scan_x as usize;

        let (winner, restart) = select_pixel(&sprites, &mem_regs, scan_x, x_usize, y, cost_fn);
        if let Some((sprite_i, pixel_in_sprite)) = restart {
            let mut updated = row_memory;
            updated[sprite_i] |= 1 << pixel_in_sprite;
            return Attempt::Restart { sprite: sprite_i, pixel_in_sprite, updated_row_memory: updated };
        }

        let target = match winner {
            Candidate::Register(t) => t,
            Candidate::Sprite { index, .. } => sprite_color_target(index),
        };
        let palette_index = mem_regs[target.index()] >> 1;
        color_row[x_usize] = palette_index;
        target_row[x_usize] = Some(target);
        line_error += cost_fn.cost(palette_index, y, x_usize);
    }

    let exit_state = RegisterState { a, x, y: yr, mem_regs };
    Attempt::Done(LineResult {
        line_error,
        exit_state,
        color_row,
        target_row,
        sprite_memory: sprites.row_memory(),
    })
}

fn hazard(old_hpos: u8, new_hpos: u8, check_x: i32) -> bool {
    let old_offset = old_hpos as i32 - SPRITE_PRELUDE;
    let new_offset = new_hpos as i32 - SPRITE_PRELUDE;
    let dist_old = (old_offset - check_x).abs();
    let dist_new = (new_offset - check_x).abs();
    HAZARD_WINDOW.contains(&dist_old) || HAZARD_WINDOW.contains(&dist_new)
}

fn sprite_color_target(i: usize) -> TargetRegister {
    match i {
        0 => TargetRegister::ColPm0,
        1 => TargetRegister::ColPm1,
        2 => TargetRegister::ColPm2,
        _ => TargetRegister::ColPm3,
    }
}

/// Select the winning register for one visible pixel, per spec.md §4.2
/// "Per-pixel color selection": an opaque covering sprite wins outright;
/// otherwise the minimum-cost candidate wins, ties broken by enumeration
/// order (sprites 0..3, then `COLOR0..2`, then `COLBAK`). Returns the
/// winner, plus `Some((sprite, pixel_in_sprite))` if this selection must
/// commit a new sprite-row bit and restart the scanline.
fn select_pixel<C: PixelCost>(
    sprites: &SpriteState,
    mem_regs: &[u8; TARGET_COUNT],
    scan_x: i32,
    x: usize,
    y: usize,
    cost_fn: &C,
) -> (Candidate, Option<(usize, usize)>) {
    let mut any_sprite_covers = false;
    let mut non_opaque_candidates: Vec<(usize, usize)> = Vec::new();

    for i in 0..SPRITE_COUNT {
        if let Some(j) = sprites.covers(i, scan_x) {
            any_sprite_covers = true;
            if sprites.is_opaque(i, j) {
                return (Candidate::Sprite { index: i, pixel_in_sprite: j }, None);
            }
            non_opaque_candidates.push((i, j));
        }
    }

    let mut best: Option<(f64, Candidate)> = None;
    let mut consider = |candidate: Candidate, target: TargetRegister| {
        let palette_index = mem_regs[target.index()] >> 1;
        let cost = cost_fn.cost(palette_index, y, x);
        if best.as_ref().map_or(true, |(best_cost, _)| cost < *best_cost) {
            best = Some((cost, candidate));
        }
    };

    for &(i, j) in &non_opaque_candidates {
        consider(Candidate::Sprite { index: i, pixel_in_sprite: j }, sprite_color_target(i));
    }
    consider(Candidate::Register(TargetRegister::Color0), TargetRegister::Color0);
    consider(Candidate::Register(TargetRegister::Color1), TargetRegister::Color1);
    consider(Candidate::Register(TargetRegister::Color2), TargetRegister::Color2);
    if !any_sprite_covers {
        consider(Candidate::Register(TargetRegister::ColBak), TargetRegister::ColBak);
    }

    let (_, winner) = best.expect("COLOR0 is always a candidate");
    match winner {
        Candidate::Sprite { index, pixel_in_sprite } => {
            (Candidate::Sprite { index, pixel_in_sprite }, Some((index, pixel_in_sprite)))
        }
        other => (other, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::{ErrorMap, PALETTE_SIZE};
    use crate::insn::Instruction;

    fn flat_errors(width: usize, per_color: impl Fn(u8) -> u32) -> ErrorMap {
        let rows: Vec<Vec<u32>> =
            (0..PALETTE_SIZE).map(|c| vec![per_color(c as u8); width]).collect();
        ErrorMap::new(width, 1, rows)
    }

    #[test]
    fn store_chooses_palette() {
        let mut picture = Picture::new(1);
        picture.lines[0].set_instructions(vec![
            Instruction::new(Op::Lda, None, 0x12),
            Instruction::new(Op::Sta, Some(TargetRegister::ColBak), 0),
        ]);
        let errors = flat_errors(1, |c| if c == 9 { 7 } else { 50 });

        let mut insn_cache = InsnCache::new();
        let mut line_cache = LineCache::new();
        let mut arena = Arena::new();
        let onoff = OnOffMap::all_enabled(1);
        let cost = SingleFrameCost { errors: &errors };
        let result = Executor::new().execute(
            &mut picture,
            &mut insn_cache,
            &mut line_cache,
            &mut arena,
            &onoff,
            &cost,
        );
        assert_eq!(result.lines[0].color_row[0], 9);
        assert_eq!(result.lines[0].line_error, 7.0);
    }

    #[test]
    fn opaque_sprite_wins_irrespective_of_cost() {
        // H=1, W=4: sprite 0 at x=0 already opaque at pixel 0 (row memory
        // bit 0 preset), COLPM0=0x20, COLBAK=0x00. err[16]=5, err[0]=99.
        let mut entry = RegisterState::new();
        entry.set(TargetRegister::HposP0, SPRITE_PRELUDE as u8);
        entry.set(TargetRegister::ColPm0, 0x20);
        entry.set(TargetRegister::ColBak, 0x00);
        let errors = flat_errors(4, |c| if c == 16 { 5 } else { 99 });
        let cost = SingleFrameCost { errors: &errors };

        let schedule_table = schedule(&[], 4);
        let row_memory = [0b0000_0001u8, 0, 0, 0];
        let result = match run_once(
            &schedule_table,
            entry,
            sprite_hpos(&entry),
            row_memory,
            0,
            4,
            &cost,
        ) {
            Attempt::Done(result) => result,
            Attempt::Restart { .. } => panic!("an already-opaque sprite must not request a restart"),
        };
        assert_eq!(result.color_row[0], 16);
        assert_eq!(result.line_error, 5.0);
    }

    #[test]
    fn restart_on_coverage_fires_exactly_once() {
        // H=1, W=8: sprite 0 covers x in [0,8), row memory all zero,
        // sprite cost beats background cost at x=0.
        let mut picture = Picture::new(1);
        picture.mem_regs_init[TargetRegister::HposP0.index()] = SPRITE_PRELUDE as u8;
        picture.mem_regs_init[TargetRegister::ColPm0.index()] = 0x20;
        picture.mem_regs_init[TargetRegister::ColBak.index()] = 0x40;
        let errors = flat_errors(8, |c| if c == 16 { 1 } else { 50 });
        let cost = SingleFrameCost { errors: &errors };

        let mut insn_cache = InsnCache::new();
        let mut line_cache = LineCache::new();
        let mut arena = Arena::new();
        let onoff = OnOffMap::all_enabled(1);
        let result = Executor::new().execute(
            &mut picture,
            &mut insn_cache,
            &mut line_cache,
            &mut arena,
            &onoff,
            &cost,
        );
        assert_eq!(result.lines[0].color_row[0], 16);
        assert_eq!(result.lines[0].sprite_memory[0] & 1, 1);
    }
}
