// Mutator: applies one typed edit to a chosen scanline of a candidate
// program, weighted by a running success/attempt ratio. Grounded on
// `original_source/src/mutation/RasterMutator.cpp`'s `MutateOnce`/
// `MutateProgram` — the switch-with-fallthrough chain that tries a
// weighted-selected edit kind and cascades to the next kind in a fixed
// order when its precondition fails is kept verbatim; `m_stats` still
// credits success to the *originally selected* kind even when a later
// kind in the chain is the one that actually ran, since that is what the
// weighting in `select_mutation` learns from.

use crate::color::{nearest_palette_index, ErrorMap};
use crate::executor::constants::{FREE_CYCLES, SPRITE_PRELUDE, SPRITE_SIZE};
use crate::insn::{Instruction, Op, TargetRegister, TARGET_COUNT};
use crate::program::Picture;
use crate::rng::Rng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    CopyLineToNext,
    PushBackToPrev,
    SwapLineWithPrev,
    AddInstruction,
    RemoveInstruction,
    SwapInstruction,
    ChangeTarget,
    ChangeValueToColor,
    ChangeValue,
}

/// Fallthrough chain order: if the kind at position `i` can't apply, the
/// next one is tried instead. `ChangeTarget` and `ChangeValue` never
/// fail, so the chain always terminates.
pub const MUTATION_CHAIN: [MutationKind; 9] = [
    MutationKind::CopyLineToNext,
    MutationKind::PushBackToPrev,
    MutationKind::SwapLineWithPrev,
    MutationKind::AddInstruction,
    MutationKind::RemoveInstruction,
    MutationKind::SwapInstruction,
    MutationKind::ChangeTarget,
    MutationKind::ChangeValueToColor,
    MutationKind::ChangeValue,
];

pub const MUTATION_COUNT: usize = MUTATION_CHAIN.len();

#[derive(Debug, Default, Clone, Copy)]
pub struct MutationStats {
    pub attempt_count: [u64; MUTATION_COUNT],
    pub success_count: [u64; MUTATION_COUNT],
}

/// Per-worker mutation engine. Owns its own region of scanlines to bias
/// toward (spec.md §4.3 "Line selection") and its running stats.
pub struct Mutator {
    rng: Rng,
    stats: MutationStats,
    currently_mutated_y: usize,
    region_start: usize,
    region_end: usize,
    targets_b: bool,
}

impl Mutator {
    pub fn new(seed: u64, height: usize, thread_index: usize, thread_count: usize) -> Self {
        let lines_per_thread = height / thread_count.max(1);
        let region_start = thread_index * lines_per_thread;
        let region_end = if thread_index + 1 == thread_count {
            height
        } else {
            region_start + lines_per_thread
        };
        Mutator {
            rng: Rng::new(seed),
            stats: MutationStats::default(),
            currently_mutated_y: region_start,
            region_start,
            region_end: region_end.max(region_start + 1).min(height.max(1)),
            targets_b: false,
        }
    }

    pub fn stats(&self) -> &MutationStats {
        &self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = MutationStats::default();
    }

    pub fn currently_mutated_y(&self) -> usize {
        self.currently_mutated_y
    }

    pub fn set_targets_b(&mut self, targets_b: bool) {
        self.targets_b = targets_b;
    }

    pub fn targets_b(&self) -> bool {
        self.targets_b
    }

    fn select_line(&mut self, height: usize) {
        if self.rng.chance(0.8) && self.region_end > self.region_start {
            self.currently_mutated_y = self.region_start + self.rng.gen_range(self.region_end - self.region_start);
        } else if height > 0 {
            self.currently_mutated_y = self.rng.gen_range(height);
        }
    }

    /// Weight by running success rate, minimum 0.1, per spec.md §4.3.
    fn select_mutation(&mut self) -> usize {
        let mut weights = [0.0f64; MUTATION_COUNT];
        let mut total = 0.0;
        for i in 0..MUTATION_COUNT {
            let success_rate = if self.stats.attempt_count[i] > 10 {
                self.stats.success_count[i] as f64 / self.stats.attempt_count[i] as f64
            } else {
                0.1
            };
            weights[i] = 0.1 + 0.9 * success_rate;
            total += weights[i];
        }
        let r = self.rng.next_f64() * total;
        let mut sum = 0.0;
        for i in 0..MUTATION_COUNT {
            sum += weights[i];
            if r <= sum {
                return i;
            }
        }
        MUTATION_COUNT - 1
    }

    /// Apply one mutation to `picture`'s currently-selected line, source
    /// image quantized via `errors`, and lines' declared possible colors
    /// via `possible_colors`.
    fn mutate_once(&mut self, picture: &mut Picture, errors: &ErrorMap, possible_colors: &[Vec<u8>]) {
        let y = self.currently_mutated_y;
        let len = picture.lines[y].instructions().len();
        if len == 0 {
            // nothing to touch but CHANGE_TARGET/ADD_INSTRUCTION style
            // kinds; fold to a no-op attempt credited against CHANGE_VALUE.
            self.stats.attempt_count[MUTATION_COUNT - 1] += 1;
            return;
        }
        let i1 = self.rng.gen_range(len);
        let mut i2 = i1;
        if len > 2 {
            while i2 == i1 {
                i2 = self.rng.gen_range(len);
            }
        }

        let start = self.select_mutation();
        self.stats.attempt_count[start] += 1;

        for &kind in &MUTATION_CHAIN[start..] {
            let applied = match kind {
                MutationKind::CopyLineToNext => self.try_copy_line_to_next(picture, y),
                MutationKind::PushBackToPrev => self.try_push_back_to_prev(picture, y, i1),
                MutationKind::SwapLineWithPrev => self.try_swap_line_with_prev(picture, y),
                MutationKind::AddInstruction => {
                    self.try_add_instruction(picture, y, i1, errors, possible_colors)
                }
                MutationKind::RemoveInstruction => self.try_remove_instruction(picture, y, i1),
                MutationKind::SwapInstruction => self.try_swap_instruction(picture, y, i1, i2),
                MutationKind::ChangeTarget => {
                    self.change_target(picture, y, i1);
                    true
                }
                MutationKind::ChangeValueToColor => {
                    self.change_value_to_color(picture, y, i1, errors);
                    true
                }
                MutationKind::ChangeValue => {
                    self.change_value(picture, y, i1, possible_colors);
                    true
                }
            };
            if applied {
                self.stats.success_count[start] += 1;
                return;
            }
        }
    }

    fn try_copy_line_to_next(&mut self, picture: &mut Picture, y: usize) -> bool {
        if y + 1 >= picture.height() {
            return false;
        }
        let next = picture.lines[y + 1].clone();
        picture.lines[y] = next;
        true
    }

    fn try_push_back_to_prev(&mut self, picture: &mut Picture, y: usize, i1: usize) -> bool {
        if y == 0 {
            return false;
        }
        let insn = picture.lines[y].instructions()[i1];
        let prev = &mut picture.lines[y - 1];
        if prev.cycles() + insn.cycles() >= FREE_CYCLES {
            return false;
        }
        prev.instructions_mut().push(insn);
        true
    }

    fn try_swap_line_with_prev(&mut self, picture: &mut Picture, y: usize) -> bool {
        if y == 0 {
            return false;
        }
        picture.lines.swap(y - 1, y);
        picture.lines[y - 1].invalidate_identity();
        picture.lines[y].invalidate_identity();
        true
    }

    fn try_add_instruction(
        &mut self,
        picture: &mut Picture,
        y: usize,
        i1: usize,
        errors: &ErrorMap,
        possible_colors: &[Vec<u8>],
    ) -> bool {
        let line = &picture.lines[y];
        let spare = line.spare_cycles();
        if spare < 2 {
            return false;
        }
        let width = errors.width();

        let insn = if spare >= 4 && self.rng.chance(0.5) {
            let op = [Op::Sta, Op::Stx, Op::Sty][self.rng.gen_range(3)];
            let target = random_target(&mut self.rng);
            let value = (self.rng.gen_range(128) as u8) * 2;
            Instruction::new(op, Some(target), value)
        } else {
            let op = [Op::Lda, Op::Ldx, Op::Ldy][self.rng.gen_range(3)];
            let value = match self.rng.gen_range(3) {
                0 => (self.rng.gen_range(128) as u8) * 2,
                1 if !possible_colors[y].is_empty() => {
                    possible_colors[y][self.rng.gen_range(possible_colors[y].len())]
                }
                _ => {
                    let x = self.rng.gen_range(width);
                    nearest_palette_index(errors, y, x) * 2
                }
            };
            Instruction::new(op, None, value)
        };

        let instructions = picture.lines[y].instructions_mut();
        instructions.insert(i1.min(instructions.len()), insn);
        true
    }

    fn try_remove_instruction(&mut self, picture: &mut Picture, y: usize, i1: usize) -> bool {
        let line = &picture.lines[y];
        if line.instructions().len() <= 1 {
            return false;
        }
        let removed_cycles = line.instructions()[i1].cycles();
        if line.cycles() <= removed_cycles {
            return false;
        }
        let instructions = picture.lines[y].instructions_mut();
        instructions.remove(i1);
        true
    }

    fn try_swap_instruction(&mut self, picture: &mut Picture, y: usize, i1: usize, i2: usize) -> bool {
        if picture.lines[y].instructions().len() <= 2 || i1 == i2 {
            return false;
        }
        picture.lines[y].instructions_mut().swap(i1, i2);
        true
    }

    fn change_target(&mut self, picture: &mut Picture, y: usize, i1: usize) {
        let target = random_target(&mut self.rng);
        picture.lines[y].instructions_mut()[i1].set_target(Some(target));
    }

    fn change_value_to_color(&mut self, picture: &mut Picture, y: usize, i1: usize, errors: &ErrorMap) {
        let width = errors.width() as i32;
        let height = picture.height();
        let insn = picture.lines[y].instructions()[i1];

        let x = if insn.target().is_some_and(TargetRegister::is_sprite_position) {
            let raw = picture.mem_regs_init[insn.target().unwrap().index()] as i32;
            raw - SPRITE_PRELUDE + self.rng.gen_range(SPRITE_SIZE as usize) as i32
        } else {
            let mut c: u32 = picture.lines[y].instructions()[..i1.min(picture.lines[y].instructions().len())]
                .iter()
                .map(|i| i.cycles())
                .sum();
            while self.rng.gen_range(5) == 0 {
                c += 1;
            }
            if c >= FREE_CYCLES {
                c = FREE_CYCLES - 1;
            }
            crate::executor::constants::screen_cycles(c, width)
        };
        let x = if x < 0 || x >= width { self.rng.gen_range(width as usize) as i32 } else { x };

        let mut row = y;
        while self.rng.gen_range(5) == 0 && row + 1 < height {
            row += 1;
        }

        let value = nearest_palette_index(errors, row, x as usize) * 2;
        picture.lines[y].instructions_mut()[i1].set_value(value);
    }

    /// 10% chance of a full resample (values drawn uniformly or from the
    /// line's declared possible colors), otherwise a +/-1 or +/-16 nudge.
    fn change_value(&mut self, picture: &mut Picture, y: usize, i1: usize, possible_colors: &[Vec<u8>]) {
        let current = picture.lines[y].instructions()[i1].value();
        let new_value = if self.rng.gen_range(10) == 0 {
            if self.rng.gen_range(2) == 0 || possible_colors[y].is_empty() {
                (self.rng.gen_range(128) as u8) * 2
            } else {
                possible_colors[y][self.rng.gen_range(possible_colors[y].len())]
            }
        } else {
            let mut delta: i32 = 1;
            if self.rng.gen_range(2) == 0 {
                delta *= -1;
            }
            if self.rng.gen_range(2) == 0 {
                delta *= 16;
            }
            (current as i32).wrapping_add(delta).rem_euclid(256) as u8
        };
        picture.lines[y].instructions_mut()[i1].set_value(new_value);
    }

    /// One full MutateProgram pass: select a line, mutate it a batch of
    /// times, maybe nudge `mem_regs_init`, maybe repeat on nearby lines.
    pub fn mutate_program(&mut self, picture: &mut Picture, errors: &ErrorMap, possible_colors: &[Vec<u8>]) {
        self.select_line(picture.height());

        if self.rng.gen_range(10) == 0 {
            self.nudge_mem_regs_init(picture);
        }

        self.mutate_line_batch(picture, errors, possible_colors);

        if self.rng.gen_range(20) == 0 {
            for _ in 0..10 {
                if self.rng.gen_range(2) == 0 && self.currently_mutated_y > self.region_start {
                    self.currently_mutated_y -= 1;
                } else if self.currently_mutated_y + 1 < self.region_end {
                    self.currently_mutated_y += 1;
                } else if self.region_end > self.region_start {
                    self.currently_mutated_y =
                        self.region_start + self.rng.gen_range(self.region_end - self.region_start);
                }
                self.mutate_line_batch(picture, errors, possible_colors);
            }
        }
    }

    fn mutate_line_batch(&mut self, picture: &mut Picture, errors: &ErrorMap, possible_colors: &[Vec<u8>]) {
        let len = picture.lines[self.currently_mutated_y].instructions().len();
        let count = (3 + len / 5).min(8).max(1);
        for _ in 0..count {
            self.mutate_once(picture, errors, possible_colors);
        }
    }

    fn nudge_mem_regs_init(&mut self, picture: &mut Picture) {
        let mut delta: i32 = 1;
        if self.rng.gen_range(2) == 0 {
            delta *= -1;
        }
        if self.rng.gen_range(2) == 0 {
            delta *= 16;
        }
        let mut target = random_target(&mut self.rng);
        while target == TargetRegister::ColBak {
            target = random_target(&mut self.rng);
        }
        let slot = &mut picture.mem_regs_init[target.index()];
        *slot = (*slot as i32).wrapping_add(delta).rem_euclid(256) as u8;
    }
}

fn random_target(rng: &mut Rng) -> TargetRegister {
    TargetRegister::from_index(rng.gen_range(TARGET_COUNT)).expect("index within TARGET_COUNT")
}
