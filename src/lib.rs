// Raster display-list optimizer library.
//
// A deterministic per-scanline program executor, a parallel LAHC/DLAS
// stochastic optimizer, a multi-level memoization fabric, and a
// dual-frame co-optimization mode.

pub mod arena;
pub mod color;
pub mod config;
pub mod dual;
pub mod error;
pub mod executor;
pub mod format;
pub mod insn;
pub mod insn_cache;
pub mod line_cache;
pub mod mutation;
pub mod onoff;
pub mod optimization;
pub mod program;
pub mod rng;
pub mod runner;

pub use color::{ErrorMap, Palette, Rgb};
pub use config::OptimizerConfig;
pub use error::{InputError, ProtocolError, ResourceError};
pub use insn::{Instruction, Op, TargetRegister};
pub use mutation::Mutator;
pub use onoff::OnOffMap;
pub use optimization::{AcceptancePolicy, Dlas, Lahc};
pub use program::{Line, Picture, RegisterState};
pub use runner::{BestSnapshot, NullObserver, Runner, RunnerObserver, StopHandle};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_components() {
        let _picture = Picture::new(4);
        let _onoff = OnOffMap::all_enabled(4);
        let _mutator = Mutator::new(1, 4, 0, 1);
        let _lahc = Lahc::new(100);
        let _config = OptimizerConfig::default();
    }
}
