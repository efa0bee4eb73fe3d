// OnOffMap: per-line enable/disable mask over the target-register
// vocabulary, parsed from the line-oriented ASCII format of spec.md §6.

use crate::error::InputError;
use crate::insn::{TargetRegister, TARGET_COUNT};

/// `H × T` boolean grid selecting whether a given target may be written
/// from a given scanline. `true` means writable (the spec's "ON").
#[derive(Debug, Clone)]
pub struct OnOffMap {
    height: usize,
    enabled: Vec<[bool; TARGET_COUNT]>,
}

impl OnOffMap {
    /// Everything enabled everywhere — the default when no OnOff file is
    /// supplied.
    pub fn all_enabled(height: usize) -> Self {
        OnOffMap { height, enabled: vec![[true; TARGET_COUNT]; height] }
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn is_enabled(&self, y: usize, target: TargetRegister) -> bool {
        self.enabled[y][target.index()]
    }

    fn set_range(&mut self, target: TargetRegister, from: usize, to: usize, enabled: bool) {
        for y in from..=to {
            self.enabled[y][target.index()] = enabled;
        }
    }

    /// Parse the `REGNAME ON|OFF FROM TO` line format. Comments (`;` or
    /// `#` prefixed) and blank lines are ignored. A parse failure is
    /// fatal and carries its 1-based source line number.
    pub fn parse(text: &str, height: usize) -> Result<Self, InputError> {
        let mut map = OnOffMap::all_enabled(height);
        for (idx, raw_line) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.len() != 4 {
                return Err(InputError::OnOffParse {
                    line: line_no,
                    message: format!("expected 'REGNAME ON|OFF FROM TO', got '{line}'"),
                });
            }
            let [reg, state, from_s, to_s] = [tokens[0], tokens[1], tokens[2], tokens[3]];

            let target = TargetRegister::from_name(reg).ok_or_else(|| {
                tracing::warn!(line = line_no, register = reg, "unknown onoff register");
                InputError::UnknownRegister { line: line_no, name: reg.to_string() }
            })?;

            let enabled = match state.to_ascii_uppercase().as_str() {
                "ON" => true,
                "OFF" => false,
                other => {
                    return Err(InputError::OnOffParse {
                        line: line_no,
                        message: format!("expected ON or OFF, got '{other}'"),
                    })
                }
            };

            let from: usize = from_s.parse().map_err(|_| InputError::OnOffParse {
                line: line_no,
                message: format!("invalid FROM value '{from_s}'"),
            })?;
            let to: usize = to_s.parse().map_err(|_| InputError::OnOffParse {
                line: line_no,
                message: format!("invalid TO value '{to_s}'"),
            })?;

            if from > to || to >= height {
                return Err(InputError::RangeOutOfBounds { line: line_no, from, to, height });
            }

            map.set_range(target, from, to, enabled);
        }
        Ok(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_basic_directives_and_ignores_comments() {
        let text = "; comment\nCOLBAK OFF 0 2\n\nHPOSP0 ON 3 3\n";
        let map = OnOffMap::parse(text, 5).unwrap();
        assert!(!map.is_enabled(0, TargetRegister::ColBak));
        assert!(!map.is_enabled(2, TargetRegister::ColBak));
        assert!(map.is_enabled(3, TargetRegister::ColBak));
        assert!(map.is_enabled(3, TargetRegister::HposP0));
    }

    #[test]
    fn unknown_register_is_fatal_with_line_number() {
        let err = OnOffMap::parse("BOGUS OFF 0 1\n", 4).unwrap_err();
        match err {
            InputError::UnknownRegister { line, name } => {
                assert_eq!(line, 1);
                assert_eq!(name, "BOGUS");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn out_of_range_is_fatal() {
        let err = OnOffMap::parse("COLBAK OFF 0 10\n", 4).unwrap_err();
        assert!(matches!(err, InputError::RangeOutOfBounds { .. }));
    }

    #[test]
    fn applying_twice_is_idempotent() {
        let text = "COLBAK OFF 0 1\nCOLOR0 ON 2 3\n";
        let a = OnOffMap::parse(text, 4).unwrap();
        let b = OnOffMap::parse(&format!("{text}{text}"), 4).unwrap();
        for y in 0..4 {
            for t in TargetRegister::ALL {
                assert_eq!(a.is_enabled(y, t), b.is_enabled(y, t));
            }
        }
    }
}
