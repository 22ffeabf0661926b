//! Command grammar: a closed set of robot commands and the ordered phrase
//! table that maps recognized speech onto them.
//!
//! Matching is exact, first match wins — a closed command grammar is what
//! keeps the robot-control surface auditable instead of open-ended.

use crate::error::{Result, VoxdriveError};
use std::collections::HashMap;

/// One of the robot's commands. Each maps to a single wire byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandCode {
    Forward,
    Backward,
    TurnLeft,
    TurnRight,
    Handshake,
    Greet,
    Dance,
}

impl CommandCode {
    /// The byte written to the serial line for this command.
    pub fn wire_byte(self) -> u8 {
        match self {
            CommandCode::Forward => b'f',
            CommandCode::Backward => b'b',
            CommandCode::TurnLeft => b'l',
            CommandCode::TurnRight => b'r',
            CommandCode::Handshake => b's',
            CommandCode::Greet => b'w',
            CommandCode::Dance => b'd',
        }
    }

    /// Stable name, used in config overrides and output.
    pub fn name(self) -> &'static str {
        match self {
            CommandCode::Forward => "forward",
            CommandCode::Backward => "backward",
            CommandCode::TurnLeft => "turn-left",
            CommandCode::TurnRight => "turn-right",
            CommandCode::Handshake => "handshake",
            CommandCode::Greet => "greet",
            CommandCode::Dance => "dance",
        }
    }

    /// Parse a command name from configuration.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "forward" => Some(CommandCode::Forward),
            "backward" => Some(CommandCode::Backward),
            "turn-left" => Some(CommandCode::TurnLeft),
            "turn-right" => Some(CommandCode::TurnRight),
            "handshake" => Some(CommandCode::Handshake),
            "greet" => Some(CommandCode::Greet),
            "dance" => Some(CommandCode::Dance),
            _ => None,
        }
    }

    /// All command codes, for iteration in tests and `commands` listing.
    pub fn all() -> &'static [CommandCode] {
        &[
            CommandCode::Forward,
            CommandCode::Backward,
            CommandCode::TurnLeft,
            CommandCode::TurnRight,
            CommandCode::Handshake,
            CommandCode::Greet,
            CommandCode::Dance,
        ]
    }
}

/// Built-in phrase table, mixed Slovenian/English, in match order.
const BUILTIN_PHRASES: &[(&str, CommandCode)] = &[
    ("robot pojdi naprej", CommandCode::Forward),
    ("robot go forward", CommandCode::Forward),
    ("robot pojdi nazaj", CommandCode::Backward),
    ("robot go backward", CommandCode::Backward),
    ("robot pojdi levo", CommandCode::TurnLeft),
    ("robot obrni se levo", CommandCode::TurnLeft),
    ("robot turn left", CommandCode::TurnLeft),
    ("robot pojdi desno", CommandCode::TurnRight),
    ("robot obrni se desno", CommandCode::TurnRight),
    ("robot turn right", CommandCode::TurnRight),
    ("handshake", CommandCode::Handshake),
    ("nice to meet you", CommandCode::Handshake),
    ("moje ime je", CommandCode::Handshake),
    ("hej", CommandCode::Greet),
    ("hejla", CommandCode::Greet),
    ("hello", CommandCode::Greet),
    ("hey", CommandCode::Greet),
    ("dance", CommandCode::Dance),
    ("ples", CommandCode::Dance),
    ("robot pleši", CommandCode::Dance),
];

/// Ordered phrase → command mapping, loaded once per session.
#[derive(Debug, Clone)]
pub struct CommandMapping {
    entries: Vec<(String, CommandCode)>,
}

impl CommandMapping {
    /// The built-in table alone.
    pub fn builtin() -> Self {
        Self {
            entries: BUILTIN_PHRASES
                .iter()
                .map(|(phrase, code)| (phrase.to_string(), *code))
                .collect(),
        }
    }

    /// Built-in table extended with user overrides from the `[commands]`
    /// config section (phrase → command name). An override for an existing
    /// phrase replaces its command; new phrases are appended. Phrases are
    /// lowercased so they match normalized transcripts.
    pub fn with_overrides(overrides: &HashMap<String, String>) -> Result<Self> {
        let mut mapping = Self::builtin();
        // Sort for deterministic table order regardless of map iteration.
        let mut pairs: Vec<_> = overrides.iter().collect();
        pairs.sort();
        for (phrase, code_name) in pairs {
            let code = CommandCode::from_name(code_name).ok_or_else(|| {
                VoxdriveError::ConfigInvalidValue {
                    key: format!("commands.{}", phrase),
                    message: format!(
                        "unknown command '{}' (expected one of: {})",
                        code_name,
                        CommandCode::all()
                            .iter()
                            .map(|c| c.name())
                            .collect::<Vec<_>>()
                            .join(", ")
                    ),
                }
            })?;
            let phrase = phrase.to_lowercase();
            match mapping.entries.iter_mut().find(|(p, _)| *p == phrase) {
                Some(entry) => entry.1 = code,
                None => mapping.entries.push((phrase, code)),
            }
        }
        Ok(mapping)
    }

    /// Resolve a normalized transcript to a command. Exact match, first
    /// match wins; anything else is no command.
    pub fn resolve(&self, normalized: &str) -> Option<CommandCode> {
        self.entries
            .iter()
            .find(|(phrase, _)| phrase == normalized)
            .map(|(_, code)| *code)
    }

    /// The table entries in match order.
    pub fn entries(&self) -> &[(String, CommandCode)] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::normalize::normalize;

    #[test]
    fn test_every_builtin_phrase_resolves_after_normalization() {
        let mapping = CommandMapping::builtin();
        for (phrase, code) in BUILTIN_PHRASES {
            // Phrases survive a round trip through the normalizer even with
            // decoration the service might add.
            let decorated = format!("  {}  ", phrase.to_uppercase());
            assert_eq!(
                mapping.resolve(&normalize(&decorated)),
                Some(*code),
                "phrase: {:?}",
                phrase
            );
        }
    }

    #[test]
    fn test_unknown_input_resolves_to_none() {
        let mapping = CommandMapping::builtin();
        assert_eq!(mapping.resolve("banana"), None);
        assert_eq!(mapping.resolve(""), None);
        assert_eq!(mapping.resolve("robot go"), None);
        // No partial or substring matching
        assert_eq!(mapping.resolve("robot go forward please"), None);
        assert_eq!(mapping.resolve("robot go forwar"), None);
    }

    #[test]
    fn test_table_entries_are_pairwise_non_overlapping() {
        let mapping = CommandMapping::builtin();
        for (i, (a, _)) in mapping.entries().iter().enumerate() {
            for (b, _) in mapping.entries().iter().skip(i + 1) {
                assert_ne!(a, b, "duplicate phrase in the builtin table: {:?}", a);
            }
        }
    }

    #[test]
    fn test_table_phrases_are_already_normalized() {
        // Matching happens on normalized input, so table entries must be
        // fixed points of the normalizer.
        for (phrase, _) in BUILTIN_PHRASES {
            assert_eq!(&normalize(phrase), phrase, "phrase: {:?}", phrase);
        }
    }

    #[test]
    fn test_wire_bytes() {
        assert_eq!(CommandCode::Forward.wire_byte(), b'f');
        assert_eq!(CommandCode::Backward.wire_byte(), b'b');
        assert_eq!(CommandCode::TurnLeft.wire_byte(), b'l');
        assert_eq!(CommandCode::TurnRight.wire_byte(), b'r');
        assert_eq!(CommandCode::Handshake.wire_byte(), b's');
        assert_eq!(CommandCode::Greet.wire_byte(), b'w');
        assert_eq!(CommandCode::Dance.wire_byte(), b'd');
    }

    #[test]
    fn test_wire_bytes_are_distinct() {
        let mut seen = std::collections::HashSet::new();
        for code in CommandCode::all() {
            assert!(
                seen.insert(code.wire_byte()),
                "duplicate wire byte for {:?}",
                code
            );
        }
    }

    #[test]
    fn test_name_round_trip() {
        for code in CommandCode::all() {
            assert_eq!(CommandCode::from_name(code.name()), Some(*code));
        }
        assert_eq!(CommandCode::from_name("fly"), None);
    }

    #[test]
    fn test_override_adds_new_phrase() {
        let mut overrides = HashMap::new();
        overrides.insert("spin".to_string(), "dance".to_string());
        let mapping = CommandMapping::with_overrides(&overrides).unwrap();
        assert_eq!(mapping.resolve("spin"), Some(CommandCode::Dance));
        // Built-ins still present
        assert_eq!(mapping.resolve("hello"), Some(CommandCode::Greet));
    }

    #[test]
    fn test_override_replaces_builtin_phrase() {
        let mut overrides = HashMap::new();
        overrides.insert("hello".to_string(), "dance".to_string());
        let mapping = CommandMapping::with_overrides(&overrides).unwrap();
        assert_eq!(mapping.resolve("hello"), Some(CommandCode::Dance));
    }

    #[test]
    fn test_override_phrase_is_lowercased() {
        let mut overrides = HashMap::new();
        overrides.insert("Do A Spin".to_string(), "dance".to_string());
        let mapping = CommandMapping::with_overrides(&overrides).unwrap();
        assert_eq!(mapping.resolve("do a spin"), Some(CommandCode::Dance));
    }

    #[test]
    fn test_override_with_unknown_command_name_fails() {
        let mut overrides = HashMap::new();
        overrides.insert("spin".to_string(), "pirouette".to_string());
        let result = CommandMapping::with_overrides(&overrides);
        assert!(matches!(
            result,
            Err(VoxdriveError::ConfigInvalidValue { .. })
        ));
    }

    #[test]
    fn test_empty_overrides_equal_builtin() {
        let mapping = CommandMapping::with_overrides(&HashMap::new()).unwrap();
        assert_eq!(mapping.entries().len(), CommandMapping::builtin().entries().len());
    }
}
