//! The driver-supplied warning policy and debug-dump selector.
//!
//! Grounded on `projects::settings::Config`: a small `serde`-derived
//! struct a driver can build by hand (as every test in this crate does)
//! or load from a project's TOML/JSON config file. Each warning class
//! gets its own named dial rather than a generic map, so the struct
//! round-trips cleanly through TOML (map keys there must be strings).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WarningKind {
    DuplicateFile,
    DuplicateImport,
    UnrecognisedFile,
    ConstReturn,
    DuplicateDeclarationSpecifier,
    DuplicateDeclaration,
    OverloadAmbiguity,
    ReservedId,
    VoidReturn,
    Unreachable,
}

impl WarningKind {
    pub const ALL: [WarningKind; 10] = [
        WarningKind::DuplicateFile,
        WarningKind::DuplicateImport,
        WarningKind::UnrecognisedFile,
        WarningKind::ConstReturn,
        WarningKind::DuplicateDeclarationSpecifier,
        WarningKind::DuplicateDeclaration,
        WarningKind::OverloadAmbiguity,
        WarningKind::ReservedId,
        WarningKind::VoidReturn,
        WarningKind::Unreachable,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Ignore,
    Warn,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DumpMode {
    #[default]
    None,
    Lex,
    ParseStructure,
    ParsePretty,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Policy {
    pub duplicate_file: Severity,
    pub duplicate_import: Severity,
    pub unrecognised_file: Severity,
    pub const_return: Severity,
    pub duplicate_declaration_specifier: Severity,
    pub duplicate_declaration: Severity,
    pub overload_ambiguity: Severity,
    pub reserved_id: Severity,
    pub void_return: Severity,
    pub unreachable: Severity,
    #[serde(default)]
    pub dump_mode: DumpMode,
}

impl Policy {
    /// Matches the spec's implied defaults: `void-return` and
    /// `const-return` are on by default as errors, the rest are warnings.
    pub fn default_policy() -> Self {
        Self {
            duplicate_file: Severity::Warn,
            duplicate_import: Severity::Warn,
            unrecognised_file: Severity::Warn,
            const_return: Severity::Error,
            duplicate_declaration_specifier: Severity::Warn,
            duplicate_declaration: Severity::Error,
            overload_ambiguity: Severity::Error,
            reserved_id: Severity::Warn,
            void_return: Severity::Error,
            unreachable: Severity::Warn,
            dump_mode: DumpMode::None,
        }
    }

    pub fn severity(&self, kind: WarningKind) -> Severity {
        match kind {
            WarningKind::DuplicateFile => self.duplicate_file,
            WarningKind::DuplicateImport => self.duplicate_import,
            WarningKind::UnrecognisedFile => self.unrecognised_file,
            WarningKind::ConstReturn => self.const_return,
            WarningKind::DuplicateDeclarationSpecifier => self.duplicate_declaration_specifier,
            WarningKind::DuplicateDeclaration => self.duplicate_declaration,
            WarningKind::OverloadAmbiguity => self.overload_ambiguity,
            WarningKind::ReservedId => self.reserved_id,
            WarningKind::VoidReturn => self.void_return,
            WarningKind::Unreachable => self.unreachable,
        }
    }

    pub fn set(&mut self, kind: WarningKind, severity: Severity) {
        match kind {
            WarningKind::DuplicateFile => self.duplicate_file = severity,
            WarningKind::DuplicateImport => self.duplicate_import = severity,
            WarningKind::UnrecognisedFile => self.unrecognised_file = severity,
            WarningKind::ConstReturn => self.const_return = severity,
            WarningKind::DuplicateDeclarationSpecifier => {
                self.duplicate_declaration_specifier = severity
            }
            WarningKind::DuplicateDeclaration => self.duplicate_declaration = severity,
            WarningKind::OverloadAmbiguity => self.overload_ambiguity = severity,
            WarningKind::ReservedId => self.reserved_id = severity,
            WarningKind::VoidReturn => self.void_return = severity,
            WarningKind::Unreachable => self.unreachable = severity,
        }
    }

    pub fn from_toml_str(source: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(source)
    }

    pub fn from_json_str(source: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(source)
    }
}

impl Default for Policy {
    fn default() -> Self {
        Self::default_policy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_make_void_return_an_error() {
        let policy = Policy::default_policy();
        assert_eq!(policy.severity(WarningKind::VoidReturn), Severity::Error);
        assert_eq!(
            policy.severity(WarningKind::DuplicateImport),
            Severity::Warn
        );
    }

    #[test]
    fn overriding_a_dial_sticks() {
        let mut policy = Policy::default_policy();
        policy.set(WarningKind::DuplicateImport, Severity::Error);
        assert_eq!(
            policy.severity(WarningKind::DuplicateImport),
            Severity::Error
        );
    }

    #[test]
    fn round_trips_through_toml() {
        let policy = Policy::default_policy();
        let text = toml::to_string(&policy).expect("serialise");
        let back = Policy::from_toml_str(&text).expect("deserialise");
        assert_eq!(back.void_return, policy.void_return);
        assert_eq!(back.dump_mode, policy.dump_mode);
    }
}
