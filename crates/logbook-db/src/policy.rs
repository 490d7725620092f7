//! Which statement errors are recovered automatically, and how.
//!
//! Each row pairs a statement kind with the error signatures it may tolerate.
//! Anything not listed here is fatal for the enclosing migration or bootstrap.

use crate::sql_parser::StatementKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// Treat the statement as already applied and carry on.
    SkipAsApplied,
}

#[derive(Debug, Clone, Copy)]
pub struct TolerancePolicy {
    pub kind: StatementKind,
    /// Lower-case fragments matched against the engine's error message.
    pub signatures: &'static [&'static str],
    pub recovery: Recovery,
}

/// Statements executed as part of an incremental migration.
pub const MIGRATION_POLICY: &[TolerancePolicy] = &[TolerancePolicy {
    kind: StatementKind::AlterTableAddColumn,
    signatures: &["duplicate column name"],
    recovery: Recovery::SkipAsApplied,
}];

/// Statements executed while bootstrapping an empty database.
pub const BOOTSTRAP_POLICY: &[TolerancePolicy] = &[
    TolerancePolicy {
        kind: StatementKind::CreateTable,
        signatures: &["already exists"],
        recovery: Recovery::SkipAsApplied,
    },
    TolerancePolicy {
        kind: StatementKind::CreateIndex,
        signatures: &["already exists"],
        recovery: Recovery::SkipAsApplied,
    },
    TolerancePolicy {
        kind: StatementKind::CreateTrigger,
        signatures: &["already exists"],
        recovery: Recovery::SkipAsApplied,
    },
    TolerancePolicy {
        kind: StatementKind::CreateView,
        signatures: &["already exists"],
        recovery: Recovery::SkipAsApplied,
    },
];

/// Look up the recovery for `error` raised by a statement of `kind`.
pub fn recovery_for(
    policies: &[TolerancePolicy],
    kind: StatementKind,
    error: &rusqlite::Error,
) -> Option<Recovery> {
    let message = error.to_string().to_lowercase();
    policies
        .iter()
        .filter(|p| p.kind == kind)
        .find(|p| p.signatures.iter().any(|sig| message.contains(sig)))
        .map(|p| p.recovery)
}
