/// Outcome returned by committing or rolling back.
///
/// Under auto-commit every statement is already its own transaction, so an
/// explicit commit or rollback does nothing; the connection records a warning
/// and reports [`TxOutcome::IneffectiveAutocommit`] instead of failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxOutcome {
    /// The server applied the commit or rollback.
    Applied,
    /// Auto-commit was on; nothing was sent.
    IneffectiveAutocommit,
}

impl TxOutcome {
    #[must_use]
    pub fn was_applied(self) -> bool {
        matches!(self, TxOutcome::Applied)
    }
}
