//! Record states tracked for every entity in the current recordset.

/// Life-cycle state of one tracked entity.
///
/// `Unknown` is the implicit state of any identity the tracker has never
/// seen; it is returned by lookups but never stored. `AddedThenModified`
/// marks a row modified before its first commit, which must still be
/// written with INSERT, not UPDATE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordState {
    Unknown,
    Unchanged,
    Added,
    Modified,
    AddedThenModified,
    Deleted,
}

impl RecordState {
    /// Whether a commit writes anything for this state.
    pub fn is_pending_write(&self) -> bool {
        !matches!(self, RecordState::Unknown | RecordState::Unchanged)
    }
}
