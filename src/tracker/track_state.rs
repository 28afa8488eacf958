/// Track lifecycle stage. Transitions only move forward:
/// `Tentative -> Confirmed -> Deleted` (or `Tentative -> Deleted`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum TrackState {
    /// Seen too few consecutive frames to be trusted
    #[default]
    Tentative,
    /// Reached the minimum hit streak; rendered and redacted
    Confirmed,
    /// Unmatched for longer than the maximum age
    Deleted,
}
