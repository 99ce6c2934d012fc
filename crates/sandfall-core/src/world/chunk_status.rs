//! Chunk generation state machine

use serde::{Deserialize, Serialize};

/// Number of procedural generation phases a chunk passes through
pub const GENERATION_PHASES: u8 = 3;

/// Lifecycle of a chunk from request to residency in the grid.
///
/// Variants are ordered; a chunk's state only ever moves forward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ChunkState {
    Ungenerated,
    /// `completed` phases out of [`GENERATION_PHASES`] are done
    Generating { completed: u8 },
    ReadyToMerge,
    Merged,
}

impl ChunkState {
    /// Generation phases finished so far
    pub fn completed_phases(self) -> u8 {
        match self {
            ChunkState::Ungenerated => 0,
            ChunkState::Generating { completed } => completed,
            ChunkState::ReadyToMerge | ChunkState::Merged => GENERATION_PHASES,
        }
    }

    /// State after finishing one more phase
    pub fn after_phase(self) -> ChunkState {
        let completed = self.completed_phases() + 1;
        if completed >= GENERATION_PHASES {
            ChunkState::ReadyToMerge
        } else {
            ChunkState::Generating { completed }
        }
    }

    pub fn is_generating(self) -> bool {
        matches!(
            self,
            ChunkState::Ungenerated | ChunkState::Generating { .. }
        )
    }

    /// State to persist: a merged chunk is stored as fully generated
    pub fn for_storage(self) -> ChunkState {
        match self {
            ChunkState::Merged => ChunkState::ReadyToMerge,
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_states_are_ordered() {
        assert!(ChunkState::Ungenerated < ChunkState::Generating { completed: 0 });
        assert!(ChunkState::Generating { completed: 1 } < ChunkState::Generating { completed: 2 });
        assert!(ChunkState::Generating { completed: 2 } < ChunkState::ReadyToMerge);
        assert!(ChunkState::ReadyToMerge < ChunkState::Merged);
    }

    #[test]
    fn test_phase_ladder_reaches_ready() {
        let mut state = ChunkState::Ungenerated;
        let mut steps = 0;
        while state.is_generating() {
            let next = state.after_phase();
            assert!(next > state);
            state = next;
            steps += 1;
        }
        assert_eq!(state, ChunkState::ReadyToMerge);
        assert_eq!(steps, GENERATION_PHASES);
    }

    #[test]
    fn test_merged_is_stored_as_ready() {
        assert_eq!(ChunkState::Merged.for_storage(), ChunkState::ReadyToMerge);
        assert_eq!(
            ChunkState::Generating { completed: 1 }.for_storage(),
            ChunkState::Generating { completed: 1 }
        );
    }
}
