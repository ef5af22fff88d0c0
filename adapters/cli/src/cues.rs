//! Maps agent positions to musical cues.
//!
//! Cues are printed, never synthesised. Pitches are MIDI note numbers.

use std::fmt;

use snake_ensemble_core::{AgentTick, EdgeRow, GridSize, Role};

const BASS_SCALE: [u8; 8] = [36, 39, 41, 43, 46, 48, 51, 53];
const PAD_CHORDS: [[u8; 3]; 4] = [[48, 51, 55], [44, 48, 51], [41, 44, 48], [43, 46, 50]];
const LEAD_ROOT: u32 = 60;

/// Percussion voices.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Drum {
    Kick,
    Snare,
}

/// A single musical event derived from one agent's tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Cue {
    Bass(u8),
    Pad([u8; 3]),
    Lead(u32),
    Perc(Drum),
}

impl fmt::Display for Cue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cue::Bass(note) => write!(f, "bass {note}"),
            Cue::Pad([root, third, fifth]) => write!(f, "pad {root}/{third}/{fifth}"),
            Cue::Lead(note) => write!(f, "lead {note}"),
            Cue::Perc(Drum::Kick) => f.write_str("perc kick"),
            Cue::Perc(Drum::Snare) => f.write_str("perc snare"),
        }
    }
}

/// Cue for a tick, if the agent is alive and its role plays at this cell.
pub(crate) fn cue_for(tick: &AgentTick, grid_size: GridSize) -> Option<Cue> {
    if !tick.lifecycle.is_alive() {
        return None;
    }

    let size = grid_size.get();
    let head = tick.head;
    match tick.role {
        Role::Bass => {
            // low rows play low notes
            let row_from_bottom = size.saturating_sub(1).saturating_sub(head.y());
            let index = usize::try_from(row_from_bottom)
                .unwrap_or(usize::MAX)
                .min(BASS_SCALE.len() - 1);
            Some(Cue::Bass(BASS_SCALE[index]))
        }
        Role::Pad => {
            let index = usize::try_from(head.x() / 2).unwrap_or(0) % PAD_CHORDS.len();
            Some(Cue::Pad(PAD_CHORDS[index]))
        }
        Role::Lead => Some(Cue::Lead(LEAD_ROOT + head.x() + (size - head.y()))),
        Role::Perc => match tick.edge? {
            EdgeRow::Bottom => Some(Cue::Perc(Drum::Kick)),
            EdgeRow::Top => Some(Cue::Perc(Drum::Snare)),
        },
    }
}
