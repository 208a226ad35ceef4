//! Replay recording and playback for gridchase runs.
//!
//! The on-disk format is plain text: one tab-delimited group per tick
//! (`tick \t avatar \t pursuer_1 \t … \t pursuer_k \t`), groups of the
//! same level concatenated on one line, a newline at each level's final
//! tick. The first flush of a run truncates the destination; every later
//! flush appends.

use std::collections::VecDeque;
use std::fmt::Write as _;
use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::time::Instant;

use gridchase_core::{
    AvatarDecision, MoveAction, PursuerDecision, SimEvent, SinkError, StateView, Tick, TickRecord,
    TickSink, WorldModel,
};
use gridchase_sim::{Controller, DecisionCell};
use thiserror::Error;

/// Errors raised while recording or reading a replay.
#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("replay i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed replay line {line}: {reason}")]
    Malformed { line: usize, reason: String },
    #[error("unknown action index {index} on replay line {line}")]
    UnknownAction { line: usize, index: u8 },
}

/// Buffers tick records and flushes them to a replay file.
///
/// Flushing happens on every level boundary and once more at run end; a
/// flush failure is fatal to the run because a truncated replay cannot
/// reproduce it.
#[derive(Debug)]
pub struct ReplayRecorder {
    path: PathBuf,
    buffer: String,
    first_write: bool,
}

impl ReplayRecorder {
    /// Recorder targeting `path`. Nothing is written until the first flush.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            buffer: String::new(),
            first_write: true,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one tick group to the buffer, breaking the line when the
    /// record closes its level.
    pub fn append(&mut self, record: &TickRecord) {
        // Infallible: writing to a String cannot fail.
        let _ = write!(
            self.buffer,
            "{}\t{}\t",
            record.tick.0,
            record.avatar_action.index()
        );
        for action in &record.pursuer_actions {
            let _ = write!(self.buffer, "{}\t", action.index());
        }
        if record.last_tick_of_level {
            self.buffer.push('\n');
        }
    }

    /// Write the buffered records out and clear the buffer. The first
    /// flush truncates any previous file at the destination.
    pub fn flush(&mut self) -> Result<(), ReplayError> {
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(self.first_write)
            .append(!self.first_write)
            .open(&self.path)?;
        file.write_all(self.buffer.as_bytes())?;
        file.flush()?;
        self.first_write = false;
        self.buffer.clear();
        Ok(())
    }
}

impl TickSink for ReplayRecorder {
    fn on_tick(&mut self, record: &TickRecord, _events: &[SimEvent]) -> Result<(), SinkError> {
        self.append(record);
        if record.last_tick_of_level {
            self.flush()?;
        }
        Ok(())
    }

    fn on_run_end(&mut self) -> Result<(), SinkError> {
        self.flush()?;
        Ok(())
    }
}

/// One recorded tick, as parsed back from a replay file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayTick {
    pub tick: Tick,
    pub avatar_action: MoveAction,
    pub pursuer_actions: Vec<MoveAction>,
}

/// A parsed replay: one vector of ticks per level, in recorded order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayLog {
    pub levels: Vec<Vec<ReplayTick>>,
}

impl ReplayLog {
    /// Read and parse a replay file. `pursuer_count` fixes the group
    /// width, which the flat format cannot encode on its own.
    pub fn load(path: impl AsRef<Path>, pursuer_count: usize) -> Result<Self, ReplayError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents, pursuer_count)
    }

    /// Parse replay text.
    pub fn parse(contents: &str, pursuer_count: usize) -> Result<Self, ReplayError> {
        let group_width = 2 + pursuer_count;
        let mut levels = Vec::new();
        for (line_no, line) in contents.lines().enumerate() {
            if line.is_empty() {
                continue;
            }
            let mut fields: Vec<&str> = line.split('\t').collect();
            // Every group ends with a tab, so a well-formed line carries
            // one trailing empty field.
            if fields.last() == Some(&"") {
                fields.pop();
            }
            if fields.is_empty() || fields.len() % group_width != 0 {
                return Err(ReplayError::Malformed {
                    line: line_no + 1,
                    reason: format!(
                        "expected groups of {group_width} fields, found {} fields",
                        fields.len()
                    ),
                });
            }
            let mut level = Vec::with_capacity(fields.len() / group_width);
            for group in fields.chunks(group_width) {
                level.push(parse_group(group, line_no + 1)?);
            }
            levels.push(level);
        }
        Ok(Self { levels })
    }

    /// Iterate all recorded ticks across levels, in order.
    pub fn ticks(&self) -> impl Iterator<Item = &ReplayTick> {
        self.levels.iter().flatten()
    }
}

fn parse_group(group: &[&str], line: usize) -> Result<ReplayTick, ReplayError> {
    let malformed = |reason: String| ReplayError::Malformed { line, reason };
    let tick: u64 = group[0]
        .parse()
        .map_err(|_| malformed(format!("bad tick index '{}'", group[0])))?;
    let mut actions = group[1..]
        .iter()
        .map(|field| {
            let index: u8 = field
                .parse()
                .map_err(|_| malformed(format!("bad action '{field}'")))?;
            MoveAction::from_index(index).ok_or(ReplayError::UnknownAction { line, index })
        })
        .collect::<Result<Vec<_>, _>>()?;
    let avatar_action = actions.remove(0);
    Ok(ReplayTick {
        tick: Tick(tick),
        avatar_action,
        pursuer_actions: actions,
    })
}

/// Avatar controller that re-issues a recorded action sequence, one per
/// thinking session. Runs out of script into `Neutral`.
#[derive(Debug)]
pub struct ReplayAvatar {
    actions: VecDeque<MoveAction>,
}

impl ReplayAvatar {
    #[must_use]
    pub fn from_log(log: &ReplayLog) -> Self {
        Self {
            actions: log.ticks().map(|tick| tick.avatar_action).collect(),
        }
    }
}

impl<W: WorldModel> Controller<W, AvatarDecision> for ReplayAvatar {
    fn reset(&mut self, _world: &W) {}

    fn think(
        &mut self,
        _view: StateView<W>,
        _deadline: Instant,
        out: &DecisionCell<AvatarDecision>,
    ) {
        let action = self.actions.pop_front().unwrap_or_default();
        out.update(|decision| decision.action = action);
    }
}

/// Pursuer-team counterpart of [`ReplayAvatar`].
#[derive(Debug)]
pub struct ReplayPursuers {
    actions: VecDeque<Vec<MoveAction>>,
}

impl ReplayPursuers {
    #[must_use]
    pub fn from_log(log: &ReplayLog) -> Self {
        Self {
            actions: log.ticks().map(|tick| tick.pursuer_actions.clone()).collect(),
        }
    }
}

impl<W: WorldModel> Controller<W, PursuerDecision> for ReplayPursuers {
    fn reset(&mut self, _world: &W) {}

    fn think(
        &mut self,
        _view: StateView<W>,
        _deadline: Instant,
        out: &DecisionCell<PursuerDecision>,
    ) {
        let actions = self.actions.pop_front().unwrap_or_default();
        out.update(|decision| decision.actions = actions);
    }
}
