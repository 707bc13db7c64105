//! Session lifecycle as an explicit transition table.
//!
//! ```text
//!               suspend            stop
//!   EXECUTE  ───────────▶  SKIP ───────────▶ STOP
//!      ▲  ◀───────────       │                 │
//!      │     resume          │ stop            │ initialize
//!      │                     ▼                 │
//!      └──────── initialize(restart) ◀─────────┘
//! ```
//!
//! The manager never decides a transition itself; it asks [`transition`] and
//! carries out the returned [`Transition`].

use session_store::SessionAction;

/// A lifecycle request against one entity's session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Initialize { restart: bool },
    Suspend,
    Resume,
    Stop,
}

/// What to do with the stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// No record yet: create one in `EXECUTE`.
    Create,
    /// Re-resolve the ordering property, go to `EXECUTE`, clear the watermark.
    Reset,
    /// Change only the action.
    Set(SessionAction),
    /// Already in the requested state; report success without writing.
    Unchanged,
    /// Not meaningful from the current state; report failure without writing.
    Reject,
}

impl Transition {
    /// Whether the operation reports success.
    pub fn succeeds(&self) -> bool {
        !matches!(self, Transition::Reject)
    }

    /// Whether the store is written.
    pub fn writes(&self) -> bool {
        matches!(
            self,
            Transition::Create | Transition::Reset | Transition::Set(_)
        )
    }
}

/// Transition table. `current` is `None` when the entity has no session.
pub fn transition(current: Option<SessionAction>, command: Command) -> Transition {
    use SessionAction::{Execute, Skip, Stop};

    match (current, command) {
        (None, Command::Initialize { .. }) => Transition::Create,
        (None, _) => Transition::Reject,

        (Some(Stop), Command::Initialize { .. }) => Transition::Reset,
        (Some(_), Command::Initialize { restart: true }) => Transition::Reset,
        (Some(_), Command::Initialize { restart: false }) => Transition::Unchanged,

        (Some(Execute), Command::Suspend) => Transition::Set(Skip),
        (Some(Skip), Command::Suspend) => Transition::Unchanged,
        (Some(Stop), Command::Suspend) => Transition::Reject,

        (Some(Skip), Command::Resume) => Transition::Set(Execute),
        (Some(Execute), Command::Resume) => Transition::Unchanged,
        (Some(Stop), Command::Resume) => Transition::Reject,

        (Some(Stop), Command::Stop) => Transition::Unchanged,
        (Some(Execute | Skip), Command::Stop) => Transition::Set(Stop),
    }
}
