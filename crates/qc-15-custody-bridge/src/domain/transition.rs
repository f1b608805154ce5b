//! # Transition Engine
//!
//! Generic state-machine primitive. An engine owns a closed set of statuses and
//! a table of named, directed edges between them. Each edge carries the handler
//! that executes it.
//!
//! The engine validates wiring only. It never looks at the entity being moved:
//! the handler receives the edge it was registered under, checks the entity is
//! in `edge.from` and sets `edge.to` itself once its own conditions hold.
//!
//! ```text
//! register(Transition { name, from, to, handler })
//!     ├── from ∉ statuses            → InvalidStatus
//!     ├── to ≠ 0 && to ∉ statuses    → InvalidStatus
//!     └── name already registered    → DuplicateName
//!
//! apply(name, ctx)
//!     ├── name unknown               → UnknownTransition
//!     └── handler(ctx, Edge { from, to })
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use thiserror::Error;

/// Lifecycle phase ordinal. `0` is reserved for "no such state / deleted".
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Status(pub u8);

impl Status {
    /// Terminal marker used as the target of delete transitions.
    pub const DELETED: Status = Status(0);

    /// True for the reserved terminal status.
    pub fn is_deleted(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "status({})", self.0)
    }
}

/// Wiring errors raised by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    /// Status was not declared when the engine was built.
    #[error("Invalid status {status} for transition '{name}'")]
    InvalidStatus {
        /// Transition being registered (empty during construction).
        name: String,
        /// Offending status.
        status: Status,
    },

    /// Status declared twice at construction.
    #[error("Duplicate status {0} in engine declaration")]
    DuplicateStatus(Status),

    /// Transition name already registered.
    #[error("Transition '{0}' is already registered")]
    DuplicateName(String),

    /// No transition with this name.
    #[error("Unknown transition '{0}'")]
    UnknownTransition(String),
}

/// Source and target of a registered transition, handed to its handler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Edge {
    /// Required current status.
    pub from: Status,
    /// Status to set on success.
    pub to: Status,
}

/// Handler executing a transition against a context of type `C`.
pub type Handler<C, E> = fn(&mut C, Edge) -> Result<(), E>;

/// A named edge `from → to` with its handler.
pub struct Transition<C, E> {
    /// Unique name within the engine.
    pub name: &'static str,
    /// Source status.
    pub from: Status,
    /// Target status (`Status::DELETED` for terminal removal).
    pub to: Status,
    /// Executes the transition.
    pub handler: Handler<C, E>,
}

impl<C, E> Transition<C, E> {
    /// Edge view of this transition.
    pub fn edge(&self) -> Edge {
        Edge {
            from: self.from,
            to: self.to,
        }
    }
}

impl<C, E> Clone for Transition<C, E> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            from: self.from,
            to: self.to,
            handler: self.handler,
        }
    }
}

impl<C, E> fmt::Debug for Transition<C, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transition")
            .field("name", &self.name)
            .field("from", &self.from)
            .field("to", &self.to)
            .finish()
    }
}

/// State-machine engine over contexts of type `C`, with handler errors `E`.
pub struct Engine<C, E> {
    statuses: BTreeSet<Status>,
    transitions: BTreeMap<&'static str, Transition<C, E>>,
}

impl<C, E> fmt::Debug for Engine<C, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("statuses", &self.statuses)
            .field("transitions", &self.transitions.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<C, E> Engine<C, E>
where
    E: From<TransitionError>,
{
    /// Build an engine whose valid statuses are exactly `statuses`.
    pub fn new(statuses: impl IntoIterator<Item = Status>) -> Result<Self, TransitionError> {
        let mut declared = BTreeSet::new();
        for status in statuses {
            if status.is_deleted() {
                return Err(TransitionError::InvalidStatus {
                    name: String::new(),
                    status,
                });
            }
            if !declared.insert(status) {
                return Err(TransitionError::DuplicateStatus(status));
            }
        }

        Ok(Self {
            statuses: declared,
            transitions: BTreeMap::new(),
        })
    }

    /// Register a transition. The engine is left unchanged on error.
    pub fn register(&mut self, transition: Transition<C, E>) -> Result<(), TransitionError> {
        if !self.statuses.contains(&transition.from) {
            return Err(TransitionError::InvalidStatus {
                name: transition.name.to_string(),
                status: transition.from,
            });
        }
        if !transition.to.is_deleted() && !self.statuses.contains(&transition.to) {
            return Err(TransitionError::InvalidStatus {
                name: transition.name.to_string(),
                status: transition.to,
            });
        }
        if self.transitions.contains_key(transition.name) {
            return Err(TransitionError::DuplicateName(transition.name.to_string()));
        }

        self.transitions.insert(transition.name, transition);
        Ok(())
    }

    /// Run the named transition's handler against `ctx`.
    pub fn apply(&self, name: &str, ctx: &mut C) -> Result<(), E> {
        let transition = self
            .transitions
            .get(name)
            .ok_or_else(|| TransitionError::UnknownTransition(name.to_string()))?;

        (transition.handler)(ctx, transition.edge())
    }

    /// Look up a transition by name.
    pub fn transition(&self, name: &str) -> Option<&Transition<C, E>> {
        self.transitions.get(name)
    }

    /// All transitions leaving `status`, in name order.
    pub fn transitions_from(&self, status: Status) -> Vec<&Transition<C, E>> {
        self.transitions
            .values()
            .filter(|t| t.from == status)
            .collect()
    }

    /// Declared statuses in ascending order.
    pub fn statuses(&self) -> impl Iterator<Item = Status> + '_ {
        self.statuses.iter().copied()
    }

    /// Whether `status` was declared at construction.
    pub fn contains_status(&self, status: Status) -> bool {
        self.statuses.contains(&status)
    }

    /// Number of registered transitions.
    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    /// True if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }
}
