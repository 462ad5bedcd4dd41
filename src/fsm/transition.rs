use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use crate::comms::ServiceHandles;
use crate::common::error::ProtocolError;
use crate::fsm::event::{EventKind, TradeEvent};
use crate::fsm::state::TradeState;
use crate::trade::TradeModel;

pub type HandlerResult<'a> =
    Pin<Box<dyn Future<Output = Result<(), ProtocolError>> + Send + 'a>>;

/// A transition handler. Plain `fn` pointers registered at table build time
/// stand in for the runtime class lookup the engine would otherwise need.
pub type HandlerFn =
    for<'a> fn(&'a mut TradeModel, &'a TradeEvent, &'a ServiceHandles) -> HandlerResult<'a>;

/// One edge of the protocol graph. `source == None` means "from any state"
/// and is reserved for protocol-level error events.
#[derive(Clone, Copy)]
pub struct Transition {
    pub source: Option<TradeState>,
    pub event: EventKind,
    pub handler: Option<HandlerFn>,
    pub target: TradeState,
    pub path: Option<&'static str>,
}

impl std::fmt::Debug for Transition {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Transition")
            .field("source", &self.source)
            .field("event", &self.event)
            .field("target", &self.target)
            .field("path", &self.path)
            .finish()
    }
}

/// Immutable transition table for one role combination. Built once at
/// startup and shared read-only across all trades of that role.
#[derive(Debug, Default)]
pub struct TransitionTable {
    transitions: HashMap<(Option<TradeState>, EventKind), Transition>,
}

impl TransitionTable {
    /// Specific-state entry first, then the any-state entry, as literal
    /// priority order.
    pub fn find(&self, state: TradeState, kind: EventKind) -> Option<&Transition> {
        self.transitions
            .get(&(Some(state), kind))
            .or_else(|| self.transitions.get(&(None, kind)))
    }

    pub fn find_from_any(&self, kind: EventKind) -> Option<&Transition> {
        self.transitions.get(&(None, kind))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Transition> {
        self.transitions.values()
    }

    fn insert(&mut self, transition: Transition) {
        let key = (transition.source, transition.event);
        if self.transitions.contains_key(&key) {
            panic!(
                "A transition exists already for the state/event pair {:?}/{}",
                transition.source, transition.event
            );
        }
        self.transitions.insert(key, transition);
    }
}

/// Fluent construction of a `TransitionTable`:
/// `from(state).on(event).run(handler).to(target)`, chainable with `then()`
/// to continue from the just-declared target, `branch([...])` for mutually
/// exclusive continuations, and `from_any()` for protocol-wide error edges.
/// Misconfiguration (duplicate pair, incomplete declaration) panics during
/// construction.
#[derive(Default)]
pub struct ProtocolBuilder {
    table: TransitionTable,
    last_target: Option<TradeState>,
}

impl ProtocolBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from(self, state: TradeState) -> TransitionDecl {
        TransitionDecl {
            builder: self,
            decl: path("").from(state),
        }
    }

    pub fn from_states(self, states: &[TradeState]) -> TransitionDecl {
        if states.is_empty() {
            panic!("from_states must not be empty");
        }
        TransitionDecl {
            builder: self,
            decl: path("").from_states(states),
        }
    }

    pub fn from_any(self) -> TransitionDecl {
        TransitionDecl {
            builder: self,
            decl: path("").from_any(),
        }
    }

    /// Continue from the target state of the previous declaration.
    pub fn then(self) -> TransitionDecl {
        let last_target = self
            .last_target
            .unwrap_or_else(|| panic!("then() requires a previously declared transition"));
        self.from(last_target)
    }

    /// Declare multiple mutually exclusive continuations sharing a source
    /// state. Exactly one path's event will ever occur for a given trade.
    pub fn branch(mut self, paths: impl IntoIterator<Item = PathDecl>) -> Self {
        for decl in paths {
            self = self.insert_decl(decl);
        }
        self
    }

    pub fn build(self) -> TransitionTable {
        self.table
    }

    fn insert_decl(mut self, decl: PathDecl) -> Self {
        let event = decl
            .event
            .unwrap_or_else(|| panic!("transition declared without on(event)"));
        let target = decl
            .target
            .unwrap_or_else(|| panic!("transition declared without to(target)"));
        if decl.sources.is_empty() {
            panic!("transition declared without from(state)");
        }
        for source in &decl.sources {
            if *source == Some(target) {
                panic!("transition declared with identical source and target {}", target);
            }
            self.table.insert(Transition {
                source: *source,
                event,
                handler: decl.handler,
                target,
                path: decl.path,
            });
        }
        self.last_target = Some(target);
        self
    }
}

/// Start a named path declaration for use inside `branch()`. The name is
/// carried into the table for diagnostics only.
pub fn path(name: &'static str) -> PathDecl {
    PathDecl {
        path: if name.is_empty() { None } else { Some(name) },
        sources: Vec::new(),
        event: None,
        handler: None,
        target: None,
    }
}

pub struct PathDecl {
    path: Option<&'static str>,
    sources: Vec<Option<TradeState>>,
    event: Option<EventKind>,
    handler: Option<HandlerFn>,
    target: Option<TradeState>,
}

impl PathDecl {
    pub fn from(mut self, state: TradeState) -> Self {
        self.sources = vec![Some(state)];
        self
    }

    pub fn from_states(mut self, states: &[TradeState]) -> Self {
        self.sources = states.iter().map(|s| Some(*s)).collect();
        self
    }

    pub fn from_any(mut self) -> Self {
        self.sources = vec![None];
        self
    }

    pub fn on(mut self, event: EventKind) -> Self {
        self.event = Some(event);
        self
    }

    pub fn run(mut self, handler: HandlerFn) -> Self {
        self.handler = Some(handler);
        self
    }

    pub fn to(mut self, target: TradeState) -> Self {
        self.target = Some(target);
        self
    }
}

/// Builder-attached declaration; `to()` commits the transition and hands the
/// builder back for chaining.
pub struct TransitionDecl {
    builder: ProtocolBuilder,
    decl: PathDecl,
}

impl TransitionDecl {
    pub fn on(mut self, event: EventKind) -> Self {
        self.decl = self.decl.on(event);
        self
    }

    pub fn run(mut self, handler: HandlerFn) -> Self {
        self.decl = self.decl.run(handler);
        self
    }

    pub fn to(self, target: TradeState) -> ProtocolBuilder {
        self.builder.insert_decl(self.decl.to(target))
    }
}
