use crate::genome::AgentKind;
use thiserror::Error;

/// Failures surfaced by the generational core.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    /// Invalid configuration, detected before the simulation starts.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// No live agents could be produced for a population, even after a retry.
    #[error("{kind} population collapsed: no live agents after retry")]
    PopulationCollapse { kind: AgentKind },

    /// Spawning produced fewer agents than requested. Only ever logged.
    #[error("{kind} spawn shortfall: requested {requested}, spawned {spawned}")]
    SpawnShortfall {
        kind: AgentKind,
        requested: usize,
        spawned: usize,
    },

    /// An operator control was issued in a phase that does not accept it.
    #[error("cannot {op} while {from:?}")]
    InvalidTransition {
        from: crate::lifecycle::Phase,
        op: &'static str,
    },
}
