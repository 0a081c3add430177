use crate::genome::{AgentKind, Genome, Vec2};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier handed out by the spawner. Never reused across generations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(pub u64);

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:06}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vitality {
    Active,
    Dormant,
    Destroyed,
}

/// A live agent instance carrying its genome.
#[derive(Debug, Clone)]
pub struct Agent {
    pub id: AgentId,
    pub kind: AgentKind,
    pub label: String,
    pub position: Vec2,
    genome: Genome,
    vitality: Vitality,
}

impl Agent {
    pub fn new(id: AgentId, kind: AgentKind, position: Vec2, genome: Genome) -> Self {
        Self {
            id,
            kind,
            label: format!("{kind}-{id}"),
            position,
            genome,
            vitality: Vitality::Dormant,
        }
    }

    pub fn genome(&self) -> &Genome {
        &self.genome
    }

    pub(crate) fn genome_mut(&mut self) -> &mut Genome {
        &mut self.genome
    }

    pub fn vitality(&self) -> Vitality {
        self.vitality
    }

    pub fn is_alive(&self) -> bool {
        self.vitality != Vitality::Destroyed
    }

    pub fn awake(&mut self) {
        if self.is_alive() {
            self.vitality = Vitality::Active;
        }
    }

    pub fn sleep(&mut self) {
        if self.is_alive() {
            self.vitality = Vitality::Dormant;
        }
    }

    pub fn destroy(&mut self) {
        self.vitality = Vitality::Destroyed;
    }
}

/// Ordered agents of one kind for the current generation.
#[derive(Debug, Clone)]
pub struct Population {
    kind: AgentKind,
    agents: Vec<Agent>,
}

impl Population {
    pub fn new(kind: AgentKind) -> Self {
        Self {
            kind,
            agents: Vec::new(),
        }
    }

    pub fn kind(&self) -> AgentKind {
        self.kind
    }

    pub fn push(&mut self, agent: Agent) {
        debug_assert_eq!(agent.kind, self.kind);
        self.agents.push(agent);
    }

    /// All agents in spawn order, destroyed ones included until pruned.
    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn live(&self) -> impl Iterator<Item = &Agent> {
        self.agents.iter().filter(|agt| agt.is_alive())
    }

    pub fn live_count(&self) -> usize {
        self.live().count()
    }

    pub fn get_mut(&mut self, id: AgentId) -> Option<&mut Agent> {
        self.agents.iter_mut().find(|agt| agt.id == id)
    }

    /// Drop destroyed agents, keeping order. Returns how many were removed.
    pub fn prune(&mut self) -> usize {
        let before = self.agents.len();
        self.agents.retain(Agent::is_alive);
        before - self.agents.len()
    }

    pub fn awake_all(&mut self) {
        self.agents.iter_mut().for_each(Agent::awake);
    }

    pub fn sleep_all(&mut self) {
        self.agents.iter_mut().for_each(Agent::sleep);
    }
}
