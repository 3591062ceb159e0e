//! Stage progress events

use std::time::Duration;

use super::stage::StageName;

/// Emitted by the orchestrator around every planned stage
#[derive(Debug, Clone, PartialEq)]
pub enum StageEvent {
    Started {
        name: StageName,
        /// 1-based position in the plan
        index: usize,
        total: usize,
    },
    Finished {
        name: StageName,
        index: usize,
        total: usize,
        duration: Duration,
        /// False for disabled stages
        ran: bool,
    },
}

impl StageEvent {
    pub fn name(&self) -> StageName {
        match self {
            StageEvent::Started { name, .. } | StageEvent::Finished { name, .. } => *name,
        }
    }
}

/// Receives stage events; the pipeline works the same with no observers
pub trait StageObserver: Send + Sync {
    fn on_event(&self, event: &StageEvent);
}
