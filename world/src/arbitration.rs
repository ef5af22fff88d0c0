//! Bounded FIFO queue of agents holding human control.
//!
//! The queue only tracks identities. Control modes live on the agents owned by
//! the world, which keeps both sides consistent when it grants or revokes a
//! slot.

use std::collections::VecDeque;

use snake_ensemble_core::{AgentId, HUMAN_CONTROL_CAPACITY};

/// Outcome of granting human control to an agent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Grant {
    /// The agent already held a slot; nothing changed.
    AlreadyHeld,
    /// The agent now holds a slot.
    Granted {
        /// Oldest holder displaced to make room, if the queue was full.
        evicted: Option<AgentId>,
    },
}

/// Ordered set of agent ids holding human control, oldest grant first.
///
/// Holds at most [`HUMAN_CONTROL_CAPACITY`] agents.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HumanControlQueue {
    slots: VecDeque<AgentId>,
}

impl HumanControlQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: VecDeque::with_capacity(HUMAN_CONTROL_CAPACITY),
        }
    }

    /// Grants a slot to `agent`, evicting the oldest holder when full.
    pub fn grant(&mut self, agent: AgentId) -> Grant {
        if self.contains(agent) {
            return Grant::AlreadyHeld;
        }

        let evicted = if self.slots.len() >= HUMAN_CONTROL_CAPACITY {
            self.slots.pop_front()
        } else {
            None
        };
        self.slots.push_back(agent);
        Grant::Granted { evicted }
    }

    /// Releases the slot held by `agent`. Returns whether one was held.
    pub fn revoke(&mut self, agent: AgentId) -> bool {
        let Some(position) = self.slots.iter().position(|held| *held == agent) else {
            return false;
        };
        let _ = self.slots.remove(position);
        true
    }

    /// Drops every holder for which `exists` returns `false`.
    ///
    /// Returns the purged identities in queue order.
    pub fn purge<F>(&mut self, exists: F) -> Vec<AgentId>
    where
        F: Fn(AgentId) -> bool,
    {
        let mut orphans = Vec::new();
        self.slots.retain(|agent| {
            let keep = exists(*agent);
            if !keep {
                orphans.push(*agent);
            }
            keep
        });
        orphans
    }

    /// Reports whether `agent` currently holds a slot.
    #[must_use]
    pub fn contains(&self, agent: AgentId) -> bool {
        self.slots.contains(&agent)
    }

    /// Iterates holders from oldest to newest grant.
    pub fn iter(&self) -> impl Iterator<Item = AgentId> + '_ {
        self.slots.iter().copied()
    }

    pub(crate) fn clear(&mut self) {
        self.slots.clear();
    }
}

impl Default for HumanControlQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(value: u32) -> AgentId {
        AgentId::new(value)
    }

    #[test]
    fn third_grant_evicts_the_oldest_holder() {
        let mut queue = HumanControlQueue::new();
        assert_eq!(queue.grant(id(1)), Grant::Granted { evicted: None });
        assert_eq!(queue.grant(id(2)), Grant::Granted { evicted: None });
        assert_eq!(queue.grant(id(3)), Grant::Granted { evicted: Some(id(1)) });

        let holders: Vec<AgentId> = queue.iter().collect();
        assert_eq!(holders, vec![id(2), id(3)]);
    }

    #[test]
    fn repeated_grant_is_a_no_op() {
        let mut queue = HumanControlQueue::new();
        let _ = queue.grant(id(4));
        let _ = queue.grant(id(5));

        assert_eq!(queue.grant(id(4)), Grant::AlreadyHeld);
        let holders: Vec<AgentId> = queue.iter().collect();
        assert_eq!(holders, vec![id(4), id(5)], "grant order is preserved");
    }

    #[test]
    fn revoke_frees_a_slot_without_evicting() {
        let mut queue = HumanControlQueue::new();
        let _ = queue.grant(id(1));
        let _ = queue.grant(id(2));

        assert!(queue.revoke(id(1)));
        assert!(!queue.revoke(id(1)), "second revoke finds nothing");
        assert_eq!(queue.grant(id(3)), Grant::Granted { evicted: None });
        assert_eq!(queue.iter().count(), 2);
    }

    #[test]
    fn purge_reports_orphans_in_queue_order() {
        let mut queue = HumanControlQueue::new();
        let _ = queue.grant(id(8));
        let _ = queue.grant(id(9));

        let orphans = queue.purge(|agent| agent == id(9));
        assert_eq!(orphans, vec![id(8)]);
        assert!(queue.contains(id(9)));
        assert!(!queue.contains(id(8)));
    }
}
