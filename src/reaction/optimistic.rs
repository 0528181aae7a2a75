use mongodb::bson::oid::ObjectId;

use crate::reaction::model::{Reaction, ReactionType, ToggleOutcome};
use crate::utils::model::Viewer;

/// Apply the toggle rules to a reaction set.
///
/// Same type by the viewer removes it, another type by the viewer is
/// switched in place, otherwise a new reaction is appended.
pub fn toggle_reaction(
    reactions: &[Reaction],
    target_id: ObjectId,
    viewer: &Viewer,
    reaction_type: ReactionType,
) -> (Vec<Reaction>, ToggleOutcome) {
    let mut next = reactions.to_vec();
    match next.iter().position(|r| r.user_id == viewer.user_id) {
        Some(idx) if next[idx].reaction_type == reaction_type => {
            next.remove(idx);
            (next, ToggleOutcome::Removed)
        }
        Some(idx) => {
            next[idx].reaction_type = reaction_type;
            (next, ToggleOutcome::Changed)
        }
        None => {
            next.push(Reaction {
                id: ObjectId::new(),
                target_id,
                reaction_type,
                user_id: viewer.user_id,
                user_name: viewer.display_name.clone(),
            });
            (next, ToggleOutcome::Added)
        }
    }
}

/// Shallow change check used to decide whether to notify a parent list.
///
/// Compares length, then type and user per index. A reorder with the same
/// content counts as a change.
pub fn reactions_changed(old: &[Reaction], new: &[Reaction]) -> bool {
    old.len() != new.len()
        || old
            .iter()
            .zip(new)
            .any(|(a, b)| a.reaction_type != b.reaction_type || a.user_id != b.user_id)
}

#[derive(Debug, Clone, PartialEq)]
pub enum MutationState {
    Idle,
    /// Local change applied, server has not answered yet
    Optimistic { previous: Vec<Reaction> },
    Confirmed,
    RolledBack,
}

/// Reaction set of one post or comment, with its reconciliation state
#[derive(Debug, Clone)]
pub struct ReactionEntity {
    pub target_id: ObjectId,
    pub reactions: Vec<Reaction>,
    pub state: MutationState,
}

impl ReactionEntity {
    pub fn new(target_id: ObjectId, reactions: Vec<Reaction>) -> Self {
        ReactionEntity {
            target_id,
            reactions,
            state: MutationState::Idle,
        }
    }

    /// Toggle locally before the server confirms.
    ///
    /// Stacked toggles keep the snapshot taken by the first one, so a
    /// rollback always lands on the last server-known set.
    pub fn toggle_local(&mut self, viewer: &Viewer, reaction_type: ReactionType) -> ToggleOutcome {
        let (next, outcome) =
            toggle_reaction(&self.reactions, self.target_id, viewer, reaction_type);
        let previous = match std::mem::replace(&mut self.state, MutationState::Idle) {
            MutationState::Optimistic { previous } => previous,
            _ => std::mem::take(&mut self.reactions),
        };
        self.reactions = next;
        self.state = MutationState::Optimistic { previous };
        outcome
    }

    /// Server accepted the mutation. When it returns the authoritative set,
    /// that replaces the optimistic one.
    pub fn confirm(&mut self, server_reactions: Option<Vec<Reaction>>) {
        if let Some(reactions) = server_reactions {
            self.reactions = reactions;
        }
        self.state = MutationState::Confirmed;
    }

    /// Server rejected the mutation; restore the pre-optimistic set.
    /// Returns false when there was no pending change to undo.
    pub fn roll_back(&mut self) -> bool {
        if !self.is_pending() {
            return false;
        }
        if let MutationState::Optimistic { previous } =
            std::mem::replace(&mut self.state, MutationState::RolledBack)
        {
            self.reactions = previous;
        }
        true
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, MutationState::Optimistic { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reaction(target: ObjectId, user: ObjectId, t: ReactionType) -> Reaction {
        Reaction {
            id: ObjectId::new(),
            target_id: target,
            reaction_type: t,
            user_id: user,
            user_name: None,
        }
    }

    #[test]
    fn toggle_adds_changes_and_removes() {
        let target = ObjectId::new();
        let viewer = Viewer::new(ObjectId::new()).with_name("ada");

        let (after_add, outcome) = toggle_reaction(&[], target, &viewer, ReactionType::Like);
        assert_eq!(outcome, ToggleOutcome::Added);
        assert_eq!(after_add.len(), 1);
        assert_eq!(after_add[0].user_name.as_deref(), Some("ada"));

        let (after_change, outcome) =
            toggle_reaction(&after_add, target, &viewer, ReactionType::Love);
        assert_eq!(outcome, ToggleOutcome::Changed);
        assert_eq!(after_change.len(), 1);
        assert_eq!(after_change[0].reaction_type, ReactionType::Love);

        let (after_remove, outcome) =
            toggle_reaction(&after_change, target, &viewer, ReactionType::Love);
        assert_eq!(outcome, ToggleOutcome::Removed);
        assert!(after_remove.is_empty());
    }

    #[test]
    fn toggle_leaves_other_users_alone() {
        let target = ObjectId::new();
        let other = reaction(target, ObjectId::new(), ReactionType::Laugh);
        let viewer = Viewer::new(ObjectId::new());

        let (next, _) = toggle_reaction(&[other.clone()], target, &viewer, ReactionType::Laugh);
        assert_eq!(next.len(), 2);
        assert_eq!(next[0], other);
    }

    #[test]
    fn change_detection_is_shallow() {
        let target = ObjectId::new();
        let a = reaction(target, ObjectId::new(), ReactionType::Like);
        let b = reaction(target, ObjectId::new(), ReactionType::Love);

        assert!(!reactions_changed(&[a.clone(), b.clone()], &[a.clone(), b.clone()]));
        assert!(reactions_changed(&[a.clone()], &[a.clone(), b.clone()]));
        // same content, different order
        assert!(reactions_changed(&[a.clone(), b.clone()], &[b.clone(), a.clone()]));

        // ids differ but type and user match: not a change
        let mut a_again = a.clone();
        a_again.id = ObjectId::new();
        assert!(!reactions_changed(&[a], &[a_again]));
    }

    #[test]
    fn rollback_restores_server_state_after_stacked_toggles() {
        let target = ObjectId::new();
        let existing = reaction(target, ObjectId::new(), ReactionType::Like);
        let viewer = Viewer::new(ObjectId::new());
        let mut entity = ReactionEntity::new(target, vec![existing.clone()]);

        entity.toggle_local(&viewer, ReactionType::Like);
        entity.toggle_local(&viewer, ReactionType::Laugh);
        assert!(entity.is_pending());
        assert_eq!(entity.reactions.len(), 2);

        entity.roll_back();
        assert_eq!(entity.state, MutationState::RolledBack);
        assert_eq!(entity.reactions, vec![existing]);
    }

    #[test]
    fn confirm_prefers_server_reactions() {
        let target = ObjectId::new();
        let viewer = Viewer::new(ObjectId::new());
        let mut entity = ReactionEntity::new(target, Vec::new());

        entity.toggle_local(&viewer, ReactionType::Love);
        let server = vec![reaction(target, viewer.user_id, ReactionType::Love)];
        entity.confirm(Some(server.clone()));

        assert_eq!(entity.state, MutationState::Confirmed);
        assert_eq!(entity.reactions, server);

        // rolling back a confirmed entity does not resurrect anything
        entity.roll_back();
        assert_eq!(entity.reactions, server);
    }

    #[test]
    fn confirm_without_payload_keeps_optimistic_set() {
        let target = ObjectId::new();
        let viewer = Viewer::new(ObjectId::new());
        let mut entity = ReactionEntity::new(target, Vec::new());

        entity.toggle_local(&viewer, ReactionType::Like);
        entity.confirm(None);
        assert_eq!(entity.reactions.len(), 1);
        assert!(!entity.is_pending());
    }

    #[test]
    fn rollback_without_pending_change_keeps_state() {
        let target = ObjectId::new();
        let viewer = Viewer::new(ObjectId::new());
        let mut entity = ReactionEntity::new(target, Vec::new());

        assert!(!entity.roll_back());
        assert_eq!(entity.state, MutationState::Idle);

        entity.toggle_local(&viewer, ReactionType::Love);
        entity.confirm(None);
        assert!(!entity.roll_back());
        assert_eq!(entity.state, MutationState::Confirmed);
        assert_eq!(entity.reactions.len(), 1);
    }
}
