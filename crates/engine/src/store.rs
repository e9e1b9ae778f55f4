use crate::action::EditorAction;
use crate::auto_time::compute_auto_time_options;
use crate::config::EditorConfig;
use crate::error::EngineError;
use crate::state::{reduce, EditorState};
use crate::validation::validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Subscriber = Box<dyn FnMut(&EditorState)>;

/// Owns the editor state and notifies subscribers after each transition.
pub struct Store {
    state: EditorState,
    config: EditorConfig,
    subscribers: Vec<(SubscriptionId, Subscriber)>,
    next_subscription: u64,
}

impl Store {
    pub fn new(config: EditorConfig) -> Self {
        Self {
            state: EditorState::new(),
            config,
            subscribers: Vec::new(),
            next_subscription: 0,
        }
    }

    pub fn state(&self) -> &EditorState {
        &self.state
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn subscribe(&mut self, subscriber: impl FnMut(&EditorState) + 'static) -> SubscriptionId {
        self.next_subscription += 1;
        let id = SubscriptionId(self.next_subscription);
        self.subscribers.push((id, Box::new(subscriber)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(candidate, _)| *candidate != id);
        self.subscribers.len() != before
    }

    /// Run `action` through the reducer. When the form changed, derived time
    /// options and validation are recomputed before subscribers hear about it.
    /// A rejected action leaves the state untouched.
    pub fn dispatch(&mut self, action: EditorAction) -> Result<(), EngineError> {
        let name = action.name();
        let next = reduce(&self.state, action, &self.config)
            .and_then(|next| self.with_derived_state(next))
            .inspect_err(|err| tracing::error!("{name} rejected: {err}"))?;
        self.state = next;
        for (_, subscriber) in &mut self.subscribers {
            subscriber(&self.state);
        }
        Ok(())
    }

    fn with_derived_state(&self, next: EditorState) -> Result<EditorState, EngineError> {
        if next.form == self.state.form {
            return Ok(next);
        }
        let options = compute_auto_time_options(&next.form);
        let next = reduce(&next, EditorAction::SetAutoTimeOptions(options), &self.config)?;
        let issues = validate(&next.form);
        reduce(&next, EditorAction::SetValidation(issues), &self.config)
    }
}
