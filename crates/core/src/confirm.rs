//! Confirmation dialog modelled as an explicit state machine.
//!
//! `Idle -> Pending(resolution) -> Resolved(bool)`. Confirming resolves `true`;
//! cancelling or dismissing resolves `false`. A pending dialog is always resolved
//! exactly once.

use std::fmt;

use thiserror::Error;

/// Copy shown while a confirmation is pending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmPrompt {
    pub title: String,
    pub description: String,
    pub confirm_label: String,
    pub cancel_label: String,
}

impl ConfirmPrompt {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            confirm_label: "Confirm".to_string(),
            cancel_label: "Cancel".to_string(),
        }
    }

    pub fn with_labels(
        mut self,
        confirm_label: impl Into<String>,
        cancel_label: impl Into<String>,
    ) -> Self {
        self.confirm_label = confirm_label.into();
        self.cancel_label = cancel_label.into();
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfirmError {
    #[error("a confirmation is already pending")]
    AlreadyPending,
    #[error("no confirmation is pending")]
    NotPending,
}

type Resolution<R> = Box<dyn FnOnce(bool) -> R + Send>;

enum State<R> {
    Idle,
    Pending {
        prompt: ConfirmPrompt,
        resolve: Resolution<R>,
    },
    Resolved(bool),
}

pub struct ConfirmDialog<R> {
    state: State<R>,
}

impl<R> Default for ConfirmDialog<R> {
    fn default() -> Self {
        Self { state: State::Idle }
    }
}

impl<R> fmt::Debug for ConfirmDialog<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.state {
            State::Idle => f.write_str("ConfirmDialog::Idle"),
            State::Pending { prompt, .. } => f
                .debug_struct("ConfirmDialog::Pending")
                .field("prompt", prompt)
                .finish_non_exhaustive(),
            State::Resolved(outcome) => write!(f, "ConfirmDialog::Resolved({outcome})"),
        }
    }
}

impl<R> ConfirmDialog<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens the dialog. `resolve` runs once with the user's answer.
    pub fn open<F>(&mut self, prompt: ConfirmPrompt, resolve: F) -> Result<(), ConfirmError>
    where
        F: FnOnce(bool) -> R + Send + 'static,
    {
        if self.is_pending() {
            return Err(ConfirmError::AlreadyPending);
        }
        self.state = State::Pending {
            prompt,
            resolve: Box::new(resolve),
        };
        Ok(())
    }

    pub fn confirm(&mut self) -> Result<R, ConfirmError> {
        self.resolve(true)
    }

    pub fn cancel(&mut self) -> Result<R, ConfirmError> {
        self.resolve(false)
    }

    /// Closing the dialog without choosing (escape, overlay click) counts as a cancel.
    /// Returns `None` when nothing was pending.
    pub fn dismiss(&mut self) -> Option<R> {
        self.resolve(false).ok()
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, State::Pending { .. })
    }

    pub fn prompt(&self) -> Option<&ConfirmPrompt> {
        match &self.state {
            State::Pending { prompt, .. } => Some(prompt),
            _ => None,
        }
    }

    /// The last answer, once resolved and until the dialog is opened again.
    pub fn outcome(&self) -> Option<bool> {
        match self.state {
            State::Resolved(outcome) => Some(outcome),
            _ => None,
        }
    }

    fn resolve(&mut self, outcome: bool) -> Result<R, ConfirmError> {
        match std::mem::replace(&mut self.state, State::Resolved(outcome)) {
            State::Pending { resolve, .. } => Ok(resolve(outcome)),
            previous => {
                self.state = previous;
                Err(ConfirmError::NotPending)
            }
        }
    }
}
