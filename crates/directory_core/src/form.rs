//! Add/edit guest modal.

use shared::domain::{Guest, GuestFields, GuestId};
use tokio::sync::{broadcast, Mutex};
use tracing::{info, warn};

use crate::{
    error::ControllerError,
    events::{self, DirectoryEvent},
    store::GuestCollection,
    validation,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormMode {
    Create,
    Edit(Guest),
}

impl FormMode {
    pub fn title(&self) -> &'static str {
        match self {
            Self::Create => "Add New Guest",
            Self::Edit(_) => "Edit Guest",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormState {
    Closed,
    Open {
        mode: FormMode,
        fields: GuestFields,
        error: Option<String>,
    },
    Submitting {
        mode: FormMode,
        fields: GuestFields,
    },
}

impl FormState {
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }

    pub fn mode(&self) -> Option<&FormMode> {
        match self {
            Self::Closed => None,
            Self::Open { mode, .. } | Self::Submitting { mode, .. } => Some(mode),
        }
    }

    pub fn fields(&self) -> Option<&GuestFields> {
        match self {
            Self::Closed => None,
            Self::Open { fields, .. } | Self::Submitting { fields, .. } => Some(fields),
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Open { error, .. } => error.as_deref(),
            _ => None,
        }
    }
}

struct FormInner {
    state: FormState,
    // Bumped on every open/close so a late submit result cannot touch a
    // form that has been closed or reopened since.
    generation: u64,
}

pub struct GuestFormController {
    guests: GuestCollection,
    inner: Mutex<FormInner>,
    events: broadcast::Sender<DirectoryEvent>,
}

impl GuestFormController {
    pub fn new(guests: GuestCollection) -> Self {
        Self {
            guests,
            inner: Mutex::new(FormInner {
                state: FormState::Closed,
                generation: 0,
            }),
            events: events::channel(),
        }
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<DirectoryEvent> {
        self.events.subscribe()
    }

    pub async fn state(&self) -> FormState {
        self.inner.lock().await.state.clone()
    }

    /// Opens in edit mode pre-filled from `guest`, or in create mode with
    /// empty fields.
    pub async fn open(&self, guest: Option<&Guest>) {
        let (mode, fields) = match guest {
            Some(guest) => (FormMode::Edit(guest.clone()), GuestFields::from(guest)),
            None => (FormMode::Create, GuestFields::default()),
        };
        let mut inner = self.inner.lock().await;
        inner.generation += 1;
        inner.state = FormState::Open {
            mode,
            fields,
            error: None,
        };
    }

    /// Fetches the current copy of the guest before opening it for editing.
    /// A failed fetch leaves the form closed.
    pub async fn open_edit_by_id(&self, id: &GuestId) -> Result<Guest, ControllerError> {
        match self.guests.get(id).await {
            Ok(guest) => {
                self.open(Some(&guest)).await;
                Ok(guest)
            }
            Err(err) => {
                warn!(guest_id = %id, error = %err, "failed to load guest for editing");
                self.close().await;
                Err(err.into())
            }
        }
    }

    pub async fn close(&self) {
        let mut inner = self.inner.lock().await;
        inner.generation += 1;
        inner.state = FormState::Closed;
    }

    /// Validates `fields` and saves them. Validation failures never reach the
    /// store; both validation and store failures keep the form open with the
    /// error message set.
    pub async fn submit(&self, fields: GuestFields) -> Result<Guest, ControllerError> {
        let (mode, generation) = {
            let mut inner = self.inner.lock().await;
            let mode = match &inner.state {
                FormState::Open { mode, .. } => mode.clone(),
                FormState::Submitting { .. } => {
                    return Err(ControllerError::InvalidState("guest is already being saved"));
                }
                FormState::Closed => {
                    return Err(ControllerError::InvalidState("guest form is not open"));
                }
            };

            if let Err(err) = validation::validate(&fields) {
                inner.state = FormState::Open {
                    mode,
                    fields,
                    error: Some(err.to_string()),
                };
                return Err(err.into());
            }

            inner.state = FormState::Submitting {
                mode: mode.clone(),
                fields: fields.clone(),
            };
            (mode, inner.generation)
        };

        let payload = validation::normalized(&fields);
        let result = match &mode {
            FormMode::Create => self.guests.create(&payload).await,
            FormMode::Edit(existing) => self.guests.update(&existing.id, &payload).await,
        };

        let mut inner = self.inner.lock().await;
        let still_current = inner.generation == generation;
        match result {
            Ok(saved) => {
                let created = matches!(mode, FormMode::Create);
                info!(guest_id = %saved.id, created, "guest saved");
                if still_current {
                    inner.generation += 1;
                    inner.state = FormState::Closed;
                }
                drop(inner);
                let _ = self.events.send(DirectoryEvent::GuestSaved {
                    guest: saved.clone(),
                    created,
                });
                Ok(saved)
            }
            Err(err) => {
                warn!(error = %err, "failed to save guest");
                if still_current {
                    inner.state = FormState::Open {
                        mode,
                        fields,
                        error: Some(err.user_message()),
                    };
                }
                Err(err.into())
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/form_tests.rs"]
mod tests;
