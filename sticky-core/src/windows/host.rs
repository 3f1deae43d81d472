//! The window system seam.
//!
//! [`WindowHost`] is the only way controllers touch real windows: list them,
//! create one from a launch payload, deliver an envelope, focus, close.
//! [`LocalDesktop`] implements it in-process with one tokio channel per
//! window, which is what the CLI demo and the tests run on.

use super::payload::WindowPayload;
use super::protocol::Envelope;
use super::WindowId;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tokio::sync::mpsc;

/// A live window and the payload it was launched with
#[derive(Debug, Clone, PartialEq)]
pub struct WindowHandle {
    pub id: WindowId,
    pub payload: WindowPayload,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("window {0} does not exist")]
    NotFound(WindowId),
    #[error("window {0} has not registered its inbox yet")]
    NotReady(WindowId),
    #[error("window {0} stopped listening")]
    Closed(WindowId),
}

pub trait WindowHost: Send + Sync {
    /// Every live window, in creation order
    fn windows(&self) -> Vec<WindowHandle>;

    fn create(&self, payload: WindowPayload) -> anyhow::Result<WindowHandle>;

    /// One delivery attempt; never blocks
    fn deliver(&self, target: &WindowId, envelope: Envelope) -> Result<(), DeliveryError>;

    /// Bring a window to front. False if it does not exist.
    fn focus(&self, target: &WindowId) -> bool;

    fn close(&self, target: &WindowId);
}

struct Slot {
    seq: u64,
    payload: WindowPayload,
    inbox: Option<mpsc::UnboundedSender<Envelope>>,
    focus_count: usize,
}

#[derive(Default)]
struct Desktop {
    next_seq: u64,
    slots: BTreeMap<WindowId, Slot>,
}

/// In-process window host.
///
/// `create` only registers the window and announces it on the launch
/// channel; whoever runs the window attaches an inbox later, and until then
/// deliveries fail with [`DeliveryError::NotReady`].
pub struct LocalDesktop {
    state: Mutex<Desktop>,
    launches: mpsc::UnboundedSender<WindowHandle>,
}

impl LocalDesktop {
    /// The host plus the stream of windows created through it
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<WindowHandle>) {
        let (launches, rx) = mpsc::unbounded_channel();
        let desktop = Self {
            state: Mutex::new(Desktop::default()),
            launches,
        };
        (Arc::new(desktop), rx)
    }

    fn lock(&self) -> MutexGuard<'_, Desktop> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Start receiving envelopes for `id`. Replaces any previous inbox.
    pub fn attach(&self, id: &WindowId) -> Option<mpsc::UnboundedReceiver<Envelope>> {
        let mut state = self.lock();
        let slot = state.slots.get_mut(id)?;
        let (tx, rx) = mpsc::unbounded_channel();
        slot.inbox = Some(tx);
        Some(rx)
    }

    pub fn is_open(&self, id: &WindowId) -> bool {
        self.lock().slots.contains_key(id)
    }

    /// How many times `id` was brought to front
    pub fn focus_count(&self, id: &WindowId) -> usize {
        self.lock().slots.get(id).map_or(0, |s| s.focus_count)
    }
}

impl WindowHost for LocalDesktop {
    fn windows(&self) -> Vec<WindowHandle> {
        let state = self.lock();
        let mut handles: Vec<(u64, WindowHandle)> = state
            .slots
            .iter()
            .map(|(id, slot)| {
                (
                    slot.seq,
                    WindowHandle {
                        id: id.clone(),
                        payload: slot.payload.clone(),
                    },
                )
            })
            .collect();
        handles.sort_by_key(|(seq, _)| *seq);
        handles.into_iter().map(|(_, h)| h).collect()
    }

    fn create(&self, payload: WindowPayload) -> anyhow::Result<WindowHandle> {
        let id = format!("{}-{}", payload.kind(), uuid::Uuid::new_v4().simple());
        let handle = WindowHandle {
            id: id.clone(),
            payload: payload.clone(),
        };

        {
            let mut state = self.lock();
            let seq = state.next_seq;
            state.next_seq += 1;
            state.slots.insert(
                id,
                Slot {
                    seq,
                    payload,
                    inbox: None,
                    focus_count: 0,
                },
            );
        }

        tracing::debug!(event = "window_created", id = %handle.id, kind = handle.payload.kind());
        if self.launches.send(handle.clone()).is_err() {
            tracing::debug!(event = "window_launcher_gone", id = %handle.id);
        }
        Ok(handle)
    }

    fn deliver(&self, target: &WindowId, envelope: Envelope) -> Result<(), DeliveryError> {
        let state = self.lock();
        let slot = state
            .slots
            .get(target)
            .ok_or_else(|| DeliveryError::NotFound(target.clone()))?;
        let inbox = slot
            .inbox
            .as_ref()
            .ok_or_else(|| DeliveryError::NotReady(target.clone()))?;
        inbox
            .send(envelope)
            .map_err(|_| DeliveryError::Closed(target.clone()))
    }

    fn focus(&self, target: &WindowId) -> bool {
        match self.lock().slots.get_mut(target) {
            Some(slot) => {
                slot.focus_count += 1;
                true
            }
            None => false,
        }
    }

    fn close(&self, target: &WindowId) {
        if self.lock().slots.remove(target).is_some() {
            tracing::debug!(event = "window_closed", id = %target);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::windows::protocol::WindowMessage;

    fn focus_envelope() -> Envelope {
        WindowMessage::ContextFocus
            .to_envelope(&"main".to_string())
            .unwrap()
    }

    #[tokio::test]
    async fn test_delivery_waits_for_attach() {
        let (desktop, mut launches) = LocalDesktop::new();
        let handle = desktop.create(WindowPayload::Main).unwrap();
        assert_eq!(launches.recv().await, Some(handle.clone()));

        assert_eq!(
            desktop.deliver(&handle.id, focus_envelope()),
            Err(DeliveryError::NotReady(handle.id.clone()))
        );

        let mut inbox = desktop.attach(&handle.id).unwrap();
        desktop.deliver(&handle.id, focus_envelope()).unwrap();
        assert_eq!(inbox.recv().await, Some(focus_envelope()));
    }

    #[test]
    fn test_missing_and_dropped_windows() {
        let (desktop, _launches) = LocalDesktop::new();
        let ghost = "note_editor-gone".to_string();
        assert_eq!(
            desktop.deliver(&ghost, focus_envelope()),
            Err(DeliveryError::NotFound(ghost.clone()))
        );
        assert!(!desktop.focus(&ghost));

        let handle = desktop.create(WindowPayload::Main).unwrap();
        drop(desktop.attach(&handle.id));
        assert_eq!(
            desktop.deliver(&handle.id, focus_envelope()),
            Err(DeliveryError::Closed(handle.id.clone()))
        );
    }

    #[test]
    fn test_windows_listed_in_creation_order() {
        let (desktop, _launches) = LocalDesktop::new();
        let a = desktop.create(WindowPayload::Main).unwrap();
        let b = desktop.create(WindowPayload::default()).unwrap();
        let c = desktop.create(WindowPayload::Main).unwrap();
        desktop.close(&b.id);

        let ids: Vec<WindowId> = desktop.windows().into_iter().map(|h| h.id).collect();
        assert_eq!(ids, vec![a.id, c.id]);
        assert!(!desktop.is_open(&b.id));
    }

    #[test]
    fn test_focus_is_counted() {
        let (desktop, _launches) = LocalDesktop::new();
        let handle = desktop.create(WindowPayload::Main).unwrap();
        assert!(desktop.focus(&handle.id));
        assert!(desktop.focus(&handle.id));
        assert_eq!(desktop.focus_count(&handle.id), 2);
    }
}
