//! Addressing and messaging other windows.
//!
//! Outbound: [`Messenger`] finds windows by their launch payload and sends
//! typed messages. A send is one attempt that reports success; only the
//! handshake after creating a window retries, and only a bounded number of
//! times.
//!
//! Inbound: [`Inbox`] maps message names to handlers on a controller. Anything
//! it cannot decode or has no handler for is `Unhandled`, never an error.

use super::host::{WindowHandle, WindowHost};
use super::protocol::{Envelope, WindowMessage};
use super::WindowId;
use crate::config::Timings;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct Messenger {
    self_id: WindowId,
    host: Arc<dyn WindowHost>,
    retry_attempts: u32,
    retry_delay: Duration,
}

impl Messenger {
    pub fn new(self_id: WindowId, host: Arc<dyn WindowHost>, timings: &Timings) -> Self {
        Self {
            self_id,
            host,
            retry_attempts: timings.handshake_attempts,
            retry_delay: timings.handshake_delay,
        }
    }

    pub fn self_id(&self) -> &WindowId {
        &self.self_id
    }

    pub fn host(&self) -> &Arc<dyn WindowHost> {
        &self.host
    }

    /// First live window matching `pred`, in creation order
    pub fn find_by_predicate<P>(&self, pred: P) -> Option<WindowHandle>
    where
        P: Fn(&WindowHandle) -> bool,
    {
        self.host.windows().into_iter().find(|w| pred(w))
    }

    pub fn find_by_id(&self, id: &WindowId) -> Option<WindowHandle> {
        self.find_by_predicate(|w| &w.id == id)
    }

    /// One delivery attempt
    pub fn send(&self, target: &WindowHandle, message: &WindowMessage) -> bool {
        self.send_to(&target.id, message)
    }

    pub fn send_to(&self, target: &WindowId, message: &WindowMessage) -> bool {
        let envelope = match message.to_envelope(&self.self_id) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(event = "message_encode_failed", name = message.name(), error = %e);
                return false;
            }
        };

        match self.host.deliver(target, envelope) {
            Ok(()) => {
                tracing::debug!(event = "message_sent", to = %target, name = message.name());
                true
            }
            Err(e) => {
                tracing::debug!(event = "message_undelivered", to = %target, name = message.name(), error = %e);
                false
            }
        }
    }

    /// Retry a send with a fixed delay. Used only for the handshake with a
    /// window that was just created and may still be starting up.
    pub async fn send_with_retry(&self, target: &WindowHandle, message: &WindowMessage) -> bool {
        for attempt in 1..=self.retry_attempts {
            if self.send(target, message) {
                return true;
            }
            if attempt < self.retry_attempts {
                tokio::time::sleep(self.retry_delay).await;
            }
        }

        tracing::warn!(
            event = "handshake_abandoned",
            to = %target.id,
            name = message.name(),
            attempts = self.retry_attempts
        );
        false
    }
}

/// Inbound message handler
pub type Handler<C> = fn(&mut C, &WindowId, WindowMessage);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Handled,
    Unhandled,
}

/// Message-name → handler table for one controller type
pub struct Inbox<C> {
    handlers: HashMap<&'static str, Handler<C>>,
}

impl<C> Default for Inbox<C> {
    fn default() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }
}

impl<C> Inbox<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, name: &'static str, handler: Handler<C>) -> Self {
        self.handlers.insert(name, handler);
        self
    }

    pub fn dispatch(&self, ctx: &mut C, envelope: &Envelope) -> Dispatch {
        let Some(handler) = self.handlers.get(envelope.name.as_str()) else {
            tracing::debug!(event = "message_unhandled", name = %envelope.name, from = %envelope.from);
            return Dispatch::Unhandled;
        };
        let Some(message) = WindowMessage::from_envelope(envelope) else {
            tracing::debug!(
                event = "message_undecodable",
                name = %envelope.name,
                v = envelope.v,
                from = %envelope.from
            );
            return Dispatch::Unhandled;
        };

        handler(ctx, &envelope.from, message);
        Dispatch::Handled
    }
}
