//! Settings satellite window.
//!
//! Mirrors the owner's settings locally and pushes every change back.

use crate::board::model::Settings;
use crate::config::Timings;
use crate::windows::debounce::Debounce;
use crate::windows::messenger::{Inbox, Messenger};
use crate::windows::payload::WindowPayload;
use crate::windows::protocol::{Envelope, WindowMessage};
use crate::windows::WindowId;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Local UI events for the settings panel
#[derive(Debug, Clone, PartialEq)]
pub enum SettingsInput {
    Change(Settings),
    Close,
}

/// Settings satellite. Toggles go to the owner as `settings_update` with no
/// debounce by default; the owner is told when the panel opens and closes.
pub struct SettingsPanel {
    messenger: Messenger,
    owner: WindowId,
    settings: Settings,
    dirty: bool,
    debounce: Debounce,
}

impl SettingsPanel {
    pub fn from_payload(
        messenger: Messenger,
        payload: &WindowPayload,
        timings: &Timings,
    ) -> Option<Self> {
        let WindowPayload::Settings {
            owner_window_id,
            settings,
        } = payload
        else {
            return None;
        };

        Some(Self {
            messenger,
            owner: owner_window_id.clone(),
            settings: settings.clone().normalized(),
            dirty: false,
            debounce: Debounce::new(timings.settings_debounce),
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Announce the panel to its owner
    pub fn open(&mut self) -> bool {
        self.messenger
            .send_to(&self.owner, &WindowMessage::SettingsOpened)
    }

    pub fn change(&mut self, settings: Settings, now: Instant) {
        self.settings = settings.normalized();
        self.dirty = true;
        self.debounce.arm(now);
        self.poll(now);
    }

    pub fn poll(&mut self, now: Instant) -> bool {
        if self.debounce.is_due(now) {
            self.flush()
        } else {
            false
        }
    }

    fn update_message(&self) -> WindowMessage {
        WindowMessage::SettingsUpdate {
            settings: self.settings.clone(),
        }
    }

    /// Push pending changes. Undelivered changes stay pending and the
    /// debounce is re-armed for another attempt.
    pub fn flush(&mut self) -> bool {
        self.debounce.cancel();
        if !self.dirty {
            return false;
        }

        if self.messenger.send_to(&self.owner, &self.update_message()) {
            self.dirty = false;
            return true;
        }
        tracing::warn!(event = "settings_not_delivered", owner = %self.owner);
        self.debounce.arm(Instant::now());
        false
    }

    /// Final flush, tell the owner, then remove the window
    pub async fn close(&mut self) {
        if !self.flush() && self.dirty {
            let delivered = match self.messenger.find_by_id(&self.owner) {
                Some(owner) => {
                    self.messenger
                        .send_with_retry(&owner, &self.update_message())
                        .await
                }
                None => false,
            };
            if !delivered {
                tracing::error!(event = "settings_lost_on_close", owner = %self.owner);
            }
            self.dirty = false;
            self.debounce.cancel();
        }
        self.messenger
            .send_to(&self.owner, &WindowMessage::SettingsClosed);
        let id = self.messenger.self_id().clone();
        self.messenger.host().close(&id);
    }

    pub fn inbox() -> Inbox<Self> {
        Inbox::<Self>::new().on("settings_update", |panel, _from, msg| {
            if let WindowMessage::SettingsUpdate { settings } = msg {
                panel.debounce.cancel();
                panel.dirty = false;
                panel.settings = settings.normalized();
            }
        })
    }

    pub async fn run(
        mut self,
        mut inbox_rx: mpsc::UnboundedReceiver<Envelope>,
        mut input: mpsc::Receiver<SettingsInput>,
    ) {
        let inbox = Self::inbox();
        self.open();

        loop {
            let deadline = self.debounce.deadline();

            tokio::select! {
                envelope = inbox_rx.recv() => match envelope {
                    Some(envelope) => {
                        inbox.dispatch(&mut self, &envelope);
                    }
                    None => {
                        self.flush();
                        break;
                    }
                },

                event = input.recv() => match event {
                    Some(SettingsInput::Change(settings)) => self.change(settings, Instant::now()),
                    Some(SettingsInput::Close) | None => {
                        self.close().await;
                        break;
                    }
                },

                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.poll(Instant::now());
                }
            }
        }

        tracing::debug!(event = "settings_panel_stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::windows::host::{LocalDesktop, WindowHost};
    use std::sync::Arc;
    use std::time::Duration;

    fn panel() -> (Arc<LocalDesktop>, mpsc::UnboundedReceiver<Envelope>, SettingsPanel) {
        let (desktop, _launches) = LocalDesktop::new();
        let owner = desktop.create(WindowPayload::Main).unwrap();
        let owner_inbox = desktop.attach(&owner.id).unwrap();
        let payload = WindowPayload::Settings {
            owner_window_id: owner.id,
            settings: Settings::default(),
        };
        let handle = desktop.create(payload.clone()).unwrap();
        let messenger = Messenger::new(handle.id, desktop.clone(), &Timings::default());
        let panel = SettingsPanel::from_payload(messenger, &payload, &Timings::default()).unwrap();
        (desktop, owner_inbox, panel)
    }

    fn names(rx: &mut mpsc::UnboundedReceiver<Envelope>) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(envelope) = rx.try_recv() {
            out.push(envelope.name);
        }
        out
    }

    #[test]
    fn toggles_are_sent_immediately() {
        let (_desktop, mut owner, mut panel) = panel();
        let changed = Settings {
            show_only_active: true,
            ..Settings::default()
        };

        panel.change(changed.clone(), Instant::now());

        let envelope = owner.try_recv().unwrap();
        match WindowMessage::from_envelope(&envelope) {
            Some(WindowMessage::SettingsUpdate { settings }) => assert_eq!(settings, changed),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn out_of_range_values_are_clamped_before_sending() {
        let (_desktop, mut owner, mut panel) = panel();

        panel.change(
            Settings {
                opacity: 0.05,
                ..Settings::default()
            },
            Instant::now(),
        );

        assert_eq!(panel.settings().opacity, Settings::MIN_OPACITY);
        let envelope = owner.try_recv().unwrap();
        assert_eq!(envelope.data["settings"]["opacity"], Settings::MIN_OPACITY);
    }

    #[tokio::test]
    async fn open_and_close_are_announced() {
        let (desktop, mut owner, mut panel) = panel();
        let id = panel.messenger.self_id().clone();

        assert!(panel.open());
        panel.close().await;

        assert_eq!(names(&mut owner), vec!["settings_opened", "settings_closed"]);
        assert!(!desktop.windows().iter().any(|w| w.id == id));
    }

    #[test]
    fn change_survives_unreachable_owner() {
        let (desktop, _launches) = LocalDesktop::new();
        let owner = desktop.create(WindowPayload::Main).unwrap();
        let payload = WindowPayload::Settings {
            owner_window_id: owner.id.clone(),
            settings: Settings::default(),
        };
        let handle = desktop.create(payload.clone()).unwrap();
        let messenger = Messenger::new(handle.id, desktop.clone(), &Timings::default());
        let mut panel = SettingsPanel::from_payload(messenger, &payload, &Timings::default()).unwrap();

        panel.change(
            Settings {
                show_only_active: true,
                ..Settings::default()
            },
            Instant::now(),
        );
        assert!(panel.dirty);

        let mut owner_inbox = desktop.attach(&owner.id).unwrap();
        assert!(panel.poll(Instant::now()));
        assert!(!panel.dirty);
        let envelope = owner_inbox.try_recv().unwrap();
        assert_eq!(envelope.data["settings"]["showOnlyActive"], true);
    }

    #[test]
    fn inbound_update_replaces_local_state() {
        let (_desktop, _owner, mut panel) = panel();
        let inbox = SettingsPanel::inbox();
        let incoming = Settings {
            font_scale: 1.4,
            ..Settings::default()
        };
        let envelope = WindowMessage::SettingsUpdate {
            settings: incoming.clone(),
        }
        .to_envelope(&"main".to_string())
        .unwrap();

        inbox.dispatch(&mut panel, &envelope);

        assert_eq!(panel.settings(), &incoming);
    }

    #[tokio::test(start_paused = true)]
    async fn debounced_panel_coalesces_changes() {
        let (_desktop, mut owner, mut panel) = panel();
        panel.debounce = Debounce::new(Duration::from_millis(200));
        let start = Instant::now();

        panel.change(
            Settings {
                font_scale: 1.1,
                ..Settings::default()
            },
            start,
        );
        panel.change(
            Settings {
                font_scale: 1.2,
                ..Settings::default()
            },
            start + Duration::from_millis(100),
        );
        assert!(owner.try_recv().is_err());

        assert!(panel.poll(start + Duration::from_millis(300)));
        let envelope = owner.try_recv().unwrap();
        assert_eq!(envelope.data["settings"]["fontScale"], 1.2);
    }
}
