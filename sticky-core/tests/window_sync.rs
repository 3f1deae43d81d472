//! End-to-end window synchronization tests
//!
//! Runs the main window, note editors, and the settings panel as separate
//! tokio tasks on a LocalDesktop. A launcher plays the window system: every
//! window the main window creates is attached and gets its controller
//! spawned. Assertions observe the persisted snapshot.

use std::sync::Arc;
use std::time::Duration;
use sticky_core::board::{Engine, EngineParts, LoopTicker, Settings, Snapshot, SystemClock};
use sticky_core::config::Timings;
use sticky_core::notify::NullNotifier;
use sticky_core::store::{ImmediateSaver, MemoryStore};
use sticky_core::test_utils::{assert_eventually, assert_eventually_bool};
use sticky_core::windows::controllers::{
    EditorInput, MainInput, MainWindow, NoteEditor, SettingsInput, SettingsPanel,
};
use sticky_core::windows::{LocalDesktop, Messenger, WindowHandle, WindowHost, WindowId, WindowPayload};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const WAIT: Duration = Duration::from_secs(3);
const POLL: Duration = Duration::from_millis(20);

enum Launched {
    Editor {
        id: WindowId,
        input: mpsc::Sender<EditorInput>,
    },
    Settings {
        id: WindowId,
        input: mpsc::Sender<SettingsInput>,
    },
}

struct Harness {
    desktop: Arc<LocalDesktop>,
    store: Arc<MemoryStore>,
    main_input: mpsc::Sender<MainInput>,
    launched: mpsc::UnboundedReceiver<Launched>,
    main_task: JoinHandle<Engine>,
}

fn spawn_launcher(
    desktop: Arc<LocalDesktop>,
    mut launches: mpsc::UnboundedReceiver<WindowHandle>,
    timings: Timings,
) -> mpsc::UnboundedReceiver<Launched> {
    let (out, launched) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Some(handle) = launches.recv().await {
            if handle.payload == WindowPayload::Main {
                continue;
            }
            let Some(inbox) = desktop.attach(&handle.id) else {
                continue;
            };
            let messenger = Messenger::new(handle.id.clone(), desktop.clone(), &timings);

            if let Some(editor) = NoteEditor::from_payload(messenger.clone(), &handle.payload, &timings) {
                let (input, rx) = mpsc::channel(16);
                tokio::spawn(editor.run(inbox, rx));
                let _ = out.send(Launched::Editor { id: handle.id, input });
            } else if let Some(panel) = SettingsPanel::from_payload(messenger, &handle.payload, &timings) {
                let (input, rx) = mpsc::channel(16);
                tokio::spawn(panel.run(inbox, rx));
                let _ = out.send(Launched::Settings { id: handle.id, input });
            }
        }
    });
    launched
}

impl Harness {
    fn start() -> Self {
        let timings = Timings::default();
        let (desktop, launches) = LocalDesktop::new();
        let launched = spawn_launcher(desktop.clone(), launches, timings);

        let main_handle = desktop.create(WindowPayload::Main).unwrap();
        let main_inbox = desktop.attach(&main_handle.id).unwrap();

        let store = Arc::new(MemoryStore::default());
        let ticker = LoopTicker::new();
        let mut engine = Engine::new(EngineParts {
            store: store.clone(),
            saver: Box::new(ImmediateSaver::new(store.clone())),
            clock: Arc::new(SystemClock),
            notifier: Arc::new(NullNotifier),
            ticker: Box::new(ticker.clone()),
            timings,
        });
        engine.load();

        let messenger = Messenger::new(main_handle.id, desktop.clone(), &timings);
        let main = MainWindow::new(engine, messenger, ticker);
        let (main_input, input_rx) = mpsc::channel(16);
        let main_task = tokio::spawn(main.run(main_inbox, input_rx));

        Self {
            desktop,
            store,
            main_input,
            launched,
            main_task,
        }
    }

    async fn send(&self, input: MainInput) {
        self.main_input.send(input).await.unwrap();
    }

    async fn saved(&self) -> Snapshot {
        let store = self.store.clone();
        assert_eventually("a saved snapshot", WAIT, POLL, || {
            let store = store.clone();
            async move { store.last_saved().ok_or("nothing saved yet") }
        })
        .await
    }

    /// Add tasks and return their ids in board order
    async fn add(&self, text: &str, expected: usize) -> Vec<String> {
        self.send(MainInput::Add(text.to_string())).await;
        let store = self.store.clone();
        assert_eventually("tasks to be saved", WAIT, POLL, || {
            let store = store.clone();
            async move {
                match store.last_saved() {
                    Some(s) if s.tasks.len() == expected => {
                        Ok(s.tasks.into_iter().map(|t| t.id).collect::<Vec<_>>())
                    }
                    Some(s) => Err(format!("{} tasks saved", s.tasks.len())),
                    None => Err("nothing saved yet".to_string()),
                }
            }
        })
        .await
    }

    async fn wait_for_context(&self, task_id: &str, text: &str) {
        let store = self.store.clone();
        let task_id = task_id.to_string();
        let text = text.to_string();
        assert_eventually_bool("note to reach the board", WAIT, POLL, || {
            let store = store.clone();
            let task_id = task_id.clone();
            let text = text.clone();
            async move {
                store
                    .last_saved()
                    .and_then(|s| s.tasks.into_iter().find(|t| t.id == task_id))
                    .is_some_and(|t| t.context_text == text)
            }
        })
        .await;
    }

    async fn next_editor(&mut self) -> (WindowId, mpsc::Sender<EditorInput>) {
        match tokio::time::timeout(WAIT, self.launched.recv()).await {
            Ok(Some(Launched::Editor { id, input })) => (id, input),
            _ => panic!("expected a note editor to launch"),
        }
    }

    async fn next_settings(&mut self) -> (WindowId, mpsc::Sender<SettingsInput>) {
        match tokio::time::timeout(WAIT, self.launched.recv()).await {
            Ok(Some(Launched::Settings { id, input })) => (id, input),
            _ => panic!("expected a settings panel to launch"),
        }
    }

    fn editor_count(&self) -> usize {
        self.desktop
            .windows()
            .iter()
            .filter(|w| w.payload.is_note_editor())
            .count()
    }

    async fn quit(self) -> Engine {
        self.send(MainInput::Quit).await;
        self.main_task.await.unwrap()
    }
}

#[tokio::test]
async fn test_note_edits_reach_the_board() {
    let mut h = Harness::start();
    let ids = h.add("Write report", 1).await;

    h.send(MainInput::OpenNote(ids[0].clone())).await;
    let (editor_id, editor) = h.next_editor().await;
    assert_eventually_bool("editor to be focused", WAIT, POLL, || {
        let desktop = h.desktop.clone();
        let id = editor_id.clone();
        async move { desktop.focus_count(&id) >= 1 }
    })
    .await;

    editor
        .send(EditorInput::Edit("numbers from Q3".to_string()))
        .await
        .unwrap();
    h.wait_for_context(&ids[0], "numbers from Q3").await;

    editor.send(EditorInput::Close).await.unwrap();
    assert_eventually_bool("editor window to close", WAIT, POLL, || {
        let desktop = h.desktop.clone();
        let id = editor_id.clone();
        async move { !desktop.is_open(&id) }
    })
    .await;

    let engine = h.quit().await;
    assert_eq!(engine.tasks()[0].context_text, "numbers from Q3");
}

#[tokio::test]
async fn test_close_mid_debounce_keeps_the_edit() {
    let mut h = Harness::start();
    let ids = h.add("Call bank", 1).await;

    h.send(MainInput::OpenNote(ids[0].clone())).await;
    let (_editor_id, editor) = h.next_editor().await;
    editor
        .send(EditorInput::Edit("ask about fees".to_string()))
        .await
        .unwrap();
    editor.send(EditorInput::Close).await.unwrap();

    h.wait_for_context(&ids[0], "ask about fees").await;
    h.quit().await;
}

#[tokio::test]
async fn test_opening_another_note_retargets_the_editor() {
    let mut h = Harness::start();
    let ids = h.add("First\nSecond", 2).await;

    h.send(MainInput::OpenNote(ids[0].clone())).await;
    let (editor_id, editor) = h.next_editor().await;
    editor
        .send(EditorInput::Edit("notes for first".to_string()))
        .await
        .unwrap();
    // Let the editor take the keystroke, well inside its debounce window
    tokio::time::sleep(Duration::from_millis(50)).await;

    h.send(MainInput::OpenNote(ids[1].clone())).await;
    h.wait_for_context(&ids[0], "notes for first").await;
    assert_eq!(h.editor_count(), 1);

    editor
        .send(EditorInput::Edit("notes for second".to_string()))
        .await
        .unwrap();
    editor.send(EditorInput::Blur).await.unwrap();
    h.wait_for_context(&ids[1], "notes for second").await;
    assert_eq!(h.editor_count(), 1);
    assert!(h.desktop.is_open(&editor_id));

    let engine = h.quit().await;
    assert_eq!(engine.task(&ids[0]).unwrap().context_text, "notes for first");
}

#[tokio::test]
async fn test_settings_panel_round_trip() {
    let mut h = Harness::start();
    h.send(MainInput::OpenSettings).await;
    let (panel_id, panel) = h.next_settings().await;

    let changed = Settings {
        opacity: 0.5,
        show_only_active: true,
        ..Settings::default()
    };
    panel.send(SettingsInput::Change(changed)).await.unwrap();

    let store = h.store.clone();
    assert_eventually_bool("settings to be saved", WAIT, POLL, || {
        let store = store.clone();
        async move {
            store
                .last_saved()
                .is_some_and(|s| s.settings.opacity == 0.5 && s.settings.show_only_active)
        }
    })
    .await;

    // Opening again focuses the same panel instead of launching another
    h.send(MainInput::OpenSettings).await;
    assert_eventually_bool("panel to be focused again", WAIT, POLL, || {
        let desktop = h.desktop.clone();
        let id = panel_id.clone();
        async move { desktop.focus_count(&id) >= 2 }
    })
    .await;

    panel.send(SettingsInput::Close).await.unwrap();
    assert_eventually_bool("panel window to close", WAIT, POLL, || {
        let desktop = h.desktop.clone();
        let id = panel_id.clone();
        async move { !desktop.is_open(&id) }
    })
    .await;

    let engine = h.quit().await;
    assert_eq!(engine.settings().opacity, 0.5);
    assert!(engine.snapshot().settings.show_only_active);
}

#[tokio::test]
async fn test_focus_minutes_apply_to_new_tasks() {
    let h = Harness::start();
    h.send(MainInput::FocusMinutes(10)).await;
    h.add("Stretch", 1).await;

    let snapshot = h.saved().await;
    assert_eq!(snapshot.settings.default_focus_minutes, 10);
    assert_eq!(snapshot.tasks[0].focus_duration_sec, 600);
    h.quit().await;
}
