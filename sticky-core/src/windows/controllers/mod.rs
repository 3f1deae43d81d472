// One controller per window kind

pub mod main;
pub mod note_editor;
pub mod settings;

pub use main::{MainInput, MainWindow};
pub use note_editor::{EditorInput, NoteEditor};
pub use settings::{SettingsInput, SettingsPanel};
