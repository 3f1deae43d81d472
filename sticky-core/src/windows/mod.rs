// Windows: launch payloads, the message protocol between windows, the
// window-system seam, and one controller per window kind

pub mod controllers;
pub mod debounce;
pub mod host;
pub mod messenger;
pub mod payload;
pub mod protocol;

/// Opaque window identifier assigned by the window host
pub type WindowId = String;

pub use host::{DeliveryError, LocalDesktop, WindowHandle, WindowHost};
pub use messenger::{Dispatch, Inbox, Messenger};
pub use payload::WindowPayload;
pub use protocol::{Envelope, WindowMessage, PROTOCOL_VERSION};
