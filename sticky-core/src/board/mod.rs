// Task board: data model, focus timers, admission limit, and the engine
// that owns all of it

pub mod admission;
pub mod clock;
pub mod engine;
pub mod model;
pub mod timer;

pub use clock::{Clock, LoopTicker, ManualClock, SystemClock, TickControl};
pub use engine::{AddOutcome, BoardEvent, Engine, EngineParts, RemovedTask};
pub use model::{FocusState, Settings, Snapshot, Task, TaskStatus, WindowBounds};
