//! Personal task tracker: dated tasks, clash detection, undo/redo and
//! calendar export, persisted to a JSON file.

pub mod clash;
pub mod command;
pub mod error;
pub mod export;
pub mod history;
pub mod model;
pub mod output;
pub mod session;
pub mod storage;
pub mod task_list;

pub use command::{Command, InputSource, Reply};
pub use error::TaskError;
pub use export::{ExportFilter, Exporter, IcsExporter};
pub use history::{HistoryPosition, HistoryStack, HistoryState};
pub use model::{Period, Priority, Task, TaskKind, TimeStamp, local_now};
pub use output::{OutputSink, Transcript};
pub use session::{Session, run};
pub use storage::{FileStore, JsonFileStore};
pub use task_list::TaskList;
