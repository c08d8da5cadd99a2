pub mod coordinator;
pub mod engine;
pub mod task;
pub mod templates;

// Re-export common types
pub use coordinator::{Role, RolePipeline, Worker};
pub use engine::{DedupEngine, PaginationPolicy};
pub use task::{DetailRecord, ListPage, Task, TaskKind};
pub use templates::{JsonTemplate, PageTemplate, TemplateRegistry};
