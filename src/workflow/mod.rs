pub mod student_ctx;

pub use student_ctx::{ChunkCtx, StudentCtx};
