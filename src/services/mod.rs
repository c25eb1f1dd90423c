pub mod chunker;
pub mod csv_export;
pub mod identity_resolver;
pub mod llm_service;
pub mod response_parser;
pub mod section_grader;
pub mod session_store;

pub use chunker::PageChunks;
pub use identity_resolver::{IdentityResolver, Resolution};
pub use llm_service::{LlmService, PromptPart, VisionModel};
pub use section_grader::{GradingRequest, SectionGrader};
pub use session_store::{InMemorySessionStore, SessionStore};
