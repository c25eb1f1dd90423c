pub mod roster;
pub mod session;
pub mod student;

pub use roster::Roster;
pub use session::{extract_sections, ExamSession, MergeStats};
pub use student::{
    MergeOutcome, RegradePolicy, ScorePatch, SectionResult, StudentIdentity, StudentRecord,
    UNKNOWN_STUDENT_NAME,
};
