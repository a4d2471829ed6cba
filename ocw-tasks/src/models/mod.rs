//! Data models for ocw-tasks
//!
//! - Task lifecycle records and the worker callback protocol
//! - Worker request/result payloads for each job type

pub mod agenda;
pub mod decision;
pub mod task;
pub mod transcript;

pub use agenda::{AgendaSubject, ProcessAgendaRequest, ProcessAgendaResult};
pub use decision::{Decision, DecisionMatch, PollDecisionsRequest, PollDecisionsResult, PollSubject};
pub use task::{NewTask, TargetKey, Task, TaskStatus, TaskType, TaskUpdate};
pub use transcript::{
    DeclaredSpeaker, TranscribeRequest, TranscribeResult, Transcript, TranscriptUtterance, Voiceprint,
};
