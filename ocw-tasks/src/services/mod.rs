//! Task orchestration services

pub mod agenda_ingestion;
pub mod authorization;
pub mod callback_handler;
pub mod decision_ingestion;
pub mod notifier;
pub mod registry;
pub mod segmentation;
pub mod task_launcher;
pub mod task_service;
pub mod transcript_ingestion;
pub mod worker_client;

pub use authorization::{gate_from_config, AuthorizationGate, Caller, OpenGate, TokenGate};
pub use callback_handler::CallbackHandler;
pub use notifier::{AdminEvent, AdminNotifier, FailurePhase, LogNotifier, Notifier, WebhookNotifier};
pub use registry::{ProcessorRegistry, ResultProcessor};
pub use segmentation::{segment_utterances, Segment, SEGMENT_GAP_THRESHOLD};
pub use task_launcher::TaskLauncher;
pub use task_service::{LaunchJob, PollDecisionsJob, ProcessAgendaJob, TaskService, TranscribeJob};
pub use worker_client::{extract_error_message, HttpWorkerClient, WorkerClient, WorkerError};
