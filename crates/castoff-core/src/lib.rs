//! Castoff Core - release orchestration engine
//!
//! Given a tagged commit, castoff builds one artifact per target platform
//! in parallel, collects the binaries in a per-run artifact store, and
//! publishes a single atomic release only once every build succeeded,
//! fanning out to secondary distribution channels afterwards.
//!
//! The stages:
//! - Tag resolver derives the release identity from the version tag
//! - Job scheduler fans out build jobs and gates publish on the join
//! - Build runner executes one recipe and deposits one artifact
//! - Release publisher creates, attaches, and notifies idempotently

pub mod error;
pub mod identity;
pub mod job;
pub mod pipeline;
pub mod publisher;
pub mod report;
pub mod runner;
pub mod scheduler;
pub mod telemetry;

// Re-export key types
pub use error::{PublishStep, ReleaseError, Result};
pub use identity::TagResolver;
pub use job::{BuildJob, BuildRecipe, JobStatus};
pub use pipeline::ReleasePipeline;
pub use publisher::{ChannelOutcome, FailedAsset, PublishRecord, ReleasePublisher};
pub use report::{BuildResult, RunReport, RunStatus};
pub use runner::{BuildOutcome, BuildRunner};
pub use scheduler::{JobScheduler, SchedulerRun};
pub use telemetry::init_tracing;
