//! Error taxonomy for the release engine.

use castoff_store::StoreError;
use serde::{Deserialize, Serialize};

/// The publisher step an error occurred in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishStep {
    CreateRelease,
    AttachAsset,
    NotifyChannel,
}

impl std::fmt::Display for PublishStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PublishStep::CreateRelease => "create-release",
            PublishStep::AttachAsset => "attach-asset",
            PublishStep::NotifyChannel => "notify-channel",
        };
        write!(f, "{name}")
    }
}

/// Release engine errors.
#[derive(Debug, thiserror::Error)]
pub enum ReleaseError {
    #[error("invalid tag: {0}")]
    InvalidTag(String),

    #[error("build failed for {platform_key}: {diagnostic}")]
    Build {
        platform_key: String,
        diagnostic: String,
    },

    #[error("artifact store error: {0}")]
    Store(#[from] StoreError),

    #[error("publish failed at {step}: {reason}")]
    Publish { step: PublishStep, reason: String },

    #[error("channel {channel} notification failed: {reason}")]
    ChannelNotify { channel: String, reason: String },

    #[error("invalid run config: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for release engine operations.
pub type Result<T> = std::result::Result<T, ReleaseError>;
