use tracing::info;

use crate::error::Result;
use crate::types::Digest;

/// Tells the requester that a digest finished aligning.
///
/// Called once per digest after it becomes ready. Failures are logged by the
/// pipeline and never affect the digest.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn digest_ready(&self, digest: &Digest) -> Result<()>;
}

/// Emits a log event instead of contacting anyone.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    async fn digest_ready(&self, digest: &Digest) -> Result<()> {
        info!(
            id = %digest.id,
            video = %digest.video_id,
            title = digest.title.as_deref().unwrap_or(""),
            "video digest ready for editing"
        );
        Ok(())
    }
}
