//! Upload validation
//!
//! An upload is stored first, then probed as a database. A file that fails
//! any check after it was created is removed before the error is returned.
//! The same happens when the upload future is dropped part way, so nothing
//! that did not pass validation stays in the store.

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use std::fmt::Display;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::error::{InspectorError, InspectorResult, UploadRejection};
use crate::file_store::{extension_of, is_recognized_name, FileStore, StoredDatabaseFile};
use crate::query_db::DataQueryProvider;

/// Attempts at finding a free name before giving up.
const MAX_NAME_ATTEMPTS: usize = 16;

/// Strictly increasing upload tokens, seeded from the wall clock in milliseconds.
#[derive(Debug, Default)]
pub struct UploadTokens {
    last: AtomicU64,
}

impl UploadTokens {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> u64 {
        let now = u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0);
        match self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| Some(now.max(last + 1)))
        {
            Ok(previous) | Err(previous) => now.max(previous + 1),
        }
    }
}

/// Final path component of a client-supplied file name.
fn base_name(original_name: &str) -> &str {
    original_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(original_name)
}

/// `field-token[.ext]`, keeping the extension of the client's file name.
pub fn upload_name(field: &str, token: u64, original_name: &str) -> String {
    match extension_of(base_name(original_name)) {
        Some(ext) => format!("{}-{}.{}", field, token, ext),
        None => format!("{}-{}", field, token),
    }
}

/// Reject names whose extension is not a database extension.
pub fn check_extension(original_name: &str) -> Result<(), UploadRejection> {
    let base = base_name(original_name);
    if is_recognized_name(base) {
        Ok(())
    } else {
        let ext = extension_of(base).unwrap_or_default().to_string();
        Err(UploadRejection::UnsupportedExtension(ext))
    }
}

/// A created upload that has not passed validation yet. Dropping it while
/// armed removes the file; `commit` keeps it.
struct PendingUpload {
    store: Arc<FileStore>,
    entry: StoredDatabaseFile,
    armed: bool,
}

impl PendingUpload {
    fn new(store: Arc<FileStore>, entry: StoredDatabaseFile) -> Self {
        Self {
            store,
            entry,
            armed: true,
        }
    }

    fn entry(&self) -> &StoredDatabaseFile {
        &self.entry
    }

    fn commit(mut self) -> StoredDatabaseFile {
        self.armed = false;
        self.entry.clone()
    }

    /// Remove the file now and report how that went.
    fn discard(mut self) -> InspectorResult<()> {
        self.armed = false;
        self.store.discard(&self.entry)
    }
}

impl Drop for PendingUpload {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match self.store.discard(&self.entry) {
            Ok(()) => warn!("Upload {} abandoned, file removed", self.entry.name),
            Err(e) => warn!("Could not remove abandoned upload {}: {}", self.entry.name, e),
        }
    }
}

pub struct UploadValidator {
    store: Arc<FileStore>,
    provider: Arc<dyn DataQueryProvider>,
    max_bytes: u64,
    tokens: UploadTokens,
}

impl UploadValidator {
    pub fn new(store: Arc<FileStore>, provider: Arc<dyn DataQueryProvider>, max_bytes: u64) -> Self {
        Self {
            store,
            provider,
            max_bytes,
            tokens: UploadTokens::new(),
        }
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    async fn create_file(
        &self,
        field: &str,
        original_name: &str,
    ) -> InspectorResult<(PendingUpload, std::fs::File)> {
        for _ in 0..MAX_NAME_ATTEMPTS {
            let name = upload_name(field, self.tokens.next(), original_name);
            let store = Arc::clone(&self.store);
            let created = tokio::task::spawn_blocking(move || {
                store
                    .create_new(&name)
                    .map(|(entry, file)| (PendingUpload::new(Arc::clone(&store), entry), file))
            })
            .await?;
            match created {
                Err(InspectorError::AlreadyExists(name)) => {
                    debug!("Upload name {} already taken, retrying", name);
                }
                other => return other,
            }
        }
        Err(InspectorError::Internal(
            "could not find a free name for the upload".to_string(),
        ))
    }

    /// Remove a rejected upload, then hand back `reason`.
    async fn reject(&self, pending: PendingUpload, reason: InspectorError) -> InspectorError {
        let name = pending.entry().name.clone();
        match tokio::task::spawn_blocking(move || pending.discard()).await {
            Ok(Ok(())) => {
                info!("Discarded rejected upload {}: {}", name, reason);
                reason
            }
            Ok(Err(e)) => {
                warn!("Could not remove rejected upload {}: {}", name, e);
                e
            }
            Err(e) => e.into(),
        }
    }

    /// Store `chunks` under a fresh name and confirm it is a database.
    ///
    /// Does not activate the database.
    pub async fn validate_and_store<S, E>(
        &self,
        field: &str,
        original_name: &str,
        mut chunks: S,
    ) -> InspectorResult<StoredDatabaseFile>
    where
        S: Stream<Item = Result<Bytes, E>> + Unpin,
        E: Display,
    {
        check_extension(original_name)?;

        let (pending, file) = self.create_file(field, original_name).await?;
        debug!("Receiving upload {} as {}", original_name, pending.entry().name);

        let mut file = tokio::fs::File::from_std(file);
        let mut written: u64 = 0;
        let mut failure: Option<InspectorError> = None;

        while let Some(chunk) = chunks.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    failure = Some(InspectorError::io(
                        "receive upload",
                        std::io::Error::other(e.to_string()),
                    ));
                    break;
                }
            };
            written += chunk.len() as u64;
            if written > self.max_bytes {
                failure = Some(UploadRejection::TooLarge { limit: self.max_bytes }.into());
                break;
            }
            if let Err(e) = file.write_all(&chunk).await {
                failure = Some(InspectorError::io("store upload", e));
                break;
            }
        }

        if failure.is_none() {
            if let Err(e) = file.flush().await {
                failure = Some(InspectorError::io("store upload", e));
            }
        }
        drop(file);

        if let Some(reason) = failure {
            return Err(self.reject(pending, reason).await);
        }
        if written == 0 {
            return Err(self.reject(pending, UploadRejection::EmptyUpload.into()).await);
        }

        let provider = Arc::clone(&self.provider);
        let path = pending.entry().path.clone();
        let probe = match tokio::task::spawn_blocking(move || provider.probe(&path)).await {
            Ok(probe) => probe,
            Err(e) => return Err(self.reject(pending, e.into()).await),
        };
        if let Err(e) = probe {
            let reason = UploadRejection::InvalidDatabaseFormat(format!("{:#}", e));
            return Err(self.reject(pending, reason.into()).await);
        }

        let entry = pending.commit();
        info!("Accepted upload {} ({} bytes) as {}", original_name, written, entry.name);
        Ok(entry)
    }
}
