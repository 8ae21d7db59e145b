//! Hand persisted fault logs to the upload transport.

use super::error::BboxError;
use super::info::ErrorInfo;

/// Event upload transport. Takes a persisted log by path.
pub trait EventUploader: Sync {
    fn upload_event_by_file(&self, path: &str) -> Result<(), BboxError>;
}

/// Upload the fault log at `path` on behalf of the event described by `info`.
pub fn upload_fault_log(
    uploader: &dyn EventUploader,
    path: &str,
    info: &ErrorInfo,
) -> Result<(), BboxError> {
    log::info!(
        "blackbox: [{}] starts uploading event [{}]",
        info.module(),
        info.event()
    );
    let result = uploader.upload_event_by_file(path);
    log::info!(
        "blackbox: [{}] ends uploading event [{}]",
        info.module(),
        info.event()
    );
    result
}
