//! Pending upload table
//!
//! Uploads are started on the platform and finish asynchronously. The table
//! correlates completions with the requests the frame made and bounds how
//! many can be in flight.

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;
use xframe_hal::UploadRequestId;

use crate::constants::MAX_PENDING_UPLOADS;
use crate::error::FrameError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingUpload {
    /// Logical names of the files in the request
    pub file_names: Vec<String>,
    pub started_ms: u64,
}

#[derive(Debug)]
pub(crate) struct UploadTable {
    pending: BTreeMap<UploadRequestId, PendingUpload>,
    /// Next request ID for correlation (wraps around, skips 0)
    next_request_id: UploadRequestId,
}

impl UploadTable {
    pub(crate) fn new() -> Self {
        Self {
            pending: BTreeMap::new(),
            next_request_id: 1,
        }
    }

    fn alloc_request_id(&mut self) -> UploadRequestId {
        let id = self.next_request_id;
        self.next_request_id = self.next_request_id.wrapping_add(1);
        if self.next_request_id == 0 {
            self.next_request_id = 1;
        }
        id
    }

    /// Enforces MAX_PENDING_UPLOADS.
    pub(crate) fn insert(&mut self, upload: PendingUpload) -> Result<UploadRequestId, FrameError> {
        if self.pending.len() >= MAX_PENDING_UPLOADS {
            return Err(FrameError::TooManyPendingUploads);
        }
        let id = self.alloc_request_id();
        self.pending.insert(id, upload);
        Ok(id)
    }

    pub(crate) fn remove(&mut self, id: UploadRequestId) -> Option<PendingUpload> {
        self.pending.remove(&id)
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }

    pub(crate) fn clear(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload() -> PendingUpload {
        PendingUpload { file_names: Vec::new(), started_ms: 0 }
    }

    #[test]
    fn test_ids_are_unique_and_nonzero() {
        let mut table = UploadTable::new();
        let a = table.insert(upload()).unwrap();
        let b = table.insert(upload()).unwrap();
        assert_ne!(a, 0);
        assert_ne!(a, b);
        assert!(table.remove(a).is_some());
        assert!(table.remove(a).is_none());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_bounded() {
        let mut table = UploadTable::new();
        for _ in 0..MAX_PENDING_UPLOADS {
            table.insert(upload()).unwrap();
        }
        assert_eq!(table.insert(upload()), Err(FrameError::TooManyPendingUploads));
    }

    #[test]
    fn test_id_wraps_past_zero() {
        let mut table = UploadTable::new();
        table.next_request_id = UploadRequestId::MAX;
        assert_eq!(table.insert(upload()).unwrap(), UploadRequestId::MAX);
        assert_eq!(table.insert(upload()).unwrap(), 1);
    }
}
