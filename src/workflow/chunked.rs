//! Ordered, sequential upload of a payload that may not fit in one
//! transaction.
//!
//! The payload is split into chunks of at most `chunk_size` bytes. Chunks are
//! handed to a [`ChunkSink`] one at a time; the next chunk is not sent until
//! the previous one is acknowledged in full. The upload counts as complete
//! only when the acknowledged bytes add up to the payload length.

use std::num::NonZeroUsize;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk<'a> {
    /// 0-based position of the chunk.
    pub index: usize,
    pub total: usize,
    /// Byte offset of the chunk within the payload.
    pub offset: usize,
    pub bytes: &'a [u8],
}

/// What the storage confirmed for one chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkAck {
    pub bytes: usize,
}

/// Storage that accepts a payload as appended chunks.
#[async_trait]
pub trait ChunkSink: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn append(&self, chunk: Chunk<'_>) -> Result<ChunkAck, Self::Error>;
}

#[derive(Debug, Error)]
pub enum ChunkUploadError<E: std::error::Error + 'static> {
    #[error("payload of {payload_len} bytes needs {required} chunks of {chunk_size} bytes, limit is {max_chunks}")]
    TooManyChunks {
        payload_len: usize,
        chunk_size: usize,
        required: usize,
        max_chunks: usize,
    },

    #[error("chunk index {chunk_index} of {total_chunks} failed after {bytes_acknowledged} bytes: {source}")]
    ChunkFailed {
        chunk_index: usize,
        total_chunks: usize,
        bytes_acknowledged: usize,
        #[source]
        source: E,
    },

    #[error("chunk index {chunk_index} of {total_chunks} acknowledged {acknowledged} of {expected} bytes")]
    ShortAcknowledgment {
        chunk_index: usize,
        total_chunks: usize,
        expected: usize,
        acknowledged: usize,
        bytes_acknowledged: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadSummary {
    pub chunks: usize,
    pub bytes: usize,
}

/// Number of chunks `payload_len` bytes occupy.
pub fn chunk_count(payload_len: usize, chunk_size: NonZeroUsize) -> usize {
    payload_len.div_ceil(chunk_size.get())
}

pub fn split_into_chunks(payload: &[u8], chunk_size: NonZeroUsize) -> impl Iterator<Item = Chunk<'_>> {
    let total = chunk_count(payload.len(), chunk_size);
    payload
        .chunks(chunk_size.get())
        .enumerate()
        .map(move |(index, bytes)| Chunk {
            index,
            total,
            offset: index * chunk_size.get(),
            bytes,
        })
}

pub async fn upload_chunks<S: ChunkSink + ?Sized>(
    sink: &S,
    payload: &[u8],
    chunk_size: NonZeroUsize,
    max_chunks: usize,
) -> Result<UploadSummary, ChunkUploadError<S::Error>> {
    let total_chunks = chunk_count(payload.len(), chunk_size);
    if total_chunks > max_chunks {
        return Err(ChunkUploadError::TooManyChunks {
            payload_len: payload.len(),
            chunk_size: chunk_size.get(),
            required: total_chunks,
            max_chunks,
        });
    }

    let mut bytes_acknowledged = 0;
    for chunk in split_into_chunks(payload, chunk_size) {
        let chunk_index = chunk.index;
        let expected = chunk.bytes.len();

        let ack = sink
            .append(chunk)
            .await
            .map_err(|source| ChunkUploadError::ChunkFailed {
                chunk_index,
                total_chunks,
                bytes_acknowledged,
                source,
            })?;

        if ack.bytes != expected {
            return Err(ChunkUploadError::ShortAcknowledgment {
                chunk_index,
                total_chunks,
                expected,
                acknowledged: ack.bytes,
                bytes_acknowledged,
            });
        }
        bytes_acknowledged += ack.bytes;

        debug!(
            chunk = chunk_index + 1,
            total_chunks,
            bytes_acknowledged,
            payload_len = payload.len(),
            "Chunk acknowledged"
        );
    }

    Ok(UploadSummary {
        chunks: total_chunks,
        bytes: bytes_acknowledged,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::Mutex;

    #[derive(Debug, Error)]
    #[error("storage rejected chunk {0}")]
    struct StorageRejected(usize);

    /// In-memory storage that records every append in arrival order.
    #[derive(Default)]
    struct RecordingStorage {
        appended: Mutex<Vec<(usize, usize, Vec<u8>)>>,
        fail_at: Option<usize>,
        short_ack_at: Option<usize>,
    }

    impl RecordingStorage {
        async fn assembled(&self) -> Vec<u8> {
            self.appended
                .lock()
                .await
                .iter()
                .flat_map(|(_, _, bytes)| bytes.iter().copied())
                .collect()
        }
    }

    #[async_trait]
    impl ChunkSink for RecordingStorage {
        type Error = StorageRejected;

        async fn append(&self, chunk: Chunk<'_>) -> Result<ChunkAck, StorageRejected> {
            if self.fail_at == Some(chunk.index) {
                return Err(StorageRejected(chunk.index));
            }
            self.appended
                .lock()
                .await
                .push((chunk.index, chunk.offset, chunk.bytes.to_vec()));
            let bytes = if self.short_ack_at == Some(chunk.index) {
                chunk.bytes.len() - 1
            } else {
                chunk.bytes.len()
            };
            Ok(ChunkAck { bytes })
        }
    }

    fn payload(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 31 % 251) as u8).collect()
    }

    fn size(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    #[test]
    fn test_split_covers_payload_in_order() {
        let data = payload(10);
        let chunks: Vec<_> = split_into_chunks(&data, size(4)).collect();

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].bytes.len(), 2);
        assert_eq!(chunks[1].offset, 4);
        assert!(chunks.iter().all(|c| c.total == 3));
        assert_eq!(chunk_count(0, size(4)), 0);
        assert_eq!(chunk_count(8, size(4)), 2);
    }

    #[tokio::test]
    async fn test_large_payload_reassembles_byte_for_byte() {
        let data = payload(4096 * 3 + 123);
        let storage = RecordingStorage::default();

        let summary = upload_chunks(&storage, &data, size(4096), 10).await.unwrap();

        assert_eq!(summary, UploadSummary { chunks: 4, bytes: data.len() });
        assert_eq!(storage.assembled().await, data);
        let order: Vec<(usize, usize)> = storage
            .appended
            .lock()
            .await
            .iter()
            .map(|(index, offset, _)| (*index, *offset))
            .collect();
        assert_eq!(order, vec![(0, 0), (1, 4096), (2, 8192), (3, 12288)]);
    }

    #[tokio::test]
    async fn test_failed_chunk_stops_upload() {
        let data = payload(4096 * 3);
        let storage = RecordingStorage {
            fail_at: Some(1),
            ..Default::default()
        };

        let err = upload_chunks(&storage, &data, size(4096), 10).await.unwrap_err();
        match err {
            ChunkUploadError::ChunkFailed {
                chunk_index,
                total_chunks,
                bytes_acknowledged,
                ..
            } => {
                assert_eq!(chunk_index, 1);
                assert_eq!(total_chunks, 3);
                assert_eq!(bytes_acknowledged, 4096);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(storage.appended.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_short_acknowledgment_is_an_error() {
        let data = payload(100);
        let storage = RecordingStorage {
            short_ack_at: Some(0),
            ..Default::default()
        };

        let err = upload_chunks(&storage, &data, size(64), 10).await.unwrap_err();
        assert!(matches!(
            err,
            ChunkUploadError::ShortAcknowledgment {
                expected: 64,
                acknowledged: 63,
                bytes_acknowledged: 0,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_chunk_limit_checked_before_first_append() {
        let data = payload(4096 * 11);
        let storage = RecordingStorage::default();

        let err = upload_chunks(&storage, &data, size(4096), 10).await.unwrap_err();
        assert!(matches!(
            err,
            ChunkUploadError::TooManyChunks {
                required: 11,
                max_chunks: 10,
                ..
            }
        ));
        assert!(storage.appended.lock().await.is_empty());
    }
}
