use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use tracing::debug;

use crate::detector::StreamErrorDetector;

/// Result of draining one upstream response body.
#[derive(Debug)]
pub enum ScanOutcome {
    /// The stream completed with no error signature; carries the full body.
    Clean(Bytes),
    /// An error signature appeared mid-stream. The partial buffer is
    /// discarded; nothing of this attempt ever reaches the client.
    ErrorDetected,
}

/// Read a response body to completion in bounded chunks, concatenating every
/// chunk into one buffer and checking each chunk against the detector as it
/// arrives.
///
/// The per-chunk check is the core of the shield: a 200 response that
/// degrades into an error payload partway through is abandoned on the first
/// flagged chunk instead of being drained to the end. Transport failures
/// during the read surface as `Err` so the caller can treat them like any
/// other connection-level fault.
pub async fn scan_stream<S, E>(
    mut stream: S,
    detector: &dyn StreamErrorDetector,
) -> Result<ScanOutcome, E>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
{
    let mut buffer = BytesMut::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if detector.detects(&chunk) {
            debug!(
                "🛡️  {} flagged a chunk after {} buffered bytes",
                detector.name(),
                buffer.len()
            );
            return Ok(ScanOutcome::ErrorDetected);
        }
        buffer.extend_from_slice(&chunk);
    }

    Ok(ScanOutcome::Clean(buffer.freeze()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::SignatureDetector;
    use futures::stream;
    use std::io;

    fn chunks(parts: &[&[u8]]) -> impl Stream<Item = Result<Bytes, io::Error>> + Unpin {
        let items: Vec<Result<Bytes, io::Error>> = parts
            .iter()
            .map(|p| Ok(Bytes::copy_from_slice(p)))
            .collect();
        stream::iter(items)
    }

    #[tokio::test]
    async fn test_clean_stream_is_buffered_byte_for_byte() {
        let stream = chunks(&[
            b"data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n",
            b"data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\n",
            b"data: [DONE]\n\n",
        ]);

        let outcome = scan_stream(stream, &SignatureDetector).await.unwrap();

        match outcome {
            ScanOutcome::Clean(buffer) => {
                let expected = b"data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n\
                    data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\ndata: [DONE]\n\n";
                assert_eq!(&buffer[..], &expected[..]);
            }
            ScanOutcome::ErrorDetected => panic!("clean stream was flagged"),
        }
    }

    #[tokio::test]
    async fn test_error_in_later_chunk_discards_attempt() {
        let stream = chunks(&[
            b"data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n",
            br#"data: {"error": {"code":"too_many_requests"}}"#,
        ]);

        let outcome = scan_stream(stream, &SignatureDetector).await.unwrap();

        assert!(matches!(outcome, ScanOutcome::ErrorDetected));
    }

    #[tokio::test]
    async fn test_error_in_first_chunk_discards_attempt() {
        let stream = chunks(&[br#"{"code":"too_many_requests"}"#]);

        let outcome = scan_stream(stream, &SignatureDetector).await.unwrap();

        assert!(matches!(outcome, ScanOutcome::ErrorDetected));
    }

    #[tokio::test]
    async fn test_empty_stream_is_clean_and_empty() {
        let stream = chunks(&[]);

        let outcome = scan_stream(stream, &SignatureDetector).await.unwrap();

        match outcome {
            ScanOutcome::Clean(buffer) => assert!(buffer.is_empty()),
            ScanOutcome::ErrorDetected => panic!("empty stream was flagged"),
        }
    }

    #[tokio::test]
    async fn test_read_failure_propagates() {
        let items: Vec<Result<Bytes, io::Error>> = vec![
            Ok(Bytes::from_static(b"data: partial")),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset")),
        ];

        let result = scan_stream(stream::iter(items), &SignatureDetector).await;

        assert!(result.is_err());
    }
}
