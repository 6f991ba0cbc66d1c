/// Trait for mid-stream error detectors
/// A detector flags response chunks that carry an error payload even though
/// the response began with a success status. Implementations must be cheap
/// enough to run on every chunk.
pub trait StreamErrorDetector: Send + Sync {
    fn detects(&self, chunk: &[u8]) -> bool;
    fn name(&self) -> &str;
}

/// Literal signature rate-limited backends embed in streamed error payloads
const TOO_MANY_REQUESTS_SIGNATURE: &[u8] = br#""code":"too_many_requests""#;

/// Generic error envelope signature
const ERROR_ENVELOPE_SIGNATURE: &[u8] = br#""error":"#;

/// Substring matcher for the two error signatures observed in the wild.
///
/// Matching raw bytes is a heuristic: a completion that legitimately contains
/// the text `"error":` triggers a retry, and a differently-worded error slips
/// through. Kept behind the trait so a stronger detector can replace it.
// TODO: match on parsed SSE events instead of raw bytes once the target's
// error format is pinned down.
pub struct SignatureDetector;

impl StreamErrorDetector for SignatureDetector {
    fn detects(&self, chunk: &[u8]) -> bool {
        contains(chunk, TOO_MANY_REQUESTS_SIGNATURE) || contains(chunk, ERROR_ENVELOPE_SIGNATURE)
    }

    fn name(&self) -> &str {
        "SignatureDetector"
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}
