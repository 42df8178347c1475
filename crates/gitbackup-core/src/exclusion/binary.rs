//! Content sniffing for binary files.

/// Number of leading bytes inspected when sniffing a file.
pub const SNIFF_LIMIT: usize = 8 * 1024;

/// Maximum share of control characters (other than tab, LF and CR).
const MAX_CONTROL_RATIO: f64 = 0.01;

/// Maximum share of non-printable bytes.
const MAX_NON_PRINTABLE_RATIO: f64 = 0.30;

/// Returns true if `sample` looks like binary content.
///
/// A NUL byte is conclusive. Otherwise the sample is binary when more than
/// 1% of it is control characters or more than 30% is non-printable
/// (control characters and DEL). Bytes at or above 128 count as text so
/// UTF-8 documents are not misclassified. An empty sample is never binary.
pub fn looks_binary(sample: &[u8]) -> bool {
    let sample = &sample[..sample.len().min(SNIFF_LIMIT)];
    if sample.is_empty() {
        return false;
    }
    if sample.contains(&0) {
        return true;
    }

    let mut control = 0usize;
    let mut non_printable = 0usize;

    for &b in sample {
        match b {
            b'\t' | b'\n' | b'\r' => {},
            0..=31 => {
                control += 1;
                non_printable += 1;
            },
            127 => non_printable += 1,
            _ => {},
        }
    }

    let len = sample.len() as f64;
    control as f64 / len > MAX_CONTROL_RATIO || non_printable as f64 / len > MAX_NON_PRINTABLE_RATIO
}
