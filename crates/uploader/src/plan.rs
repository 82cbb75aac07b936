use streamvault_session::UploadSession;

pub use streamvault_store::{MAX_MULTIPART_PARTS, MIN_PART_SIZE};

/// Default slice size for multipart transfers, 10 MiB.
pub const DEFAULT_CHUNK_SIZE: u64 = 10 * 1024 * 1024;

/// One slice of the source file, addressed by its 1-based part number.
/// Part `p` covers `[(p-1)*chunk, min(size, p*chunk))`, so every part is
/// `chunk` bytes long except possibly the last.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartSpan {
    pub part_number: u32,
    pub offset: u64,
    pub length: u64,
}

/// Number of parts a file of `file_size` bytes splits into.
pub fn total_parts(file_size: u64, chunk_size: u64) -> u32 {
    if file_size == 0 || chunk_size == 0 {
        return 0;
    }
    file_size.div_ceil(chunk_size) as u32
}

/// Byte span for one part. `part_number` must be in `1..=total_parts`.
pub fn part_span(part_number: u32, file_size: u64, chunk_size: u64) -> PartSpan {
    let offset = u64::from(part_number - 1) * chunk_size;
    let end = (offset + chunk_size).min(file_size);
    PartSpan {
        part_number,
        offset,
        length: end - offset,
    }
}

/// Spans still missing from the session, in ascending part order.
pub fn pending_parts(session: &UploadSession, chunk_size: u64) -> Vec<PartSpan> {
    let total = total_parts(session.file_size, chunk_size);
    (1..=total)
        .filter(|number| !session.has_part(*number))
        .map(|number| part_span(number, session.file_size, chunk_size))
        .collect()
}
