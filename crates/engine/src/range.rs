use thiserror::Error;

/// A byte range as requested, before validation against the resource size.
/// `end = None` means "to the end of the resource".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeRequest {
    pub start: u64,
    pub end: Option<u64>,
}

/// An inclusive byte span known to lie within a resource of `total_size`
/// bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedRange {
    pub start: u64,
    pub end: u64,
    pub total_size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("requested range is not satisfiable for a resource of {size} bytes")]
pub struct UnsatisfiableRange {
    pub size: u64,
}

impl RangeRequest {
    pub fn new(start: u64, end: Option<u64>) -> Self {
        Self { start, end }
    }

    /// Validates the request against the resource size and clamps an open
    /// or oversized end to the last byte. Unsatisfiable when the start is
    /// past the end of the resource or the span is inverted.
    pub fn resolve(self, size: u64) -> Result<ResolvedRange, UnsatisfiableRange> {
        if self.start >= size {
            return Err(UnsatisfiableRange { size });
        }
        if let Some(end) = self.end {
            if end < self.start {
                return Err(UnsatisfiableRange { size });
            }
        }
        let end = self.end.unwrap_or(size - 1).min(size - 1);
        Ok(ResolvedRange {
            start: self.start,
            end,
            total_size: size,
        })
    }
}

impl ResolvedRange {
    /// Number of bytes covered, both ends inclusive.
    pub fn length(&self) -> u64 {
        self.end - self.start + 1
    }
}
