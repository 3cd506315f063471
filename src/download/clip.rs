//! Byte-range planning for segmented transfers.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Default segment size (20 MiB).
pub const DEFAULT_SEGMENT_SIZE: u64 = 20 * 1024 * 1024;

/// Inclusive byte range used for `Range` requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub from: u64,
    /// `None` reads through the end of the resource.
    pub to: Option<u64>,
}

impl ByteRange {
    /// Open-ended range starting at `from`.
    pub fn from_offset(from: u64) -> Self {
        Self { from, to: None }
    }

    /// `Range` header value.
    pub fn header_value(&self) -> String {
        match self.to {
            Some(to) => format!("bytes={}-{}", self.from, to),
            None => format!("bytes={}-", self.from),
        }
    }
}

/// One contiguous byte range of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Clip {
    /// Dense 0-based position in the plan.
    pub index: usize,

    /// First byte, inclusive.
    pub from: u64,

    /// Last byte, inclusive. `None` reads through the end of the resource.
    pub to: Option<u64>,
}

impl Clip {
    pub fn range(&self) -> ByteRange {
        ByteRange {
            from: self.from,
            to: self.to,
        }
    }

    /// Byte count this clip must hold once complete, given the resource size.
    pub fn expected_len(&self, total: u64) -> u64 {
        match self.to {
            Some(to) => to - self.from + 1,
            None => total.saturating_sub(self.from),
        }
    }
}

/// Partition `[0, size)` into clips of `segment_size` bytes.
///
/// The final clip is open-ended and absorbs the remainder. A zero size or
/// segment size yields an empty plan.
pub fn get_all_clips(size: u64, segment_size: u64) -> Vec<Clip> {
    if size == 0 || segment_size == 0 {
        return Vec::new();
    }

    let count = size.div_ceil(segment_size) as usize;
    (0..count)
        .map(|index| {
            let from = index as u64 * segment_size;
            let to = if index + 1 == count {
                None
            } else {
                Some(from + segment_size - 1)
            };
            Clip { index, from, to }
        })
        .collect()
}

/// Temp file holding one clip: `<dest>.<index:05>.tmp`.
pub fn temp_path(dest: &Path, index: usize) -> PathBuf {
    let mut name = OsString::from(dest.as_os_str());
    name.push(format!(".{:05}.tmp", index));
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_partition(size: u64, segment: u64) {
        let clips = get_all_clips(size, segment);
        let mut next = 0u64;
        for (i, clip) in clips.iter().enumerate() {
            assert_eq!(clip.index, i);
            assert_eq!(clip.from, next);
            let len = clip.expected_len(size);
            assert!(len > 0);
            if clip.to.is_some() {
                assert_eq!(len, segment);
            }
            next += len;
        }
        assert_eq!(next, size);
        assert!(clips.last().unwrap().to.is_none());
    }

    #[test]
    fn test_partition_exact_and_remainder() {
        assert_partition(100, 10);
        assert_partition(105, 10);
        assert_partition(9, 10);
        assert_partition(1, 1);
        assert_partition(DEFAULT_SEGMENT_SIZE * 3 + 17, DEFAULT_SEGMENT_SIZE);
    }

    #[test]
    fn test_clip_layout() {
        let clips = get_all_clips(25, 10);
        assert_eq!(
            clips,
            vec![
                Clip { index: 0, from: 0, to: Some(9) },
                Clip { index: 1, from: 10, to: Some(19) },
                Clip { index: 2, from: 20, to: None },
            ]
        );
        assert_eq!(clips[0].range().header_value(), "bytes=0-9");
        assert_eq!(clips[2].range().header_value(), "bytes=20-");
        assert_eq!(ByteRange::from_offset(7).header_value(), "bytes=7-");
        assert_eq!(clips[2].expected_len(25), 5);
    }

    #[test]
    fn test_empty_plan() {
        assert!(get_all_clips(0, 10).is_empty());
        assert!(get_all_clips(10, 0).is_empty());
    }

    #[test]
    fn test_temp_path() {
        let dest = Path::new("/tmp/out/video.m4s");
        assert_eq!(
            temp_path(dest, 3),
            PathBuf::from("/tmp/out/video.m4s.00003.tmp")
        );
        assert_eq!(
            temp_path(dest, 12345),
            PathBuf::from("/tmp/out/video.m4s.12345.tmp")
        );
    }
}
