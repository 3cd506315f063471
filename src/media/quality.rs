//! Quality ordinal and codec lookup tables.

use crate::media::track::UNKNOWN_CODEC;

/// Human-readable label for a quality ordinal.
pub fn quality_description(qn: u32) -> String {
    let label = match qn {
        127 => "8K 超高清",
        126 => "杜比视界",
        125 => "HDR 真彩",
        120 => "4K 超清",
        116 => "1080P 高帧率",
        112 => "1080P 高码率",
        100 => "智能修复",
        80 => "1080P 高清",
        74 => "720P 高帧率",
        64 | 48 => "720P 高清",
        32 => "480P 清晰",
        16 => "360P 流畅",
        6 => "240P 流畅",
        5 => "144P 流畅",
        _ => return format!("未知画质({})", qn),
    };
    label.to_string()
}

/// Map a numeric video codec id to its name.
pub fn video_codec_name(codec_id: i64) -> &'static str {
    match codec_id {
        7 => "AVC",
        12 => "HEVC",
        13 => "AV1",
        _ => UNKNOWN_CODEC,
    }
}

/// Normalize an audio `codecs` tag.
///
/// Unrecognized tags are kept as-is; an empty tag becomes the unknown sentinel.
pub fn audio_codec_name(tag: &str) -> String {
    match tag {
        "mp4a.40.2" | "mp4a.40.5" => "M4A".to_string(),
        "ec-3" => "E-AC-3".to_string(),
        "fLaC" => "FLAC".to_string(),
        "" => UNKNOWN_CODEC.to_string(),
        other => other.to_string(),
    }
}
