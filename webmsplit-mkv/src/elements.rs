//! Matroska element ID constants.
//!
//! IDs are stored with their VINT marker bits, exactly as they appear in the
//! byte stream.

// =============================================================================
// EBML Header Elements
// =============================================================================

/// EBML header element.
pub const EBML: u32 = 0x1A45DFA3;
/// EBML version.
pub const EBML_VERSION: u32 = 0x4286;
/// EBML read version.
pub const EBML_READ_VERSION: u32 = 0x42F7;
/// Maximum ID length.
pub const EBML_MAX_ID_LENGTH: u32 = 0x42F2;
/// Maximum size length.
pub const EBML_MAX_SIZE_LENGTH: u32 = 0x42F3;
/// Document type.
pub const DOC_TYPE: u32 = 0x4282;
/// Document type version.
pub const DOC_TYPE_VERSION: u32 = 0x4287;
/// Document type read version.
pub const DOC_TYPE_READ_VERSION: u32 = 0x4285;

// =============================================================================
// Segment and Level-1 Elements
// =============================================================================

/// Segment (root container).
pub const SEGMENT: u32 = 0x18538067;
/// Seek Head.
pub const SEEK_HEAD: u32 = 0x114D9B74;
/// Seek entry.
pub const SEEK: u32 = 0x4DBB;
/// Seek ID.
pub const SEEK_ID: u32 = 0x53AB;
/// Seek Position.
pub const SEEK_POSITION: u32 = 0x53AC;
/// Segment Info.
pub const INFO: u32 = 0x1549A966;
/// Tracks.
pub const TRACKS: u32 = 0x1654AE6B;
/// Cluster.
pub const CLUSTER: u32 = 0x1F43B675;
/// Cues.
pub const CUES: u32 = 0x1C53BB6B;
/// Attachments.
pub const ATTACHMENTS: u32 = 0x1941A469;
/// Chapters.
pub const CHAPTERS: u32 = 0x1043A770;
/// Tags.
pub const TAGS: u32 = 0x1254C367;

// =============================================================================
// Segment Information
// =============================================================================

/// Timecode Scale (nanoseconds per tick).
pub const TIMECODE_SCALE: u32 = 0x2AD7B1;
/// Duration.
pub const DURATION: u32 = 0x4489;
/// Title.
pub const TITLE: u32 = 0x7BA9;
/// Muxing Application.
pub const MUXING_APP: u32 = 0x4D80;
/// Writing Application.
pub const WRITING_APP: u32 = 0x5741;

// =============================================================================
// Cluster Elements
// =============================================================================

/// Cluster Timestamp.
pub const TIMESTAMP: u32 = 0xE7;
/// Cluster Position.
pub const POSITION: u32 = 0xA7;
/// Previous Cluster Size.
pub const PREV_SIZE: u32 = 0xAB;
/// Simple Block.
pub const SIMPLE_BLOCK: u32 = 0xA3;
/// Block Group.
pub const BLOCK_GROUP: u32 = 0xA0;
/// Block.
pub const BLOCK: u32 = 0xA1;
/// Block Duration.
pub const BLOCK_DURATION: u32 = 0x9B;
/// Reference Block.
pub const REFERENCE_BLOCK: u32 = 0xFB;

// =============================================================================
// Track Elements
// =============================================================================

/// Track Entry.
pub const TRACK_ENTRY: u32 = 0xAE;
/// Track Number.
pub const TRACK_NUMBER: u32 = 0xD7;
/// Track UID.
pub const TRACK_UID: u32 = 0x73C5;
/// Track Type.
pub const TRACK_TYPE: u32 = 0x83;
/// Default Duration.
pub const DEFAULT_DURATION: u32 = 0x23E383;
/// Name.
pub const NAME: u32 = 0x536E;
/// Language.
pub const LANGUAGE: u32 = 0x22B59C;
/// Codec ID.
pub const CODEC_ID: u32 = 0x86;
/// Codec Private data.
pub const CODEC_PRIVATE: u32 = 0x63A2;
/// Codec Name.
pub const CODEC_NAME: u32 = 0x258688;

/// Video settings.
pub const VIDEO: u32 = 0xE0;
/// Pixel Width.
pub const PIXEL_WIDTH: u32 = 0xB0;
/// Pixel Height.
pub const PIXEL_HEIGHT: u32 = 0xBA;
/// Frame Rate.
pub const FRAME_RATE: u32 = 0x2383E3;

/// Audio settings.
pub const AUDIO: u32 = 0xE1;
/// Sampling Frequency.
pub const SAMPLING_FREQUENCY: u32 = 0xB5;
/// Channels.
pub const CHANNELS: u32 = 0x9F;
/// Bit Depth.
pub const BIT_DEPTH: u32 = 0x6264;

// =============================================================================
// Cueing Data
// =============================================================================

/// Cue Point.
pub const CUE_POINT: u32 = 0xBB;
/// Cue Time.
pub const CUE_TIME: u32 = 0xB3;
/// Cue Track Positions.
pub const CUE_TRACK_POSITIONS: u32 = 0xB7;
/// Cue Track.
pub const CUE_TRACK: u32 = 0xF7;
/// Cue Cluster Position.
pub const CUE_CLUSTER_POSITION: u32 = 0xF1;
/// Cue Relative Position.
pub const CUE_RELATIVE_POSITION: u32 = 0xF0;
/// Cue Block Number.
pub const CUE_BLOCK_NUMBER: u32 = 0x5378;

// =============================================================================
// Void and CRC
// =============================================================================

/// Void (padding).
pub const VOID: u32 = 0xEC;
/// CRC-32.
pub const CRC32: u32 = 0xBF;

// =============================================================================
// Track Types
// =============================================================================

/// Track type: Video.
pub const TRACK_TYPE_VIDEO: u64 = 1;
/// Track type: Audio.
pub const TRACK_TYPE_AUDIO: u64 = 2;

// =============================================================================
// Block Header Flags
// =============================================================================

/// SimpleBlock key frame flag.
pub const BLOCK_FLAG_KEYFRAME: u8 = 0x80;
/// Block invisible flag.
pub const BLOCK_FLAG_INVISIBLE: u8 = 0x08;
/// Block lacing bits.
pub const BLOCK_FLAG_LACING: u8 = 0x06;
/// SimpleBlock discardable flag.
pub const BLOCK_FLAG_DISCARDABLE: u8 = 0x01;

// =============================================================================
// Codec IDs
// =============================================================================

/// Matroska codec ID definitions for the codecs streams are built for.
pub mod codec_ids {
    /// VP8 video codec.
    pub const V_VP8: &str = "V_VP8";
    /// VP9 video codec.
    pub const V_VP9: &str = "V_VP9";
    /// AV1 video codec.
    pub const V_AV1: &str = "V_AV1";
    /// Opus audio codec.
    pub const A_OPUS: &str = "A_OPUS";
    /// Vorbis audio codec.
    pub const A_VORBIS: &str = "A_VORBIS";
}

/// Check if a video codec ID can be delivered by a stream.
pub fn is_supported_video_codec(codec_id: &str) -> bool {
    [codec_ids::V_VP8, codec_ids::V_VP9, codec_ids::V_AV1]
        .iter()
        .any(|id| id.eq_ignore_ascii_case(codec_id))
}

/// Check if an audio codec ID can be delivered by a stream.
pub fn is_supported_audio_codec(codec_id: &str) -> bool {
    [codec_ids::A_VORBIS, codec_ids::A_OPUS]
        .iter()
        .any(|id| id.eq_ignore_ascii_case(codec_id))
}

/// Check if an ID starts a level-1 element (a direct child of Segment).
///
/// An unknown-size cluster ends where the next one of these begins.
pub fn is_level1(id: u32) -> bool {
    matches!(
        id,
        SEEK_HEAD | INFO | TRACKS | CLUSTER | CUES | ATTACHMENTS | CHAPTERS | TAGS
    )
}

/// Human-readable element name for diagnostics.
pub fn element_name(id: u32) -> &'static str {
    match id {
        EBML => "EBML",
        SEGMENT => "Segment",
        SEEK_HEAD => "SeekHead",
        INFO => "Info",
        TRACKS => "Tracks",
        CLUSTER => "Cluster",
        CUES => "Cues",
        ATTACHMENTS => "Attachments",
        CHAPTERS => "Chapters",
        TAGS => "Tags",
        SIMPLE_BLOCK => "SimpleBlock",
        BLOCK_GROUP => "BlockGroup",
        VOID => "Void",
        CRC32 => "CRC-32",
        _ => "Unknown",
    }
}
