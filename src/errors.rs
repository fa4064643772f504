/// Result type for LoadError
pub type LoadResult<T, E = LoadError> = std::result::Result<T, E>;

/// Things that can go wrong while loading a beatmap into the engine.
///
/// These are deliberately coarse; a failed beatmap yields 0 pp / 0 SR and
/// must never poison other beatmaps in the same batch.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Error)]
pub enum LoadError {
    /// Empty or unreadable file contents
    #[error("failed to load file")]
    FileLoad,

    /// The file contains no timing points
    #[error("no timingpoints in file")]
    NoTimingPoints,

    /// The file contains no hit objects
    #[error("no objects in file")]
    NoObjects,

    /// More hit objects (or predicted slider scoring events) than the engine will accept
    #[error("too many objects in file")]
    TooManyHitObjects,

    /// A stop token was triggered mid-load
    #[error("async load interrupted")]
    LoadInterrupted,

    /// `Mode:` was not 0 (osu!standard)
    #[error("cannot load non-standard gamemode")]
    NonStdGamemode,

    /// The `osu file format v<N>` header is above the supported version
    #[error("unknown beatmap version")]
    UnknownVersion,

    /// Metadata was requested on a beatmap set instead of a difficulty
    #[error("tried to load metadata for beatmapset")]
    LoadMetadataOnBeatmapSet,
}

/// Result type for ParseError
pub type ParseResult<T, E = ParseError> = std::result::Result<T, E>;

/// Any kind of error encountered while parsing a single line.
///
/// Unlike [`LoadError`], these never fail a whole file by themselves; the
/// parser logs the offending line and moves on.
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum ParseError {
    #[error("error parsing int: {0}")]
    Int(#[from] std::num::ParseIntError),

    #[error("error parsing float: {0}")]
    Float(#[from] std::num::ParseFloatError),

    #[error("non-finite coordinate")]
    NonFiniteCoordinate,

    #[error("missing field {0}")]
    MissingField(&'static str),

    #[error("invalid hit object type: {0}")]
    InvalidObjectType(u32),

    #[error("invalid slider curve type: {0}")]
    InvalidCurveType(String),

    #[error("invalid timing point: {0}")]
    InvalidTimingPoint(&'static str),

    #[error("invalid color component")]
    InvalidColorComponent,
}
