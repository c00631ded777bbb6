use thiserror::Error;

#[derive(Error, Debug)]
pub enum LiveError {
    #[error("HTTP error: {0}")]
    HttpError(reqwest::StatusCode),

    #[error(transparent)]
    RequestError(#[from] reqwest::Error),

    #[error(transparent)]
    UrlParseError(#[from] url::ParseError),

    // MPEG-DASH errors
    #[error(transparent)]
    MpdParseError(#[from] dash_mpd::DashMpdError),

    #[error("Invalid mpd: {0}")]
    MpdParsing(String),

    #[error("Invalid timing schema: {0:?}")]
    InvalidTimingSchema(String),

    #[error("Failed to parse date time: {0}")]
    DateTimeParsing(String),

    #[error(transparent)]
    ChronoParseError(#[from] chrono::ParseError),

    #[error(transparent)]
    TimeRangeError(#[from] chrono::OutOfRangeError),

    // Scheduler errors
    #[error("No stream in the manifest has any segment reference")]
    NoSegmentsAvailable,

    #[error("A manifest refresh is already in flight")]
    RefreshInFlight,

    #[error("No manifest has been loaded yet")]
    NotLoaded,

    #[error("Live session has been torn down")]
    SessionClosed,
}

pub type LiveResult<T> = Result<T, LiveError>;
