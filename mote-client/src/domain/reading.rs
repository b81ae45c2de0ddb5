use time::{
    format_description::{well_known::Rfc3339, FormatItem},
    macros::format_description,
    OffsetDateTime, PrimitiveDateTime,
};

const NAIVE_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
const NAIVE_FORMAT_SUBSEC: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond]");
const NAIVE_FORMAT_T: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");

/// Collection timestamp as written by the ingestion path.
///
/// Older rows may lack timezone information; those are `Naive` and must be
/// resolved against an assumed zone before comparison or display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectedAt {
    Aware(OffsetDateTime),
    Naive(PrimitiveDateTime),
}

impl CollectedAt {
    /// Text form used by backends without a native timestamp type.
    /// Aware values are RFC 3339, naive values omit the offset.
    pub fn to_storage_string(&self) -> Result<String, time::error::Format> {
        match self {
            Self::Aware(ts) => ts.format(&Rfc3339),
            Self::Naive(ts) => {
                if ts.nanosecond() == 0 {
                    ts.format(NAIVE_FORMAT)
                } else {
                    ts.format(NAIVE_FORMAT_SUBSEC)
                }
            }
        }
    }

    pub fn parse_storage(s: &str) -> Option<Self> {
        let s = s.trim();
        if let Ok(ts) = OffsetDateTime::parse(s, &Rfc3339) {
            return Some(Self::Aware(ts));
        }
        [NAIVE_FORMAT, NAIVE_FORMAT_SUBSEC, NAIVE_FORMAT_T]
            .iter()
            .find_map(|fmt| PrimitiveDateTime::parse(s, fmt).ok())
            .map(Self::Naive)
    }
}

impl From<OffsetDateTime> for CollectedAt {
    fn from(ts: OffsetDateTime) -> Self {
        Self::Aware(ts)
    }
}

impl From<PrimitiveDateTime> for CollectedAt {
    fn from(ts: PrimitiveDateTime) -> Self {
        Self::Naive(ts)
    }
}

/// A single device report. `last_collection` is the instantaneous value,
/// `total` the cumulative counter.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub device_id: i64,
    pub collected_at: CollectedAt,
    pub last_collection: f64,
    pub total: f64,
}
