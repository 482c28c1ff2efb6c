use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Local, TimeZone, Utc};
use rayon::prelude::*;
use tracing::debug;

use crate::album::Album;

pub const LAST_PLAYED_FORMAT: &str = "%m/%d/%Y %I:%M %P";

/// Typed value of one cell. Drives both sorting and the default rendering.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Absent,
    Number(f64),
    Text(String),
    Time(DateTime<Utc>),
}

impl CellValue {
    fn rank(&self) -> u8 {
        match self {
            CellValue::Absent => 0,
            CellValue::Number(_) => 1,
            CellValue::Text(_) => 2,
            CellValue::Time(_) => 3,
        }
    }

    /// Total order used for sorting. Absent is the lowest value, values of
    /// different kinds are ordered by kind.
    pub fn compare(&self, other: &CellValue) -> Ordering {
        match (self, other) {
            (CellValue::Number(a), CellValue::Number(b)) => a.total_cmp(b),
            (CellValue::Text(a), CellValue::Text(b)) => a.cmp(b),
            (CellValue::Time(a), CellValue::Time(b)) => a.cmp(b),
            (a, b) => a.rank().cmp(&b.rank()),
        }
    }

    pub fn display(&self) -> String {
        match self {
            CellValue::Absent => String::new(),
            CellValue::Number(n) => n.to_string(),
            CellValue::Text(s) => s.clone(),
            CellValue::Time(t) => t.to_rfc3339(),
        }
    }
}

impl From<Option<f64>> for CellValue {
    fn from(value: Option<f64>) -> Self {
        value.map(CellValue::Number).unwrap_or(CellValue::Absent)
    }
}

impl From<Option<DateTime<Utc>>> for CellValue {
    fn from(value: Option<DateTime<Utc>>) -> Self {
        value.map(CellValue::Time).unwrap_or(CellValue::Absent)
    }
}

/// Album fields that can be shown without a derivation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Field {
    AlbumTitle,
    AvgUserRating,
    BandName,
    LastListened,
    ReleaseDate,
}

impl Field {
    fn get(&self, album: &Album) -> CellValue {
        match self {
            Field::AlbumTitle => CellValue::Text(album.album_title.clone()),
            Field::AvgUserRating => album.avg_user_rating.into(),
            Field::BandName => CellValue::Text(album.band_name.clone()),
            Field::LastListened => album.last_listened.into(),
            Field::ReleaseDate => CellValue::Text(album.release_date.clone()),
        }
    }
}

pub enum Accessor {
    Field(Field),
    Derived(fn(&Album) -> CellValue),
}

pub struct ColumnDef {
    pub id: &'static str,
    pub header: &'static str,
    pub accessor: Accessor,
    /// Custom cell renderer, [`CellValue::display`] is used when missing.
    pub cell: Option<fn(&CellValue) -> String>,
}

impl ColumnDef {
    pub fn value(&self, album: &Album) -> CellValue {
        match &self.accessor {
            Accessor::Field(field) => field.get(album),
            Accessor::Derived(derive) => derive(album),
        }
    }

    pub fn render(&self, value: &CellValue) -> String {
        match self.cell {
            Some(cell) => cell(value),
            None => value.display(),
        }
    }
}

pub static ALBUM_COLUMNS: [ColumnDef; 6] = [
    ColumnDef {
        id: "album_title",
        header: "Album Title",
        accessor: Accessor::Field(Field::AlbumTitle),
        cell: None,
    },
    ColumnDef {
        id: "avg_user_rating",
        header: "Avg User Rating",
        accessor: Accessor::Field(Field::AvgUserRating),
        cell: Some(render_rating),
    },
    ColumnDef {
        id: "band_name",
        header: "Band Name",
        accessor: Accessor::Field(Field::BandName),
        cell: None,
    },
    ColumnDef {
        id: "genres",
        header: "Genres",
        accessor: Accessor::Derived(joined_genres),
        cell: None,
    },
    ColumnDef {
        id: "last_listened",
        header: "Last Played",
        accessor: Accessor::Field(Field::LastListened),
        cell: Some(render_last_played),
    },
    ColumnDef {
        id: "release_date",
        header: "Release Date",
        accessor: Accessor::Field(Field::ReleaseDate),
        cell: None,
    },
];

fn joined_genres(album: &Album) -> CellValue {
    CellValue::Text(album.genres.join(","))
}

fn render_rating(value: &CellValue) -> String {
    match value {
        CellValue::Number(rating) => round_one_decimal(*rating),
        other => other.display(),
    }
}

fn render_last_played(value: &CellValue) -> String {
    match value {
        CellValue::Time(ts) => format_timestamp(Some(*ts)),
        CellValue::Absent => format_timestamp(None),
        other => other.display(),
    }
}

/// Round half up to one decimal place, 4.55 -> "4.6".
///
/// Works on the shortest decimal text of the value, so 1.15 rounds to "1.2"
/// even though the nearest double is slightly below it.
pub fn round_one_decimal(value: f64) -> String {
    if !value.is_finite() {
        return format!("{value:.1}");
    }
    let text = value.abs().to_string();
    let (whole, fraction) = text.split_once('.').unwrap_or((text.as_str(), ""));
    let mut fraction = fraction.bytes();
    let tenth = fraction.next().unwrap_or(b'0');
    let round_up = fraction.next().is_some_and(|d| d >= b'5');

    let mut digits: Vec<u8> = whole.bytes().chain([tenth]).collect();
    if round_up {
        let mut carry = true;
        for d in digits.iter_mut().rev() {
            if *d == b'9' {
                *d = b'0';
            } else {
                *d += 1;
                carry = false;
                break;
            }
        }
        if carry {
            digits.insert(0, b'1');
        }
    }

    let sign = if value < 0.0 && digits.iter().any(|d| *d != b'0') {
        "-"
    } else {
        ""
    };
    let (whole, tenth) = digits.split_at(digits.len() - 1);
    format!(
        "{sign}{}.{}",
        String::from_utf8_lossy(whole),
        tenth[0] as char
    )
}

/// Formats a last-played timestamp in the local time zone. A missing timestamp
/// renders as empty text.
pub fn format_timestamp(ts: Option<DateTime<Utc>>) -> String {
    format_timestamp_in(ts, &Local)
}

pub fn format_timestamp_in<Tz>(ts: Option<DateTime<Utc>>, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    ts.map(|t| t.with_timezone(tz).format(LAST_PLAYED_FORMAT).to_string())
        .unwrap_or_default()
}

/// All values of one column, in record order.
#[derive(Debug, Clone)]
pub struct ColumnData {
    pub id: &'static str,
    pub header: &'static str,
    pub values: Vec<CellValue>,
    pub cells: Vec<String>,
    pub max_width: usize,
}

impl ColumnData {
    fn load(def: &ColumnDef, records: &[Album]) -> Self {
        let values: Vec<CellValue> = records.iter().map(|r| def.value(r)).collect();
        let cells: Vec<String> = values
            .iter()
            .map(|v| def.render(v).replace("\r\n", " ↵ ").replace('\n', " ↵ "))
            .collect();
        let max_width = cells
            .iter()
            .map(|c| c.chars().count())
            .max()
            .unwrap_or(0);

        ColumnData {
            id: def.id,
            header: def.header,
            values,
            cells,
            max_width,
        }
    }

    pub fn as_string(&self) -> String {
        format!(
            "\"{}\" ({}), width_max: {}, # rows {}",
            self.header,
            self.id,
            self.max_width,
            self.cells.len()
        )
    }
}

/// Evaluates every column over all records. Each column is built in its own rayon task.
pub fn materialize(defs: &[ColumnDef], records: &[Album]) -> Vec<ColumnData> {
    let columns: Vec<ColumnData> = defs
        .par_iter()
        .map(|def| ColumnData::load(def, records))
        .collect();
    for c in columns.iter() {
        debug!("Column: {}", c.as_string());
    }
    columns
}
