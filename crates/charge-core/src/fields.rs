//! Header-to-field resolution.
//!
//! Export files name their columns however the charger vendor likes
//! (`"Station ID"`, `"Energy (kWh)"`, `"charger_kw"`). Each canonical field
//! carries an ordered list of alias substrings; a header matches a field when
//! its normalized form contains one of them.

use crate::models::{CanonicalField, RawRow, RawValue};

// ── Alias table ───────────────────────────────────────────────────────────────

const STATION_ID_ALIASES: &[&str] = &["station_id", "stationid", "station", "site_id", "id"];
const TIMESTAMP_ALIASES: &[&str] = &[
    "timestamp",
    "start_time",
    "started_at",
    "datetime",
    "date",
    "start",
];
// Plain "kw" is deliberately absent: it would also match "energy_(kwh)".
const ENERGY_ALIASES: &[&str] = &["energy_delivered", "energy", "kwh", "consumption"];
const DURATION_ALIASES: &[&str] = &["session_duration", "duration", "minutes", "charging_time"];
const POWER_ALIASES: &[&str] = &["power_rating", "max_power", "power", "rating", "charger_kw"];
const STATUS_ALIASES: &[&str] = &["status", "state", "result"];
const LOCATION_ALIASES: &[&str] = &["location", "address", "site_name", "city"];

impl CanonicalField {
    /// Alias substrings for this field, highest priority first.
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            CanonicalField::StationId => STATION_ID_ALIASES,
            CanonicalField::Timestamp => TIMESTAMP_ALIASES,
            CanonicalField::EnergyDelivered => ENERGY_ALIASES,
            CanonicalField::SessionDuration => DURATION_ALIASES,
            CanonicalField::PowerRating => POWER_ALIASES,
            CanonicalField::Status => STATUS_ALIASES,
            CanonicalField::Location => LOCATION_ALIASES,
        }
    }

    /// Every field the resolver knows about, required ones first.
    pub fn all() -> [CanonicalField; 7] {
        [
            CanonicalField::StationId,
            CanonicalField::Timestamp,
            CanonicalField::EnergyDelivered,
            CanonicalField::SessionDuration,
            CanonicalField::PowerRating,
            CanonicalField::Status,
            CanonicalField::Location,
        ]
    }

    fn slot(self) -> usize {
        self as usize
    }
}

/// Lower-case `header` and collapse each run of whitespace into one `_`.
///
/// ```
/// use charge_core::fields::normalize_header;
///
/// assert_eq!(normalize_header("Energy (kWh)"), "energy_(kwh)");
/// assert_eq!(normalize_header("  Station   ID "), "station_id");
/// ```
pub fn normalize_header(header: &str) -> String {
    header
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("_")
}

// ── ColumnMap ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
struct Column {
    index: usize,
    header: String,
}

/// Column of every canonical field for one header layout.
///
/// Built once per file and reused for each of its rows. Every field is
/// resolved on its own: its aliases are tried in priority order and, for each
/// alias, the headers are scanned left to right; the first header containing
/// it wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMap {
    columns: [Option<Column>; 7],
}

impl ColumnMap {
    pub fn from_headers<'h>(headers: impl IntoIterator<Item = &'h str>) -> Self {
        let headers: Vec<&str> = headers.into_iter().collect();
        let normalized: Vec<String> = headers.iter().map(|h| normalize_header(h)).collect();

        let mut map = ColumnMap::default();
        for field in CanonicalField::all() {
            let found = field
                .aliases()
                .iter()
                .find_map(|alias| normalized.iter().position(|h| h.contains(alias)));
            if let Some(index) = found {
                map.columns[field.slot()] = Some(Column {
                    index,
                    header: headers[index].to_string(),
                });
            }
        }
        map
    }

    pub fn for_row(row: &RawRow) -> Self {
        Self::from_headers(row.headers())
    }

    /// Position of the column resolving `field`.
    pub fn column(&self, field: CanonicalField) -> Option<usize> {
        self.columns[field.slot()].as_ref().map(|c| c.index)
    }

    /// Original header text of the column resolving `field`.
    pub fn header(&self, field: CanonicalField) -> Option<&str> {
        self.columns[field.slot()].as_ref().map(|c| c.header.as_str())
    }

    pub fn has(&self, field: CanonicalField) -> bool {
        self.columns[field.slot()].is_some()
    }

    /// Required fields without a column, in canonical order.
    pub fn missing_required(&self) -> Vec<CanonicalField> {
        CanonicalField::REQUIRED
            .iter()
            .copied()
            .filter(|field| !self.has(*field))
            .collect()
    }

    /// The value of `field` in `row`; `None` when unmapped or blank.
    ///
    /// A row whose layout differs from the mapped one is resolved on its own.
    pub fn value<'r>(&self, row: &'r RawRow, field: CanonicalField) -> Option<&'r RawValue> {
        let column = self.columns[field.slot()].as_ref()?;
        let value = match row.cells().get(column.index) {
            Some((header, value)) if *header == column.header => value,
            _ => return FieldResolver::resolve(row, field),
        };
        if value.is_empty() {
            None
        } else {
            Some(value)
        }
    }
}

// ── FieldResolver ─────────────────────────────────────────────────────────────

/// Stateless lookup of canonical fields in raw rows.
pub struct FieldResolver;

impl FieldResolver {
    /// Resolve every field against `headers`.
    pub fn map<'h>(headers: impl IntoIterator<Item = &'h str>) -> ColumnMap {
        ColumnMap::from_headers(headers)
    }

    /// The value of `field` in a single `row`.
    ///
    /// Returns `None` when no header matches or the matched cell is blank.
    pub fn resolve(row: &RawRow, field: CanonicalField) -> Option<&RawValue> {
        let map = ColumnMap::for_row(row);
        let index = map.column(field)?;
        let (_, value) = row.cells().get(index)?;
        if value.is_empty() {
            None
        } else {
            Some(value)
        }
    }

    /// Required fields with no matching header in `headers`.
    pub fn missing_required<'h>(headers: impl IntoIterator<Item = &'h str>) -> Vec<CanonicalField> {
        ColumnMap::from_headers(headers).missing_required()
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
