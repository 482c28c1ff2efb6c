use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::album::Album;
use crate::columns::{ColumnData, ColumnDef, materialize};
use crate::storage::KeyValueStore;

pub const SORT_BY_KEY: &str = "sortBy";
pub const DEFAULT_SORT_COLUMN: &str = "last_listened";

/// One entry of the persisted sort specification, `{"id": .., "desc": ..}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortEntry {
    pub id: String,
    pub desc: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn indicator(self) -> &'static str {
        match self {
            SortDirection::Ascending => "▲",
            SortDirection::Descending => "▼",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ActiveSort {
    column: usize,
    direction: SortDirection,
}

/// What the store holds under [`SORT_BY_KEY`]. `[]` is a valid, unsorted table.
enum StoredSort {
    Sorted(ActiveSort),
    Unsorted,
    Unusable,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeaderCell {
    pub id: &'static str,
    pub label: &'static str,
    pub sorted: Option<SortDirection>,
}

impl HeaderCell {
    /// Label followed by the sort indicator, if any.
    pub fn title(&self) -> String {
        match self.sorted {
            Some(direction) => format!("{} {}", self.label, direction.indicator()),
            None => self.label.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedTable {
    pub headers: Vec<HeaderCell>,
    pub rows: Vec<Vec<String>>,
}

/// Records shaped into columns, ordered by at most one active sort column.
/// Every change of the sort is written back to the store under [`SORT_BY_KEY`].
pub struct SortableTable {
    columns: Vec<ColumnData>,
    rows: Vec<usize>, // Display position -> record index
    sort_by: Option<ActiveSort>,
    store: Box<dyn KeyValueStore>,
}

impl SortableTable {
    pub fn init(defs: &[ColumnDef], records: &[Album], store: Box<dyn KeyValueStore>) -> Self {
        let columns = materialize(defs, records);
        let mut table = SortableTable {
            rows: (0..records.len()).collect(),
            columns,
            sort_by: None,
            store,
        };
        table.sort_by = match table.load_sort_spec() {
            StoredSort::Sorted(active) => Some(active),
            StoredSort::Unsorted => None,
            StoredSort::Unusable => table.default_sort(),
        };
        info!("Initial sort: {:?}", table.sort_spec());
        table.apply_sort();
        table
    }

    fn load_sort_spec(&self) -> StoredSort {
        let Some(stored) = self.store.get(SORT_BY_KEY) else {
            return StoredSort::Unusable;
        };
        let entries: Vec<SortEntry> = match serde_json::from_str(&stored) {
            Ok(entries) => entries,
            Err(e) => {
                debug!("Ignoring malformed {SORT_BY_KEY} \"{stored}\": {e}");
                return StoredSort::Unusable;
            }
        };
        let Some(entry) = entries.first() else {
            return StoredSort::Unsorted;
        };
        let Some(column) = self.column_index(&entry.id) else {
            debug!("Ignoring {SORT_BY_KEY} for unknown column \"{}\"", entry.id);
            return StoredSort::Unusable;
        };
        let direction = if entry.desc {
            SortDirection::Descending
        } else {
            SortDirection::Ascending
        };
        StoredSort::Sorted(ActiveSort { column, direction })
    }

    fn default_sort(&self) -> Option<ActiveSort> {
        self.column_index(DEFAULT_SORT_COLUMN).map(|column| ActiveSort {
            column,
            direction: SortDirection::Descending,
        })
    }

    pub fn column_index(&self, id: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.id == id)
    }

    /// Cycles the sort of a column: none -> ascending -> descending -> none.
    /// Activating a column clears the sort of every other column.
    pub fn toggle_sort(&mut self, id: &str) -> bool {
        let Some(column) = self.column_index(id) else {
            warn!("Cannot sort by unknown column \"{id}\"");
            return false;
        };
        self.sort_by = match self.sort_by {
            Some(active) if active.column == column => match active.direction {
                SortDirection::Ascending => Some(ActiveSort {
                    column,
                    direction: SortDirection::Descending,
                }),
                SortDirection::Descending => None,
            },
            _ => Some(ActiveSort {
                column,
                direction: SortDirection::Ascending,
            }),
        };
        self.apply_sort();
        self.persist_sort_spec();
        true
    }

    fn apply_sort(&mut self) {
        self.rows = (0..self.rows.len()).collect();
        let Some(active) = self.sort_by else {
            return;
        };
        let values = &self.columns[active.column].values;
        // Stable sort: equal keys keep their fetch order in both directions
        match active.direction {
            SortDirection::Ascending => self.rows.sort_by(|&a, &b| values[a].compare(&values[b])),
            SortDirection::Descending => self.rows.sort_by(|&a, &b| values[b].compare(&values[a])),
        }
    }

    fn persist_sort_spec(&mut self) {
        let spec = self.sort_spec();
        match serde_json::to_string(&spec) {
            Ok(value) => {
                if let Err(e) = self.store.set(SORT_BY_KEY, &value) {
                    warn!("Failed to persist sort specification: {e}");
                }
            }
            Err(e) => warn!("Failed to serialize sort specification: {e}"),
        }
    }

    pub fn sort_spec(&self) -> Vec<SortEntry> {
        self.sort_by
            .iter()
            .map(|active| SortEntry {
                id: self.columns[active.column].id.to_string(),
                desc: active.direction == SortDirection::Descending,
            })
            .collect()
    }

    pub fn sorted_column(&self) -> Option<(usize, SortDirection)> {
        self.sort_by.map(|active| (active.column, active.direction))
    }

    pub fn headers(&self) -> Vec<HeaderCell> {
        self.columns
            .iter()
            .enumerate()
            .map(|(idx, column)| HeaderCell {
                id: column.id,
                label: column.header,
                sorted: self
                    .sort_by
                    .filter(|active| active.column == idx)
                    .map(|active| active.direction),
            })
            .collect()
    }

    pub fn columns(&self) -> &[ColumnData] {
        &self.columns
    }

    /// Record indices in display order.
    pub fn rows(&self) -> &[usize] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn render(&self) -> RenderedTable {
        self.render_window(0, self.rows.len())
    }

    /// Renders the display rows `begin..end`, clamped to the table.
    pub fn render_window(&self, begin: usize, end: usize) -> RenderedTable {
        let end = end.min(self.rows.len());
        let begin = begin.min(end);
        let rows = self.rows[begin..end]
            .iter()
            .map(|&ridx| self.columns.iter().map(|c| c.cells[ridx].clone()).collect())
            .collect();
        RenderedTable {
            headers: self.headers(),
            rows,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cmp::Ordering;

    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::columns::ALBUM_COLUMNS;
    use crate::storage::{FileStore, MemoryStore};

    fn albums() -> Vec<Album> {
        let ts = |d| Some(Utc.with_ymd_and_hms(2021, 5, d, 12, 0, 0).unwrap());
        vec![
            Album::new("Discovery", "Daft Punk")
                .with_rating(Some(4.4))
                .with_genres(&["Electronic"])
                .with_last_listened(ts(3))
                .with_release_date("2001-03-12"),
            Album::new("Homework", "Daft Punk")
                .with_rating(None)
                .with_genres(&["Electronic", "House"])
                .with_last_listened(None)
                .with_release_date("1997-01-20"),
            Album::new("Nevermind", "Nirvana")
                .with_rating(Some(4.4))
                .with_genres(&["Rock", "Grunge"])
                .with_last_listened(ts(12))
                .with_release_date("1991-09-24"),
            Album::new("In Utero", "Nirvana")
                .with_rating(Some(3.9))
                .with_genres(&["Rock"])
                .with_last_listened(ts(1))
                .with_release_date("1993-09-21"),
            Album::new("Random Access Memories", "Daft Punk")
                .with_rating(None)
                .with_genres(&["Electronic", "Disco"])
                .with_last_listened(None)
                .with_release_date("2013-05-17"),
        ]
    }

    fn table_with(store: Box<dyn KeyValueStore>) -> SortableTable {
        SortableTable::init(&ALBUM_COLUMNS, &albums(), store)
    }

    fn titles(table: &SortableTable) -> Vec<String> {
        table.render().rows.into_iter().map(|r| r[0].clone()).collect()
    }

    fn entry(id: &str, desc: bool) -> SortEntry {
        SortEntry {
            id: id.to_string(),
            desc,
        }
    }

    fn sort_to(table: &mut SortableTable, id: &str, direction: SortDirection) {
        for _ in 0..3 {
            if table.sorted_column() == table.column_index(id).map(|c| (c, direction)) {
                return;
            }
            table.toggle_sort(id);
        }
        panic!("{id} never reached {direction:?}");
    }

    #[test]
    fn rating_scenario_absent_sorts_low() {
        let records = vec![
            Album::new("A", "x").with_rating(Some(4.55)),
            Album::new("B", "x").with_rating(None),
            Album::new("C", "x").with_rating(Some(3.0)),
        ];
        let mut table = SortableTable::init(&ALBUM_COLUMNS, &records, Box::new(MemoryStore::default()));
        table.toggle_sort("avg_user_rating");
        assert_eq!(table.sort_spec(), vec![entry("avg_user_rating", false)]);

        let rendered = table.render();
        let order: Vec<&str> = rendered.rows.iter().map(|r| r[0].as_str()).collect();
        assert_eq!(order, vec!["B", "C", "A"]);
        let ratings: Vec<&str> = rendered.rows.iter().map(|r| r[1].as_str()).collect();
        assert_eq!(ratings, vec!["", "3.0", "4.6"]);
    }

    #[test]
    fn every_column_sorts_monotonic_in_both_directions() {
        for def in ALBUM_COLUMNS.iter() {
            for direction in [SortDirection::Ascending, SortDirection::Descending] {
                let mut table = table_with(Box::new(MemoryStore::default()));
                sort_to(&mut table, def.id, direction);
                let column = table.column_index(def.id).unwrap();
                let values = &table.columns()[column].values;
                for pair in table.rows().windows(2) {
                    let ord = values[pair[0]].compare(&values[pair[1]]);
                    match direction {
                        SortDirection::Ascending => assert_ne!(ord, Ordering::Greater, "{}", def.id),
                        SortDirection::Descending => assert_ne!(ord, Ordering::Less, "{}", def.id),
                    }
                }
            }
        }
    }

    #[test]
    fn equal_keys_keep_input_order() {
        let mut table = table_with(Box::new(MemoryStore::default()));
        sort_to(&mut table, "band_name", SortDirection::Ascending);
        assert_eq!(
            titles(&table),
            vec!["Discovery", "Homework", "Random Access Memories", "Nevermind", "In Utero"]
        );
        sort_to(&mut table, "band_name", SortDirection::Descending);
        assert_eq!(
            titles(&table),
            vec!["Nevermind", "In Utero", "Discovery", "Homework", "Random Access Memories"]
        );
    }

    #[test]
    fn absent_timestamps_go_last_when_descending() {
        let table = table_with(Box::new(MemoryStore::default()));
        assert_eq!(
            titles(&table),
            vec!["Nevermind", "Discovery", "In Utero", "Homework", "Random Access Memories"]
        );
    }

    #[test]
    fn render_is_idempotent() {
        let mut table = table_with(Box::new(MemoryStore::default()));
        table.toggle_sort("genres");
        assert_eq!(table.render(), table.render());
    }

    #[test]
    fn default_when_nothing_is_stored() {
        let table = table_with(Box::new(MemoryStore::default()));
        assert_eq!(table.sort_spec(), vec![entry("last_listened", true)]);
    }

    #[test]
    fn default_when_stored_value_is_unusable() {
        for stored in ["not json", "{\"id\":1}", r#"[{"id":"nope","desc":false}]"#] {
            let table = table_with(Box::new(MemoryStore::with_entry(SORT_BY_KEY, stored)));
            assert_eq!(table.sort_spec(), vec![entry("last_listened", true)], "{stored}");
        }
    }

    #[test]
    fn stored_spec_seeds_the_sort() {
        let store = MemoryStore::with_entry(SORT_BY_KEY, r#"[{"id":"release_date","desc":false}]"#);
        let table = table_with(Box::new(store));
        assert_eq!(table.sort_spec(), vec![entry("release_date", false)]);
        assert_eq!(titles(&table)[0], "Nevermind");
    }

    #[test]
    fn sort_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let mut table = table_with(Box::new(FileStore::open(dir.path()).unwrap()));
        sort_to(&mut table, "band_name", SortDirection::Descending);
        let before = titles(&table);

        let reloaded = table_with(Box::new(FileStore::open(dir.path()).unwrap()));
        assert_eq!(reloaded.sort_spec(), vec![entry("band_name", true)]);
        assert_eq!(titles(&reloaded), before);
    }

    #[test]
    fn stored_empty_spec_means_unsorted() {
        let table = table_with(Box::new(MemoryStore::with_entry(SORT_BY_KEY, "[]")));
        assert!(table.sort_spec().is_empty());
        assert!(table.headers().iter().all(|h| h.sorted.is_none()));
        assert_eq!(
            titles(&table),
            vec!["Discovery", "Homework", "Nevermind", "In Utero", "Random Access Memories"]
        );
    }

    #[test]
    fn unsorted_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let mut table = table_with(Box::new(FileStore::open(dir.path()).unwrap()));
        // Default last_listened descending cycles to unsorted
        table.toggle_sort("last_listened");
        assert!(table.sort_spec().is_empty());

        let reloaded = table_with(Box::new(FileStore::open(dir.path()).unwrap()));
        assert!(reloaded.sort_spec().is_empty());
        assert_eq!(titles(&reloaded), titles(&table));
    }

    #[test]
    fn toggle_cycles_and_persists_each_step() {
        let dir = tempfile::tempdir().unwrap();
        let mut table = table_with(Box::new(FileStore::open(dir.path()).unwrap()));
        let stored = || FileStore::open(dir.path()).unwrap().get(SORT_BY_KEY);

        table.toggle_sort("album_title");
        assert_eq!(stored().as_deref(), Some(r#"[{"id":"album_title","desc":false}]"#));
        table.toggle_sort("album_title");
        assert_eq!(stored().as_deref(), Some(r#"[{"id":"album_title","desc":true}]"#));
        table.toggle_sort("album_title");
        assert_eq!(stored().as_deref(), Some("[]"));
        assert!(table.sort_spec().is_empty());
        // Unsorted shows the fetch order
        assert_eq!(titles(&table)[..2], ["Discovery", "Homework"]);
        table.toggle_sort("album_title");
        assert_eq!(table.sort_spec(), vec![entry("album_title", false)]);
    }

    #[test]
    fn only_one_column_is_sorted() {
        let mut table = table_with(Box::new(MemoryStore::default()));
        table.toggle_sort("album_title");
        table.toggle_sort("band_name");
        let sorted: Vec<&str> = table
            .headers()
            .iter()
            .filter(|h| h.sorted.is_some())
            .map(|h| h.id)
            .collect();
        assert_eq!(sorted, vec!["band_name"]);
        assert_eq!(table.sort_spec(), vec![entry("band_name", false)]);
    }

    #[test]
    fn switching_from_descending_column_starts_ascending() {
        let mut table = table_with(Box::new(MemoryStore::default()));
        // Default is last_listened descending
        table.toggle_sort("last_listened");
        assert!(table.sort_spec().is_empty());
        table.toggle_sort("release_date");
        table.toggle_sort("release_date");
        table.toggle_sort("genres");
        assert_eq!(table.sort_spec(), vec![entry("genres", false)]);
    }

    #[test]
    fn unknown_column_is_ignored() {
        let mut table = table_with(Box::new(MemoryStore::default()));
        assert!(!table.toggle_sort("label"));
        assert_eq!(table.sort_spec(), vec![entry("last_listened", true)]);
    }

    #[test]
    fn headers_carry_indicators() {
        let mut table = table_with(Box::new(MemoryStore::default()));
        let headers = table.headers();
        assert_eq!(headers[4].title(), "Last Played ▼");
        assert_eq!(headers[0].title(), "Album Title");
        table.toggle_sort("album_title");
        assert_eq!(table.headers()[0].title(), "Album Title ▲");
        assert_eq!(table.headers()[4].title(), "Last Played");
    }

    #[test]
    fn render_window_is_clamped() {
        let table = table_with(Box::new(MemoryStore::default()));
        assert_eq!(table.render_window(3, 100).rows.len(), 2);
        assert!(table.render_window(9, 12).rows.is_empty());
        assert_eq!(table.row_count(), 5);
    }
}
