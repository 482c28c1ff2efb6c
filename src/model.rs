use std::sync::Arc;
use std::time::Instant;

use tokio::sync::oneshot::{self, error::TryRecvError};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::album::Album;
use crate::columns::ALBUM_COLUMNS;
use crate::domain::{AlbumsConfig, HELP_TEXT, Message, SourceError};
use crate::source::AlbumSource;
use crate::storage::{KeyValueStore, MemoryStore};
use crate::table::{SortDirection, SortEntry, SortableTable};
use crate::ui::{COLUMN_WIDTH_MARGIN, SCROLLBAR_WIDTH, STATUSLINE_HEIGHT, TABLE_HEADER_HEIGHT};

#[derive(Debug, PartialEq)]
pub enum Status {
    Running,
    Quitting,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoadState {
    Loading,
    Loaded,
    Errored,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Modus {
    Table,
    Popup,
}

#[derive(Clone, Debug)]
pub struct ColumnView {
    pub name: String,
    pub width: usize,
    pub data: Vec<String>,
    pub sorted: Option<SortDirection>,
}

/// Visible window into the sorted table.
#[derive(Debug, Default)]
struct TableView {
    visible_columns: Vec<usize>, // Idx of columns that are send to the UI for rendering.
    visible_width: usize,
    curser_row: usize,
    curser_column: usize,
    offset_row: usize,
    offset_column: usize,
    data: Vec<ColumnView>,
    heigh: usize,
    width: usize,
}

impl TableView {
    fn select_row(&mut self, row: usize) {
        let heigh = self.heigh.max(1);
        if row < self.offset_row {
            self.offset_row = row;
        } else if row >= self.offset_row + heigh {
            self.offset_row = row + 1 - heigh;
        }
        self.curser_row = row - self.offset_row;
    }

    fn selected_row(&self) -> usize {
        self.offset_row + self.curser_row
    }
}

/// The single fetch of one mount. Dropping it aborts the task, so a late
/// result can never reach a torn down model.
struct Loader {
    rx: oneshot::Receiver<Result<Vec<Album>, SourceError>>,
    task: JoinHandle<()>,
    started: Instant,
}

impl Drop for Loader {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub struct UIData {
    pub name: String,
    pub load_state: LoadState,
    pub error_message: Option<String>,
    pub table: Vec<ColumnView>,
    pub nrows: usize, // Total number of rows in the table
    pub selected_row: usize,
    pub selected_column: usize,
    pub abs_selected_row: usize,
    pub sort_description: String,
    pub show_popup: bool,
    pub popup_message: String,
    pub layout: UILayout,
    pub last_update: Instant,
    pub status_message: String,
    pub last_status_message_update: Instant,
}

impl UIData {
    pub fn empty() -> Self {
        UIData {
            name: String::new(),
            load_state: LoadState::Loading,
            error_message: None,
            table: Vec::new(),
            nrows: 0,
            selected_row: 0,
            selected_column: 0,
            abs_selected_row: 0,
            sort_description: String::new(),
            show_popup: false,
            popup_message: String::new(),
            layout: UILayout::default(),
            last_update: Instant::now(),
            status_message: String::new(),
            last_status_message_update: Instant::now(),
        }
    }
}

#[derive(Default, Clone, Debug)]
pub struct UILayout {
    pub width: usize,
    pub height: usize,
    pub table_width: usize,
    pub table_height: usize,
    pub statusline_width: usize,
    pub statusline_height: usize,
}

impl UILayout {
    pub fn from_values(ui_width: usize, ui_height: usize) -> Self {
        let layout = UILayout {
            width: ui_width,
            height: ui_height,
            table_width: ui_width.saturating_sub(SCROLLBAR_WIDTH),
            table_height: ui_height.saturating_sub(STATUSLINE_HEIGHT + TABLE_HEADER_HEIGHT),
            statusline_width: ui_width,
            statusline_height: STATUSLINE_HEIGHT,
        };
        trace!("Build UILayout: {:?}", layout);
        layout
    }
}

pub struct Model {
    config: AlbumsConfig,
    pub status: Status,
    modus: Modus,
    load_state: LoadState,
    source_name: String,
    albums: Vec<Album>,
    error: Option<SourceError>,
    store: Option<Box<dyn KeyValueStore>>,
    table: Option<SortableTable>,
    fetch_issued: bool,
    loader: Option<Loader>,
    view: TableView,
    uilayout: UILayout,
    uidata: UIData,
    status_message: String,
    last_status_message_update: Instant,
}

impl Model {
    pub fn init(
        config: &AlbumsConfig,
        store: Box<dyn KeyValueStore>,
        ui_width: usize,
        ui_height: usize,
    ) -> Self {
        let mut model = Self {
            config: config.clone(),
            status: Status::Running,
            modus: Modus::Table,
            load_state: LoadState::Loading,
            source_name: String::new(),
            albums: Vec::new(),
            error: None,
            store: Some(store),
            table: None,
            fetch_issued: false,
            loader: None,
            view: TableView::default(),
            uilayout: UILayout::from_values(ui_width, ui_height),
            uidata: UIData::empty(),
            status_message: "Started albums!".to_string(),
            last_status_message_update: Instant::now(),
        };
        model.update_uidata();
        model
    }

    /// Issues the one fetch of this mount. Later calls are ignored.
    pub fn mount(&mut self, source: Arc<dyn AlbumSource>) {
        if self.fetch_issued {
            debug!("Fetch already issued, ignoring mount");
            return;
        }
        self.fetch_issued = true;

        let (tx, rx) = oneshot::channel();
        let task = tokio::spawn(async move {
            // The receiver is gone when the model was dropped in the meantime
            let _ = tx.send(source.fetch().await);
        });
        self.loader = Some(Loader {
            rx,
            task,
            started: Instant::now(),
        });
        self.set_status_message("Loading albums ...");
    }

    pub fn set_source_name(&mut self, name: impl Into<String>) {
        self.source_name = name.into();
        self.update_uidata();
    }

    /// Applies the fetch result if it arrived. Called once per UI tick.
    pub fn poll_fetch(&mut self) {
        let Some(loader) = self.loader.as_mut() else {
            return;
        };
        let result = match loader.rx.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return,
            Err(TryRecvError::Closed) => Err(SourceError::Unavailable(
                "fetch ended without a result".into(),
            )),
        };
        self.finish_fetch(result);
    }

    /// Waits for the pending fetch, if any, and applies its result.
    pub async fn wait_for_fetch(&mut self) {
        let Some(loader) = self.loader.as_mut() else {
            return;
        };
        let result = match (&mut loader.rx).await {
            Ok(result) => result,
            Err(_) => Err(SourceError::Unavailable(
                "fetch ended without a result".into(),
            )),
        };
        self.finish_fetch(result);
    }

    fn finish_fetch(&mut self, result: Result<Vec<Album>, SourceError>) {
        let Some(loader) = self.loader.take() else {
            return;
        };
        let duration = loader.started.elapsed().as_millis();
        match result {
            Ok(albums) => {
                info!("Loaded {} albums in {duration}ms", albums.len());
                let store = self.store.take().unwrap_or_else(|| {
                    warn!("No preference store left, sort order will not persist");
                    Box::new(MemoryStore::default())
                });
                self.albums = albums;
                self.table = Some(SortableTable::init(&ALBUM_COLUMNS, &self.albums, store));
                self.load_state = LoadState::Loaded;
                self.set_status_message(format!(
                    "Loaded {} albums in {duration}ms ...",
                    self.albums.len()
                ));
                self.update_table_data();
            }
            Err(e) => {
                error!("Fetching albums failed after {duration}ms: {e}");
                self.error = Some(e);
                self.load_state = LoadState::Errored;
                self.set_status_message("Loading albums failed");
                self.update_uidata();
            }
        }
    }

    pub fn load_state(&self) -> LoadState {
        self.load_state
    }

    pub fn error(&self) -> Option<&SourceError> {
        self.error.as_ref()
    }

    pub fn albums(&self) -> &[Album] {
        &self.albums
    }

    pub fn table(&self) -> Option<&SortableTable> {
        self.table.as_ref()
    }

    pub fn sort_spec(&self) -> Vec<SortEntry> {
        self.table
            .as_ref()
            .map(|t| t.sort_spec())
            .unwrap_or_default()
    }

    pub fn get_uidata(&self) -> &UIData {
        &self.uidata
    }

    fn row_count(&self) -> usize {
        self.table.as_ref().map(|t| t.row_count()).unwrap_or(0)
    }

    fn column_count(&self) -> usize {
        self.table.as_ref().map(|t| t.columns().len()).unwrap_or(0)
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
        self.last_status_message_update = Instant::now();
        self.uidata.status_message = self.status_message.clone();
        self.uidata.last_status_message_update = self.last_status_message_update;
        self.uidata.last_update = Instant::now();
    }

    fn sort_description(&self) -> String {
        let Some(table) = self.table.as_ref() else {
            return String::new();
        };
        match table.headers().into_iter().find(|h| h.sorted.is_some()) {
            Some(header) => format!("sorted by {}", header.title()),
            None => "unsorted".to_string(),
        }
    }

    fn update_uidata(&mut self) {
        self.uidata = UIData {
            name: self.source_name.clone(),
            load_state: self.load_state,
            error_message: self.error.as_ref().map(|e| e.to_string()),
            table: self.view.data.clone(),
            nrows: self.row_count(),
            selected_row: self.view.curser_row,
            selected_column: self.view.curser_column,
            abs_selected_row: self.view.selected_row(),
            sort_description: self.sort_description(),
            show_popup: self.modus == Modus::Popup,
            popup_message: if self.modus == Modus::Popup {
                HELP_TEXT.to_string()
            } else {
                String::new()
            },
            layout: self.uilayout.clone(),
            last_update: Instant::now(),
            status_message: self.status_message.clone(),
            last_status_message_update: self.last_status_message_update,
        };
    }

    fn update_table_data(&mut self) {
        let Some(table) = self.table.as_ref() else {
            self.update_uidata();
            return;
        };
        let view = &mut self.view;
        view.width = self.uilayout.table_width;
        view.heigh = self.uilayout.table_height;

        // A resize or a shorter table can leave the curser outside of the window
        let last_row = table.row_count().saturating_sub(1);
        let row = view.selected_row().min(last_row);
        // A grown window must not leave empty space below the last row
        view.offset_row = view
            .offset_row
            .min(table.row_count().saturating_sub(view.heigh));
        view.select_row(row);

        let rbegin = view.offset_row;
        let rend = std::cmp::min(rbegin + view.heigh, table.row_count());
        let rendered = table.render_window(rbegin, rend);

        trace!(
            "Table: Cr {}, Cc {}, Or {}, Oc {}, Rb {}, Re {}, tw: {}, th: {}",
            view.curser_row,
            view.curser_column,
            view.offset_row,
            view.offset_column,
            rbegin,
            rend,
            view.width,
            view.heigh,
        );

        let widths: Vec<usize> = table
            .columns()
            .iter()
            .map(|c| Self::calculate_column_width(c.header, c.max_width, self.config.max_column_width))
            .collect();

        // Create a list of columns that fit in the table
        view.offset_column = view.offset_column.min(widths.len().saturating_sub(1));
        view.visible_columns = Vec::new();
        let mut visible_width = 0;
        let mut render_widths = Vec::new();
        for (cidx, &width) in widths.iter().enumerate().skip(view.offset_column) {
            if visible_width + width + 1 <= view.width {
                view.visible_columns.push(cidx);
                render_widths.push(width);
                visible_width += width + 1;
            } else {
                // Add the last partial visible column
                if visible_width < view.width {
                    let remaining_width = view.width - visible_width;
                    view.visible_columns.push(cidx);
                    render_widths.push(remaining_width);
                    visible_width += width + 1;
                }
                break;
            }
        }
        // Wider than the table when the most right column is only partially rendered
        view.visible_width = visible_width;
        view.curser_column = view
            .curser_column
            .min(view.visible_columns.len().saturating_sub(1));

        view.data = view
            .visible_columns
            .iter()
            .zip(render_widths)
            .map(|(&idx, width)| {
                let header = &rendered.headers[idx];
                ColumnView {
                    name: Self::get_visible_name(&header.title(), width),
                    width,
                    data: rendered.rows.iter().map(|row| row[idx].clone()).collect(),
                    sorted: header.sorted,
                }
            })
            .collect();

        self.update_uidata();
    }

    fn get_visible_name(name: &str, width: usize) -> String {
        if width < 3 {
            return String::new();
        }
        if name.chars().count() > width {
            let mut reduced_name: String = name.chars().take(width - 3).collect();
            reduced_name.push_str("...");
            reduced_name
        } else {
            name.to_string()
        }
    }

    fn calculate_column_width(header: &str, max_cell_width: usize, max_column_width: usize) -> usize {
        // Reserve room for the " ▲" sort indicator
        let header_width = header.chars().count() + 2;
        let width = std::cmp::max(header_width, max_cell_width) + COLUMN_WIDTH_MARGIN;
        std::cmp::min(width, max_column_width.max(header_width))
    }

    pub fn quit(&mut self) {
        self.status = Status::Quitting;
    }

    fn ui_resize(&mut self, width: usize, height: usize) {
        trace!(
            "UI was resized! w:{}->{}, h:{}->{}",
            self.uilayout.width, width, self.uilayout.height, height
        );
        self.uilayout = UILayout::from_values(width, height);
        self.update_table_data();
    }

    pub fn update(&mut self, message: Option<Message>) {
        let Some(msg) = message else {
            return;
        };
        trace!("Update: Modus {:?}, LoadState {:?}, Message {:?}", self.modus, self.load_state, msg);

        match (self.modus, self.load_state) {
            (Modus::Popup, _) => match msg {
                Message::Quit => self.quit(),
                Message::Resize(width, height) => self.ui_resize(width, height),
                Message::Exit | Message::Help | Message::ToggleSortSelected => self.close_popup(),
                _ => (),
            },
            (Modus::Table, LoadState::Loaded) => match msg {
                Message::Quit => self.quit(),
                Message::Help => self.show_help(),
                Message::MoveDown => self.move_table_selection_down(1),
                Message::MoveUp => self.move_table_selection_up(1),
                Message::MoveLeft => self.move_table_selection_left(),
                Message::MoveRight => self.move_table_selection_right(),
                Message::MovePageUp => self.move_table_selection_up(self.uilayout.table_height.max(1)),
                Message::MovePageDown => {
                    self.move_table_selection_down(self.uilayout.table_height.max(1))
                }
                Message::MoveBeginning => self.move_table_selection_beginning(),
                Message::MoveEnd => self.move_table_selection_end(),
                Message::ToggleSortSelected => {
                    if let Some(&idx) = self.view.visible_columns.get(self.view.curser_column) {
                        self.toggle_sort(idx);
                    }
                }
                Message::ToggleSortColumn(idx) => self.toggle_sort(idx),
                Message::HeaderClick(x) => self.header_click(x as usize),
                Message::Resize(width, height) => self.ui_resize(width, height),
                Message::Exit => (),
            },
            // Nothing to interact with while loading or after an error
            (Modus::Table, _) => match msg {
                Message::Quit => self.quit(),
                Message::Help => self.show_help(),
                Message::Resize(width, height) => self.ui_resize(width, height),
                _ => (),
            },
        }
    }

    // -------------------- Control handling functions ---------------------- //

    fn show_help(&mut self) {
        self.modus = Modus::Popup;
        self.update_uidata();
    }

    fn close_popup(&mut self) {
        self.modus = Modus::Table;
        self.update_uidata();
    }

    fn toggle_sort(&mut self, column_idx: usize) {
        let Some(table) = self.table.as_mut() else {
            return;
        };
        let Some(id) = table.columns().get(column_idx).map(|c| c.id) else {
            debug!("No column {column_idx} to sort by");
            return;
        };
        table.toggle_sort(id);
        let description = self.sort_description();
        info!("Table is now {description}");
        self.set_status_message(format!("Table is now {description}"));
        self.update_table_data();
    }

    /// Maps a click on the header row to the column below it.
    fn header_click(&mut self, x: usize) {
        let mut begin = 0;
        let mut hit = None;
        for (&idx, column) in self.view.visible_columns.iter().zip(self.view.data.iter()) {
            if x >= begin && x < begin + column.width {
                hit = Some(idx);
                break;
            }
            begin += column.width + 1;
        }
        match hit {
            Some(idx) => self.toggle_sort(idx),
            None => trace!("Header click at {x} hit no column"),
        }
    }

    fn move_table_selection_beginning(&mut self) {
        self.view.select_row(0);
        self.update_table_data();
    }

    fn move_table_selection_end(&mut self) {
        self.view.select_row(self.row_count().saturating_sub(1));
        self.update_table_data();
    }

    fn move_table_selection_up(&mut self, size: usize) {
        let row = self.view.selected_row().saturating_sub(size);
        self.view.select_row(row);
        self.update_table_data();
    }

    fn move_table_selection_down(&mut self, size: usize) {
        let last_row = self.row_count().saturating_sub(1);
        let row = std::cmp::min(self.view.selected_row() + size, last_row);
        self.view.select_row(row);
        self.update_table_data();
    }

    fn move_table_selection_left(&mut self) {
        let view = &mut self.view;
        if view.curser_column > 0 {
            view.curser_column -= 1;
        } else if view.offset_column > 0 {
            view.offset_column -= 1;
        }
        self.update_table_data();
    }

    fn move_table_selection_right(&mut self) {
        let ncolumns = self.column_count();
        let view = &mut self.view;
        if view.curser_column + view.offset_column + 1 < ncolumns {
            // Somewhere before the last column
            if view.curser_column + 1 < view.visible_columns.len() {
                view.curser_column += 1;
            } else {
                // At the end of the screen
                view.offset_column += 1;
            }
            self.update_table_data();
        } else if view.visible_width > view.width && view.offset_column + 1 < ncolumns {
            // Last column is only partially visible
            view.offset_column += 1;
            self.update_table_data();
        }
    }
}
