use arboard::Clipboard;
use ratatui::crossterm::event::KeyEvent;
use ratatui::layout::Rect;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::domain::{CMDMode, Message, TVConfig};
use crate::filter::{filter_rows, has_active_filters};
use crate::format::{format_cell_value, format_detail_value, format_tooltip_value};
use crate::inputter::{InputResult, Inputter};
use crate::layout::{ResizeDrag, clamp_width};
use crate::prefs::{Density, PersistedViewPrefs, PreferenceStore, TableIdentity, ViewMode};
use crate::sort::{SortDirection, SortSpec, sort_rows, toggle_sort};
use crate::table::TableData;
use crate::ui::{
    ACTION_COLUMN_WIDTH, CMDLINE_HEIGHT, COLUMN_SPACING, FILTER_PANEL_HEIGHT, FOOTER_HEIGHT,
    STATUSLINE_HEIGHT, TABLE_HEADER_HEIGHT, TOOLBAR_HEIGHT,
};

pub const EMPTY_PLACEHOLDER: &str = "Empty";
const FIELD_HEADER: &str = "Field";
const DETAIL_PAGE: usize = 10;

#[derive(Debug, PartialEq)]
pub enum Status {
    EMPTY,
    LOADING,
    READY,
    QUITTING,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Modus {
    TABLE,
    POPUP,
    CMDINPUT,
}

/// Pointer and keyboard capture currently in effect.
///
/// Pointer motion is only routed while `Dragging`, the cancel key only
/// reaches the detail overlay while `OverlayOpen`. Leaving a state releases
/// its capture.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Interaction {
    #[default]
    Idle,
    Dragging(ResizeDrag),
    OverlayOpen,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Viewport {
    pub cursor_row: usize,
    pub cursor_column: usize,
    pub cursor_record: usize,
    pub offset_row: usize,
    pub offset_column: usize,
    pub offset_field: usize,
    pub offset_record: usize,
    pub detail_scroll: usize,
}

/// View state that is dropped whenever another table is opened.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub global_filter: String,
    pub column_filters: BTreeMap<String, String>,
    pub sort: Option<SortSpec>,
    /// Original row index shown in the detail overlay.
    pub selected_row: Option<usize>,
    pub column_filters_visible: bool,
    pub viewport: Viewport,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmptyState {
    NoRows,
    NoMatches,
}

impl EmptyState {
    pub fn message(&self) -> &'static str {
        match self {
            EmptyState::NoRows => "No data (or empty table)",
            EmptyState::NoMatches => "No rows match the current filters",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectedColumn {
    pub name: String,
    /// Effective width in pixels.
    pub width: u32,
    /// Width in terminal cells.
    pub cells: u16,
    /// Whether the width was set by the user.
    pub explicit: bool,
    pub sort: Option<SortDirection>,
    pub filter: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectedRow {
    pub original_index: usize,
    pub cells: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RowProjection {
    pub columns: Vec<ProjectedColumn>,
    pub rows: Vec<ProjectedRow>,
    pub empty: Option<EmptyState>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransposedField {
    pub name: String,
    pub cells: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnProjection {
    /// `Row N` labels, one per original row.
    pub headers: Vec<String>,
    pub fields: Vec<TransposedField>,
    /// Set when the table has no rows and every field shows the placeholder.
    pub placeholder: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetailView {
    pub original_index: usize,
    pub title: String,
    pub fields: Vec<(String, String)>,
}

#[derive(Default, Clone, Debug, PartialEq)]
pub struct UILayout {
    pub width: u16,
    pub height: u16,
    pub toolbar: Rect,
    pub filter_panel: Option<Rect>,
    pub table: Rect,
    pub footer: Rect,
    pub statusline: Rect,
    pub cmdline: Rect,
}

impl UILayout {
    pub fn from_values(width: u16, height: u16, filter_panel_visible: bool) -> Self {
        let panel_height = if filter_panel_visible { FILTER_PANEL_HEIGHT } else { 0 };
        let top = TOOLBAR_HEIGHT + panel_height;
        let bottom = FOOTER_HEIGHT + STATUSLINE_HEIGHT + CMDLINE_HEIGHT;
        let table_height = height.saturating_sub(top + bottom);

        let row = |y: u16, h: u16| Rect::new(0, y.min(height), width, h);
        let layout = UILayout {
            width,
            height,
            toolbar: row(0, TOOLBAR_HEIGHT),
            filter_panel: filter_panel_visible.then(|| row(TOOLBAR_HEIGHT, FILTER_PANEL_HEIGHT)),
            table: row(top, table_height),
            footer: row(top + table_height, FOOTER_HEIGHT),
            statusline: row(top + table_height + FOOTER_HEIGHT, STATUSLINE_HEIGHT),
            cmdline: row(
                top + table_height + FOOTER_HEIGHT + STATUSLINE_HEIGHT,
                CMDLINE_HEIGHT,
            ),
        };
        trace!("Build UILayout: {:?}", layout);
        layout
    }

    /// Rows available below the table header.
    pub fn body_height(&self) -> u16 {
        self.table.height.saturating_sub(TABLE_HEADER_HEIGHT)
    }

    pub fn body_top(&self) -> u16 {
        self.table.y + TABLE_HEADER_HEIGHT
    }

    /// Centered area covering most of the screen, used by the overlays.
    pub fn overlay_area(&self) -> Rect {
        let w = (self.width as u32 * 8 / 10) as u16;
        let h = (self.height as u32 * 8 / 10) as u16;
        Rect::new((self.width - w) / 2, (self.height - h) / 2, w, h)
    }
}

pub struct Model {
    config: TVConfig,
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    data: Option<TableData>,
    loading: bool,
    identity: TableIdentity,
    prefs: PersistedViewPrefs,
    session: SessionState,
    interaction: Interaction,
    store: Box<dyn PreferenceStore>,
    visible_rows: Vec<usize>, // Original indices after filtering and sorting
    intrinsic_cells: Vec<u16>, // Natural width of each column in the row view
    record_cells: Vec<u16>,    // Natural width of each record in the column view
    field_cells: u16,
    uilayout: UILayout,
    clipboard: Option<Clipboard>,
    input: Inputter,
    cmd_mode: Option<CMDMode>,
    cmd_original: String,
    last_input: InputResult,
    status_message: String,
    last_status_message_update: Instant,
}

impl Model {
    pub fn init(
        config: &TVConfig,
        store: Box<dyn PreferenceStore>,
        ui_width: u16,
        ui_height: u16,
    ) -> Self {
        Self {
            config: config.clone(),
            status: Status::EMPTY,
            modus: Modus::TABLE,
            previous_modus: Modus::TABLE,
            data: None,
            loading: false,
            identity: TableIdentity::default(),
            prefs: PersistedViewPrefs::default(),
            session: SessionState::default(),
            interaction: Interaction::Idle,
            store,
            visible_rows: Vec::new(),
            intrinsic_cells: Vec::new(),
            record_cells: Vec::new(),
            field_cells: FIELD_HEADER.len() as u16,
            uilayout: UILayout::from_values(ui_width, ui_height, false),
            clipboard: None,
            input: Inputter::default(),
            cmd_mode: None,
            cmd_original: String::new(),
            last_input: InputResult::default(),
            status_message: "Started tvgrid!".to_string(),
            last_status_message_update: Instant::now(),
        }
    }

    // ------------------------- Source handling ---------------------------- //

    /// Hands a new input to the grid. A different identity drops all session
    /// state and reloads the stored preferences; the same identity keeps both.
    pub fn set_source(&mut self, data: Option<TableData>, loading: bool, identity: TableIdentity) {
        if identity != self.identity {
            info!(
                "Switching table to {}::{}",
                identity.db_path, identity.table_name
            );
            self.release_interaction();
            self.cancel_cmd_mode();
            self.session = SessionState::default();
            self.identity = identity;
            self.prefs = match self.identity.key() {
                Some(key) => PersistedViewPrefs::load(self.store.as_ref(), &key),
                None => PersistedViewPrefs::default(),
            };
            debug!(
                "View preferences: {:?}, {:?}, {} stored widths",
                self.prefs.view_mode,
                self.prefs.density,
                self.prefs.column_widths.len()
            );
            self.update_layout();
        }
        self.data = data;
        self.loading = loading;
        self.status = match (&self.data, loading) {
            (_, true) => Status::LOADING,
            (None, false) => Status::EMPTY,
            (Some(_), false) => Status::READY,
        };
        if let Some(selected) = self.session.selected_row
            && selected >= self.row_count()
        {
            self.close_detail();
        }
        self.measure_columns();
        self.refresh_rows();
        if let Some(data) = &self.data {
            self.set_status_message(format!(
                "Loaded {} of {} rows",
                data.rows.len(),
                data.total_rows
            ));
        }
    }

    fn row_count(&self) -> usize {
        self.data.as_ref().map(|d| d.rows.len()).unwrap_or(0)
    }

    fn columns(&self) -> &[String] {
        self.data.as_ref().map(|d| d.columns.as_slice()).unwrap_or(&[])
    }

    fn measure_columns(&mut self) {
        let max = self.config.max_column_cells.max(3);
        let Some(data) = &self.data else {
            self.intrinsic_cells.clear();
            self.record_cells.clear();
            return;
        };
        let clip = |n: usize| n.clamp(3, max) as u16;

        for (column, width) in self.prefs.column_widths.iter() {
            if !data.columns.iter().any(|c| c == column) {
                debug!("Stored width {width}px for {column} matches no column");
            }
        }

        // Room for the sort marker next to the name.
        self.intrinsic_cells = data
            .columns
            .iter()
            .map(|c| {
                let widest = data
                    .rows
                    .iter()
                    .map(|r| format_cell_value(r.get(c)).chars().count())
                    .max()
                    .unwrap_or(0);
                clip(widest.max(c.chars().count() + 2))
            })
            .collect();

        self.record_cells = data
            .rows
            .iter()
            .enumerate()
            .map(|(idx, r)| {
                let widest = data
                    .columns
                    .iter()
                    .map(|c| format_cell_value(r.get(c)).chars().count())
                    .max()
                    .unwrap_or(0);
                clip(widest.max(format!("Row {}", idx + 1).len()))
            })
            .collect();

        self.field_cells = clip(
            data.columns
                .iter()
                .map(|c| c.chars().count())
                .max()
                .unwrap_or(0)
                .max(FIELD_HEADER.len()),
        );
    }

    /// Recomputes the filtered and sorted row order.
    fn refresh_rows(&mut self) {
        let start_time = Instant::now();
        self.visible_rows = match &self.data {
            Some(data) => {
                let mut rows = filter_rows(
                    data,
                    &self.session.global_filter,
                    &self.session.column_filters,
                );
                sort_rows(data, &mut rows, self.session.sort.as_ref());
                rows
            }
            None => Vec::new(),
        };
        trace!(
            "Refreshed {} visible rows in {}us",
            self.visible_rows.len(),
            start_time.elapsed().as_micros()
        );
        self.clamp_viewport();
    }

    // ----------------------- Persisted preferences ------------------------ //

    fn persist_prefs(&mut self) {
        if let Some(key) = self.identity.key() {
            self.prefs.save(self.store.as_mut(), &key);
        } else {
            debug!("No table identity, view preferences are not stored");
        }
    }

    pub fn set_view_mode(&mut self, mode: ViewMode) {
        self.prefs.view_mode = mode;
        self.persist_prefs();
        self.clamp_viewport();
    }

    pub fn set_density(&mut self, density: Density) {
        self.prefs.density = density;
        self.persist_prefs();
        self.clamp_viewport();
    }

    pub fn begin_resize(&mut self, column: &str, x: u16) {
        let Some(idx) = self.column_index(column) else {
            warn!("Cannot resize unknown column {column}");
            return;
        };
        self.release_interaction();
        let current = self.column_width(idx);
        let drag = ResizeDrag::begin(column, current, self.cells_to_px(x));
        trace!("Begin resize {:?}", drag);
        self.interaction = Interaction::Dragging(drag);
    }

    pub fn drag_resize(&mut self, x: u16) {
        let x = self.cells_to_px(x);
        let Interaction::Dragging(drag) = &self.interaction else {
            trace!("Ignoring pointer motion outside of a drag");
            return;
        };
        let width = drag.apply(&mut self.prefs.column_widths, x);
        trace!("Resized {} to {width}px", drag.column);
        self.persist_prefs();
        self.clamp_viewport();
    }

    pub fn end_resize(&mut self) {
        if let Interaction::Dragging(drag) = &self.interaction {
            trace!("End resize of {}", drag.column);
            self.interaction = Interaction::Idle;
        }
    }

    pub fn reset_column_width(&mut self, column: &str) {
        if self.prefs.column_widths.reset(column) {
            self.persist_prefs();
            self.set_status_message(format!("Reset width of {column}"));
        }
        self.clamp_viewport();
    }

    /// Keyboard counterpart of a drag.
    pub fn resize_column_by(&mut self, column: &str, delta: i32) {
        let Some(idx) = self.column_index(column) else {
            return;
        };
        let width = self.column_width(idx) as i64 + delta as i64;
        let stored = self.prefs.column_widths.set(column, width);
        trace!("Resized {column} to {stored}px");
        self.persist_prefs();
        self.clamp_viewport();
    }

    fn resize_current_column(&mut self, delta: i32) {
        if let Some(column) = self.current_column().map(str::to_string) {
            self.resize_column_by(&column, delta);
        }
    }

    fn cells_to_px(&self, cells: u16) -> i64 {
        cells as i64 * self.config.cell_pixel_width.max(1) as i64
    }

    fn px_to_cells(&self, px: u32) -> u16 {
        (px / self.config.cell_pixel_width.max(1)).clamp(1, u16::MAX as u32) as u16
    }

    fn column_index(&self, column: &str) -> Option<usize> {
        self.columns().iter().position(|c| c == column)
    }

    /// Effective width of a column in pixels.
    fn column_width(&self, idx: usize) -> u32 {
        let intrinsic = self
            .intrinsic_cells
            .get(idx)
            .map(|&c| self.cells_to_px(c) as u32)
            .unwrap_or(clamp_width(0));
        self.columns()
            .get(idx)
            .map(|c| self.prefs.column_widths.width_for(c, intrinsic))
            .unwrap_or(intrinsic)
    }

    // ---------------------------- Session state --------------------------- //

    pub fn set_global_filter(&mut self, text: &str) {
        self.session.global_filter = text.to_string();
        self.refresh_rows();
    }

    pub fn set_column_filter(&mut self, column: &str, text: &str) {
        if text.is_empty() {
            self.session.column_filters.remove(column);
        } else {
            self.session
                .column_filters
                .insert(column.to_string(), text.to_string());
        }
        self.refresh_rows();
    }

    pub fn clear_filters(&mut self) {
        self.session.global_filter.clear();
        self.session.column_filters.clear();
        self.refresh_rows();
        self.set_status_message("Cleared filters");
    }

    pub fn toggle_column_filters_panel(&mut self) {
        self.session.column_filters_visible = !self.session.column_filters_visible;
        self.update_layout();
    }

    pub fn toggle_sort(&mut self, column: &str) {
        self.session.sort = toggle_sort(self.session.sort.as_ref(), column);
        match &self.session.sort {
            Some(spec) => self.set_status_message(format!(
                "Sorted by {} {}",
                spec.column,
                spec.direction.symbol()
            )),
            None => self.set_status_message("Sorting cleared"),
        }
        self.refresh_rows();
    }

    pub fn open_detail(&mut self, original_index: usize) {
        if original_index >= self.row_count() {
            warn!("Cannot show details of unknown row {original_index}");
            return;
        }
        self.release_interaction();
        self.session.selected_row = Some(original_index);
        self.session.viewport.detail_scroll = 0;
        self.interaction = Interaction::OverlayOpen;
        trace!("Opened details of row {original_index}");
    }

    pub fn close_detail(&mut self) {
        self.session.selected_row = None;
        if self.interaction == Interaction::OverlayOpen {
            self.interaction = Interaction::Idle;
        }
    }

    /// Drops any active drag or overlay capture.
    fn release_interaction(&mut self) {
        match std::mem::take(&mut self.interaction) {
            Interaction::Idle => {}
            Interaction::Dragging(drag) => trace!("Released resize drag of {}", drag.column),
            Interaction::OverlayOpen => {
                trace!("Released detail overlay");
                self.session.selected_row = None;
            }
        }
    }

    // ----------------------------- Projections ---------------------------- //

    pub fn row_projection(&self) -> RowProjection {
        let columns = self.projected_columns();
        let Some(data) = &self.data else {
            return RowProjection {
                columns,
                rows: Vec::new(),
                empty: Some(EmptyState::NoRows),
            };
        };
        let rows: Vec<ProjectedRow> = self
            .visible_rows
            .iter()
            .map(|&idx| ProjectedRow {
                original_index: idx,
                cells: data
                    .columns
                    .iter()
                    .map(|c| format_cell_value(data.cell(idx, c)))
                    .collect(),
            })
            .collect();
        let empty = if data.rows.is_empty() {
            Some(EmptyState::NoRows)
        } else if rows.is_empty() {
            Some(EmptyState::NoMatches)
        } else {
            None
        };
        RowProjection {
            columns,
            rows,
            empty,
        }
    }

    fn projected_columns(&self) -> Vec<ProjectedColumn> {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, name)| {
                let width = self.column_width(idx);
                ProjectedColumn {
                    name: name.clone(),
                    width,
                    cells: self.px_to_cells(width),
                    explicit: self.prefs.column_widths.get(name).is_some(),
                    sort: self
                        .session
                        .sort
                        .as_ref()
                        .filter(|s| &s.column == name)
                        .map(|s| s.direction),
                    filter: self
                        .session
                        .column_filters
                        .get(name)
                        .filter(|f| !f.trim().is_empty())
                        .cloned(),
                }
            })
            .collect()
    }

    /// Fields as rows, original records as columns. Filters and sorting do
    /// not apply here.
    pub fn column_projection(&self) -> ColumnProjection {
        let Some(data) = &self.data else {
            return ColumnProjection {
                headers: Vec::new(),
                fields: Vec::new(),
                placeholder: true,
            };
        };
        let placeholder = data.rows.is_empty();
        let headers = (1..=data.rows.len()).map(|n| format!("Row {n}")).collect();
        let fields = data
            .columns
            .iter()
            .map(|c| TransposedField {
                name: c.clone(),
                cells: if placeholder {
                    vec![EMPTY_PLACEHOLDER.to_string()]
                } else {
                    data.rows.iter().map(|r| format_cell_value(r.get(c))).collect()
                },
            })
            .collect();
        ColumnProjection {
            headers,
            fields,
            placeholder,
        }
    }

    pub fn detail(&self) -> Option<DetailView> {
        let idx = self.session.selected_row?;
        let data = self.data.as_ref()?;
        let row = data.rows.get(idx)?;
        Some(DetailView {
            original_index: idx,
            title: format!("Row {}", idx + 1),
            fields: data
                .columns
                .iter()
                .map(|c| (c.clone(), format_detail_value(row.get(c))))
                .collect(),
        })
    }

    // ----------------------------- Accessors ------------------------------ //

    pub fn prefs(&self) -> &PersistedViewPrefs {
        &self.prefs
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn interaction(&self) -> &Interaction {
        &self.interaction
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.interaction, Interaction::Dragging(_))
    }

    pub fn is_overlay_open(&self) -> bool {
        self.interaction == Interaction::OverlayOpen
    }

    pub fn identity(&self) -> &TableIdentity {
        &self.identity
    }

    pub fn data(&self) -> Option<&TableData> {
        self.data.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn visible_rows(&self) -> &[usize] {
        &self.visible_rows
    }

    pub fn uilayout(&self) -> &UILayout {
        &self.uilayout
    }

    pub fn status_message(&self) -> &str {
        &self.status_message
    }

    pub fn last_status_message_update(&self) -> Instant {
        self.last_status_message_update
    }

    pub fn show_help(&self) -> bool {
        self.modus == Modus::POPUP
    }

    /// Current command line edit, if any.
    pub fn cmd_input(&self) -> Option<(&CMDMode, &InputResult)> {
        self.cmd_mode.as_ref().map(|m| (m, &self.last_input))
    }

    pub fn raw_keyevents(&self) -> bool {
        self.modus == Modus::CMDINPUT
    }

    pub fn has_active_filters(&self) -> bool {
        has_active_filters(&self.session.global_filter, &self.session.column_filters)
    }

    pub fn footer_text(&self) -> String {
        match &self.data {
            Some(data) if self.has_active_filters() => format!(
                "Showing first {} rows ({} matching). Total rows: {}",
                data.rows.len(),
                self.visible_rows.len(),
                data.total_rows
            ),
            Some(data) => format!(
                "Showing first {} rows. Total rows: {}",
                data.rows.len(),
                data.total_rows
            ),
            None => String::new(),
        }
    }

    /// Original row index and column name under the cursor.
    fn current_cell(&self) -> Option<(usize, &str)> {
        let vp = &self.session.viewport;
        let column = self.columns().get(vp.cursor_column)?.as_str();
        let row = match self.prefs.view_mode {
            ViewMode::Row => *self.visible_rows.get(vp.cursor_row)?,
            ViewMode::Column => vp.cursor_record,
        };
        (row < self.row_count()).then_some((row, column))
    }

    pub fn current_column(&self) -> Option<&str> {
        self.columns()
            .get(self.session.viewport.cursor_column)
            .map(String::as_str)
    }

    /// Tooltip text of the cell under the cursor, on a single line.
    pub fn current_tooltip(&self) -> Option<String> {
        let (row, column) = self.current_cell()?;
        let data = self.data.as_ref()?;
        let text = format_tooltip_value(data.cell(row, column));
        Some(text.split_whitespace().collect::<Vec<_>>().join(" "))
    }

    // ------------------------------ Geometry ------------------------------ //

    fn row_stride(&self) -> usize {
        match self.prefs.density {
            Density::Standard => 2,
            Density::Compact => 1,
        }
    }

    /// Number of data rows that fit below the header.
    pub fn body_capacity(&self) -> usize {
        match self.prefs.view_mode {
            ViewMode::Row => (self.uilayout.body_height() as usize / self.row_stride()).max(1),
            ViewMode::Column => (self.uilayout.body_height() as usize).max(1),
        }
    }

    /// Original row index rendered at screen line `y` of the row view.
    pub fn row_at(&self, y: u16) -> Option<usize> {
        let top = self.uilayout.body_top();
        if y < top || y >= self.uilayout.table.y + self.uilayout.table.height {
            return None;
        }
        let line = (y - top) as usize;
        if line % self.row_stride() != 0 {
            return None;
        }
        let pos = self.session.viewport.offset_row + line / self.row_stride();
        self.visible_rows.get(pos).copied()
    }

    fn fit(widths: &[u16], offset: usize, budget: u16) -> Vec<(usize, u16)> {
        let mut visible = Vec::new();
        let mut used: u16 = 0;
        for (idx, &w) in widths.iter().enumerate().skip(offset) {
            let needed = w.saturating_add(COLUMN_SPACING);
            if used.saturating_add(needed) <= budget {
                visible.push((idx, w));
                used += needed;
            } else {
                // Last column is shown partially.
                if used < budget {
                    visible.push((idx, budget - used));
                }
                break;
            }
        }
        visible
    }

    /// Columns of the row view that fit on screen, with their cell widths.
    pub fn visible_columns(&self) -> Vec<(usize, u16)> {
        let widths: Vec<u16> = (0..self.columns().len())
            .map(|idx| self.px_to_cells(self.column_width(idx)))
            .collect();
        let budget = self
            .uilayout
            .width
            .saturating_sub(ACTION_COLUMN_WIDTH + COLUMN_SPACING);
        Self::fit(&widths, self.session.viewport.offset_column, budget)
    }

    pub fn field_column_width(&self) -> u16 {
        self.field_cells
    }

    /// Records of the column view that fit on screen, with their widths.
    pub fn visible_records(&self) -> Vec<(usize, u16)> {
        let budget = self
            .uilayout
            .width
            .saturating_sub(self.field_cells + COLUMN_SPACING);
        Self::fit(&self.record_cells, self.session.viewport.offset_record, budget)
    }

    fn update_layout(&mut self) {
        self.uilayout = UILayout::from_values(
            self.uilayout.width,
            self.uilayout.height,
            self.session.column_filters_visible,
        );
        self.clamp_viewport();
    }

    fn ui_resize(&mut self, width: usize, height: usize) {
        trace!(
            "UI was resized! w:{}->{}, h:{}->{}",
            self.uilayout.width, width, self.uilayout.height, height
        );
        self.uilayout.width = width.min(u16::MAX as usize) as u16;
        self.uilayout.height = height.min(u16::MAX as usize) as u16;
        self.update_layout();
    }

    /// Keeps cursors inside the data and the viewport around the cursors.
    fn clamp_viewport(&mut self) {
        let nrows = self.visible_rows.len();
        let ncols = self.columns().len();
        let nrecords = self.row_count();
        let capacity = self.body_capacity();
        let vp = &mut self.session.viewport;

        vp.cursor_row = vp.cursor_row.min(nrows.saturating_sub(1));
        vp.cursor_column = vp.cursor_column.min(ncols.saturating_sub(1));
        vp.cursor_record = vp.cursor_record.min(nrecords.saturating_sub(1));

        match self.prefs.view_mode {
            ViewMode::Row => {
                vp.offset_row = Self::scroll(vp.offset_row, vp.cursor_row, capacity);
            }
            ViewMode::Column => {
                vp.offset_field = Self::scroll(vp.offset_field, vp.cursor_column, capacity);
            }
        }

        // Horizontal scrolling depends on the rendered widths.
        match self.prefs.view_mode {
            ViewMode::Row => {
                let cursor = self.session.viewport.cursor_column;
                let vp = &mut self.session.viewport;
                vp.offset_column = vp.offset_column.min(cursor);
                while self.session.viewport.offset_column < cursor
                    && !self.visible_columns().iter().any(|&(idx, _)| idx == cursor)
                {
                    self.session.viewport.offset_column += 1;
                }
            }
            ViewMode::Column => {
                let cursor = self.session.viewport.cursor_record;
                let vp = &mut self.session.viewport;
                vp.offset_record = vp.offset_record.min(cursor);
                while self.session.viewport.offset_record < cursor
                    && !self.visible_records().iter().any(|&(idx, _)| idx == cursor)
                {
                    self.session.viewport.offset_record += 1;
                }
            }
        }
    }

    fn scroll(offset: usize, cursor: usize, capacity: usize) -> usize {
        if cursor < offset {
            cursor
        } else if cursor >= offset + capacity {
            cursor + 1 - capacity
        } else {
            offset
        }
    }

    // ------------------------------ Messages ------------------------------ //

    pub fn quit(&mut self) {
        self.release_interaction();
        self.status = Status::QUITTING;
    }

    pub fn update(&mut self, message: Option<Message>) {
        let Some(msg) = message else {
            return;
        };
        match self.modus {
            Modus::TABLE if self.is_overlay_open() => match msg {
                Message::Quit => self.quit(),
                Message::Exit | Message::Enter => self.close_detail(),
                Message::MoveUp => self.scroll_detail(-1),
                Message::MoveDown => self.scroll_detail(1),
                Message::MovePageUp => self.scroll_detail(-(DETAIL_PAGE as isize)),
                Message::MovePageDown => self.scroll_detail(DETAIL_PAGE as isize),
                Message::CopyCell | Message::CopyRow => self.copy_row(),
                Message::Resize(width, height) => self.ui_resize(width, height),
                _ => (),
            },
            Modus::TABLE => match msg {
                Message::Quit => self.quit(),
                Message::MoveUp => self.move_vertical(-1),
                Message::MoveDown => self.move_vertical(1),
                Message::MoveLeft => self.move_horizontal(-1),
                Message::MoveRight => self.move_horizontal(1),
                Message::MovePageUp => self.move_vertical(-(self.body_capacity() as isize)),
                Message::MovePageDown => self.move_vertical(self.body_capacity() as isize),
                Message::MoveBeginning => self.move_vertical(isize::MIN),
                Message::MoveEnd => self.move_vertical(isize::MAX),
                Message::ToggleViewMode => self.set_view_mode(self.prefs.view_mode.toggled()),
                Message::ToggleDensity => self.set_density(self.prefs.density.toggled()),
                Message::GlobalFilter => self.enter_cmd_mode(CMDMode::GlobalFilter),
                Message::ColumnFilter => {
                    if let Some(column) = self.current_column().map(str::to_string) {
                        self.enter_cmd_mode(CMDMode::ColumnFilter(column));
                    }
                }
                Message::ToggleColumnFilters => self.toggle_column_filters_panel(),
                Message::ClearFilters => self.clear_filters(),
                Message::SortCurrentColumn => {
                    if let Some(column) = self.current_column().map(str::to_string) {
                        self.toggle_sort(&column);
                    }
                }
                Message::SortColumn(column) => self.toggle_sort(&column),
                Message::GrowColumn => self.resize_current_column(self.config.resize_step),
                Message::ShrinkColumn => self.resize_current_column(-self.config.resize_step),
                Message::ResetCurrentColumn => {
                    if let Some(column) = self.current_column().map(str::to_string) {
                        self.reset_column_width(&column);
                    }
                }
                Message::BeginResize(column, x) => self.begin_resize(&column, x),
                Message::DragTo(x) => self.drag_resize(x),
                Message::EndResize => self.end_resize(),
                Message::ResetColumn(column) => {
                    self.end_resize();
                    self.reset_column_width(&column);
                }
                Message::Enter => {
                    if let Some((row, _)) = self.current_cell() {
                        self.open_detail(row);
                    }
                }
                Message::OpenDetail(row) => self.open_detail(row),
                Message::Exit => self.end_resize(),
                Message::CopyCell => self.copy_cell(),
                Message::CopyRow => self.copy_row(),
                Message::Help => self.enter_help(),
                Message::Resize(width, height) => self.ui_resize(width, height),
                Message::RawKey(_) => (),
            },
            Modus::POPUP => match msg {
                Message::Quit => self.quit(),
                Message::EndResize => self.end_resize(),
                Message::Exit | Message::Enter | Message::Help => self.exit_popup(),
                Message::Resize(width, height) => self.ui_resize(width, height),
                _ => (),
            },
            Modus::CMDINPUT => match msg {
                Message::RawKey(key) => self.raw_input(key),
                Message::EndResize => self.end_resize(),
                Message::Resize(width, height) => self.ui_resize(width, height),
                _ => (),
            },
        }
    }

    fn move_vertical(&mut self, delta: isize) {
        let vp = &mut self.session.viewport;
        let (cursor, len) = match self.prefs.view_mode {
            ViewMode::Row => (&mut vp.cursor_row, self.visible_rows.len()),
            ViewMode::Column => (
                &mut vp.cursor_column,
                self.data.as_ref().map(|d| d.columns.len()).unwrap_or(0),
            ),
        };
        *cursor = cursor.saturating_add_signed(delta).min(len.saturating_sub(1));
        self.clamp_viewport();
    }

    fn move_horizontal(&mut self, delta: isize) {
        let vp = &mut self.session.viewport;
        let (cursor, len) = match self.prefs.view_mode {
            ViewMode::Row => (
                &mut vp.cursor_column,
                self.data.as_ref().map(|d| d.columns.len()).unwrap_or(0),
            ),
            ViewMode::Column => (
                &mut vp.cursor_record,
                self.data.as_ref().map(|d| d.rows.len()).unwrap_or(0),
            ),
        };
        *cursor = cursor.saturating_add_signed(delta).min(len.saturating_sub(1));
        self.clamp_viewport();
    }

    fn scroll_detail(&mut self, delta: isize) {
        let vp = &mut self.session.viewport;
        vp.detail_scroll = vp.detail_scroll.saturating_add_signed(delta);
    }

    fn enter_help(&mut self) {
        self.release_interaction();
        self.previous_modus = self.modus;
        self.modus = Modus::POPUP;
    }

    fn exit_popup(&mut self) {
        trace!("Close popup ...");
        self.modus = self.previous_modus;
        self.previous_modus = Modus::POPUP;
    }

    fn enter_cmd_mode(&mut self, mode: CMDMode) {
        trace!("Entering command mode {:?} ...", mode);
        self.release_interaction();
        let current = match &mode {
            CMDMode::GlobalFilter => self.session.global_filter.clone(),
            CMDMode::ColumnFilter(column) => self
                .session
                .column_filters
                .get(column)
                .cloned()
                .unwrap_or_default(),
        };
        self.previous_modus = self.modus;
        self.modus = Modus::CMDINPUT;
        self.cmd_mode = Some(mode);
        self.cmd_original = current.clone();
        self.input.start(&current);
        self.last_input = self.input.get();
    }

    fn cancel_cmd_mode(&mut self) {
        if self.modus == Modus::CMDINPUT {
            self.modus = Modus::TABLE;
        }
        self.cmd_mode = None;
        self.input.clear();
        self.last_input = InputResult::default();
    }

    /// Filters are applied while typing; escape restores the previous text.
    fn raw_input(&mut self, key: KeyEvent) {
        self.last_input = self.input.read(key);
        let text = if self.last_input.canceled {
            self.cmd_original.clone()
        } else {
            self.last_input.input.clone()
        };
        match self.cmd_mode.clone() {
            Some(CMDMode::GlobalFilter) => self.set_global_filter(&text),
            Some(CMDMode::ColumnFilter(column)) => self.set_column_filter(&column, &text),
            None => warn!("Input without command mode"),
        }
        if self.last_input.finished {
            trace!("Finished cmd input {:?}", self.last_input);
            self.modus = self.previous_modus;
            self.previous_modus = Modus::CMDINPUT;
            self.cmd_mode = None;
            if self.has_active_filters() {
                self.set_status_message(format!("{} matching rows", self.visible_rows.len()));
            }
        }
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
        self.last_status_message_update = Instant::now();
    }

    fn set_clipboard(&mut self, content: String) {
        if self.clipboard.is_none() {
            match Clipboard::new() {
                Ok(clipboard) => self.clipboard = Some(clipboard),
                Err(e) => {
                    warn!("Clipboard unavailable: {:?}", e);
                    self.set_status_message("Clipboard unavailable");
                    return;
                }
            }
        }
        if let Some(clipboard) = self.clipboard.as_mut() {
            match clipboard.set_text(content) {
                Ok(_) => {
                    trace!("Copied content to clipboard.");
                    self.set_status_message("Copied to clipboard");
                }
                Err(e) => warn!("Error copying to clipboard: {:?}", e),
            }
        }
    }

    fn copy_cell(&mut self) {
        let Some((row, column)) = self.current_cell() else {
            return;
        };
        let content = format_detail_value(self.data.as_ref().and_then(|d| d.cell(row, column)));
        self.set_clipboard(content);
    }

    fn copy_row(&mut self) {
        let row = match self.session.selected_row {
            Some(idx) => Some(idx),
            None => self.current_cell().map(|(row, _)| row),
        };
        let content = row
            .and_then(|idx| self.data.as_ref()?.rows.get(idx))
            .map(|r| serde_json::Value::Object(r.clone()).to_string());
        if let Some(content) = content {
            self.set_clipboard(content);
        }
    }
}

impl Drop for Model {
    fn drop(&mut self) {
        self.release_interaction();
    }
}
