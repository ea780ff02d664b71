use std::fmt;
use std::io::Error;

use derive_setters::Setters;
use ratatui::crossterm::event::KeyEvent;

pub const HELP_TEXT: &str = "\
tvgrid key bindings

  q            quit
  arrows/hjkl  move selection
  PgUp/PgDn    page up/down
  Home/End     first/last row
  v            toggle row/column view
  d            toggle standard/compact density
  /            global filter
  f            filter current column
  F            show/hide column filters
  x            clear all filters
  s            cycle sort on current column
  < / >        shrink/grow current column
  =            reset current column width
  Enter        show row details
  Esc          close details/popup
  y / Y        copy cell / row
  ?            this help

Mouse: click a header to sort, drag its right edge to resize,
double click the edge to reset.";

#[derive(Debug)]
pub enum TVError {
    IoError(Error),
    JsonError(serde_json::Error),
    LoadingFailed(String),
    LoggingFailed(String),
    FileNotFound,
    PermissionDenied,
}

impl fmt::Display for TVError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TVError::IoError(e) => write!(f, "io error: {e}"),
            TVError::JsonError(e) => write!(f, "invalid json: {e}"),
            TVError::LoadingFailed(msg) => write!(f, "loading failed: {msg}"),
            TVError::LoggingFailed(msg) => write!(f, "logging setup failed: {msg}"),
            TVError::FileNotFound => write!(f, "file not found"),
            TVError::PermissionDenied => write!(f, "permission denied"),
        }
    }
}

impl std::error::Error for TVError {}

impl From<Error> for TVError {
    fn from(err: Error) -> Self {
        TVError::IoError(err)
    }
}

impl From<serde_json::Error> for TVError {
    fn from(err: serde_json::Error) -> Self {
        TVError::JsonError(err)
    }
}

#[derive(Debug, Clone, Setters)]
#[setters(prefix = "with_")]
pub struct TVConfig {
    pub event_poll_time: u64,
    /// Pixels represented by one terminal cell.
    pub cell_pixel_width: u32,
    /// Upper bound for intrinsic column widths, in cells.
    pub max_column_cells: usize,
    /// Pixels added or removed by a keyboard resize.
    pub resize_step: i32,
    pub double_click_ms: u64,
}

impl Default for TVConfig {
    fn default() -> Self {
        Self {
            event_poll_time: 100,
            cell_pixel_width: 8,
            max_column_cells: 40,
            resize_step: 40,
            double_click_ms: 400,
        }
    }
}

/// Targets of the single line command input.
#[derive(Debug, Clone, PartialEq)]
pub enum CMDMode {
    GlobalFilter,
    ColumnFilter(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Quit,
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    MovePageUp,
    MovePageDown,
    MoveBeginning,
    MoveEnd,
    ToggleViewMode,
    ToggleDensity,
    GlobalFilter,
    ColumnFilter,
    ToggleColumnFilters,
    ClearFilters,
    SortCurrentColumn,
    SortColumn(String),
    GrowColumn,
    ShrinkColumn,
    ResetCurrentColumn,
    /// Press on a resize handle: column and pointer x in cells.
    BeginResize(String, u16),
    DragTo(u16),
    EndResize,
    ResetColumn(String),
    Enter,
    OpenDetail(usize),
    Exit,
    CopyCell,
    CopyRow,
    Help,
    Resize(usize, usize),
    RawKey(KeyEvent),
}
