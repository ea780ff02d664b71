use std::time::{Duration, Instant};
use tracing::trace;

use ratatui::crossterm::event::{
    self, Event, KeyCode, KeyEvent, KeyEventKind, MouseButton, MouseEvent, MouseEventKind,
};

use crate::domain::{Message, TVConfig, TVError};
use crate::layout::{HeaderHit, hit_test};
use crate::model::Model;
use crate::prefs::ViewMode;
use crate::ui::{ACTION_COLUMN_WIDTH, COLUMN_SPACING};

pub struct Controller {
    event_poll_time: u64,
    double_click: Duration,
    last_handle_press: Option<(String, Instant)>,
}

impl Controller {
    pub fn new(cfg: &TVConfig) -> Self {
        Self {
            event_poll_time: cfg.event_poll_time,
            double_click: Duration::from_millis(cfg.double_click_ms),
            last_handle_press: None,
        }
    }

    pub fn handle_event(&mut self, model: &Model) -> Result<Option<Message>, TVError> {
        if !event::poll(Duration::from_millis(self.event_poll_time))? {
            return Ok(None);
        }
        let message = match event::read()? {
            Event::Key(key) if key.kind == KeyEventKind::Press => self.handle_key(model, key),
            Event::Mouse(mouse) => self.handle_mouse(model, mouse, Instant::now()),
            Event::Resize(width, height) => Some(Message::Resize(width as usize, height as usize)),
            _ => None,
        };
        Ok(message)
    }

    fn handle_key(&self, model: &Model, key: KeyEvent) -> Option<Message> {
        if model.raw_keyevents() {
            return Some(Message::RawKey(key));
        }
        let message = match key.code {
            KeyCode::Char('q') => Some(Message::Quit),
            KeyCode::Esc => Some(Message::Exit),
            KeyCode::Enter => Some(Message::Enter),
            KeyCode::Up | KeyCode::Char('k') => Some(Message::MoveUp),
            KeyCode::Down | KeyCode::Char('j') => Some(Message::MoveDown),
            KeyCode::Left | KeyCode::Char('h') => Some(Message::MoveLeft),
            KeyCode::Right | KeyCode::Char('l') => Some(Message::MoveRight),
            KeyCode::PageUp => Some(Message::MovePageUp),
            KeyCode::PageDown => Some(Message::MovePageDown),
            KeyCode::Home | KeyCode::Char('g') => Some(Message::MoveBeginning),
            KeyCode::End | KeyCode::Char('G') => Some(Message::MoveEnd),
            KeyCode::Char('v') => Some(Message::ToggleViewMode),
            KeyCode::Char('d') => Some(Message::ToggleDensity),
            KeyCode::Char('/') => Some(Message::GlobalFilter),
            KeyCode::Char('f') => Some(Message::ColumnFilter),
            KeyCode::Char('F') => Some(Message::ToggleColumnFilters),
            KeyCode::Char('x') => Some(Message::ClearFilters),
            KeyCode::Char('s') => Some(Message::SortCurrentColumn),
            KeyCode::Char('>') => Some(Message::GrowColumn),
            KeyCode::Char('<') => Some(Message::ShrinkColumn),
            KeyCode::Char('=') => Some(Message::ResetCurrentColumn),
            KeyCode::Char('y') => Some(Message::CopyCell),
            KeyCode::Char('Y') => Some(Message::CopyRow),
            KeyCode::Char('?') => Some(Message::Help),
            _ => None,
        };
        trace!("Mapped: {key:?} => {message:?}");
        message
    }

    /// Pointer motion and release only matter while a resize drag is active;
    /// while the detail overlay is open only presses outside of it do.
    fn handle_mouse(&mut self, model: &Model, mouse: MouseEvent, now: Instant) -> Option<Message> {
        let (x, y) = (mouse.column, mouse.row);
        if model.is_dragging() {
            return match mouse.kind {
                MouseEventKind::Drag(MouseButton::Left) => Some(Message::DragTo(x)),
                MouseEventKind::Up(MouseButton::Left) => Some(Message::EndResize),
                _ => None,
            };
        }
        if model.is_overlay_open() {
            return match mouse.kind {
                MouseEventKind::Down(MouseButton::Left) => {
                    let inside = model
                        .uilayout()
                        .overlay_area()
                        .contains(ratatui::layout::Position::new(x, y));
                    (!inside).then_some(Message::Exit)
                }
                MouseEventKind::ScrollDown => Some(Message::MoveDown),
                MouseEventKind::ScrollUp => Some(Message::MoveUp),
                _ => None,
            };
        }
        if model.raw_keyevents() || model.show_help() {
            return None;
        }
        match mouse.kind {
            MouseEventKind::ScrollDown => Some(Message::MoveDown),
            MouseEventKind::ScrollUp => Some(Message::MoveUp),
            MouseEventKind::Down(MouseButton::Left)
                if model.prefs().view_mode == ViewMode::Row =>
            {
                self.press_in_row_view(model, x, y, now)
            }
            _ => None,
        }
    }

    fn press_in_row_view(&mut self, model: &Model, x: u16, y: u16, now: Instant) -> Option<Message> {
        let data = model.data()?;
        let visible = model.visible_columns();
        let table = model.uilayout().table;

        if y == table.y {
            let widths: Vec<u16> = visible.iter().map(|&(_, w)| w).collect();
            return match hit_test(table.x, &widths, x)? {
                HeaderHit::Label(pos) => {
                    Some(Message::SortColumn(data.columns[visible[pos].0].clone()))
                }
                HeaderHit::Handle(pos) => {
                    let column = data.columns[visible[pos].0].clone();
                    Some(self.press_handle(column, x, now))
                }
            };
        }

        let row = model.row_at(y)?;
        let action_x: u16 = table.x
            + visible
                .iter()
                .map(|&(_, w)| w + COLUMN_SPACING)
                .sum::<u16>();
        (x >= action_x && x < action_x + ACTION_COLUMN_WIDTH).then_some(Message::OpenDetail(row))
    }

    /// A second press on the same handle within the double click window
    /// resets the column, any other press starts a drag.
    fn press_handle(&mut self, column: String, x: u16, now: Instant) -> Message {
        let is_double = matches!(
            &self.last_handle_press,
            Some((last, at)) if *last == column && now.duration_since(*at) <= self.double_click
        );
        if is_double {
            self.last_handle_press = None;
            Message::ResetColumn(column)
        } else {
            self.last_handle_press = Some((column.clone(), now));
            Message::BeginResize(column, x)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prefs::{MemoryStore, TableIdentity};
    use crate::table::TableData;
    use ratatui::crossterm::event::KeyModifiers;
    use serde_json::json;

    fn model() -> Model {
        let rows = [json!({"a": "x", "b": 1}), json!({"a": "y", "b": 2})]
            .into_iter()
            .map(|v| v.as_object().cloned().unwrap())
            .collect();
        let mut m = Model::init(&TVConfig::default(), Box::new(MemoryStore::new()), 80, 20);
        m.set_source(
            Some(TableData::new(vec!["a".into(), "b".into()], rows)),
            false,
            TableIdentity::new("/db", "t"),
        );
        m
    }

    fn mouse(kind: MouseEventKind, column: u16, row: u16) -> MouseEvent {
        MouseEvent {
            kind,
            column,
            row,
            modifiers: KeyModifiers::NONE,
        }
    }

    fn press(column: u16, row: u16) -> MouseEvent {
        mouse(MouseEventKind::Down(MouseButton::Left), column, row)
    }

    #[test]
    fn maps_keys() {
        let c = Controller::new(&TVConfig::default());
        let m = model();
        let key = |code| KeyEvent::new(code, KeyModifiers::NONE);
        assert_eq!(c.handle_key(&m, key(KeyCode::Char('q'))), Some(Message::Quit));
        assert_eq!(c.handle_key(&m, key(KeyCode::Char('s'))), Some(Message::SortCurrentColumn));
        assert_eq!(c.handle_key(&m, key(KeyCode::Esc)), Some(Message::Exit));
        assert_eq!(c.handle_key(&m, key(KeyCode::F(5))), None);
    }

    #[test]
    fn header_press_sorts_or_starts_resize() {
        let mut c = Controller::new(&TVConfig::default());
        let m = model();
        let header_y = m.uilayout().table.y;
        let (_, width_a) = m.visible_columns()[0];
        let now = Instant::now();

        assert_eq!(
            c.handle_mouse(&m, press(0, header_y), now),
            Some(Message::SortColumn("a".into()))
        );
        assert_eq!(
            c.handle_mouse(&m, press(width_a - 1, header_y), now),
            Some(Message::BeginResize("a".into(), width_a - 1))
        );
    }

    #[test]
    fn double_press_on_handle_resets() {
        let mut c = Controller::new(&TVConfig::default());
        let m = model();
        let header_y = m.uilayout().table.y;
        let (_, width_a) = m.visible_columns()[0];
        let handle = width_a - 1;
        let now = Instant::now();

        c.handle_mouse(&m, press(handle, header_y), now);
        assert_eq!(
            c.handle_mouse(&m, press(handle, header_y), now + Duration::from_millis(100)),
            Some(Message::ResetColumn("a".into()))
        );
        // Too slow for a double click.
        c.handle_mouse(&m, press(handle, header_y), now);
        assert!(matches!(
            c.handle_mouse(&m, press(handle, header_y), now + Duration::from_secs(2)),
            Some(Message::BeginResize(_, _))
        ));
    }

    #[test]
    fn motion_is_only_routed_while_dragging() {
        let mut c = Controller::new(&TVConfig::default());
        let mut m = model();
        let drag = mouse(MouseEventKind::Drag(MouseButton::Left), 30, 1);
        let release = mouse(MouseEventKind::Up(MouseButton::Left), 30, 1);
        let now = Instant::now();

        assert_eq!(c.handle_mouse(&m, drag, now), None);
        assert_eq!(c.handle_mouse(&m, release, now), None);

        m.begin_resize("a", 3);
        assert_eq!(c.handle_mouse(&m, drag, now), Some(Message::DragTo(30)));
        assert_eq!(c.handle_mouse(&m, release, now), Some(Message::EndResize));
        m.end_resize();
        assert_eq!(c.handle_mouse(&m, drag, now), None);
    }

    #[test]
    fn action_cell_opens_detail_and_outside_press_closes() {
        let mut c = Controller::new(&TVConfig::default());
        let mut m = model();
        let action_x: u16 = m.visible_columns().iter().map(|&(_, w)| w + 1).sum();
        let second_row_y = m.uilayout().body_top() + 2;
        let now = Instant::now();

        assert_eq!(
            c.handle_mouse(&m, press(action_x, second_row_y), now),
            Some(Message::OpenDetail(1))
        );
        assert_eq!(c.handle_mouse(&m, press(0, second_row_y), now), None);

        m.open_detail(1);
        let overlay = m.uilayout().overlay_area();
        assert_eq!(c.handle_mouse(&m, press(overlay.x + 1, overlay.y + 1), now), None);
        assert_eq!(c.handle_mouse(&m, press(0, 0), now), Some(Message::Exit));
    }
}
