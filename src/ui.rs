use std::time::Duration;

use ratatui::{
    Frame,
    layout::{Constraint, Position, Rect},
    style::{Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Cell, Clear, Paragraph, Row, Table, Wrap},
};

use crate::domain::{CMDMode, HELP_TEXT};
use crate::model::{Model, RowProjection};
use crate::prefs::{Density, ViewMode};

pub const TOOLBAR_HEIGHT: u16 = 1;
pub const FILTER_PANEL_HEIGHT: u16 = 1;
pub const TABLE_HEADER_HEIGHT: u16 = 1;
pub const FOOTER_HEIGHT: u16 = 1;
pub const STATUSLINE_HEIGHT: u16 = 1;
pub const CMDLINE_HEIGHT: u16 = 1;
pub const COLUMN_SPACING: u16 = 1;
pub const ACTION_COLUMN_WIDTH: u16 = 3;
pub const ACTION_LABEL: &str = "[+]";

const STATUS_MESSAGE_TIMEOUT: Duration = Duration::from_secs(3);

fn toggle_button(label: &str, active: bool) -> Span<'static> {
    if active {
        format!("[{label}]").black().on_cyan().bold()
    } else {
        format!(" {label} ").into()
    }
}

pub fn draw(model: &Model, frame: &mut Frame) {
    let area = frame.area();
    let layout = model.uilayout();
    let clip = |r: Rect| r.intersection(area);

    draw_toolbar(model, frame, clip(layout.toolbar));
    if let Some(panel) = layout.filter_panel {
        draw_filter_panel(model, frame, clip(panel));
    }

    let table_area = clip(layout.table);
    if model.is_loading() {
        frame.render_widget(Paragraph::new("Loading data...").centered(), table_area);
    } else if model.data().is_none() {
        frame.render_widget(
            Paragraph::new("No data loaded.").centered().dim(),
            table_area,
        );
    } else {
        match model.prefs().view_mode {
            ViewMode::Row => draw_rows(model, frame, table_area),
            ViewMode::Column => draw_columns(model, frame, table_area),
        }
    }

    frame.render_widget(
        Paragraph::new(model.footer_text()).dim(),
        clip(layout.footer),
    );
    draw_statusline(model, frame, clip(layout.statusline));
    draw_cmdline(model, frame, clip(layout.cmdline));

    if model.detail().is_some() {
        draw_detail(model, frame, clip(layout.overlay_area()));
    }
    if model.show_help() {
        let popup = clip(layout.overlay_area());
        frame.render_widget(Clear, popup);
        frame.render_widget(
            Paragraph::new(HELP_TEXT).block(Block::bordered().title(" Help (Esc to close) ")),
            popup,
        );
    }
}

fn draw_toolbar(model: &Model, frame: &mut Frame, area: Rect) {
    let prefs = model.prefs();
    let session = model.session();
    let identity = model.identity();
    let mut spans = vec![
        format!(" {} ", identity.table_name).black().on_white(),
        " View:".bold(),
        toggle_button("Row", prefs.view_mode == ViewMode::Row),
        toggle_button("Column", prefs.view_mode == ViewMode::Column),
        "  Density:".bold(),
        toggle_button("Standard", prefs.density == Density::Standard),
        toggle_button("Compact", prefs.density == Density::Compact),
    ];
    if let Some(sort) = &session.sort {
        spans.push("  Sort: ".bold());
        spans.push(format!("{} {}", sort.column, sort.direction.symbol()).yellow());
    }
    if !session.global_filter.trim().is_empty() {
        spans.push("  Filter: ".bold());
        spans.push(format!("\"{}\"", session.global_filter).yellow());
    }
    frame.render_widget(Line::from(spans), area);
}

fn draw_filter_panel(model: &Model, frame: &mut Frame, area: Rect) {
    let filters = &model.session().column_filters;
    let line = if filters.is_empty() {
        Line::from(" No column filters, press f to filter the current column".dim())
    } else {
        let mut spans = vec![" Column filters:".bold()];
        for (column, term) in filters {
            spans.push(format!(" {column}=").into());
            spans.push(format!("\"{term}\"").yellow());
        }
        Line::from(spans)
    };
    frame.render_widget(line, area);
}

fn header_label(projection: &RowProjection, idx: usize) -> String {
    let column = &projection.columns[idx];
    let mut label = column.name.clone();
    if let Some(direction) = column.sort {
        label.push(' ');
        label.push_str(direction.symbol());
    }
    if column.filter.is_some() {
        label.push('*');
    }
    label
}

fn draw_rows(model: &Model, frame: &mut Frame, area: Rect) {
    let projection = model.row_projection();
    let visible = model.visible_columns();
    let vp = &model.session().viewport;

    let mut widths: Vec<Constraint> = visible.iter().map(|&(_, w)| Constraint::Length(w)).collect();
    widths.push(Constraint::Length(ACTION_COLUMN_WIDTH));

    let header = Row::new(
        visible
            .iter()
            .map(|&(idx, _)| {
                let cell = Cell::from(header_label(&projection, idx));
                if idx == vp.cursor_column {
                    cell.underlined()
                } else {
                    cell
                }
            })
            .chain(std::iter::once(Cell::from(""))),
    )
    .style(Style::new().bold().reversed());

    let margin = match model.prefs().density {
        Density::Standard => 1,
        Density::Compact => 0,
    };
    let rows = projection
        .rows
        .iter()
        .enumerate()
        .skip(vp.offset_row)
        .take(model.body_capacity())
        .map(|(pos, row)| {
            let cells = visible
                .iter()
                .map(|&(idx, _)| {
                    let cell = Cell::from(row.cells[idx].as_str());
                    if pos == vp.cursor_row && idx == vp.cursor_column {
                        cell.reversed()
                    } else {
                        cell
                    }
                })
                .chain(std::iter::once(Cell::from(ACTION_LABEL).cyan()));
            let line = Row::new(cells).bottom_margin(margin);
            if pos == vp.cursor_row {
                line.style(Style::new().add_modifier(Modifier::BOLD))
            } else {
                line
            }
        });

    let table = Table::new(rows, widths)
        .header(header)
        .column_spacing(COLUMN_SPACING);
    frame.render_widget(table, area);

    if let Some(empty) = &projection.empty {
        let body = Rect {
            y: area.y + TABLE_HEADER_HEIGHT,
            height: area.height.saturating_sub(TABLE_HEADER_HEIGHT),
            ..area
        };
        frame.render_widget(Paragraph::new(empty.message()).centered().dim(), body);
    }
}

fn draw_columns(model: &Model, frame: &mut Frame, area: Rect) {
    let projection = model.column_projection();
    let records = model.visible_records();
    let vp = &model.session().viewport;

    let mut widths = vec![Constraint::Length(model.field_column_width())];
    let header_cells: Vec<Cell> = if projection.placeholder {
        widths.push(Constraint::Fill(1));
        vec![Cell::from("Field"), Cell::from("")]
    } else {
        widths.extend(records.iter().map(|&(_, w)| Constraint::Length(w)));
        std::iter::once(Cell::from("Field"))
            .chain(
                records
                    .iter()
                    .map(|&(idx, _)| Cell::from(projection.headers[idx].as_str())),
            )
            .collect()
    };
    let header = Row::new(header_cells).style(Style::new().bold().reversed());

    let rows = projection
        .fields
        .iter()
        .enumerate()
        .skip(vp.offset_field)
        .take(model.body_capacity())
        .map(|(field_idx, field)| {
            let name = Cell::from(field.name.as_str()).bold();
            let line = if projection.placeholder {
                Row::new(vec![name, Cell::from(field.cells[0].as_str()).italic().dim()])
            } else {
                Row::new(std::iter::once(name).chain(records.iter().map(|&(idx, _)| {
                    let cell = Cell::from(field.cells[idx].as_str());
                    if field_idx == vp.cursor_column && idx == vp.cursor_record {
                        cell.reversed()
                    } else {
                        cell
                    }
                })))
            };
            if field_idx == vp.cursor_column {
                line.style(Style::new().add_modifier(Modifier::BOLD))
            } else {
                line
            }
        });

    let table = Table::new(rows, widths)
        .header(header)
        .column_spacing(COLUMN_SPACING);
    frame.render_widget(table, area);
}

fn draw_statusline(model: &Model, frame: &mut Frame, area: Rect) {
    let recent = model.last_status_message_update().elapsed() < STATUS_MESSAGE_TIMEOUT;
    let text = match model.current_tooltip() {
        Some(tooltip) if !recent => tooltip,
        _ => model.status_message().to_string(),
    };
    frame.render_widget(Paragraph::new(text).italic(), area);
}

fn draw_cmdline(model: &Model, frame: &mut Frame, area: Rect) {
    let Some((mode, input)) = model.cmd_input() else {
        frame.render_widget(
            Line::from(vec![" Help ".into(), "<?>".blue().bold(), " Quit ".into(), "<q>".blue().bold()]),
            area,
        );
        return;
    };
    let prompt = match mode {
        CMDMode::GlobalFilter => "Filter: ".to_string(),
        CMDMode::ColumnFilter(column) => format!("Filter {column}: "),
    };
    let prompt_width = prompt.chars().count() as u16;
    frame.render_widget(
        Line::from(vec![prompt.bold(), input.input.as_str().into()]),
        area,
    );
    let x = area.x + prompt_width + input.cursor_pos as u16;
    frame.set_cursor_position(Position::new(x.min(area.right().saturating_sub(1)), area.y));
}

fn draw_detail(model: &Model, frame: &mut Frame, area: Rect) {
    let Some(detail) = model.detail() else {
        return;
    };
    let mut lines: Vec<Line> = Vec::new();
    for (name, value) in &detail.fields {
        lines.push(Line::from(name.clone().bold().cyan()));
        if value.is_empty() {
            lines.push(Line::from("  (empty)".dim()));
        }
        for part in value.lines() {
            lines.push(Line::from(format!("  {part}")));
        }
    }
    let scroll = model.session().viewport.detail_scroll.min(u16::MAX as usize) as u16;
    frame.render_widget(Clear, area);
    frame.render_widget(
        Paragraph::new(Text::from(lines))
            .wrap(Wrap { trim: false })
            .scroll((scroll, 0))
            .block(Block::bordered().title(format!(" {} (Esc to close) ", detail.title))),
        area,
    );
}
