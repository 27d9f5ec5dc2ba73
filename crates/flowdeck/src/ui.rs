use crate::app::{App, InputMode};
use crate::theme::{self, icons};
use chrono::{Local, TimeZone, Utc};
use flowdeck_core::filter::TagState;
use flowdeck_core::{FilterCriteria, FlowSummary};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, List, ListItem, Paragraph, Row, Table, Wrap},
    Frame,
};

pub fn render(f: &mut Frame, app: &mut App) {
    let area = f.size();
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),
            Constraint::Min(3),
            Constraint::Length(1),
        ])
        .split(area);

    render_filter_bar(f, app, rows[0]);

    let main = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(rows[1]);
    app.update_layout(main[0]);
    render_list(f, app, main[0]);
    if app.show_tag_selector {
        render_tag_selector(f, app, main[1]);
    } else if app.show_help {
        render_help(f, main[1]);
    } else {
        render_summary(f, app, main[1]);
    }

    render_footer(f, app, rows[2]);
}

fn render_filter_bar(f: &mut Frame, app: &App, area: Rect) {
    let criteria = app.engine.criteria();
    let block = Block::default()
        .borders(Borders::ALL)
        .title("flowdeck")
        .border_style(Style::default().fg(Color::DarkGray));
    let inner = block.inner(area);
    f.render_widget(block, area);

    let label = |text: &'static str| Span::styled(text, Style::default().fg(theme::MUTED));
    let text_span = if app.input_mode == InputMode::EditText {
        Span::styled(
            format!("{}_", app.draft),
            Style::default()
                .fg(theme::ACCENT)
                .add_modifier(Modifier::BOLD),
        )
    } else {
        Span::raw(criteria.text.clone().unwrap_or_else(|| "-".to_string()))
    };
    let now = Utc::now();
    let first = Line::from(vec![
        label("service "),
        Span::styled(
            criteria.service.clone().unwrap_or_else(|| "all".to_string()),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        label("  text "),
        text_span,
        label("  time "),
        time_span(app, criteria),
        label("  tick "),
        Span::raw(app.clock.current_tick(now).to_string()),
    ]);

    let mut second = vec![label("tags ")];
    if criteria.tags.is_empty() {
        second.push(Span::raw("-"));
    }
    for tag in &criteria.tags.include {
        second.push(Span::styled(
            format!("{}{tag} ", icons::INCLUDED),
            theme::tag_badge_style(tag),
        ));
    }
    for tag in &criteria.tags.exclude {
        second.push(Span::styled(
            format!("{}{tag} ", icons::EXCLUDED),
            theme::tag_badge_style(tag).add_modifier(Modifier::CROSSED_OUT),
        ));
    }
    if !criteria.flags.is_empty() || !criteria.flag_ids.is_empty() {
        second.push(label("  flags "));
        let joined: Vec<&str> = criteria
            .flags
            .iter()
            .chain(criteria.flag_ids.iter())
            .map(String::as_str)
            .collect();
        second.push(Span::raw(joined.join(", ")));
    }

    f.render_widget(Paragraph::new(vec![first, Line::from(second)]), inner);
}

fn time_span(app: &App, criteria: &FilterCriteria) -> Span<'static> {
    let editing = match app.input_mode {
        InputMode::EditFromTick => "from",
        InputMode::EditToTick => "to",
        _ => return Span::raw(time_range_label(app, criteria)),
    };
    Span::styled(
        format!("{editing} t{}_", app.tick_draft),
        Style::default()
            .fg(theme::ACCENT)
            .add_modifier(Modifier::BOLD),
    )
}

fn time_range_label(app: &App, criteria: &FilterCriteria) -> String {
    let bound = |ms: Option<i64>| match ms {
        Some(ms) => format!("t{}", app.clock.unix_ms_to_tick(ms)),
        None => "*".to_string(),
    };
    if criteria.from_ms.is_none() && criteria.to_ms.is_none() {
        return "all".to_string();
    }
    format!("{}..{}", bound(criteria.from_ms), bound(criteria.to_ms))
}

fn list_title(app: &App) -> String {
    let count = app.engine.items().len();
    let mut title = format!(
        "Flows ({count}{})",
        if app.engine.has_more() { "+" } else { "" }
    );
    if app.engine.is_manual_loading() {
        title.push_str(" refreshing");
    } else if app.engine.is_loading_more() {
        title.push_str(" loading more");
    }
    title
}

fn render_list(f: &mut Frame, app: &mut App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(list_title(app))
        .border_style(Style::default().fg(theme::ACCENT));

    let placeholder = if let Some(err) = app.engine.load_error() {
        Some(vec![
            Line::from(Span::styled(
                "Failed to load flows",
                Style::default().fg(theme::WARN).add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Line::from(err.to_string()),
            Line::from(""),
            Line::from("Press r to retry, q to quit."),
        ])
    } else if app.engine.items().is_empty() {
        let message = if app.engine.is_loading() {
            "Loading flows..."
        } else {
            "No flows match the current filter"
        };
        Some(vec![Line::from(Span::styled(
            message,
            Style::default().fg(theme::MUTED),
        ))])
    } else {
        None
    };
    if let Some(lines) = placeholder {
        app.viewport.set_geometry(0, 0);
        let inner = block.inner(area);
        f.render_widget(block, area);
        f.render_widget(Paragraph::new(lines).wrap(Wrap { trim: true }), inner);
        return;
    }

    let body_height = block.inner(area).height.saturating_sub(1) as usize;
    app.viewport
        .set_geometry(body_height, app.engine.items().len());

    let opened = app.engine.opened_id();
    let rows: Vec<Row> = app
        .engine
        .items()
        .iter()
        .enumerate()
        .map(|(idx, flow)| {
            flow_row(flow, opened == Some(&flow.id)).style(theme::zebra_row_style(idx))
        })
        .collect();

    let widths = [
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Length(14),
        Constraint::Length(6),
        Constraint::Length(12),
        Constraint::Length(8),
        Constraint::Min(10),
    ];
    let table = Table::new(rows, widths)
        .header(
            Row::new(vec!["", "", "", "Service", "Port", "Time", "Dur", "Tags"])
                .style(theme::HEADER_STYLE),
        )
        .block(block)
        .highlight_style(theme::SELECTED_STYLE);

    app.table_state.select(Some(app.engine.index()));
    *app.table_state.offset_mut() = app.viewport.offset();
    f.render_stateful_widget(table, area, &mut app.table_state);
    app.viewport.sync_offset(app.table_state.offset());
}

fn flow_row(flow: &FlowSummary, opened: bool) -> Row<'static> {
    let star = if flow.is_starred() {
        Span::styled(icons::STARRED, Style::default().fg(theme::STAR))
    } else {
        Span::styled(icons::UNSTARRED, Style::default().fg(theme::DIM))
    };
    let link = if flow.has_links() {
        Span::styled(icons::LINKED, Style::default().fg(theme::LINK))
    } else {
        Span::raw(" ")
    };
    let marker = if opened { icons::OPENED } else { " " };
    let (duration, duration_color) = theme::duration_text(flow.duration);
    let (hms, millis) = format_time(flow.time);
    let tags: Vec<Span> = flow
        .display_tags()
        .map(|tag| Span::styled(format!("{tag} "), theme::tag_badge_style(tag)))
        .collect();

    Row::new(vec![
        Cell::from(Span::styled(marker, Style::default().fg(theme::ACCENT))),
        Cell::from(star),
        Cell::from(link),
        Cell::from(Span::styled(
            flow.service_tag.clone(),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Cell::from(Span::styled(
            format!(":{}", flow.dst_port),
            Style::default().fg(theme::MUTED),
        )),
        Cell::from(Line::from(vec![
            Span::styled(hms, Style::default().fg(theme::MUTED)),
            Span::styled(millis, Style::default().fg(theme::DIM)),
        ])),
        Cell::from(Span::styled(duration, Style::default().fg(duration_color))),
        Cell::from(Line::from(tags)),
    ])
}

/// `("HH:MM:SS", ".mmm")` in local time.
fn format_time(unix_ms: i64) -> (String, String) {
    match Local.timestamp_millis_opt(unix_ms).single() {
        Some(time) => (
            time.format("%H:%M:%S").to_string(),
            time.format("%.3f").to_string(),
        ),
        None => ("--:--:--".to_string(), ".---".to_string()),
    }
}

fn render_summary(f: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title("Flow")
        .border_style(Style::default());
    let inner = block.inner(area);
    f.render_widget(block, area);

    let Some(flow) = app.engine.selected() else {
        let p = Paragraph::new(Span::styled("No flow selected", Style::default().fg(theme::MUTED)));
        f.render_widget(p, inner);
        return;
    };

    let field = |name: &'static str, value: String| {
        Line::from(vec![
            Span::styled(format!("{name:<9}"), Style::default().fg(Color::DarkGray)),
            Span::raw(value),
        ])
    };
    let when = Local
        .timestamp_millis_opt(flow.time)
        .single()
        .map(|time| time.format("%Y-%m-%d %H:%M:%S%.3f").to_string())
        .unwrap_or_default();

    let mut lines = vec![
        Line::from(Span::styled(
            flow.id.to_string(),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        field("service", flow.service_tag.clone()),
        field("source", format!("{}:{}", flow.src_ip, flow.src_port)),
        field("dest", format!("{}:{}", flow.dst_ip, flow.dst_port)),
        field("time", when),
        field("duration", format!("{}ms", flow.duration)),
        field("packets", flow.num_packets.to_string()),
        field(
            "starred",
            if flow.is_starred() { "yes" } else { "no" }.to_string(),
        ),
    ];
    if !flow.parent_id.is_null() {
        lines.push(field("parent", flow.parent_id.to_string()));
    }
    if !flow.child_id.is_null() {
        lines.push(field("child", flow.child_id.to_string()));
    }
    if !flow.filename.is_empty() {
        lines.push(field("pcap", flow.filename.clone()));
    }

    let tags: Vec<Span> = flow
        .display_tags()
        .map(|tag| Span::styled(format!("{tag} "), theme::tag_badge_style(tag)))
        .collect();
    if !tags.is_empty() {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "Tags:",
            Style::default().fg(Color::Blue),
        )));
        lines.push(Line::from(tags));
    }
    if !flow.flags.is_empty() {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "Flags:",
            Style::default().fg(Color::Yellow),
        )));
        for flag in &flow.flags {
            lines.push(Line::from(format!("- {flag}")));
        }
    }

    f.render_widget(Paragraph::new(lines).wrap(Wrap { trim: true }), inner);
}

fn render_help(f: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title("Help")
        .border_style(Style::default().fg(Color::Yellow));
    let inner = block.inner(area);
    f.render_widget(block, area);

    let bindings = [
        ("j / Down", "Next flow"),
        ("k / Up", "Previous flow"),
        ("Enter", "Open flow (new history entry)"),
        ("r", "Refresh and open newest"),
        ("h", "Star / unstar"),
        ("/ or s", "Edit text filter"),
        ("S", "Cycle service"),
        ("t", "Tag selector"),
        ("i / o", "Toggle flag-in / flag-out"),
        ("[ / ]", "History back / forward"),
        ("f / T", "Edit from / to tick"),
        ("L", "Last 5 ticks"),
        ("c", "Clear time range"),
        ("?", "Toggle help"),
        ("q", "Quit"),
    ];
    let mut text = vec![
        Line::from(Span::styled(
            "Keyboard Shortcuts",
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
    ];
    text.extend(bindings.iter().map(|(keys, action)| {
        Line::from(vec![
            Span::styled(format!("{keys:<11}"), Color::Cyan),
            Span::raw(*action),
        ])
    }));

    f.render_widget(Paragraph::new(text).wrap(Wrap { trim: true }), inner);
}

fn render_tag_selector(f: &mut Frame, app: &mut App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title("Tags (space: include / exclude / off)")
        .border_style(Style::default().fg(theme::ACCENT));
    let inner = block.inner(area);
    f.render_widget(block, area);

    if app.tags.is_empty() {
        f.render_widget(Paragraph::new("No tags found"), inner);
        return;
    }

    let filter = &app.engine.criteria().tags;
    let items: Vec<ListItem> = app
        .tags
        .iter()
        .map(|tag| {
            let marker = match filter.state(tag) {
                TagState::Included => icons::INCLUDED,
                TagState::Excluded => icons::EXCLUDED,
                TagState::Off => icons::OFF,
            };
            ListItem::new(Line::from(vec![
                Span::raw(format!("[{marker}] ")),
                Span::styled(tag.clone(), theme::tag_badge_style(tag)),
            ]))
        })
        .collect();

    let list = List::new(items)
        .highlight_style(theme::SELECTED_STYLE)
        .highlight_symbol("> ");
    f.render_stateful_widget(list, inner, &mut app.tag_list_state);
}

fn render_footer(f: &mut Frame, app: &App, area: Rect) {
    let line = match app.status.as_deref().or(app.engine.status()) {
        Some(status) => Line::from(Span::styled(
            status.to_string(),
            Style::default().fg(theme::WARN),
        )),
        None => Line::from(vec![
            Span::styled(app.history.current().to_string(), Style::default().fg(theme::DIM)),
            Span::styled("   ? help  q quit", Style::default().fg(theme::MUTED)),
        ]),
    };
    f.render_widget(Paragraph::new(line), area);
}
