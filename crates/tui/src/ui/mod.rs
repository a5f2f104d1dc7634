use aesthetic_core::{MessageState, Role};
use ratatui::{
    layout::{Constraint, Direction, Layout, Position, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState},
    Frame,
};
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

use crate::app::input::{input_height, measure_prefix_line_col, wrap_draft_lines};
use crate::app::{App, Focus};
use crate::strings::{
    build_status_line, build_stick_label, spinner_frame, typing_dots, APP_TITLE,
    INPUT_PLACEHOLDER, PREFIX_ASSISTANT, PREFIX_USER, PROMPTS_CAPTION, SEND_LABEL, TITLE_CHAT,
    TITLE_PROMPTS,
};
use crate::theme::THEME;

/// Renders the whole screen. Reads the session; never mutates it.
pub fn draw(f: &mut Frame, app: &mut App) {
    let area = f.area();
    let inner_width = area.width.saturating_sub(2);

    // Grow or shrink the compose box one row per frame toward its target.
    let target_lines = input_height(app.session.draft(), inner_width, app.input_max_lines);
    let current = app.input_visible_lines.max(1);
    app.input_visible_lines = if current < target_lines {
        current + 1
    } else if current > target_lines {
        current - 1
    } else {
        current
    };
    if app.input_visible_lines != target_lines {
        app.dirty = true;
    }
    let input_height = app.input_visible_lines + 2;

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(3),
            Constraint::Length(1),
            Constraint::Length(input_height),
        ])
        .split(area);

    draw_header(f, chunks[0], app);
    if app.picker_available() {
        draw_prompts(f, chunks[1], app);
    } else {
        draw_chat(f, chunks[1], app);
    }
    draw_status(f, chunks[2], app);
    draw_input(f, chunks[3], app);

    if app.scroll.is_settling() {
        app.dirty = true;
    }
}

fn draw_header(f: &mut Frame, area: Rect, app: &App) {
    let line = Line::from(vec![
        Span::styled(
            format!(" {}", APP_TITLE),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!("  {}", app.model_label),
            Style::default().fg(THEME.muted),
        ),
    ]);
    f.render_widget(Paragraph::new(line), area);
}

fn draw_prompts(f: &mut Frame, area: Rect, app: &mut App) {
    // No transcript pane while the picker is showing.
    app.scroll.unmount();
    app.chat_area = None;

    let focused = app.focus == Focus::Prompts;
    let border_style = if focused {
        Style::default().fg(THEME.border_focus)
    } else {
        Style::default().fg(THEME.border_inactive)
    };
    let block = Block::default()
        .title(TITLE_PROMPTS)
        .borders(Borders::ALL)
        .border_style(border_style);
    let inner = block.inner(area);

    let mut lines: Vec<Line> = vec![
        Line::from(Span::styled(
            PROMPTS_CAPTION,
            Style::default().fg(THEME.muted),
        )),
        Line::from(""),
    ];
    app.picker.hit_rows.clear();
    for (i, prompt) in app.picker.catalog.entries().iter().enumerate() {
        let row = 2 + i as u16;
        if row < inner.height {
            app.picker
                .hit_rows
                .push((i, Rect::new(inner.x, inner.y + row, inner.width, 1)));
        }
        let selected = focused && i == app.picker.selected;
        let style = if selected {
            Style::default()
                .fg(THEME.prompt_selected_fg)
                .bg(THEME.prompt_selected_bg)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };
        let marker = if selected { "> " } else { "  " };
        lines.push(Line::from(Span::styled(
            format!("{}{}", marker, prompt),
            style,
        )));
    }
    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_chat(f: &mut Frame, area: Rect, app: &mut App) {
    let block = Block::default()
        .title(TITLE_CHAT)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(THEME.chat_border));
    let inner = block.inner(area);
    app.chat_area = Some(area);
    app.picker.hit_rows.clear();
    app.scroll.mount(inner);

    // Last column belongs to the scrollbar.
    app.ensure_chat_wrapped(inner.width.saturating_sub(1));
    let offset = app.scroll.layout(app.chat_total_lines, inner.height);

    let dots = typing_dots(app.tick);
    let mut vis_lines: Vec<Line> = Vec::new();
    let mut skip = offset;
    let mut remaining = inner.height as usize;
    'outer: for cached in &app.chat_cache {
        if skip >= cached.lines.len() {
            skip -= cached.lines.len();
            continue;
        }
        let (prefix, prefix_style) = match cached.role {
            Role::User => (
                PREFIX_USER,
                Style::default()
                    .fg(THEME.user_prefix)
                    .add_modifier(Modifier::BOLD),
            ),
            Role::Assistant => (
                PREFIX_ASSISTANT,
                Style::default()
                    .fg(THEME.assistant_prefix)
                    .add_modifier(Modifier::BOLD),
            ),
        };
        for (i, line) in cached.lines.iter().enumerate().skip(skip) {
            if remaining == 0 {
                break 'outer;
            }
            let rendered = if i >= cached.body {
                let style = match cached.state {
                    MessageState::Failed(_) => Style::default().fg(THEME.error),
                    _ => Style::default().fg(THEME.muted),
                };
                Line::from(Span::styled(line.clone(), style))
            } else if i == 0 && cached.awaiting_text() {
                Line::from(vec![
                    Span::styled(prefix, prefix_style),
                    Span::styled(dots, Style::default().fg(THEME.muted)),
                ])
            } else if i == 0 {
                let cut = prefix.len().min(line.len());
                Line::from(vec![
                    Span::styled(line[..cut].to_string(), prefix_style),
                    Span::raw(line[cut..].to_string()),
                ])
            } else {
                Line::from(line.clone())
            };
            vis_lines.push(rendered);
            remaining -= 1;
        }
        skip = 0;
    }

    f.render_widget(Paragraph::new(vis_lines).block(block), area);

    if app.chat_total_lines > inner.height as usize {
        let mut sb_state = ScrollbarState::new(app.chat_total_lines).position(offset);
        let sb = Scrollbar::default().orientation(ScrollbarOrientation::VerticalRight);
        f.render_stateful_widget(sb, inner, &mut sb_state);
    }
}

fn draw_status(f: &mut Frame, area: Rect, app: &App) {
    let busy = app.session.is_busy().then(|| spinner_frame(app.tick));
    let stick = build_stick_label(app.scroll.lines_below());
    let text = build_status_line(busy, &stick, &app.model_label, area.width);
    let para = Paragraph::new(Line::from(Span::styled(
        text,
        Style::default().fg(THEME.muted),
    )));
    f.render_widget(para, area);
}

fn draw_input(f: &mut Frame, area: Rect, app: &mut App) {
    let focused = app.focus == Focus::Input;
    let border_style = if focused {
        Style::default().fg(THEME.border_focus)
    } else {
        Style::default().fg(THEME.border_inactive)
    };
    let draft = app.session.draft();
    let can_send = !draft.trim().is_empty() && !app.session.is_busy();
    let send_style = if can_send {
        Style::default()
            .fg(THEME.send_active)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(THEME.muted)
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style)
        .title_top(Line::from(Span::styled(SEND_LABEL, send_style)).right_aligned());

    let inner_width = area.width.saturating_sub(2);
    let graphemes: Vec<&str> = draft.graphemes(true).collect();
    let upto = app.input_cursor.min(graphemes.len());
    let (line_idx, col_width) = measure_prefix_line_col(&graphemes, upto, inner_width);
    let offset_y = line_idx.saturating_sub(app.input_visible_lines.saturating_sub(1));

    let para = if draft.is_empty() {
        Paragraph::new(Line::from(Span::styled(
            INPUT_PLACEHOLDER,
            Style::default().fg(THEME.muted),
        )))
        .block(block)
    } else {
        // Rows come pre-broken so the box height and caret match the text.
        let rows: Vec<Line> = wrap_draft_lines(draft, inner_width)
            .into_iter()
            .map(Line::from)
            .collect();
        Paragraph::new(rows).block(block).scroll((offset_y, 0))
    };
    f.render_widget(para, area);

    let label_w = UnicodeWidthStr::width(SEND_LABEL) as u16;
    app.send_area = Some(Rect::new(
        area.x + area.width.saturating_sub(1 + label_w),
        area.y,
        label_w,
        1,
    ));

    if focused {
        let cursor_x = area.x + 1 + col_width;
        let cursor_y = area.y + 1 + line_idx.saturating_sub(offset_y);
        f.set_cursor_position(Position::new(cursor_x, cursor_y));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::Backend;
    use crate::strings::MARKER_STOPPED;
    use aesthetic_core::prompts::SAMPLE_PROMPTS;
    use ratatui::{backend::TestBackend, Terminal};
    use tokio::runtime::Handle;

    fn offline_app() -> App {
        App::new(
            Handle::current(),
            Backend::Unavailable("config: OPENAI_API_KEY not set".into()),
        )
    }

    fn render(term: &mut Terminal<TestBackend>, app: &mut App) -> String {
        term.draw(|f| draw(f, app)).unwrap();
        let buf = term.backend().buffer();
        let mut out = String::new();
        for y in 0..buf.area.height {
            for x in 0..buf.area.width {
                out.push_str(buf[(x, y)].symbol());
            }
            out.push('\n');
        }
        out
    }

    #[tokio::test]
    async fn empty_session_lists_sample_prompts() {
        let mut app = offline_app();
        let mut term = Terminal::new(TestBackend::new(80, 20)).unwrap();
        let screen = render(&mut term, &mut app);

        assert!(screen.contains(APP_TITLE));
        assert!(screen.contains(PROMPTS_CAPTION));
        for p in SAMPLE_PROMPTS {
            assert!(screen.contains(p), "missing prompt {p:?}");
        }
        assert!(screen.contains(INPUT_PLACEHOLDER));
        assert!(screen.contains(SEND_LABEL));
        assert_eq!(app.picker.hit_rows.len(), SAMPLE_PROMPTS.len());
        assert!(!app.scroll.is_mounted());
    }

    #[tokio::test]
    async fn transcript_shows_turns_and_outcome_markers() {
        let mut app = offline_app();
        app.session.set_draft("Hello");
        app.submit();
        let mut term = Terminal::new(TestBackend::new(80, 20)).unwrap();
        let busy = render(&mut term, &mut app);
        assert!(busy.contains("| Hello"));
        assert!(busy.contains("Thinking"));
        assert!(app.scroll.is_mounted());

        app.on_tick();
        let failed = render(&mut term, &mut app);
        assert!(failed.contains("[error] config: OPENAI_API_KEY not set"));
        assert!(failed.contains("Ready"));

        app.session.set_draft("again");
        app.submit();
        app.stop();
        let stopped = render(&mut term, &mut app);
        assert!(stopped.contains(MARKER_STOPPED));
    }

    #[tokio::test]
    async fn input_box_grows_one_row_per_frame_up_to_the_cap() {
        let mut app = offline_app();
        let mut term = Terminal::new(TestBackend::new(40, 24)).unwrap();
        app.session.set_draft("a\nb\nc");
        render(&mut term, &mut app);
        assert_eq!(app.input_visible_lines, 2);
        render(&mut term, &mut app);
        assert_eq!(app.input_visible_lines, 3);
        render(&mut term, &mut app);
        assert_eq!(app.input_visible_lines, 3);

        app.session.set_draft("x\n".repeat(20));
        for _ in 0..10 {
            render(&mut term, &mut app);
        }
        assert_eq!(app.input_visible_lines, app.input_max_lines);
    }

    #[tokio::test]
    async fn send_area_sits_on_the_input_border() {
        let mut app = offline_app();
        let mut term = Terminal::new(TestBackend::new(60, 16)).unwrap();
        let screen = render(&mut term, &mut app);
        let send = app.send_area.unwrap();
        let row: String = screen.lines().nth(send.y as usize).unwrap().to_string();
        let cells: Vec<&str> = row.graphemes(true).collect();
        let label: String = cells[send.x as usize..(send.x + send.width) as usize].concat();
        assert_eq!(label, SEND_LABEL);
    }

    #[tokio::test]
    async fn long_words_stay_visible_in_the_compose_box() {
        let mut app = offline_app();
        // Ten columns inside the borders.
        let mut term = Terminal::new(TestBackend::new(12, 12)).unwrap();
        app.on_paste("aaaaa bbbbbb ccccc");
        let mut screen = String::new();
        for _ in 0..3 {
            screen = render(&mut term, &mut app);
        }
        assert_eq!(app.input_visible_lines, 2);

        let rows: Vec<&str> = screen.lines().collect();
        assert_eq!(rows[9], "│aaaaa bbbb│");
        assert_eq!(rows[10], "│bb ccccc  │");
        // Caret sits right after the last grapheme, on the last row.
        assert_eq!(term.get_cursor_position().unwrap(), Position::new(9, 10));
    }
}
