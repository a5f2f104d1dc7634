use std::time::{Duration, Instant};

use crossterm::event::{self, Event, MouseButton, MouseEvent, MouseEventKind};
use ratatui::{backend::Backend, layout::Rect, Terminal};
use tracing::debug;

use crate::{
    app::{App, Focus},
    ui,
};

const WHEEL_ROWS: usize = 3;

pub fn run<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> anyhow::Result<()> {
    let mut last_draw = Instant::now();
    let heartbeat = Duration::from_millis(500);
    loop {
        if app.dirty || last_draw.elapsed() >= heartbeat {
            // Cleared first: drawing may ask for another frame (easing, input growth).
            app.dirty = false;
            terminal.draw(|f| ui::draw(f, app))?;
            last_draw = Instant::now();
        }

        if event::poll(Duration::from_millis(60))? {
            match event::read()? {
                Event::Key(key) => app.on_key(key),
                Event::Paste(s) => app.on_paste(&s),
                Event::Resize(w, h) => {
                    debug!(target: "tui", "resize {}x{}", w, h);
                    app.dirty = true;
                }
                Event::Mouse(me) => on_mouse(app, me),
                _ => {}
            }
        }

        app.on_tick();

        if app.should_quit {
            break;
        }
    }
    Ok(())
}

fn inside(area: Option<Rect>, x: u16, y: u16) -> bool {
    area.is_some_and(|a| x >= a.x && x < a.x + a.width && y >= a.y && y < a.y + a.height)
}

pub fn on_mouse(app: &mut App, me: MouseEvent) {
    let (x, y) = (me.column, me.row);
    match me.kind {
        MouseEventKind::ScrollUp if inside(app.chat_area, x, y) => {
            app.scroll.scroll_up(WHEEL_ROWS);
        }
        MouseEventKind::ScrollDown if inside(app.chat_area, x, y) => {
            app.scroll.scroll_down(WHEEL_ROWS);
        }
        MouseEventKind::Down(MouseButton::Left) => {
            if inside(app.send_area, x, y) {
                app.submit();
            } else if let Some(idx) = app.picker.hit(x, y) {
                app.select_prompt(idx);
            } else {
                app.focus = Focus::Input;
            }
        }
        _ => return,
    }
    app.dirty = true;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::Backend as ChatBackend;
    use crossterm::event::KeyModifiers;
    use tokio::runtime::Handle;

    fn click(x: u16, y: u16) -> MouseEvent {
        MouseEvent {
            kind: MouseEventKind::Down(MouseButton::Left),
            column: x,
            row: y,
            modifiers: KeyModifiers::NONE,
        }
    }

    #[tokio::test]
    async fn clicks_route_to_send_and_prompts() {
        let mut app = App::new(
            Handle::current(),
            ChatBackend::Unavailable("config: missing".into()),
        );
        app.picker.hit_rows = vec![(0, Rect::new(1, 3, 30, 1)), (1, Rect::new(1, 4, 30, 1))];
        app.send_area = Some(Rect::new(50, 20, 8, 1));

        // Send with a blank draft does nothing.
        on_mouse(&mut app, click(52, 20));
        assert!(app.session.is_empty());

        on_mouse(&mut app, click(10, 4));
        assert_eq!(
            app.session.draft(),
            aesthetic_core::prompts::SAMPLE_PROMPTS[1]
        );
        assert!(app.session.is_empty());

        on_mouse(&mut app, click(52, 20));
        assert_eq!(app.session.messages().len(), 2);
    }
}
