// Centralized UI strings and labels. ASCII-friendly by default.

use unicode_width::UnicodeWidthStr;

pub const APP_TITLE: &str = "aesthetic.chat";

// User messages: '|' prefix, assistant messages: '>' prefix (colors applied in UI)
pub const PREFIX_USER: &str = "| ";
pub const PREFIX_ASSISTANT: &str = "> ";

pub const INPUT_PLACEHOLDER: &str = "Message aesthetic.chat...";
pub const PROMPTS_CAPTION: &str = "Try asking about:";
pub const SEND_LABEL: &str = "[ Send ]";

// Block titles keep surrounding spaces for visual padding
pub const TITLE_CHAT: &str = " Chat ";
pub const TITLE_PROMPTS: &str = " Start a conversation ";

pub const MARKER_STOPPED: &str = "[stopped]";

pub fn marker_error(reason: &str) -> String {
    format!("[error] {}", reason)
}

const SPINNER: [&str; 4] = ["|", "/", "-", "\\"];

pub fn spinner_frame(tick: u64) -> &'static str {
    SPINNER[(tick as usize) % SPINNER.len()]
}

// Animated "." / ".." / "..." for an empty streaming turn.
pub fn typing_dots(tick: u64) -> &'static str {
    match (tick / 3) % 3 {
        0 => ".",
        1 => "..",
        _ => "...",
    }
}

pub const STICK_BOTTOM: &str = "Bottom";

pub fn build_stick_label(lines_below: usize) -> String {
    if lines_below == 0 {
        STICK_BOTTOM.to_string()
    } else {
        format!("+{} lines", lines_below)
    }
}

// Build the status bar line with width-aware compaction.
// - busy: Some(spinner frame) while a response is streaming
// - stick: e.g. "Bottom" or "+12 lines"
// - model: label of the configured model, or "offline"
pub fn build_status_line(busy: Option<&str>, stick: &str, model: &str, max_width: u16) -> String {
    let mut segments: Vec<String> = Vec::new();
    match busy {
        Some(frame) => segments.push(format!("{} Thinking  Ctrl+C: stop", frame)),
        None => segments.push("Ready".to_string()),
    }
    segments.push(format!("[{}][{}]", model, stick));
    // Hints ordered by importance; appended while space allows.
    let hints: [&str; 4] = [
        "Enter: send; Shift+Enter: newline",
        "PgUp/PgDn: scroll",
        "Ctrl+Up/Down: fine",
        "Esc: quit",
    ];
    for h in hints {
        segments.push(h.to_string());
    }

    let sep = "  |  ";
    let mut out = String::new();
    let mut used = 0usize;
    for (i, seg) in segments.iter().enumerate() {
        let segw = UnicodeWidthStr::width(seg.as_str());
        let addw = segw
            + if i == 0 {
                0
            } else {
                UnicodeWidthStr::width(sep)
            };
        if used + addw > max_width as usize {
            break;
        }
        if i > 0 {
            out.push_str(sep);
            used += UnicodeWidthStr::width(sep);
        }
        out.push_str(seg);
        used += segw;
    }
    out
}
