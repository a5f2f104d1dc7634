use ratatui::style::Color;

pub struct Theme {
    pub border_focus: Color,
    pub border_inactive: Color,
    pub chat_border: Color,
    pub user_prefix: Color,
    pub assistant_prefix: Color,
    pub error: Color,
    pub muted: Color,
    pub prompt_selected_fg: Color,
    pub prompt_selected_bg: Color,
    pub send_active: Color,
}

pub const THEME: Theme = Theme {
    border_focus: Color::Cyan,
    border_inactive: Color::DarkGray,
    chat_border: Color::DarkGray,
    user_prefix: Color::Green,
    assistant_prefix: Color::Magenta,
    error: Color::Red,
    muted: Color::DarkGray,
    prompt_selected_fg: Color::Black,
    prompt_selected_bg: Color::Cyan,
    send_active: Color::Cyan,
};
