//! HTML presentation of the shell state.
//!
//! One renderer covers every screen variant; they differ only in theme and
//! which decorations are shown.

use crate::data::Todo;
use crate::shell::display_name::avatar_text;
use crate::shell::{ViewMode, ViewState};

pub const LOADING_TEXT: &str = "할 일 목록을 불러오는 중입니다...";
pub const EMPTY_TEXT: &str = "현재 등록된 할 일이 없습니다.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    #[default]
    Classic,
    Badge,
    Pastel,
}

impl Theme {
    fn class(&self) -> &'static str {
        match self {
            Theme::Classic => "theme-classic",
            Theme::Badge => "theme-badge",
            Theme::Pastel => "theme-pastel",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Presentation {
    pub theme: Theme,
    pub show_badge: bool,
    pub show_view_toggle: bool,
    /// Staggered fade-in per item
    pub animate: bool,
}

impl Default for Presentation {
    fn default() -> Self {
        Self::for_theme(Theme::Classic)
    }
}

impl Presentation {
    pub fn for_theme(theme: Theme) -> Self {
        match theme {
            Theme::Classic => Self {
                theme,
                show_badge: false,
                show_view_toggle: true,
                animate: false,
            },
            Theme::Badge | Theme::Pastel => Self {
                theme,
                show_badge: true,
                show_view_toggle: true,
                animate: true,
            },
        }
    }
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

fn item_style(presentation: &Presentation, index: usize) -> String {
    if presentation.animate {
        format!(
            " style=\"animation: fade-up 360ms ease-out both; animation-delay: {}ms\"",
            index * 60
        )
    } else {
        String::new()
    }
}

fn render_items(html: &mut String, todos: &[Todo], mode: ViewMode, presentation: &Presentation) {
    match mode {
        ViewMode::List => {
            html.push_str("<ul class=\"todo-list\">");
            for (index, todo) in todos.iter().enumerate() {
                html.push_str(&format!(
                    "<li class=\"todo-item\" data-id=\"{}\"{}>{}</li>",
                    escape_html(&todo.id),
                    item_style(presentation, index),
                    escape_html(todo.text())
                ));
            }
            html.push_str("</ul>");
        }
        ViewMode::Tile => {
            html.push_str("<div class=\"grid\">");
            for (index, todo) in todos.iter().enumerate() {
                html.push_str(&format!(
                    "<div class=\"tile\" data-id=\"{}\"{}><div class=\"title\">{}</div></div>",
                    escape_html(&todo.id),
                    item_style(presentation, index),
                    escape_html(todo.text())
                ));
            }
            html.push_str("</div>");
        }
    }
}

fn toggle_button(label: &str, title: &str, mode: ViewMode, current: ViewMode) -> String {
    let selected = mode == current;
    format!(
        "<button role=\"tab\" data-view=\"{}\" aria-selected=\"{}\" aria-pressed=\"{}\" title=\"{}\">{}</button>",
        mode.as_str(),
        selected,
        selected,
        title,
        label
    )
}

pub fn render(state: &ViewState, presentation: &Presentation) -> String {
    let mut html = format!("<main class=\"{}\">", presentation.theme.class());

    if state.is_loading {
        html.push_str(&format!(
            "<div class=\"loading\"><div class=\"spinner\"></div><p class=\"loading-hint\">{}</p></div></main>",
            LOADING_TEXT
        ));
        return html;
    }

    html.push_str("<div class=\"content-container\">");
    html.push_str(&format!(
        "<h1>{}님, 환영합니다 👋</h1>",
        escape_html(&state.display_name)
    ));

    if presentation.show_view_toggle || presentation.show_badge {
        html.push_str("<div class=\"top-row\">");
        if presentation.show_view_toggle {
            html.push_str("<div class=\"view-toggle\" role=\"tablist\" aria-label=\"보기 전환\">");
            html.push_str(&toggle_button("리스트", "리스트 보기", ViewMode::List, state.view_mode));
            html.push_str(&toggle_button("타일", "타일 보기", ViewMode::Tile, state.view_mode));
            html.push_str("</div>");
        }
        if presentation.show_badge {
            html.push_str(&format!(
                "<div class=\"user-badge\" title=\"{}\">{}</div>",
                escape_html(&state.display_name),
                escape_html(&avatar_text(&state.display_name))
            ));
        }
        html.push_str("</div>");
    }

    html.push_str("<button class=\"app\" type=\"button\" data-action=\"new\">+ new</button>");

    if state.todos.is_empty() {
        html.push_str(&format!("<p class=\"empty\">{}</p>", EMPTY_TEXT));
    } else {
        render_items(&mut html, &state.todos, state.view_mode, presentation);
    }

    html.push_str("<button class=\"app\" data-action=\"sign-out\">Sign out</button>");
    html.push_str("</div></main>");
    html
}
