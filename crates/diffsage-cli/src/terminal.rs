use std::io::Write;

use diffsage_core::{PopupRenderer, PopupView, StatusIcon};

/// Renders popup views as status lines on a terminal.
///
/// Only status changes are written; the HTML result is printed from the
/// final popup state once the run is over.
pub struct TerminalRenderer<W: Write + Send> {
    out: W,
    last: Option<PopupView>,
}

impl<W: Write + Send> TerminalRenderer<W> {
    pub fn new(out: W) -> Self {
        Self { out, last: None }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

pub fn icon(status: StatusIcon) -> &'static str {
    match status {
        StatusIcon::None => "",
        StatusIcon::Spinner => "…",
        StatusIcon::Checkmark => "✓",
        StatusIcon::Cross => "✗",
    }
}

fn status_line(view: &PopupView) -> Option<String> {
    match view.status {
        StatusIcon::None => None,
        StatusIcon::Spinner if view.result.is_empty() => Some(format!("{} Loading", icon(view.status))),
        StatusIcon::Spinner => Some(format!(
            "{} {}",
            icon(view.status),
            first_text_line(&view.result)
        )),
        StatusIcon::Checkmark => Some(format!("{} Review ready", icon(view.status))),
        StatusIcon::Cross if view.rerun_enabled => {
            Some(format!("{} Review failed", icon(view.status)))
        }
        StatusIcon::Cross => Some(format!("{} {}", icon(view.status), view.result)),
    }
}

/// First line of visible text in an HTML fragment.
fn first_text_line(html: &str) -> String {
    let mut text = String::new();
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            '\n' if !in_tag && !text.trim().is_empty() => break,
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }
    let line = text.trim();
    match line.char_indices().nth(80) {
        Some((idx, _)) => format!("{}…", &line[..idx]),
        None => line.to_string(),
    }
}

impl<W: Write + Send> PopupRenderer for TerminalRenderer<W> {
    fn render(&mut self, view: &PopupView) {
        let previous = self.last.as_ref().and_then(status_line);
        if let Some(line) = status_line(view).filter(|line| Some(line) != previous.as_ref()) {
            let _ = writeln!(self.out, "{line}");
        }
        self.last = Some(view.clone());
    }
}
