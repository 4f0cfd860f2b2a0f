//! Markdown to HTML for the review shown in the popup.

/// Render model output as HTML. Raw HTML in the input is not passed through.
pub fn render_markdown(markdown: &str) -> String {
    let mut options = comrak::Options::default();
    options.extension.strikethrough = true;
    options.extension.table = true;
    options.extension.autolink = true;
    options.extension.tasklist = true;
    comrak::markdown_to_html(markdown, &options)
}

/// Render an answer with the optional truncation warning appended after it.
pub fn render_answer(answer: &str, warning: Option<&str>) -> String {
    let markdown = format!("{} \n\n{}", answer, warning.unwrap_or_default());
    render_markdown(&markdown)
}
