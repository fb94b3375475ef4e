pub mod auth;
pub mod dashboard;
pub mod generate;

/// Escapes text for interpolation into the HTML templates.
fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
