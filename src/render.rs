//! HTML pages for the browser front-end.
//!
//! Templates are compiled in with `include_str!` and use `{{TOKEN}}`
//! placeholders. Every value taken from a request is escaped before it is
//! substituted.

use crate::detect::Detection;
use crate::error::DetectError;
use crate::labels::PlasticType;

const HOME_TEMPLATE: &str = include_str!("assets/home.html");
const DETECT_TEMPLATE: &str = include_str!("assets/detect.html");

pub fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn home_page() -> String {
    let labels: String = PlasticType::ALL
        .iter()
        .map(|t| format!("<li><strong>{}</strong>: {}</li>", t.name(), t.description()))
        .collect();
    HOME_TEMPLATE.replace("{{LABEL_LIST}}", &labels)
}

/// Detect page. `None` renders the empty form.
pub fn detect_page(outcome: Option<&Result<Detection, DetectError>>) -> String {
    let (error_section, result_section) = match outcome {
        None => (String::new(), String::new()),
        Some(Err(err)) => (
            format!(r#"<p class="error">{}</p>"#, html_escape(&err.to_string())),
            String::new(),
        ),
        Some(Ok(detection)) => (String::new(), result_html(detection)),
    };

    DETECT_TEMPLATE
        .replace("{{ERROR_SECTION}}", &error_section)
        .replace("{{RESULT_SECTION}}", &result_section)
}

fn result_html(detection: &Detection) -> String {
    let prediction = &detection.prediction;
    let confidence = match prediction.confidence() {
        Some(c) => format!("<p>Tingkat keyakinan: {:.2}%</p>", c),
        None => "<p>Tingkat keyakinan terlalu rendah untuk menentukan jenis plastik.</p>".to_string(),
    };
    let description = prediction
        .description()
        .map(|d| format!("<p>{}</p>", d))
        .unwrap_or_default();

    format!(
        r#"<div class="result">
  <img src="/uploads/{src}" alt="{alt}">
  <h2>Hasil: {label}</h2>
  {confidence}
  {description}
</div>"#,
        src = html_escape(&detection.filename),
        alt = html_escape(&detection.filename),
        label = prediction.label_name(),
        confidence = confidence,
        description = description,
    )
}
