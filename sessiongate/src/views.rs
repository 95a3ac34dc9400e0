//! Views rendering
//!
//! Every view has a content block, which can be rendered on its own (to be swapped into an
//! already loaded page) or embedded into the base layout as a full page.

use std::collections::HashMap;

use serde_json::Value;

const BASE_TEMPLATE: &str = include_str!("../resources/templates/base.html");

/// Views known to the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum View {
    Login,
    Register,
}

impl View {
    fn title(self) -> &'static str {
        match self {
            Self::Login => "Log in",
            Self::Register => "Register",
        }
    }
}

/// Which part of the view to render
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Part {
    /// Whole document with the base layout
    Page,
    /// Only the view content block
    Content,
}

/// Views renderer
pub trait Renderer: Send + Sync {
    /// Renders the view with an optional data payload
    fn render(&self, view: View, part: Part, data: Option<&Value>) -> String;
}

/// Renderer of views embedded in the binary
///
/// `{{key}}` placeholders are filled with the top level string and number fields of the data
/// object. Values are HTML escaped, unknown keys are rendered empty.
pub struct StaticViews {
    views: HashMap<View, &'static str>,
}

impl StaticViews {
    pub fn new() -> Self {
        let views = HashMap::from([
            (View::Login, include_str!("../resources/views/login.html")),
            (View::Register, include_str!("../resources/views/register.html")),
        ]);

        Self { views }
    }
}

impl Default for StaticViews {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for StaticViews {
    fn render(&self, view: View, part: Part, data: Option<&Value>) -> String {
        let template = self.views.get(&view).copied().unwrap_or_default();
        let content = fill(template, |key| lookup(data, key));

        match part {
            Part::Content => content,
            Part::Page => fill(BASE_TEMPLATE, |key| match key {
                "content" => content.clone(),
                "title" => view.title().to_owned(),
                _ => lookup(data, key),
            }),
        }
    }
}

/// Replaces `{{key}}` placeholders using `value` for every found key
fn fill(template: &str, value: impl Fn(&str) -> String) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        let Some(len) = rest[start..].find("}}") else {
            break;
        };

        out.push_str(&rest[..start]);
        out.push_str(&value(rest[start + 2..start + len].trim()));
        rest = &rest[start + len + 2..];
    }

    out.push_str(rest);
    out
}

/// Reads escaped data field
fn lookup(data: Option<&Value>, key: &str) -> String {
    match data.and_then(|data| data.get(key)) {
        Some(Value::String(s)) => escape(s),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn escape(s: &str) -> String {
    s.chars().fold(String::with_capacity(s.len()), |mut out, c| {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
        out
    })
}
