//! Form-control macros.
//!
//! Inside `<form>` bodies, `[type name {values}]{attrs}` expands to an input
//! element. Values are comma separated; each is `key:Display` or `Display`,
//! optionally ending in `*` to mark the default. `Group{a, b}` groups values
//! into an `<optgroup>` (select) or `<fieldset>` (radio).

use std::fmt::Write as _;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::escape::escape_attr;

static FORM_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)(<form\b[^>]*>)(.*?)(</form>)").unwrap());
static MACRO_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\[([A-Za-z]+)[ \t]+([\w.-]+)(?:[ \t]*\{((?:[^{}]|\{[^{}]*\})*)\})?[ \t]*\](?:\{([^{}\n]*)\})?",
    )
    .unwrap()
});
static GROUP_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)^([^{}]*?)[ \t]*\{(.*)\}$").unwrap());

const TRUE_VALUES: [&str; 6] = ["true", "yes", "y", "on", "1", "checked"];
const FALSE_VALUES: [&str; 6] = ["false", "no", "n", "off", "0", "unchecked"];

#[derive(Debug, Clone, PartialEq, Eq)]
struct Choice {
    value: String,
    display: String,
    default: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Entry {
    Single(Choice),
    Group { label: String, choices: Vec<Choice> },
}

/// Expand macros inside every `<form>` element.
pub(crate) fn forms(text: &str) -> String {
    FORM_RE
        .replace_all(text, |caps: &Captures<'_>| {
            format!("{}{}{}", &caps[1], expand_macros(&caps[2]), &caps[3])
        })
        .into_owned()
}

fn expand_macros(body: &str) -> String {
    MACRO_RE
        .replace_all(body, |caps: &Captures<'_>| {
            let whole = &caps[0];
            let end = caps.get(0).map_or(0, |m| m.end());
            // `[text](href)` is a link.
            if body[end..].starts_with('(') {
                return whole.to_owned();
            }
            let kind = caps[1].to_ascii_lowercase();
            let name = &caps[2];
            let entries = caps.get(3).map(|m| parse_entries(m.as_str())).unwrap_or_default();
            let attrs = caps
                .get(4)
                .map(|m| m.as_str().trim())
                .filter(|a| !a.is_empty())
                .map(|a| format!(" {a}"))
                .unwrap_or_default();
            render(&kind, name, &entries, &attrs)
        })
        .into_owned()
}

fn render(kind: &str, name: &str, entries: &[Entry], attrs: &str) -> String {
    let choices: Vec<&Choice> = entries
        .iter()
        .flat_map(|entry| match entry {
            Entry::Single(choice) => std::slice::from_ref(choice).iter(),
            Entry::Group { choices, .. } => choices.iter(),
        })
        .collect();
    let first = choices.first().copied();
    let default = choices.iter().copied().find(|c| c.default);
    let n = escape_attr(name);

    match kind {
        "hidden" | "value" => {
            let value = default.or(first).map(|c| escape_attr(&c.value)).unwrap_or_default();
            format!("<input type=\"hidden\" name=\"{n}\" value=\"{value}\"{attrs}>")
        }
        "submit" | "button" => {
            let label = first.map_or_else(|| derive_label(name), |c| c.display.clone());
            format!("<button type=\"{kind}\" name=\"{n}\"{attrs}>{label}</button>")
        }
        "label" => {
            let label = first.map_or_else(|| derive_label(name), |c| c.display.clone());
            format!("<label for=\"{n}\"{attrs}>{label}</label>")
        }
        "select" => {
            let mut out = format!("<select name=\"{n}\" id=\"{n}\"{attrs}>");
            for entry in entries {
                match entry {
                    Entry::Single(choice) => push_option(&mut out, choice),
                    Entry::Group { label, choices } => {
                        let _ = write!(out, "<optgroup label=\"{}\">", escape_attr(label));
                        for choice in choices {
                            push_option(&mut out, choice);
                        }
                        out.push_str("</optgroup>");
                    }
                }
            }
            out.push_str("</select>");
            out
        }
        "checkbox" | "accept" => checkbox(name, first, kind == "accept", attrs),
        "radio" => {
            let mut out = String::new();
            for entry in entries {
                match entry {
                    Entry::Single(choice) => push_radio(&mut out, name, choice, attrs),
                    Entry::Group { label, choices } => {
                        let _ = write!(out, "<fieldset><legend>{label}</legend>");
                        for choice in choices {
                            push_radio(&mut out, name, choice, attrs);
                        }
                        out.push_str("</fieldset>");
                    }
                }
            }
            out
        }
        "textarea" | "textbox" => {
            let placeholder = choices
                .iter()
                .find(|c| !c.default)
                .map(|c| format!(" placeholder=\"{}\"", escape_attr(&c.display)))
                .unwrap_or_default();
            let content = default.map(|c| c.display.as_str()).unwrap_or_default();
            format!("<textarea name=\"{n}\" id=\"{n}\"{placeholder}{attrs}>{content}</textarea>")
        }
        "list" => {
            let mut out = format!("<input list=\"{n}-list\" name=\"{n}\" id=\"{n}\"{attrs}><datalist id=\"{n}-list\">");
            for choice in &choices {
                push_option(&mut out, choice);
            }
            out.push_str("</datalist>");
            out
        }
        _ => {
            let value = default
                .map(|c| format!(" value=\"{}\"", escape_attr(&c.value)))
                .unwrap_or_default();
            let placeholder = choices
                .iter()
                .find(|c| !c.default)
                .map(|c| format!(" placeholder=\"{}\"", escape_attr(&c.display)))
                .unwrap_or_default();
            format!("<input type=\"{kind}\" name=\"{n}\" id=\"{n}\"{value}{placeholder}{attrs}>")
        }
    }
}

fn checkbox(name: &str, first: Option<&Choice>, required: bool, attrs: &str) -> String {
    let n = escape_attr(name);
    let mut checked = first.is_some_and(|c| c.default);
    let mut value = String::new();
    let mut label = derive_label(name);

    if let Some(choice) = first {
        let word = choice.value.to_ascii_lowercase();
        if TRUE_VALUES.contains(&word.as_str()) {
            checked = true;
        } else if !FALSE_VALUES.contains(&word.as_str()) {
            value = format!(" value=\"{}\"", escape_attr(&choice.value));
            label.clone_from(&choice.display);
        }
    }

    let checked = if checked { " checked" } else { "" };
    let required = if required { " required" } else { "" };
    format!(
        "<input type=\"checkbox\" id=\"{n}\" name=\"{n}\"{value}{checked}{required}{attrs}><label for=\"{n}\">{label}</label>"
    )
}

fn push_option(out: &mut String, choice: &Choice) {
    let selected = if choice.default { " selected" } else { "" };
    let _ = write!(
        out,
        "<option value=\"{}\"{selected}>{}</option>",
        escape_attr(&choice.value),
        choice.display
    );
}

fn push_radio(out: &mut String, name: &str, choice: &Choice, attrs: &str) {
    let id = format!("{name}-{}", id_part(&choice.value));
    let checked = if choice.default { " checked" } else { "" };
    let _ = write!(
        out,
        "<input type=\"radio\" id=\"{id}\" name=\"{}\" value=\"{}\"{checked}{attrs}><label for=\"{id}\">{}</label>",
        escape_attr(name),
        escape_attr(&choice.value),
        choice.display
    );
}

fn id_part(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
        .collect()
}

/// `first_name` becomes `First name`.
fn derive_label(name: &str) -> String {
    let spaced = name.replace(['_', '-'], " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn parse_entries(values: &str) -> Vec<Entry> {
    split_top_level(values)
        .into_iter()
        .filter_map(|token| {
            if let Some(caps) = GROUP_RE.captures(token) {
                let choices = split_top_level(&caps[2]).into_iter().filter_map(parse_choice).collect();
                return Some(Entry::Group {
                    label: caps[1].trim().to_owned(),
                    choices,
                });
            }
            parse_choice(token).map(Entry::Single)
        })
        .collect()
}

fn parse_choice(token: &str) -> Option<Choice> {
    let token = token.trim();
    let (token, default) = match token.strip_suffix('*') {
        Some(rest) => (rest.trim_end(), true),
        None => (token, false),
    };
    if token.is_empty() {
        return None;
    }
    let (value, display) = match token.split_once(':') {
        Some((key, display)) => (key.trim(), display.trim()),
        None => (token, token),
    };
    Some(Choice {
        value: value.to_owned(),
        display: display.to_owned(),
        default,
    })
}

/// Split on commas that are not inside braces.
fn split_top_level(values: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in values.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(values[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(values[start..].trim());
    parts.retain(|p| !p.is_empty());
    parts
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn in_form(body: &str) -> String {
        let html = forms(&format!("<form action=\"/go\">{body}</form>"));
        html.strip_prefix("<form action=\"/go\">")
            .and_then(|h| h.strip_suffix("</form>"))
            .unwrap()
            .to_owned()
    }

    #[test]
    fn test_outside_form_untouched() {
        let text = "[text name]";

        assert_eq!(forms(text), text);
    }

    #[test]
    fn test_link_is_not_a_macro() {
        assert_eq!(in_form("[link here](/x)"), "[link here](/x)");
    }

    #[test]
    fn test_hidden() {
        assert_eq!(
            in_form("[hidden token {abc}]"),
            "<input type=\"hidden\" name=\"token\" value=\"abc\">"
        );
    }

    #[test]
    fn test_submit_with_attrs() {
        assert_eq!(
            in_form("[submit send {Send it}]{class=\"btn\"}"),
            "<button type=\"submit\" name=\"send\" class=\"btn\">Send it</button>"
        );
    }

    #[test]
    fn test_label_derived() {
        assert_eq!(in_form("[label first_name]"), "<label for=\"first_name\">First name</label>");
    }

    #[test]
    fn test_select_with_default_and_group() {
        assert_eq!(
            in_form("[select color {r:Red, g:Green*, Dark{navy:Navy, black}}]"),
            "<select name=\"color\" id=\"color\">\
             <option value=\"r\">Red</option>\
             <option value=\"g\" selected>Green</option>\
             <optgroup label=\"Dark\">\
             <option value=\"navy\">Navy</option>\
             <option value=\"black\">black</option>\
             </optgroup></select>"
        );
    }

    #[test]
    fn test_checkbox_true_vocabulary() {
        assert_eq!(
            in_form("[checkbox remember_me {yes}]"),
            "<input type=\"checkbox\" id=\"remember_me\" name=\"remember_me\" checked>\
             <label for=\"remember_me\">Remember me</label>"
        );
        assert_eq!(
            in_form("[checkbox news {off}]"),
            "<input type=\"checkbox\" id=\"news\" name=\"news\"><label for=\"news\">News</label>"
        );
    }

    #[test]
    fn test_checkbox_with_value() {
        assert_eq!(
            in_form("[checkbox news {weekly:Weekly digest*}]"),
            "<input type=\"checkbox\" id=\"news\" name=\"news\" value=\"weekly\" checked>\
             <label for=\"news\">Weekly digest</label>"
        );
    }

    #[test]
    fn test_accept_is_required() {
        assert_eq!(
            in_form("[accept terms]"),
            "<input type=\"checkbox\" id=\"terms\" name=\"terms\" required><label for=\"terms\">Terms</label>"
        );
    }

    #[test]
    fn test_radio_group() {
        assert_eq!(
            in_form("[radio size {s:Small*, Large{l:L, xl:XL}}]"),
            "<input type=\"radio\" id=\"size-s\" name=\"size\" value=\"s\" checked><label for=\"size-s\">Small</label>\
             <fieldset><legend>Large</legend>\
             <input type=\"radio\" id=\"size-l\" name=\"size\" value=\"l\"><label for=\"size-l\">L</label>\
             <input type=\"radio\" id=\"size-xl\" name=\"size\" value=\"xl\"><label for=\"size-xl\">XL</label>\
             </fieldset>"
        );
    }

    #[test]
    fn test_textarea() {
        assert_eq!(
            in_form("[textarea bio {Tell us more}]"),
            "<textarea name=\"bio\" id=\"bio\" placeholder=\"Tell us more\"></textarea>"
        );
    }

    #[test]
    fn test_list() {
        assert_eq!(
            in_form("[list city {Paris, Rome}]"),
            "<input list=\"city-list\" name=\"city\" id=\"city\"><datalist id=\"city-list\">\
             <option value=\"Paris\">Paris</option><option value=\"Rome\">Rome</option></datalist>"
        );
    }

    #[test]
    fn test_fallback_input() {
        assert_eq!(
            in_form("[email contact {you@example.com}]{required}"),
            "<input type=\"email\" name=\"contact\" id=\"contact\" placeholder=\"you@example.com\" required>"
        );
        assert_eq!(
            in_form("[number qty {1*}]"),
            "<input type=\"number\" name=\"qty\" id=\"qty\" value=\"1\">"
        );
    }

    #[test]
    fn test_forms_idempotent() {
        let once = forms("<form>[select a {x, y*}]\n[checkbox b {on}]</form>");

        assert_eq!(forms(&once), once);
    }

    #[test]
    fn test_derive_label() {
        assert_eq!(derive_label("first-name_x"), "First name x");
        assert_eq!(derive_label(""), "");
    }
}
