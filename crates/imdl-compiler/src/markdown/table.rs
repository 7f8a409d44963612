//! Pipe tables.

use std::fmt::Write as _;
use std::sync::LazyLock;

use regex::Regex;

use super::paragraph::attribute_line;

static SEPARATOR_CELL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^:?-+:?$").unwrap());

fn is_table_line(line: &str) -> bool {
    line.trim_start().starts_with('|')
}

fn cells(line: &str) -> Vec<&str> {
    let row = line.trim();
    let row = row.strip_prefix('|').unwrap_or(row);
    let row = row.strip_suffix('|').unwrap_or(row);
    row.split('|').map(str::trim).collect()
}

fn is_separator(row: &[&str]) -> bool {
    !row.is_empty() && row.iter().all(|cell| SEPARATOR_CELL_RE.is_match(cell))
}

/// Compile blocks of two or more `|` lines into tables. An attribute line
/// directly above the block is applied to the `<table>`.
pub(crate) fn tables(text: &str) -> String {
    let lines: Vec<&str> = text.split('\n').collect();
    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    let mut i = 0;

    while i < lines.len() {
        let end = lines[i..].iter().position(|line| !is_table_line(line)).map_or(lines.len(), |n| i + n);
        if end - i < 2 {
            out.push(lines[i].to_owned());
            i += 1;
            continue;
        }

        let attrs = i
            .checked_sub(1)
            .and_then(|prev| attribute_line(lines[prev]))
            .map(str::to_owned);
        if attrs.is_some() {
            out.pop();
        }
        out.push(render(&lines[i..end], attrs.as_deref()));
        i = end;
    }

    out.join("\n")
}

fn render(block: &[&str], attrs: Option<&str>) -> String {
    let mut rows: Vec<Vec<&str>> = block.iter().map(|line| cells(line)).collect();
    if rows.len() > 1 && is_separator(&rows[1]) {
        rows.remove(1);
    }
    let header = rows.remove(0);
    let columns = header.len();

    let mut out = String::from("<table");
    if let Some(attrs) = attrs.filter(|a| !a.is_empty()) {
        let _ = write!(out, " {attrs}");
    }
    out.push_str("><thead><tr>");
    for cell in &header {
        let _ = write!(out, "<th>{cell}</th>");
    }
    out.push_str("</tr></thead><tbody>");
    for row in &rows {
        let class = if row.iter().all(|cell| cell.is_empty()) {
            Some("blank")
        } else if row.len() < columns {
            Some("small")
        } else if row.len() > columns {
            Some("big")
        } else {
            None
        };
        match class {
            Some(class) => {
                let _ = write!(out, "<tr class=\"{class}\">");
            }
            None => out.push_str("<tr>"),
        }
        for cell in row {
            let _ = write!(out, "<td>{cell}</td>");
        }
        out.push_str("</tr>");
    }
    out.push_str("</tbody></table>");
    out
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_table_with_separator() {
        assert_eq!(
            tables("| a | b |\n|---|:-:|\n| 1 | 2 |"),
            "<table><thead><tr><th>a</th><th>b</th></tr></thead>\
             <tbody><tr><td>1</td><td>2</td></tr></tbody></table>"
        );
    }

    #[test]
    fn test_table_without_separator() {
        assert_eq!(
            tables("|x|\n|1|"),
            "<table><thead><tr><th>x</th></tr></thead><tbody><tr><td>1</td></tr></tbody></table>"
        );
    }

    #[test]
    fn test_row_classes() {
        assert_eq!(
            tables("| a | b |\n| 1 |\n| 1 | 2 | 3 |\n| | |"),
            "<table><thead><tr><th>a</th><th>b</th></tr></thead><tbody>\
             <tr class=\"small\"><td>1</td></tr>\
             <tr class=\"big\"><td>1</td><td>2</td><td>3</td></tr>\
             <tr class=\"blank\"><td></td><td></td></tr>\
             </tbody></table>"
        );
    }

    #[test]
    fn test_attribute_line_applies() {
        assert_eq!(
            tables("intro\n{class=\"grid\"}\n|a|\n|b|"),
            "intro\n<table class=\"grid\"><thead><tr><th>a</th></tr></thead>\
             <tbody><tr><td>b</td></tr></tbody></table>"
        );
    }

    #[test]
    fn test_single_pipe_line_is_not_a_table() {
        let text = "| just one\ntext";

        assert_eq!(tables(text), text);
    }

    #[test]
    fn test_tables_idempotent() {
        let once = tables("|a|b|\n|-|-|\n|1|2|");

        assert_eq!(tables(&once), once);
    }
}
