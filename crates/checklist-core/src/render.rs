use std::io::{self, IsTerminal, Write};

use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::list_view::{ListBody, ListRender};

/// Width used for ids in the table; enough to stay unique in practice.
const SHORT_ID: usize = 8;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> Self {
        Self {
            color: cfg.get_bool("color").unwrap_or(true),
        }
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    #[tracing::instrument(skip(self, render))]
    pub fn print_list(&mut self, render: &ListRender) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        let color = self.color && io::stdout().is_terminal();
        self.write_list(&mut out, render, color)
    }

    pub fn write_list<W: Write>(
        &self,
        mut out: W,
        render: &ListRender,
        color: bool,
    ) -> anyhow::Result<()> {
        writeln!(out, "filter: {}", render.filter.label())?;
        if !render.draft.is_empty() {
            writeln!(out, "draft:  {}", render.draft)?;
        }

        let rows = match &render.body {
            ListBody::Loading => {
                writeln!(out, "loading…")?;
                return Ok(());
            }
            ListBody::Loaded(rows) => rows,
        };

        if rows.is_empty() {
            writeln!(out, "no tasks")?;
        } else {
            let headers = vec!["ID".to_string(), " ".to_string(), "Task".to_string()];
            let body = rows
                .iter()
                .map(|row| {
                    let id: String = row.id.as_str().chars().take(SHORT_ID).collect();
                    let mark = if row.completed { "x" } else { " " };
                    let text = if row.editable {
                        paint(&format!("{}_", row.text), "4", color)
                    } else if row.completed {
                        paint(&row.text, "2", color)
                    } else {
                        row.text.clone()
                    };
                    vec![paint(&id, "33", color), mark.to_string(), text]
                })
                .collect();
            write_table(&mut out, headers, body)?;
        }

        writeln!(
            out,
            "{} tasks, {} active, {} completed",
            render.counts.total, render.counts.active, render.counts.completed
        )?;
        Ok(())
    }
}

fn paint(text: &str, code: &str, color: bool) -> String {
    if !color {
        return text.to_string();
    }
    format!("\x1b[{code}m{text}\x1b[0m")
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for width in &widths {
        write!(writer, "{:-<width$} ", "", width = *width)?;
    }
    writeln!(writer)?;

    for row in rows {
        for (idx, cell) in row.iter().enumerate() {
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Filter;
    use crate::list_view::RowRender;
    use crate::store::Counts;
    use crate::task::TaskId;

    fn rendered(render: &ListRender) -> String {
        let mut buf = Vec::new();
        Renderer::plain()
            .write_list(&mut buf, render, false)
            .expect("write");
        String::from_utf8(buf).expect("utf8")
    }

    #[test]
    fn loading_shows_placeholder_only() {
        let out = rendered(&ListRender {
            draft: String::new(),
            filter: Filter::All,
            editing: None,
            counts: Counts::default(),
            body: ListBody::Loading,
        });
        assert_eq!(out, "filter: All\nloading…\n");
    }

    #[test]
    fn rows_are_aligned_and_marked() {
        let out = rendered(&ListRender {
            draft: "half typed".to_string(),
            filter: Filter::All,
            editing: Some(TaskId::from("b")),
            counts: Counts {
                total: 2,
                active: 1,
                completed: 1,
            },
            body: ListBody::Loaded(vec![
                RowRender {
                    id: TaskId::from("a"),
                    text: "Buy milk".to_string(),
                    completed: true,
                    editable: false,
                },
                RowRender {
                    id: TaskId::from("b"),
                    text: "Call mom".to_string(),
                    completed: false,
                    editable: true,
                },
            ]),
        });

        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "filter: All");
        assert_eq!(lines[1], "draft:  half typed");
        assert_eq!(lines[4], "a  x Buy milk  ");
        assert_eq!(lines[5], "b    Call mom_ ");
        assert_eq!(lines[6], "2 tasks, 1 active, 1 completed");
    }

    #[test]
    fn color_follows_config() {
        let mut cfg = Config::default();
        assert!(Renderer::new(&cfg).color);

        cfg.apply_overrides(vec![("rc.color".to_string(), "off".to_string())]);
        assert!(!Renderer::new(&cfg).color);
    }

    #[test]
    fn strip_ansi_keeps_visible_text() {
        assert_eq!(strip_ansi("\x1b[33mabc\x1b[0m"), "abc");
    }
}
