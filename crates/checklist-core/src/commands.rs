use std::io::{self, BufRead, Write};

use anyhow::{Context, anyhow};
use tracing::{debug, info, instrument, warn};

use crate::cli::Invocation;
use crate::list_view::ListView;
use crate::render::Renderer;
use crate::store::RecordStore;
use crate::task::TaskId;

/// Label nodes in the shell are plain strings: `label:<task id>`.
pub type ShellNode = String;

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "add", "delete", "done", "edit", "help", "list", "purge", "shell",
    ]
}

pub fn expand_command_abbrev<'a>(token: &'a str, known: &[&'a str]) -> Option<&'a str> {
    if known.contains(&token) {
        return Some(token);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

pub fn label_node(id: &TaskId) -> ShellNode {
    format!("label:{id}")
}

/// Finds a task by exact id or unique id prefix.
pub fn resolve_task_id<S, G>(view: &ListView<S, ShellNode, G>, token: &str) -> anyhow::Result<TaskId>
where
    S: RecordStore,
{
    let state = view.store().state();
    if let Some(task) = state.records.iter().find(|t| t.id.as_str() == token) {
        return Ok(task.id.clone());
    }

    let mut matches = state
        .records
        .iter()
        .filter(|t| !token.is_empty() && t.id.as_str().starts_with(token));
    let first = matches
        .next()
        .ok_or_else(|| anyhow!("no task matches id {token:?}"))?;
    if matches.next().is_some() {
        return Err(anyhow!("id prefix {token:?} is ambiguous"));
    }
    Ok(first.id.clone())
}

#[instrument(skip(view, renderer, inv), fields(command = %inv.command))]
pub fn dispatch<S, G>(
    view: &mut ListView<S, ShellNode, G>,
    renderer: &mut Renderer,
    inv: Invocation,
) -> anyhow::Result<()>
where
    S: RecordStore,
{
    let args = inv.command_args;
    match inv.command.as_str() {
        "list" => {
            if let Some(name) = args.first() {
                view.set_filter(name)?;
            }
            renderer.print_list(&view.render())
        }
        "add" => {
            view.set_draft(args.join(" "));
            let id = view.submit().context("failed to create task")?;
            println!("created task {id}");
            Ok(())
        }
        "done" => {
            let token = args.first().ok_or_else(|| anyhow!("done needs a task id"))?;
            let id = resolve_task_id(view, token)?;
            let completed = view.toggle_completed(&id)?;
            println!(
                "task {id} marked {}",
                if completed { "completed" } else { "active" }
            );
            Ok(())
        }
        "edit" => {
            let (token, text) = args
                .split_first()
                .ok_or_else(|| anyhow!("edit needs a task id and new text"))?;
            let id = resolve_task_id(view, token)?;
            view.activate(id.clone());
            view.commit_edit(text.join(" "))
                .with_context(|| format!("failed to update task {id}"))?;
            println!("task {id} updated");
            Ok(())
        }
        "delete" => {
            let token = args.first().ok_or_else(|| anyhow!("delete needs a task id"))?;
            let id = resolve_task_id(view, token)?;
            view.delete(&id)?;
            println!("task {id} deleted");
            Ok(())
        }
        "shell" => {
            let stdin = io::stdin();
            let stdout = io::stdout();
            run_shell(view, stdin.lock(), stdout.lock(), renderer)
        }
        "help" => {
            print_help(io::stdout().lock())?;
            Ok(())
        }
        other => Err(anyhow!("command {other} is not available here")),
    }
}

fn print_help<W: Write>(mut out: W) -> io::Result<()> {
    writeln!(out, "commands:")?;
    writeln!(out, "  list [all|active|completed]   show tasks")?;
    writeln!(out, "  add <text>                    create a task")?;
    writeln!(out, "  done <id>                     toggle completion")?;
    writeln!(out, "  edit <id> <text>              replace a task's text")?;
    writeln!(out, "  delete <id>                   remove a task")?;
    writeln!(out, "  purge                         remove completed tasks")?;
    writeln!(out, "  shell                         interactive session")
}

fn print_shell_help<W: Write>(mut out: W) -> io::Result<()> {
    writeln!(out, "type <text>     set the new-task draft")?;
    writeln!(out, "submit          create a task from the draft")?;
    writeln!(out, "filter <name>   all, active or completed")?;
    writeln!(out, "toggle          cycle the filter")?;
    writeln!(out, "done <id>       toggle completion")?;
    writeln!(out, "edit <id>       open a row for editing")?;
    writeln!(out, "save <text>     commit the open editor")?;
    writeln!(out, "cancel          close the open editor")?;
    writeln!(out, "click <node>    click a node (label:<id> or anything else)")?;
    writeln!(out, "rm <id>         delete a task")?;
    writeln!(out, "show            print the list")?;
    writeln!(out, "quit            leave the shell")
}

/// Line-oriented session over a live [`ListView`]. Every visible row
/// registers a `label:<id>` node, so `click` exercises outside-click
/// handling the way a pointer would.
#[instrument(skip_all)]
pub fn run_shell<S, G, R, W>(
    view: &mut ListView<S, ShellNode, G>,
    input: R,
    mut out: W,
    renderer: &Renderer,
) -> anyhow::Result<()>
where
    S: RecordStore,
    R: BufRead,
    W: Write,
{
    let mut mounted: Vec<TaskId> = Vec::new();
    sync_row_nodes(view, &mut mounted);
    renderer.write_list(&mut out, &view.render(), false)?;

    for line in input.lines() {
        let line = line.context("failed to read shell input")?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let (cmd, rest) = match line.split_once(char::is_whitespace) {
            Some((cmd, rest)) => (cmd, rest.trim()),
            None => (line, ""),
        };
        debug!(cmd, rest, "shell command");

        let outcome = match cmd {
            "quit" | "exit" => break,
            "help" => {
                print_shell_help(&mut out)?;
                Ok(())
            }
            "type" => {
                view.set_draft(rest);
                Ok(())
            }
            "submit" => match view.submit() {
                Ok(id) => {
                    writeln!(out, "created {id}")?;
                    Ok(())
                }
                Err(err) => Err(anyhow::Error::from(err)),
            },
            "filter" => view.set_filter(rest).map(|_| ()).map_err(anyhow::Error::from),
            "toggle" => {
                view.cycle_filter();
                Ok(())
            }
            "done" => resolve_task_id(view, rest)
                .and_then(|id| view.toggle_completed(&id).map(|_| ()).map_err(anyhow::Error::from)),
            "edit" => resolve_task_id(view, rest).and_then(|id| {
                if view.node(&id).is_none() {
                    return Err(anyhow!("task {id} is hidden by the current filter"));
                }
                view.activate(id.clone());
                // The click that opened the editor lands on its own label.
                if let Some(node) = view.node(&id).cloned() {
                    view.handle_global_click(&node);
                }
                Ok(())
            }),
            "save" => view.commit_edit(rest).map_err(anyhow::Error::from),
            "cancel" => {
                view.cancel_edit();
                Ok(())
            }
            "click" => {
                if view.handle_global_click(&rest.to_string()) {
                    writeln!(out, "left edit mode")?;
                }
                Ok(())
            }
            "rm" => resolve_task_id(view, rest)
                .and_then(|id| view.delete(&id).map_err(anyhow::Error::from)),
            "show" => Ok(()),
            other => Err(anyhow!("unknown shell command {other:?}; try help")),
        };

        match outcome {
            Ok(()) => {
                sync_row_nodes(view, &mut mounted);
                renderer.write_list(&mut out, &view.render(), false)?;
            }
            Err(err) => {
                warn!(error = %err, "shell command failed");
                writeln!(out, "error: {err:#}")?;
            }
        }
    }

    info!("shell closed");
    Ok(())
}

/// Registers label nodes for rows that are rendered now and drops the ones
/// that went away.
fn sync_row_nodes<S, G>(view: &mut ListView<S, ShellNode, G>, mounted: &mut Vec<TaskId>)
where
    S: RecordStore,
{
    let visible: Vec<TaskId> = view.render().rows().iter().map(|row| row.id.clone()).collect();

    for id in mounted.iter().filter(|id| !visible.contains(id)) {
        view.unregister_node(id);
    }
    for id in visible.iter().filter(|id| !mounted.contains(id)) {
        view.register_node(id.clone(), label_node(id));
    }
    *mounted = visible;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edit_mode::EditMode;
    use crate::filter::Filter;
    use crate::ids::SequentialIds;
    use crate::listener::ScopedListener;
    use crate::store::{CollectionRef, MemoryStore, TaskCollection};

    fn shell_view() -> ListView<MemoryStore, ShellNode> {
        let mut view = ListView::new(
            TaskCollection::new(CollectionRef::default(), MemoryStore::new()),
            Filter::All,
            Box::new(SequentialIds::new("t")),
            ScopedListener::detached(),
        );
        view.load().expect("load");
        view
    }

    fn run(view: &mut ListView<MemoryStore, ShellNode>, script: &str) -> String {
        let mut out = Vec::new();
        run_shell(view, script.as_bytes(), &mut out, &Renderer::plain()).expect("shell");
        String::from_utf8(out).expect("utf8")
    }

    #[test]
    fn abbreviations_must_be_unique() {
        let known = known_command_names();
        assert_eq!(expand_command_abbrev("sh", &known), Some("shell"));
        assert_eq!(expand_command_abbrev("d", &known), None);
        assert_eq!(expand_command_abbrev("zzz", &known), None);
    }

    #[test]
    fn shell_creates_and_filters() {
        let mut view = shell_view();
        let out = run(
            &mut view,
            "type Buy milk\nsubmit\nfilter completed\nfilter all\n",
        );

        assert!(out.contains("created t-1"));
        assert_eq!(view.filter(), Filter::All);
        assert_eq!(view.render().rows()[0].text, "Buy milk");
        assert_eq!(view.draft(), "");
    }

    #[test]
    fn shell_click_inside_keeps_editor_open() {
        let mut view = shell_view();
        run(
            &mut view,
            "type a\nsubmit\ntype b\nsubmit\nedit t-1\nclick label:t-1\n",
        );
        assert_eq!(view.render().editing, Some(TaskId::from("t-1")));

        let out = run(&mut view, "click label:t-2\n");
        assert!(out.contains("left edit mode"));
        assert_eq!(view.render().editing, None);
    }

    #[test]
    fn shell_save_commits_text() {
        let mut view = shell_view();
        run(&mut view, "type draft\nsubmit\nedit t-1\nsave final text\n");

        assert_eq!(view.render().editing, None);
        assert_eq!(view.render().rows()[0].text, "final text");
    }

    #[test]
    fn shell_refuses_to_edit_hidden_rows() {
        let mut view = shell_view();
        let out = run(
            &mut view,
            "type old\nsubmit\ndone t-1\nfilter active\nedit t-1\nsave new text\n",
        );

        assert!(out.contains("error: task t-1 is hidden by the current filter"));
        assert!(out.contains("error: no task is being edited"));
        assert_eq!(view.edit_mode(), EditMode::Idle);
        assert_eq!(
            view.store().get(&TaskId::from("t-1")).map(|t| t.text),
            Some("old".to_string())
        );

        run(&mut view, "filter all\nedit t-1\nsave new text\n");
        assert_eq!(
            view.store().get(&TaskId::from("t-1")).map(|t| t.text),
            Some("new text".to_string())
        );
    }

    #[test]
    fn shell_reports_errors_and_continues() {
        let mut view = shell_view();
        let out = run(&mut view, "filter someday\nbogus\ntype x\nsubmit\n");

        assert!(out.contains("error: unknown filter"));
        assert!(out.contains("error: unknown shell command"));
        assert!(out.contains("created t-1"));
    }

    #[test]
    fn ids_resolve_by_unique_prefix() {
        let mut view = shell_view();
        view.submit().expect("submit");
        view.submit().expect("submit");

        assert_eq!(resolve_task_id(&view, "t-2").expect("exact"), TaskId::from("t-2"));
        assert!(resolve_task_id(&view, "t-").is_err());
        assert!(resolve_task_id(&view, "x").is_err());
    }
}
