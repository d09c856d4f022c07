mod filter_toggle;
mod new_task_form;
mod task_list;
mod task_list_row;

pub use filter_toggle::FilterToggle;
pub use new_task_form::NewTaskForm;
pub use task_list::TaskList;
pub use task_list_row::TaskListRow;

/// Class carried by every row label.
/// Clicks on its descendants resolve to
/// the label itself.
pub const LABEL_CLASS: &str =
  "task-label";
