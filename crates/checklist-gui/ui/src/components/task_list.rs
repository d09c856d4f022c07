use checklist_core::{
  RowRender,
  TaskId
};
use web_sys::Element;
use yew::{
  Callback,
  Html,
  Properties,
  function_component,
  html
};

use super::TaskListRow;

#[derive(Properties, PartialEq)]
pub struct TaskListProps {
  pub rows:        Vec<RowRender>,
  pub on_toggle:   Callback<TaskId>,
  pub on_delete:   Callback<TaskId>,
  pub on_activate: Callback<TaskId>,
  pub on_commit:   Callback<String>,
  pub on_cancel:   Callback<()>,
  pub on_label:
    Callback<(TaskId, Option<Element>)>
}

#[function_component(TaskList)]
pub fn task_list(
  props: &TaskListProps
) -> Html {
  if props.rows.is_empty() {
    return html! {
        <div class="panel list empty">{ "Nothing to show" }</div>
    };
  }

  html! {
      <ul class="panel list">
          {
              for props.rows.iter().cloned().map(|row| html! {
                  <TaskListRow
                      key={row.id.as_str().to_string()}
                      row={row}
                      on_toggle={props.on_toggle.clone()}
                      on_delete={props.on_delete.clone()}
                      on_activate={props.on_activate.clone()}
                      on_commit={props.on_commit.clone()}
                      on_cancel={props.on_cancel.clone()}
                      on_label={props.on_label.clone()}
                  />
              })
          }
      </ul>
  }
}
