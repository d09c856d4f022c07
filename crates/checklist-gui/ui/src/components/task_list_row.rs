use checklist_core::{
  RowRender,
  TaskId
};
use web_sys::{
  Element,
  HtmlInputElement
};
use yew::{
  Callback,
  Html,
  Properties,
  TargetCast,
  classes,
  function_component,
  html,
  use_effect_with,
  use_node_ref
};

use super::LABEL_CLASS;

#[derive(Properties, PartialEq)]
pub struct TaskListRowProps {
  pub row:         RowRender,
  pub on_toggle:   Callback<TaskId>,
  pub on_delete:   Callback<TaskId>,
  pub on_activate: Callback<TaskId>,
  pub on_commit:   Callback<String>,
  pub on_cancel:   Callback<()>,
  pub on_label:
    Callback<(TaskId, Option<Element>)>
}

#[function_component(TaskListRow)]
pub fn task_list_row(
  props: &TaskListRowProps
) -> Html {
  let label_ref = use_node_ref();
  let edit_ref = use_node_ref();
  let row = &props.row;

  // The label element is the row's node
  // for outside-click detection.
  {
    let label_ref = label_ref.clone();
    let on_label =
      props.on_label.clone();
    use_effect_with(
      row.id.clone(),
      move |id| {
        let id = id.clone();
        if let Some(label) =
          label_ref.cast::<Element>()
        {
          on_label.emit((
            id.clone(),
            Some(label)
          ));
        }
        move || on_label.emit((id, None))
      }
    );
  }

  {
    let edit_ref = edit_ref.clone();
    use_effect_with(
      row.editable,
      move |editable| {
        if *editable
          && let Some(input) = edit_ref
            .cast::<HtmlInputElement>()
        {
          let _ = input.focus();
          input.select();
        }
        || ()
      }
    );
  }

  let on_toggle = {
    let on_toggle =
      props.on_toggle.clone();
    let id = row.id.clone();
    move |_: yew::MouseEvent| {
      on_toggle.emit(id.clone())
    }
  };
  let on_delete = {
    let on_delete =
      props.on_delete.clone();
    let id = row.id.clone();
    move |_: yew::MouseEvent| {
      on_delete.emit(id.clone())
    }
  };
  let on_activate = {
    let on_activate =
      props.on_activate.clone();
    let id = row.id.clone();
    move |_: yew::MouseEvent| {
      on_activate.emit(id.clone())
    }
  };
  let on_keydown = {
    let on_commit =
      props.on_commit.clone();
    let on_cancel =
      props.on_cancel.clone();
    move |e: yew::KeyboardEvent| {
      match e.key().as_str() {
        | "Enter" => {
          let input: HtmlInputElement =
            e.target_unchecked_into();
          on_commit.emit(input.value());
        }
        | "Escape" => on_cancel.emit(()),
        | _ => {}
      }
    }
  };

  let class = classes!(
    "row",
    row.completed.then_some("done"),
    row.editable.then_some("editing")
  );

  html! {
      <li class={class}>
          <input
              type="checkbox"
              class="toggle"
              checked={row.completed}
              onclick={on_toggle}
          />
          <div class={LABEL_CLASS} ref={label_ref} ondblclick={on_activate}>
              {
                  if row.editable {
                      html! {
                          <input
                              class="task-edit"
                              ref={edit_ref}
                              value={row.text.clone()}
                              onkeydown={on_keydown}
                          />
                      }
                  } else {
                      html! { <span class="task-text">{ &row.text }</span> }
                  }
              }
          </div>
          <button class="destroy" title="Delete" onclick={on_delete}>{ "×" }</button>
      </li>
  }
}
