use web_sys::HtmlInputElement;
use yew::{
  Callback,
  Html,
  Properties,
  TargetCast,
  function_component,
  html
};

#[derive(Properties, PartialEq)]
pub struct NewTaskFormProps {
  pub draft:     String,
  pub on_input:  Callback<String>,
  pub on_submit: Callback<()>
}

#[function_component(NewTaskForm)]
pub fn new_task_form(
  props: &NewTaskFormProps
) -> Html {
  let on_input = props.on_input.clone();
  let on_submit =
    props.on_submit.clone();

  html! {
      <form
          class="panel new-task"
          onsubmit={move |e: yew::SubmitEvent| {
              e.prevent_default();
              on_submit.emit(());
          }}
      >
          <input
              class="new-task-input"
              placeholder="What needs to be done?"
              value={props.draft.clone()}
              oninput={move |e: yew::InputEvent| {
                  let input: HtmlInputElement = e.target_unchecked_into();
                  on_input.emit(input.value());
              }}
          />
          <button type="submit" class="new-task-create">{ "Create" }</button>
      </form>
  }
}
