use std::cell::RefCell;
use std::rc::{
  Rc,
  Weak
};

use checklist_core::{
  CollectionRef,
  ListBody,
  ListView,
  ScopedListener,
  TaskCollection,
  TaskId,
  UuidGenerator
};
use gloo::events::EventListener;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::spawn_local;
use web_sys::Element;
use yew::{
  Callback,
  Html,
  function_component,
  html,
  use_effect_with,
  use_force_update,
  use_state
};

use super::storage::{
  self,
  LocalStorageStore
};
use super::ui_debug;
use crate::components::{
  FilterToggle,
  LABEL_CLASS,
  NewTaskForm,
  TaskList
};

type TaskListView = ListView<
  LocalStorageStore,
  Element,
  EventListener
>;
type SharedView =
  Rc<RefCell<TaskListView>>;

fn new_view() -> SharedView {
  Rc::new_cyclic(
    |weak: &Weak<
      RefCell<TaskListView>
    >| {
      let weak = weak.clone();
      let listener =
        ScopedListener::new(move || {
          attach_outside_click(
            weak.clone()
          )
        });

      RefCell::new(ListView::new(
        TaskCollection::new(
          CollectionRef::default(),
          LocalStorageStore
        ),
        storage::load_filter(),
        Box::new(UuidGenerator),
        listener
      ))
    }
  )
}

/// Document-level click listener that
/// lives only while a row is being
/// edited. Handling is deferred so the
/// listener is never dropped from inside
/// its own callback.
fn attach_outside_click(
  view: Weak<RefCell<TaskListView>>
) -> EventListener {
  ui_debug(
    "edit.listener",
    "attached document click listener"
  );
  let document =
    gloo::utils::document();

  EventListener::new(
    &document,
    "click",
    move |event| {
      let Some(target) = event
        .target()
        .and_then(|target| {
          target
            .dyn_into::<Element>()
            .ok()
        })
      else {
        return;
      };
      let node = target
        .closest(&format!(
          ".{LABEL_CLASS}"
        ))
        .ok()
        .flatten()
        .unwrap_or(target);

      let view = view.clone();
      spawn_local(async move {
        let Some(view) = view.upgrade()
        else {
          return;
        };
        let Ok(mut view) =
          view.try_borrow_mut()
        else {
          return;
        };
        if view
          .handle_global_click(&node)
        {
          ui_debug(
            "edit.outside_click",
            "left edit mode"
          );
        }
      });
    }
  )
}

#[function_component(App)]
pub fn app() -> Html {
  let view = use_state(new_view);
  let force_update =
    use_force_update();

  {
    let view = (*view).clone();
    use_effect_with((), move |_| {
      let subscription =
        view.borrow().subscribe(
          move || {
            let force_update =
              force_update.clone();
            spawn_local(async move {
              force_update
                .force_update();
            });
          }
        );

      if let Err(err) =
        view.borrow_mut().load()
      {
        tracing::warn!(
          error = %err,
          "failed to load tasks"
        );
      }
      ui_debug(
        "app.mounted",
        "task list loaded and \
         subscribed"
      );

      move || {
        drop(subscription);
        if let Ok(mut view) =
          view.try_borrow_mut()
        {
          view.unmount();
        }
      }
    });
  }

  let render =
    view.borrow().render();

  {
    use_effect_with(
      render.filter,
      move |filter| {
        storage::save_filter(*filter);
        tracing::debug!(
          filter = %filter,
          "persisted filter"
        );
        || ()
      }
    );
  }

  let on_draft = {
    let view = (*view).clone();
    Callback::from(
      move |text: String| {
        view.borrow().set_draft(text);
      }
    )
  };

  let on_submit = {
    let view = (*view).clone();
    Callback::from(move |_: ()| {
      match view.borrow_mut().submit()
      {
        | Ok(id) => {
          ui_debug(
            "task.created",
            id.as_str()
          );
        }
        | Err(err) => {
          tracing::warn!(
            error = %err,
            "create failed, draft kept"
          );
        }
      }
    })
  };

  let on_filter = {
    let view = (*view).clone();
    Callback::from(
      move |value: String| {
        if let Err(err) = view
          .borrow_mut()
          .set_filter(&value)
        {
          tracing::warn!(
            error = %err,
            "filter rejected"
          );
        }
      }
    )
  };

  let on_cycle_filter = {
    let view = (*view).clone();
    Callback::from(move |_: ()| {
      let next =
        view.borrow_mut().cycle_filter();
      ui_debug(
        "filter.cycled",
        next.as_key()
      );
    })
  };

  let on_toggle = {
    let view = (*view).clone();
    Callback::from(
      move |id: TaskId| {
        if let Err(err) = view
          .borrow_mut()
          .toggle_completed(&id)
        {
          tracing::warn!(
            id = %id,
            error = %err,
            "toggle failed"
          );
        }
      }
    )
  };

  let on_delete = {
    let view = (*view).clone();
    Callback::from(
      move |id: TaskId| {
        if let Err(err) =
          view.borrow_mut().delete(&id)
        {
          tracing::warn!(
            id = %id,
            error = %err,
            "delete failed"
          );
        }
      }
    )
  };

  let on_activate = {
    let view = (*view).clone();
    Callback::from(
      move |id: TaskId| {
        view.borrow_mut().activate(id);
      }
    )
  };

  let on_commit = {
    let view = (*view).clone();
    Callback::from(
      move |text: String| {
        if let Err(err) = view
          .borrow_mut()
          .commit_edit(text)
        {
          tracing::warn!(
            error = %err,
            "edit not saved, editor \
             stays open"
          );
        }
      }
    )
  };

  let on_cancel = {
    let view = (*view).clone();
    Callback::from(move |_: ()| {
      view.borrow_mut().cancel_edit();
    })
  };

  let on_label = {
    let view = (*view).clone();
    Callback::from(
      move |(id, node): (
        TaskId,
        Option<Element>
      )| {
        let Ok(mut view) =
          view.try_borrow_mut()
        else {
          return;
        };
        match node {
          | Some(node) => {
            view.register_node(id, node)
          }
          | None => {
            view.unregister_node(&id)
          }
        }
      }
    )
  };

  let counts = render.counts;
  let body = match render.body {
    | ListBody::Loading => html! {
        <div class="panel list loading">{ "Loading…" }</div>
    },
    | ListBody::Loaded(rows) => html! {
        <TaskList
            rows={rows}
            on_toggle={on_toggle}
            on_delete={on_delete}
            on_activate={on_activate}
            on_commit={on_commit}
            on_cancel={on_cancel}
            on_label={on_label}
        />
    }
  };

  html! {
      <div class="app">
          <NewTaskForm
              draft={render.draft}
              on_input={on_draft}
              on_submit={on_submit}
          />
          <FilterToggle
              current={render.filter}
              on_select={on_filter}
              on_cycle={on_cycle_filter}
          />
          { body }
          <div class="footer">
              { format!(
                  "{} active, {} completed",
                  counts.active, counts.completed
              ) }
          </div>
      </div>
  }
}
