use checklist_core::Filter;
use yew::{
  Callback,
  Html,
  Properties,
  function_component,
  html
};

#[derive(Properties, PartialEq)]
pub struct FilterToggleProps {
  pub current:   Filter,
  pub on_select: Callback<String>,
  pub on_cycle:  Callback<()>
}

#[function_component(FilterToggle)]
pub fn filter_toggle(
  props: &FilterToggleProps
) -> Html {
  let on_cycle = props.on_cycle.clone();

  html! {
      <div class="filter-toggle">
          {
              for Filter::VARIANTS.iter().copied().map(|filter| {
                  let active = props.current == filter;
                  let on_select = props.on_select.clone();
                  html! {
                      <button
                          class={if active { "filter active" } else { "filter" }}
                          onclick={move |_| on_select.emit(filter.as_key().to_string())}
                      >
                          { filter.label() }
                      </button>
                  }
              })
          }
          <button
              class="filter cycle"
              title="Next filter"
              onclick={move |_| on_cycle.emit(())}
          >
              { "⟳" }
          </button>
      </div>
  }
}
