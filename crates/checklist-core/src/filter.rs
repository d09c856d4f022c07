use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use serde::{
  Deserialize,
  Serialize
};
use tracing::{
  debug,
  trace
};

use crate::error::InvalidFilterError;
use crate::observable::{
  Observable,
  Subscription
};
use crate::task::Task;

#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Hash,
)]
#[serde(rename_all = "lowercase")]
pub enum Filter {
  #[default]
  All,
  Active,
  Completed
}

impl Filter {
  pub const VARIANTS: [Filter; 3] = [
    Filter::All,
    Filter::Active,
    Filter::Completed
  ];

  pub fn as_key(self) -> &'static str {
    match self {
      | Filter::All => "all",
      | Filter::Active => "active",
      | Filter::Completed => {
        "completed"
      }
    }
  }

  pub fn label(self) -> &'static str {
    match self {
      | Filter::All => "All",
      | Filter::Active => "Active",
      | Filter::Completed => {
        "Completed"
      }
    }
  }

  /// The filter the toggle widget moves to next.
  pub fn next(self) -> Self {
    match self {
      | Filter::All => Filter::Active,
      | Filter::Active => {
        Filter::Completed
      }
      | Filter::Completed => Filter::All
    }
  }
}

impl fmt::Display for Filter {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(self.as_key())
  }
}

impl FromStr for Filter {
  type Err = InvalidFilterError;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    match s
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "all" => Ok(Filter::All),
      | "active" => Ok(Filter::Active),
      | "completed" => {
        Ok(Filter::Completed)
      }
      | _ => {
        Err(InvalidFilterError {
          value: s.to_string()
        })
      }
    }
  }
}

/// Store query derived from a [`Filter`].
#[derive(
  Debug,
  Clone,
  Copy,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct Predicate {
  pub completed: bool
}

impl Predicate {
  pub fn matches(
    &self,
    task: &Task
  ) -> bool {
    task.completed == self.completed
  }
}

/// `All` queries the whole collection; the other two narrow it by status.
pub fn predicate(
  filter: Filter
) -> Option<Predicate> {
  match filter {
    | Filter::All => None,
    | Filter::Active => {
      Some(Predicate {
        completed: false
      })
    }
    | Filter::Completed => {
      Some(Predicate {
        completed: true
      })
    }
  }
}

pub fn matches(
  predicate: Option<&Predicate>,
  task: &Task
) -> bool {
  predicate
    .map(|p| p.matches(task))
    .unwrap_or(true)
}

/// Holds the active filter for one view tree.
#[derive(Debug, Clone)]
pub struct FilterSelector {
  current: Observable<Filter>
}

impl Default for FilterSelector {
  fn default() -> Self {
    Self::new(Filter::default())
  }
}

impl FilterSelector {
  pub fn new(initial: Filter) -> Self {
    Self {
      current: Observable::new(initial)
    }
  }

  pub fn current(&self) -> Filter {
    *self.current.get()
  }

  pub fn predicate(
    &self
  ) -> Option<Predicate> {
    predicate(self.current())
  }

  /// Parses and applies a filter name. On error the current filter is
  /// left as it was.
  #[tracing::instrument(skip(self))]
  pub fn set_filter(
    &self,
    value: &str
  ) -> Result<bool, InvalidFilterError>
  {
    let filter =
      value.parse::<Filter>()?;
    Ok(self.set(filter))
  }

  /// Returns whether the filter actually changed.
  pub fn set(
    &self,
    filter: Filter
  ) -> bool {
    let changed = self
      .current
      .replace_if_changed(filter);
    if changed {
      debug!(filter = %filter, "filter changed");
    } else {
      trace!(filter = %filter, "filter unchanged");
    }
    changed
  }

  pub fn cycle(&self) -> Filter {
    let next = self.current().next();
    self.set(next);
    next
  }

  pub fn subscribe(
    &self,
    listener: impl FnMut(&Rc<Filter>)
    + 'static
  ) -> Subscription {
    self.current.subscribe(listener)
  }
}
