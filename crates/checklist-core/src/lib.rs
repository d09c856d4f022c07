pub mod edit_mode;
pub mod error;
pub mod filter;
pub mod ids;
pub mod list_view;
pub mod listener;
pub mod observable;
pub mod store;
pub mod task;

#[cfg(feature = "native")]
pub mod cli;
#[cfg(feature = "native")]
pub mod commands;
#[cfg(feature = "native")]
pub mod config;
#[cfg(feature = "native")]
pub mod datastore;
#[cfg(feature = "native")]
pub mod render;

pub use edit_mode::{EditMode, EditModeController, NodeRegistry};
pub use error::{InvalidFilterError, PersistenceError};
pub use filter::{Filter, FilterSelector, Predicate};
pub use ids::{IdGenerator, UuidGenerator};
pub use list_view::{ListBody, ListRender, ListView, RowRender};
pub use listener::ScopedListener;
pub use observable::{Observable, Subscription};
pub use store::{CollectionRef, CollectionView, Counts, MemoryStore, RecordStore, TaskCollection, ViewSnapshot};
pub use task::{Task, TaskId, TaskPatch};

#[cfg(feature = "native")]
pub use native::run;

#[cfg(feature = "native")]
mod native {
  use std::ffi::OsString;

  use anyhow::Context;
  use clap::Parser;
  use tracing::{
    debug,
    info
  };

  use crate::commands::ShellNode;
  use crate::{
    ListView,
    ScopedListener,
    TaskCollection,
    UuidGenerator,
    cli,
    commands,
    config,
    datastore,
    render
  };

  #[tracing::instrument(skip_all)]
  pub fn run(
    raw_args: Vec<OsString>
  ) -> anyhow::Result<()> {
    let pre =
      cli::preprocess_args(&raw_args)?;
    let cli = cli::GlobalCli::parse_from(
      pre.cleaned_args
    );

    cli::init_tracing(
      cli.verbose,
      cli.quiet
    )?;

    info!(
      verbose = cli.verbose,
      quiet = cli.quiet,
      "starting checklist CLI"
    );
    debug!(?pre.rc_overrides, "preprocessed rc overrides");

    let mut cfg = config::Config::load(
      cli.config.as_deref()
    )?;
    cfg.apply_overrides(
      pre.rc_overrides.into_iter().chain(
        cli
          .rc_overrides
          .into_iter()
          .map(|kv| (kv.key, kv.value))
      )
    );

    let data_dir =
      config::resolve_data_dir(
        &cfg,
        cli.data.as_deref()
      )
      .context(
        "failed to resolve data \
         directory"
      )?;
    let collection = cfg.collection()?;

    let store =
      datastore::JsonlStore::open(
        &data_dir
      )
      .with_context(|| {
        format!(
          "failed to open datastore at \
           {}",
          data_dir.display()
        )
      })?;

    let inv =
      cli::Invocation::parse(cli.rest)?;

    if inv.command == "purge" {
      let removed = store
        .purge_completed(&collection)
        .context(
          "failed to purge completed \
           tasks"
        )?;
      println!(
        "removed {removed} completed \
         tasks"
      );
      return Ok(());
    }

    let mut renderer =
      render::Renderer::new(&cfg);
    let mut view: ListView<
      datastore::JsonlStore,
      ShellNode
    > = ListView::new(
      TaskCollection::new(
        collection, store
      ),
      cfg.default_filter(),
      Box::new(UuidGenerator),
      ScopedListener::detached()
    );
    view.load().context(
      "failed to load tasks"
    )?;

    commands::dispatch(
      &mut view,
      &mut renderer,
      inv
    )?;

    view.unmount();
    info!("done");
    Ok(())
  }
}
