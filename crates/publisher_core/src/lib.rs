//! Publisher core: workflow state, actions, reducer and the store that drives them.
mod action;
mod format;
mod reducer;
mod state;
mod store;
mod view_model;

pub use action::{Action, PROGRESS_COMPLETE};
pub use format::{filtered_title, format_bytes, DEFAULT_TITLE};
pub use reducer::reduce;
pub use state::{Stage, WorkflowSnapshot, WorkflowState, UNDEFINED_ARTIFACT_ID};
pub use store::{Dispatcher, Middleware, Next, Reducer, Store};
pub use view_model::{PublishView, Screen};

/// Store specialised for the publish workflow.
pub type PublishStore = Store<WorkflowState, Action>;

/// Build a store wired to [`reduce`].
pub fn publish_store(initial_state: WorkflowState) -> PublishStore {
    Store::new(reduce, initial_state)
}
