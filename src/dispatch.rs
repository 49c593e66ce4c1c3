//! Action dispatch: routes a client-originated `"<model>.<method>"`
//! message to its registered handler, rebuilds the page's tree, and
//! diffs it down to a sparse payload.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use futures_util::FutureExt;

use crate::action::ActionContext;
use crate::diff::{self, SparseTree};
use crate::error::EngineError;
use crate::session::Page;

/// Dispatches one action against `page`. `canceled` lets the caller
/// (typically the websocket loop, when a newer action for the same page
/// arrives before this one finishes) signal that the result should be
/// discarded rather than committed.
#[tracing::instrument(skip(page, payload, canceled), fields(action))]
pub async fn dispatch_action(
    page: &Page,
    action: &str,
    payload: serde_json::Value,
    canceled: Arc<AtomicBool>,
) -> Result<SparseTree, EngineError> {
    page.touch();
    let (model_name, method) = action
        .split_once('.')
        .ok_or_else(|| EngineError::UnknownAction {
            action: action.to_string(),
        })?;

    let mut state = page.state.lock().await;
    let model = state
        .models
        .get_mut(model_name)
        .ok_or_else(|| EngineError::UnknownAction {
            action: action.to_string(),
        })?;

    let mut ctx = ActionContext::new(payload, canceled);
    let outcome = std::panic::AssertUnwindSafe(model.call(method, &mut ctx))
        .catch_unwind()
        .await;

    let call_result = match outcome {
        Ok(result) => result,
        Err(_) => {
            return Err(EngineError::Action {
                message: format!("action {:?} panicked", action),
            })
        }
    };
    call_result?;

    if ctx.is_canceled() {
        return Err(EngineError::Canceled);
    }

    let new_data = ctx.take_result().unwrap_or_else(|| state.data.clone());
    let new_tree = page.template().build(new_data.clone(), page.max_depth())?;
    let sparse = diff::diff(&state.tree, &new_tree);

    state.data = new_data;
    state.tree = new_tree;

    Ok(sparse)
}
