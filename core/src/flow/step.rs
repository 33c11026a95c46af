// storefront-core/src/flow/step.rs

use super::ContextData;
use std::sync::Arc;

/// Evaluated before a step runs; `true` skips the step entirely (before, on and after).
pub type SkipCondition<TData> = Arc<dyn Fn(ContextData<TData>) -> bool + Send + Sync + 'static>;

#[derive(Clone)]
pub struct StepDef<TData: 'static + Send + Sync> {
  pub name: String,
  /// An optional step with no handlers is passed over instead of failing the run.
  pub optional: bool,
  pub skip_if: Option<SkipCondition<TData>>,
}

impl<TData: 'static + Send + Sync> std::fmt::Debug for StepDef<TData> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("StepDef")
      .field("name", &self.name)
      .field("optional", &self.optional)
      .field("skip_if_present", &self.skip_if.is_some())
      .finish()
  }
}

/// Builds a [`SkipCondition`] from a closure over the context's data.
///
/// The closure runs under a read lock.
pub fn skip_when<TData, F>(predicate: F) -> Option<SkipCondition<TData>>
where
  TData: 'static + Send + Sync,
  F: Fn(&TData) -> bool + Send + Sync + 'static,
{
  Some(Arc::new(move |ctx: ContextData<TData>| ctx.with(|data| predicate(data))))
}
