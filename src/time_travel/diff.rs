//! DiffCalculator - compare a view's state at two points in history

use std::fmt;
use std::sync::Arc;

use futures::StreamExt;
use serde::Serialize;
use serde_json::Value;

use crate::error::EngineResult;
use crate::types::{DiffSide, ReplayTarget, StateDiff};
use crate::view::Reducer;

use super::replay::{ReplayEngine, ReplayOptions};

/// Equality used for individual state values
pub type ValueEquals = Arc<dyn Fn(&Value, &Value) -> bool + Send + Sync>;

#[derive(Clone, Default)]
pub struct DiffOptions {
    pub replay: ReplayOptions,
    /// Overrides structural equality of serialized values
    pub equals: Option<ValueEquals>,
}

impl DiffOptions {
    pub fn with_equals<F>(mut self, equals: F) -> Self
    where
        F: Fn(&Value, &Value) -> bool + Send + Sync + 'static,
    {
        self.equals = Some(Arc::new(equals));
        self
    }
}

impl fmt::Debug for DiffOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiffOptions")
            .field("replay", &self.replay)
            .field("equals", &self.equals.as_ref().map(|_| "custom"))
            .finish()
    }
}

pub struct DiffCalculator<R: Reducer> {
    engine: ReplayEngine<R>,
}

impl<R: Reducer> DiffCalculator<R>
where
    R::State: Serialize,
{
    pub fn new(engine: ReplayEngine<R>) -> Self {
        Self { engine }
    }

    /// Replay both targets concurrently and report changed top-level keys
    pub async fn diff(
        &self,
        from: ReplayTarget,
        to: ReplayTarget,
        options: DiffOptions,
    ) -> EngineResult<StateDiff<R::State>> {
        let (from, to) = tokio::try_join!(
            self.resolve(from, &options.replay),
            self.resolve(to, &options.replay),
        )?;

        let from_value = serde_json::to_value(&from.state)?;
        let to_value = serde_json::to_value(&to.state)?;
        let changed_keys = changed_keys(&from_value, &to_value, options.equals.as_ref());

        Ok(StateDiff {
            from,
            to,
            changed_keys,
        })
    }

    /// Last replay step for `target`
    ///
    /// When no step is yielded the state comes from the snapshot covering
    /// the target, or is the initial state at offset `-1`.
    async fn resolve(
        &self,
        target: ReplayTarget,
        options: &ReplayOptions,
    ) -> EngineResult<DiffSide<R::State>> {
        let mut steps = self.engine.replay(target, options.clone());
        let mut last = None;
        while let Some(step) = steps.next().await {
            last = Some(step?);
        }

        match last {
            Some(step) => Ok(DiffSide {
                offset: step.offset,
                state: step.state,
            }),
            None => {
                let (offset, state) = self.engine.replay_to_position(target, options.clone()).await?;
                Ok(DiffSide { offset, state })
            }
        }
    }
}

/// Keys that differ between two serialized states
///
/// Objects are compared key by key over the union of both key sets, in
/// sorted order. Anything else is compared whole under the key `"value"`.
pub fn changed_keys(from: &Value, to: &Value, equals: Option<&ValueEquals>) -> Vec<String> {
    let same = |a: &Value, b: &Value| {
        if std::ptr::eq(a, b) {
            return true;
        }
        match equals {
            Some(equals) => equals(a, b),
            None => a == b,
        }
    };

    match (from, to) {
        (Value::Object(a), Value::Object(b)) => {
            let mut keys: Vec<&String> = a.keys().chain(b.keys().filter(|k| !a.contains_key(*k))).collect();
            keys.sort();
            keys.into_iter()
                .filter(|key| match (a.get(*key), b.get(*key)) {
                    (Some(x), Some(y)) => !same(x, y),
                    _ => true,
                })
                .cloned()
                .collect()
        }
        _ if same(from, to) => Vec::new(),
        _ => vec!["value".to_string()],
    }
}
