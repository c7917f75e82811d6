//! In-process line store for tests and local runs without Postgres.

use async_trait::async_trait;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use super::line_store::LineStore;
use crate::error::LineError;
use crate::models::{SportLine, SportType};

/// [`LineStore`] keeping one score per sport in memory.
#[derive(Debug, Default)]
pub struct InMemoryLineStore {
    lines: RwLock<FxHashMap<SportType, f64>>,
}

impl InMemoryLineStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with `lines`; invalid scores are skipped.
    pub fn with_lines(lines: &[SportLine]) -> Self {
        let store = Self::new();
        {
            let mut map = store.lines.write();
            for line in lines.iter().filter(|l| l.score.is_finite()) {
                map.insert(line.sport_type, line.score);
            }
        }
        store
    }

    pub fn len(&self) -> usize {
        self.lines.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.read().is_empty()
    }
}

#[async_trait]
impl LineStore for InMemoryLineStore {
    async fn store(&self, line: &SportLine) -> Result<(), LineError> {
        if !line.score.is_finite() {
            return Err(LineError::invalid_argument(format!(
                "score for {} must be finite",
                line.sport_type
            )));
        }
        self.lines.write().insert(line.sport_type, line.score);
        Ok(())
    }

    async fn get_lines_by_sport_types(
        &self,
        types: &[SportType],
    ) -> Result<Vec<SportLine>, LineError> {
        if types.is_empty() {
            return Err(LineError::invalid_argument("sport types must not be empty"));
        }

        let map = self.lines.read();
        Ok(types
            .iter()
            .filter_map(|t| {
                map.get(t).map(|score| SportLine {
                    sport_type: *t,
                    score: *score,
                })
            })
            .collect())
    }
}
