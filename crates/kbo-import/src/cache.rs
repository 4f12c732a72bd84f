//! The code cache — every `(category, code_value) → id` pair, loaded once
//! per run after the codes step and immutable from then on. All mapper code
//! lookups go through it; nothing re-queries the `code` table per row.

use std::collections::HashMap;

use kbo_core::CodeCategory;

use crate::Result;

#[derive(Debug, Default)]
pub struct CodeCache {
  ids: HashMap<CodeCategory, HashMap<String, i64>>,
}

impl CodeCache {
  /// Load the full `code` table. Rows with a category outside the known set
  /// are skipped (the reference file occasionally grows vocabularies this
  /// importer does not consume).
  pub fn load(conn: &rusqlite::Connection) -> Result<Self> {
    let mut stmt = conn.prepare("SELECT id, category, code_value FROM code")?;
    let rows = stmt
      .query_map([], |r| {
        Ok((
          r.get::<_, i64>(0)?,
          r.get::<_, String>(1)?,
          r.get::<_, String>(2)?,
        ))
      })?
      .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut ids: HashMap<CodeCategory, HashMap<String, i64>> = HashMap::new();
    for (id, category, code_value) in rows {
      match CodeCategory::parse(&category) {
        Ok(category) => {
          ids.entry(category).or_default().insert(code_value, id);
        }
        Err(_) => {
          tracing::debug!(category, "skipping unknown code category");
        }
      }
    }
    Ok(Self { ids })
  }

  pub fn try_get(&self, category: CodeCategory, code_value: &str) -> Option<i64> {
    self.ids.get(&category)?.get(code_value).copied()
  }

  pub fn len(&self) -> usize {
    self.ids.values().map(HashMap::len).sum()
  }

  pub fn is_empty(&self) -> bool { self.len() == 0 }
}
