//! Persisting the move vocabulary.

use gambit_core::{
  store::CorpusStore,
  vocabulary::{self, MoveVocabulary},
};

use crate::error::{Error, Result};

/// Generate the vocabulary and store whatever entries are missing, in one
/// transaction. Returns how many rows were added.
pub async fn fill_vocabulary<C: CorpusStore>(store: &C) -> Result<u64> {
  let added = store
    .save_legal_moves(vocabulary::generate().collect())
    .await
    .map_err(Error::store)?;
  tracing::info!(added, "vocabulary filled");
  Ok(added)
}

/// The stored vocabulary, filling the table first if it is empty.
pub async fn load_vocabulary<C: CorpusStore>(store: &C) -> Result<MoveVocabulary> {
  let mut stored = store.legal_moves().await.map_err(Error::store)?;
  if stored.is_empty() {
    fill_vocabulary(store).await?;
    stored = store.legal_moves().await.map_err(Error::store)?;
  }
  Ok(MoveVocabulary::from_moves(stored))
}
