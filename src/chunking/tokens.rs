use std::sync::Arc;

use semchunk_rs::Chunker;

/// Counts tokens in a text segment.
pub type TokenCounter = Arc<dyn Fn(&str) -> usize + Send + Sync>;

/// `cl100k_base` token counter, or a whitespace counter when the encoding cannot be loaded.
pub fn token_counter() -> TokenCounter {
    match tiktoken_rs::cl100k_base() {
        Ok(encoding) => {
            let encoding = Arc::new(encoding);
            Arc::new(move |segment: &str| encoding.encode_ordinary(segment).len())
        }
        Err(error) => {
            tracing::warn!(
                error = %error,
                "cl100k_base unavailable; falling back to whitespace token counter"
            );
            whitespace_counter()
        }
    }
}

/// One token per whitespace-separated word; non-empty whitespace counts as one.
pub fn whitespace_counter() -> TokenCounter {
    Arc::new(|segment: &str| {
        let tokens = segment.split_whitespace().count();
        if tokens == 0 && !segment.is_empty() {
            1
        } else {
            tokens
        }
    })
}

/// Split `text` into semantic pieces of at most `budget` tokens.
pub fn split_to_budget(text: &str, budget: usize, counter: &TokenCounter) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    let budget = budget.max(1);
    if counter.as_ref()(text) <= budget {
        return vec![text.trim().to_string()];
    }
    let counter = counter.clone();
    let chunker = Chunker::new(budget, Box::new(move |segment: &str| counter.as_ref()(segment)));
    chunker
        .chunk(text)
        .into_iter()
        .map(|piece| piece.trim().to_string())
        .filter(|piece| !piece.is_empty())
        .collect()
}
