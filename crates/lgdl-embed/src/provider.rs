//! Pluggable embedding providers.
//!
//! Grounded in `ob-semantic-matcher::embedder::Embedder`'s query/target
//! split and CLS-pooling-then-L2-normalize shape, but this crate ships
//! only the deterministic offline fallback: no model download, no GPU,
//! bit-reproducible across runs so the vector cache's version lock means
//! something. A real model-backed provider (Candle, a hosted API) can
//! implement the same trait without touching the cache or cascade
//! matcher.

use crate::vector::l2_normalize;

/// Something that turns text into a fixed-dimension vector.
///
/// `model_name`/`model_version` together form half of the cache key
/// (`CacheKey`, see `cache.rs`): changing either invalidates every entry
/// produced by a prior provider rather than silently mixing incompatible
/// vectors.
pub trait EmbeddingProvider: Send + Sync {
    fn embed_query(&self, text: &str) -> Vec<f32>;
    fn embed_target(&self, text: &str) -> Vec<f32>;
    fn dimension(&self) -> usize;
    fn model_name(&self) -> &str;
    fn model_version(&self) -> u32;
}

/// BGE-style instruction prefix applied to queries only, so a query and a
/// target made of the same words still land at slightly different points
/// (asymmetric retrieval), the same convention as `QUERY_PREFIX` elsewhere
/// in this stack.
const QUERY_PREFIX: &str = "query: ";

pub const DEFAULT_DIMENSION: usize = 256;

/// Character-bigram TF-IDF-ish vectorizer. No training, no corpus
/// statistics beyond the input text itself (a proper IDF would need a
/// document collection this crate doesn't have); each bigram hashes into
/// one of `dimension` buckets and contributes a log-scaled term count.
/// Deterministic and dependency-free: the same text always produces the
/// same vector, which is the only property the cascade matcher and the
/// vector cache actually need from it.
#[derive(Debug, Clone)]
pub struct OfflineVectorizer {
    dimension: usize,
}

impl OfflineVectorizer {
    pub fn new() -> Self {
        Self {
            dimension: DEFAULT_DIMENSION,
        }
    }

    pub fn with_dimension(dimension: usize) -> Self {
        Self { dimension }
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let normalized = text.trim().to_lowercase();
        let chars: Vec<char> = normalized.chars().collect();
        let mut buckets = vec![0u32; self.dimension];

        if chars.len() < 2 {
            for c in &chars {
                let idx = (*c as usize) % self.dimension;
                buckets[idx] += 1;
            }
        } else {
            for window in chars.windows(2) {
                let bigram: String = window.iter().collect();
                let idx = bucket_for(&bigram, self.dimension);
                buckets[idx] += 1;
            }
        }

        let mut v: Vec<f32> = buckets
            .into_iter()
            .map(|count| if count == 0 { 0.0 } else { (1.0 + count as f32).ln() })
            .collect();
        l2_normalize(&mut v);
        v
    }
}

impl Default for OfflineVectorizer {
    fn default() -> Self {
        Self::new()
    }
}

impl EmbeddingProvider for OfflineVectorizer {
    fn embed_query(&self, text: &str) -> Vec<f32> {
        self.vectorize(&format!("{QUERY_PREFIX}{text}"))
    }

    fn embed_target(&self, text: &str) -> Vec<f32> {
        self.vectorize(text)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "offline-bigram-tfidf"
    }

    fn model_version(&self) -> u32 {
        1
    }
}

fn bucket_for(bigram: &str, dimension: usize) -> usize {
    let mut hash: u64 = 1469598103934665603; // FNV-1a offset basis
    for b in bigram.as_bytes() {
        hash ^= *b as u64;
        hash = hash.wrapping_mul(1099511628211);
    }
    (hash as usize) % dimension
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_text_is_bit_reproducible() {
        let v = OfflineVectorizer::new();
        assert_eq!(v.embed_target("reschedule my appointment"), v.embed_target("reschedule my appointment"));
    }

    #[test]
    fn query_and_target_differ_for_same_words() {
        let v = OfflineVectorizer::new();
        assert_ne!(v.embed_query("book a visit"), v.embed_target("book a visit"));
    }

    #[test]
    fn similar_phrases_score_higher_than_unrelated_ones() {
        use crate::vector::cosine_similarity;
        let v = OfflineVectorizer::new();
        let a = v.embed_target("I need to see Dr. Smith");
        let b = v.embed_target("I need to see Dr. Jones");
        let c = v.embed_target("cancel my subscription");
        assert!(cosine_similarity(&a, &b) > cosine_similarity(&a, &c));
    }

    #[test]
    fn output_has_requested_dimension() {
        let v = OfflineVectorizer::with_dimension(64);
        assert_eq!(v.embed_target("hi").len(), 64);
    }
}
