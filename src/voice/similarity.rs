//! Embedding arithmetic

use crate::{Error, Result};

/// Element-wise arithmetic mean of speaker embeddings
///
/// # Errors
///
/// Returns `MalformedEmbedding` if there are no embeddings, any is empty, or
/// their lengths disagree
pub fn mean_embedding(embeddings: &[Vec<f32>]) -> Result<Vec<f32>> {
    let Some(first) = embeddings.first() else {
        return Err(Error::MalformedEmbedding("no embeddings to average".to_string()));
    };
    let dims = first.len();
    if dims == 0 {
        return Err(Error::MalformedEmbedding("empty embedding".to_string()));
    }
    if let Some(bad) = embeddings.iter().find(|e| e.len() != dims) {
        return Err(Error::MalformedEmbedding(format!(
            "embedding length {} does not match {dims}",
            bad.len()
        )));
    }

    let mut sum = vec![0.0_f64; dims];
    for embedding in embeddings {
        for (acc, value) in sum.iter_mut().zip(embedding) {
            *acc += f64::from(*value);
        }
    }

    #[allow(clippy::cast_precision_loss)]
    let count = embeddings.len() as f64;
    #[allow(clippy::cast_possible_truncation)]
    let mean = sum.into_iter().map(|total| (total / count) as f32).collect();
    Ok(mean)
}

/// Cosine similarity of two vectors
///
/// Returns 0 for empty vectors, mismatched lengths, or a zero norm.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let mut dot = 0.0_f64;
    let mut norm_a = 0.0_f64;
    let mut norm_b = 0.0_f64;

    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        return 0.0;
    }

    #[allow(clippy::cast_possible_truncation)]
    let similarity = (dot / denom).clamp(-1.0, 1.0) as f32;
    similarity
}
