// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// SIMILARIDADE VETORIAL
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
// Cosseno entre embeddings e ranking top-k com Rayon.
// Um relatório anual gera poucas centenas de chunks; o paralelismo entre
// comparações basta.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use rayon::prelude::*;

/// Similaridade cosseno
///
/// ```text
/// cos(θ) = (A · B) / (||A|| × ||B||)
/// ```
///
/// Vetores de tamanhos diferentes ou com norma zero têm similaridade 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot_product = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b) {
        dot_product += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denominator = norm_a.sqrt() * norm_b.sqrt();
    if denominator == 0.0 {
        0.0
    } else {
        dot_product / denominator
    }
}

/// Os `top_k` vetores mais similares à query, em ordem decrescente de
/// similaridade. Empates mantêm a ordem original.
///
/// Aceita qualquer item que exponha um embedding (`Vec<f32>`, `&[f32]`,
/// chunks do índice), sem copiar os vetores.
pub fn top_k_similar<E>(query: &[f32], embeddings: &[E], top_k: usize) -> Vec<(usize, f32)>
where
    E: AsRef<[f32]> + Sync,
{
    let mut scored: Vec<(usize, f32)> = embeddings
        .par_iter()
        .enumerate()
        .map(|(idx, embedding)| (idx, cosine_similarity(query, embedding.as_ref())))
        .collect();

    scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    scored.truncate(top_k);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_identical() {
        let a = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal_and_degenerate() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_top_k_order() {
        let embeddings = vec![vec![0.0, 1.0], vec![1.0, 0.0], vec![1.0, 1.0]];
        let ranked = top_k_similar(&[1.0, 0.1], &embeddings, 2);
        assert_eq!(ranked.iter().map(|(i, _)| *i).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_top_k_over_borrowed_slices() {
        let a = [0.0, 1.0];
        let b = [1.0, 0.0];
        let embeddings: Vec<&[f32]> = vec![&a, &b];
        let ranked = top_k_similar(&[1.0, 0.0], &embeddings, 1);
        assert_eq!(ranked, vec![(1, 1.0)]);
    }

    #[test]
    fn test_top_k_larger_than_len() {
        let embeddings = vec![vec![1.0], vec![1.0]];
        let ranked = top_k_similar(&[1.0], &embeddings, 10);
        assert_eq!(ranked.iter().map(|(i, _)| *i).collect::<Vec<_>>(), vec![0, 1]);
    }
}
