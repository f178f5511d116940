use std::cmp::Ordering;

use crate::matching::domain::similarity_scorer::{clamp_score, raw_cosine};
use crate::shared::embedding::{Embedding, EmbeddingError};
use crate::shared::face_record::{FaceRecord, MatchCandidate};

/// Exhaustive nearest-neighbour ranking of `records` against `query`.
///
/// Keeps records whose raw cosine is at least `score_floor`, orders them by
/// descending score and returns at most `limit`. Reported scores are
/// clamped to `[0, 1]`. The sort is stable: equal scores keep
/// the order in which `records` yielded them.
pub fn rank_candidates<'a, I>(
    query: &Embedding,
    records: I,
    limit: usize,
    score_floor: f64,
) -> Result<Vec<MatchCandidate>, EmbeddingError>
where
    I: IntoIterator<Item = &'a FaceRecord>,
{
    if limit == 0 {
        return Ok(Vec::new());
    }

    let mut scored = Vec::new();
    for record in records {
        let raw = raw_cosine(query, &record.embedding)?;
        if raw >= score_floor {
            scored.push((raw, record));
        }
    }

    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
    scored.truncate(limit);

    Ok(scored
        .into_iter()
        .map(|(raw, r)| MatchCandidate {
            face_id: r.face_id.clone(),
            person_name: r.person_name.clone(),
            description: r.description.clone(),
            created_at: r.created_at,
            similarity_score: clamp_score(raw),
        })
        .collect())
}
