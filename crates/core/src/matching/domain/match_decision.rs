use crate::matching::domain::threshold::Threshold;
use crate::shared::face_record::{MatchCandidate, VerificationResult};

/// Decides a verification from candidates already ranked by the store.
///
/// Only the top-ranked candidate is considered; when several share the top
/// score, the one the store listed first wins. An empty list is a definitive
/// no-match with a score of 0.
pub fn decide(
    candidates: &[MatchCandidate],
    threshold: Threshold,
    confidence: f64,
) -> VerificationResult {
    let Some(best) = candidates.first() else {
        return VerificationResult {
            is_match: false,
            matched_face_id: None,
            matched_person_name: None,
            similarity_score: 0.0,
            confidence,
            threshold_used: threshold.value(),
        };
    };

    let is_match = threshold.is_met_by(best.similarity_score);
    VerificationResult {
        is_match,
        matched_face_id: is_match.then(|| best.face_id.clone()),
        matched_person_name: is_match.then(|| best.person_name.clone()),
        similarity_score: best.similarity_score,
        confidence,
        threshold_used: threshold.value(),
    }
}
