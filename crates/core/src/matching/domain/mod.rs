pub mod candidate_ranking;
pub mod match_decision;
pub mod similarity_scorer;
pub mod threshold;
