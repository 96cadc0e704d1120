// Ranking: embedding backends, cosine similarity, ordering and rank assignment.

pub mod embedder;
pub mod ranker;
pub mod similarity;
