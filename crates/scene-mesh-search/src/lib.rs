//! Composite ranked-search scoring and the process-wide ranking flag.

#![forbid(unsafe_code)]

pub mod ranking_flag;
pub mod search_ranker;

pub use ranking_flag::{RankingFlag, global_ranking_flag};
pub use search_ranker::SearchRanker;
