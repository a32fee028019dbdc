pub mod cancel;
pub mod histogram;
pub mod ranker;
pub mod report;
pub mod scanner;
pub mod similarity;
