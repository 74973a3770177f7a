pub mod demand;
pub mod history;
pub mod reporting;
pub mod sources;
