pub mod activity;
pub mod classifier;
pub mod graph;
pub mod ingest;
pub mod scoring;
