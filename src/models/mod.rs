pub mod activity;
pub mod blocker;
pub mod evaluation;
pub mod member;
pub mod project;
pub mod snapshot;
pub mod workspace;
