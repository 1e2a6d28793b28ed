pub mod activity;
pub mod db;
pub mod evaluate;
pub mod git;
pub mod project;
pub mod settings;
