pub mod checkpoint;
pub mod controller;
pub mod errors;
pub mod models;
pub mod providers;
pub mod runner;
pub mod tools;
