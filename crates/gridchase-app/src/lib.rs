//! Demo fixtures for the gridchase scheduler: a small deterministic ring
//! course world and scripted reference controllers.

pub mod controllers;
pub mod course;

pub use controllers::{GreedyAvatar, HomingPursuers, RandomPursuers, TraceViewport};
pub use course::{CourseConfig, CourseWorld};
