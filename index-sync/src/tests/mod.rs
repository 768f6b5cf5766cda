pub mod common;

pub mod commands;
