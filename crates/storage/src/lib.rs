#![forbid(unsafe_code)]

pub mod objects;
pub mod repository;
pub mod sqlite;
