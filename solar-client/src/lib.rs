pub mod aggregation;
pub mod db;
pub mod domain;
pub mod synthetic;
pub mod zone;
