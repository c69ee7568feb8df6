pub mod database;
pub mod item_types;
