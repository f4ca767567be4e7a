pub mod address;
pub mod cell;
pub mod cell_id;
pub mod edit;
pub mod error;
pub mod position;
pub mod render;
pub mod row_edit;
pub mod sheet;
pub mod snapshot;
pub mod store;
pub mod template;
