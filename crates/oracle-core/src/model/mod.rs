pub mod observation;
pub mod seat;
pub mod tile;
pub mod tileset;
