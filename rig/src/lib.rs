pub mod camera;
pub mod stage;
pub mod sweep;
