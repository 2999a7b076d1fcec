pub mod filter;
pub mod folder;
pub mod keys;
pub mod series;
