pub mod entities;
pub mod errors;
pub mod filter;
pub mod plan;
pub mod presets;
