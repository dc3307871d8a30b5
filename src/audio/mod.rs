pub mod analysis;
pub mod decode;
