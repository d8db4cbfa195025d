pub mod mat4;
pub mod vec;

pub use mat4::*;
pub use vec::*;
