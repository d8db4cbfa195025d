pub mod camera;
pub mod panorama;
pub mod sphere;

pub use camera::*;
pub use panorama::*;
pub use sphere::*;
