pub mod function;
pub mod grid;
pub mod plane;
pub mod quaternion;

pub use function::EscapeFunction;
pub use grid::{CountGrid, DensityGrid};
pub use plane::{Perspective, Plane4, ProjectionMatrix};
pub use quaternion::Quat;
