pub mod feature;
pub mod grid;
pub mod index;

pub use feature::{CollisionBox, CollisionFeature};
pub use grid::CollisionGrid;
pub use index::CollisionIndex;
