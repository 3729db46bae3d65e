pub mod centroid;
pub mod perimeter;
pub mod r2;
pub mod shape;
