pub mod contour;
pub mod polyspan;
