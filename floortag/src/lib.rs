pub mod detect;
pub mod dict;
pub mod homography;
pub mod mapping;
pub mod render;

#[cfg(feature = "serde")]
pub mod config;
