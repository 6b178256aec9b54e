pub mod image;
pub mod preprocess;
pub mod threshold;
pub mod unionfind;
pub mod connected;
pub mod cluster;
#[allow(clippy::needless_range_loop)]
pub mod quad;
pub mod refine;
pub mod decode;
pub mod detector;
pub mod dedup;
