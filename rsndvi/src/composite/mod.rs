pub mod builder;
pub mod raster;
pub mod scene_picker;
pub mod season;
