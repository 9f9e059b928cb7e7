//! Multi-pass algorithms shared by operations.

pub mod morphology;
pub mod parallel_reduction;
pub mod smaa;
pub mod symmetric_separable_blur;

pub use morphology::{
    MAX_MORPHOLOGICAL_DISTANCE, morphological_distance, morphological_distance_feather,
    morphological_step,
};
pub use parallel_reduction::{
    maximum_float, maximum_float_in_range, maximum_luminance, minimum_float,
    minimum_float_in_range, minimum_luminance, sum_blue, sum_blue_squared_difference, sum_color,
    sum_green, sum_green_squared_difference, sum_luminance, sum_luminance_squared_difference,
    sum_red, sum_red_squared_difference,
};
pub use smaa::smaa;
pub use symmetric_separable_blur::symmetric_separable_blur;

#[cfg(test)]
#[path = "../../tests/unit/algorithms.rs"]
mod tests;
