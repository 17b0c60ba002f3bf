pub mod step_recipe;

pub use step_recipe::{depth_schedule, DepthSchedule, StepRecipe};
