pub mod filters;
pub mod frames;
pub mod gate;
pub mod noise;
pub mod notes;
pub mod pitch;
pub mod windowing;
