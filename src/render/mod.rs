pub mod frame;
pub mod pipeline;
pub mod source;
pub mod visualizer;
