mod accumulator;
mod merge;

pub use accumulator::{ExpansionDirection, GraphAccumulator};
pub use merge::NodeGraphData;
