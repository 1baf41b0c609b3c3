//! Model Training Methods
//!
//! The stratified splitter and the forest classifier used by the training
//! workflow.

pub mod forest;
pub mod split;

pub use forest::{ForestParams, RandomForest};
pub use split::{stratified_split, SplitIndices};
