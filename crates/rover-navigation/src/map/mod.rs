//! Cost maps: per-source obstacle grids, the prior trajectory corridor,
//! fusion, inflation and the shared snapshot store.

pub mod costmap;
pub mod fuser;
pub mod geometry;
pub mod inflation;
pub mod pose;
pub mod prior;
pub mod store;

pub use costmap::{CostMap, FREE_COST, INSCRIBED_COST, MAX_FREE_COST, OBSTACLE_COST, Source, is_obstacle};
pub use fuser::fuse;
pub use geometry::{Geometry, GeometryCostMap};
pub use inflation::{InflationConfig, InflationMode, Inflator};
pub use pose::CostMapPose;
pub use prior::{prior_trajectory_map, prior_trajectory_map_for_world};
pub use store::CostMapStore;
