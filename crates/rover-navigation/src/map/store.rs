use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use super::costmap::{CostMap, Source};
use super::fuser::fuse;
use super::inflation::{InflationConfig, Inflator};
use crate::error::NavigationError;

/// Shared home of the per-source cost maps and of the merged, inflated
/// snapshot planners read from.
///
/// Writers build a complete map off to the side and hand it over with
/// [`CostMapStore::replace`]; the store only holds a lock long enough to swap
/// an `Arc`. Readers get an `Arc<CostMap>` that can never change under them.
/// Rebuilds are serialized so snapshots are published in the order their
/// sources were read.
#[derive(Debug)]
pub struct CostMapStore {
    resolution: f64,
    inflator: Inflator,
    sources: RwLock<BTreeMap<Source, Arc<CostMap>>>,
    published: RwLock<Arc<CostMap>>,
    rebuilding: Mutex<()>,
}

impl CostMapStore {
    /// Creates an empty store for maps of `resolution` meters per cell.
    pub fn new(resolution: f64, inflation: &InflationConfig) -> Result<Self, NavigationError> {
        let inflator = Inflator::new(resolution, inflation)?;
        let empty = CostMap::empty(Source::Inflated, resolution)?.into_published();
        Ok(CostMapStore {
            resolution,
            inflator,
            sources: RwLock::new(BTreeMap::new()),
            published: RwLock::new(Arc::new(empty)),
            rebuilding: Mutex::new(()),
        })
    }

    /// Meters per cell of every map in the store.
    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    /// Installs a new revision of the map of `map.source()`, publishing it first.
    pub fn replace(&self, map: CostMap) -> Result<(), NavigationError> {
        if (map.resolution() - self.resolution).abs() > f64::EPSILON * self.resolution {
            return Err(NavigationError::InvalidResolution("Source resolution does not match store"));
        }
        let source = map.source();
        let map = Arc::new(map.into_published());
        self.sources.write().insert(source, map);
        debug!(%source, "Cost map source replaced");
        Ok(())
    }

    /// Removes a source entirely.
    pub fn remove(&self, source: Source) -> Option<Arc<CostMap>> {
        self.sources.write().remove(&source)
    }

    /// Current revision of one source.
    pub fn source(&self, source: Source) -> Option<Arc<CostMap>> {
        self.sources.read().get(&source).cloned()
    }

    /// Fuses the sources that need inflation, inflates the result, merges in
    /// the sources that don't and publishes it as the new snapshot.
    ///
    /// Writers to the sources and readers of the snapshot are never blocked
    /// by the fusion work; concurrent rebuilds wait for each other.
    pub fn rebuild(&self) -> Result<Arc<CostMap>, NavigationError> {
        let _rebuilding = self.rebuilding.lock();
        let sources: Vec<Arc<CostMap>> = self.sources.read().values().cloned().collect();
        let (inflatable, as_is): (Vec<&CostMap>, Vec<&CostMap>) =
            sources.iter().map(|m| m.as_ref()).partition(|m| m.source().requires_inflation());
        let inflated = self.inflator.inflate(&fuse(inflatable, self.resolution)?)?;
        let inflated = if as_is.is_empty() {
            inflated
        } else {
            fuse(as_is.into_iter().chain([&inflated]), self.resolution)?
                .with_source(Source::Inflated)
                .into_published()
        };
        let inflated = Arc::new(inflated);
        *self.published.write() = Arc::clone(&inflated);
        info!(
            sources = sources.len(),
            width = inflated.width(),
            height = inflated.height(),
            "Published inflated cost map"
        );
        Ok(inflated)
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> Arc<CostMap> {
        Arc::clone(&self.published.read())
    }
}
