pub mod curve;
pub mod store;
pub mod utility;
pub mod worker;
pub mod pseudo;
pub mod coordinator;

// Re-export commonly used types
pub use curve::{Curve, FragmentEdge, PrecursorCluster, PrecursorLink};
pub use store::{RtIndexed, RtIndexedStore};
pub use worker::{GroupingOpts, OverlapGate};
pub use pseudo::{AssembleOpts, PseudoSpectrum, SpectrumPoint};
pub use coordinator::{CoordinatorError, GroupingCoordinator, IsolationWindow};
