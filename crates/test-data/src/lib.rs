//! Test data for the run tracker.
//!
//! Synthetic run traces with GPS noise and heart rate, GPX import/export, and
//! simulated collaborators for driving a [`runs::Recorder`] without real hardware.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use test_data::prelude::*;
//!
//! let world = SimWorld::new(0);
//! let (recorder, _task) = Recorder::spawn(RecorderConfig::default(), world.collaborators());
//! recorder.start().await?;
//!
//! let mut rng = StdRng::seed_from_u64(7);
//! let run = ProceduralTrace::new().with_distance(5.0).generate(&RunnerProfile::default(), &mut rng);
//! world.positions.replay(&run.path);
//! ```

pub mod config;
pub mod gpx;
pub mod profiles;
pub mod sim;
pub mod sources;

pub mod prelude {
    //! Convenient re-exports for common usage.

    pub use crate::config::{BoundingBox, Region, SeedConfig};
    pub use crate::gpx::{GpxError, read_path, read_path_file, write_run, write_run_file};
    pub use crate::profiles::{RunnerProfile, sample_variance};
    pub use crate::sim::{
        ManualClock, MemoryRunStore, NotifierEvent, RecordingNotifier, SimWorld,
        SimulatedHeartRateFeed, SimulatedPositionFeed,
    };
    pub use crate::sources::{GeneratedRun, ProceduralTrace, TraceConfig};
    pub use rand::{SeedableRng, rngs::StdRng};
    pub use runs::{Recorder, RecorderHandle, config::RecorderConfig};
}
