//! Client for the home-visit proximity alert and manual verification
//! workflow.
//!
//! [`PollAlertsJob`](jobs::PollAlertsJob) keeps an [`AlertFeed`](feed::AlertFeed)
//! of in-flight alerts fresh, [`AlertLifecycleManager`](lifecycle::AlertLifecycleManager)
//! triages individual alerts, and
//! [`ManualVerificationWorkflow`](verification::ManualVerificationWorkflow)
//! covers visits that geolocation could not confirm.

pub mod backend;
pub mod config;
pub mod error;
pub mod feed;
pub mod jobs;
pub mod lifecycle;
pub mod logging;
pub mod metrics;
pub mod notice;
pub mod verification;

pub use backend::{HttpBackend, InMemoryBackend, ProximityBackend};
pub use error::ClientError;
pub use feed::AlertFeed;
pub use lifecycle::AlertLifecycleManager;
pub use notice::{Notice, NoticeLevel, NoticeSink, RecordingNoticeSink, TracingNoticeSink};
pub use verification::ManualVerificationWorkflow;
