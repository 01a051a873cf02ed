pub use allocation::{
    Allocation, AllocationPolicy, AllocationResult, BiasFactor, allocate, apportion,
    default_epsilon, max_distributable,
};
pub use cache::{CachedGroup, MemoryPreviewCache, NoopPreviewCache, PreviewCache};
pub use campaigns::Campaign;
pub use commands::{DonationNew, GroupDonationNew, GroupPreviewCmd};
pub use distribution::{GroupAllocation, GroupDonationReceipt, Share};
pub use donations::{Donation, Donor, NOTE_MAX_CHARS};
pub use eligibility::{Candidate, GroupCriterion, select};
pub use error::EngineError;
pub use money::MoneyCents;
pub use ops::{Engine, EngineBuilder};
pub use organizations::Organization;
pub use recipients::Recipient;
pub use snapshot::RecipientSnapshot;

mod allocation;
mod cache;
mod campaigns;
mod commands;
mod distribution;
mod donations;
mod eligibility;
mod error;
mod money;
mod ops;
mod organizations;
mod recipients;
mod snapshot;
mod util;

type ResultEngine<T> = Result<T, EngineError>;
