//! Audience records: normalization, hashing and partitioning into buckets.

pub mod model;
pub mod normalize;
pub mod partition;

pub use model::{AddressInfo, AudienceBucket, Identifier, RawRecord, UploadKeyType, COLUMNS};
pub use normalize::{normalize_and_hash, prepare};
pub use partition::{partition, read_audience_file, Partition};
