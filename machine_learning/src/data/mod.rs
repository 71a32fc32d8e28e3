mod augment;
mod dataloader;
mod dataset;

pub use augment::Augment;
pub use dataloader::{Batch, Batches, DataLoader};
pub use dataset::InMemoryDataset;
