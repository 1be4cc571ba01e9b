pub mod id;
pub use id::PlaylistId;

pub mod metadata;

pub mod fetcher;

pub mod download;

pub mod folder;

pub mod lock;

pub mod pipeline;

pub mod tag;
