//! Project Assets
//!
//! Images and sounds referenced by id from the project document. Bytes come
//! from an `AssetSource` (data URIs, or files next to the project); the
//! `AssetCache` decodes them a few per frame so a slow asset never stalls
//! the loop, and everything that is not decoded yet simply reads as absent.
//!
//! ```text
//! Asset.src ──AssetSource::read──▶ bytes ──AssetCache::poll──▶ ImageData / AudioClip
//! ```

mod cache;
mod source;

pub use cache::{AssetCache, AssetEvent, AssetStatus, AudioClip, ImageData};
pub use source::{
    parse_data_uri, sniff_mime, to_data_uri, AssetLoadError, AssetSource, DataUriSource, FileSource,
};

#[cfg(test)]
pub(crate) use cache::tests::{image_asset, png_bytes};
