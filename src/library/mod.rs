// Library module
// Locating sound files and the catalogs clips are loaded from

pub mod catalog;
pub mod scanner;

pub use catalog::{ClipCatalogProvider, RemoteListing, StaticList};
pub use scanner::DirectoryScanner;
