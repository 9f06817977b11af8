//! Default collaborators for Wikipedia dumps: the dump host, the XML shard
//! reader and the wikitext cleaner behind it.

pub mod dump;
pub mod markup;
pub mod pages;

pub use dump::HttpDumpClient;
pub use pages::WikiXmlExtractor;
