pub mod client;

pub use client::{FetchedPage, HttpFetcher, PageFetcher};
