//! Multi-strategy coordinate resolution for shared map links.
//!
//! Strategies run in a fixed order of increasing cost (path pattern, decoded
//! parameters, HTTP redirects, headless render, geocoding) and the first
//! success wins. See [`Pipeline`].

mod client;
pub mod decode;
pub mod error;
pub mod geocode;
pub mod pattern;
pub mod pipeline;
pub mod redirect;
pub mod render;
pub mod strategy;

pub use decode::{decode_url, DecodedUrl};
pub use error::{RenderError, ResolverError};
pub use geocode::GeocodingResolver;
pub use pattern::{find_candidates, first_coordinate, CoordinateMatch, Marker};
pub use pipeline::{Pipeline, PipelineState, StrategyOrder};
pub use redirect::{Landing, RedirectResolver};
pub use render::chrome::ChromeEngine;
pub use render::{
    probe, BrowserResolver, ReleaseHandle, RenderEngine, RenderLease, RenderOptions, RenderSession,
};
pub use strategy::{
    Attempt, DecodedParamsMatcher, Discovery, PathPatternMatcher, ResolutionContext, Strategy,
};
