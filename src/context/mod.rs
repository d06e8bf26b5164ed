//! The context track resolver (§4.H): model, streaming parser, and the
//! windowed navigator itself.

pub mod model;
pub mod parse;
pub mod resolver;

pub use model::{ContextTrack, FetchMode, ProvidedTrack, ResolvedContextPage, TrackProvider};
pub use resolver::{ContextResolver, ContextResolverConfig};
