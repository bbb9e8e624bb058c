//! Bundled vertex programs.
//!
//! | Program | Reducer | Result slot |
//! |---------|---------|-------------|
//! | [`PageRankPregel`] | sum | `rank` (double) |
//! | [`ConnectedComponentsPregel`] | min | `component` (long) |
//! | [`SingleSourceShortestPath`] | min | `distance` (double) |

mod connected_components;
mod page_rank;
mod shortest_path;

pub use connected_components::ConnectedComponentsPregel;
pub use page_rank::PageRankPregel;
pub use shortest_path::SingleSourceShortestPath;
