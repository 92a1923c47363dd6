//! robots.txt handling
//!
//! The spider fetches each site's robots.txt once a day and checks every URL
//! against it before fetching. Per-page `<meta name="robots">` directives are
//! read by the HTML parser.

mod cache;
mod parser;

pub use cache::{fetch_robots, CachedRobots, RobotsCache};
pub use parser::ParsedRobots;
