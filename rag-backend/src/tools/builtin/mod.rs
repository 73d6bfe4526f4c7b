pub mod search;
pub mod time;

pub use search::{AnalyzeSentimentTool, SearchDocsTool, WebSearchTool};
pub use time::{GetDateTool, GetTimeTool};
