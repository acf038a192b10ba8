use super::RequestsLoggingLevel;
use crate::bookmark_manager::DEFAULT_PER_PAGE;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub requests_logging_level: RequestsLoggingLevel,
    pub port: u16,
    pub metrics_port: u16,
    /// Page size of `GET /api/bookmark`.
    pub per_page: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            requests_logging_level: RequestsLoggingLevel::Path,
            port: 3002,
            metrics_port: 9092,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}
