use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for dweb-crawler
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    pub ipfs: IpfsConfig,
    pub tika: TikaConfig,
    #[serde(default)]
    pub nsfw: Option<NsfwConfig>,
    pub index: IndexConfig,
    #[serde(default)]
    pub workers: WorkersConfig,
    /// Identifiers published to the hashes queue on startup
    #[serde(default)]
    pub seeds: Vec<String>,
}

/// Crawl decision engine tuning
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CrawlerConfig {
    /// Capacity of the channel between a directory listing and its consumer
    pub dir_entry_buffer_size: usize,

    /// Seconds before an already indexed resource gets its last-seen refreshed
    pub min_update_age: u64,

    /// Seconds allowed for resolving the type of a resource
    pub stat_timeout: u64,

    /// Seconds allowed between two directory entries
    pub dir_entry_timeout: u64,

    /// Number of entries above which a directory is considered too large
    pub max_dir_size: usize,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            dir_entry_buffer_size: 256,
            min_update_age: 3600,
            stat_timeout: 60,
            dir_entry_timeout: 60,
            max_dir_size: 32768,
        }
    }
}

/// IPFS daemon endpoints
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct IpfsConfig {
    /// Base URL of the HTTP API, e.g. `http://localhost:5001`
    pub api_url: String,

    /// Base URL of the gateway extractors fetch content from
    pub gateway_url: String,

    /// Size of a chunk; unreferenced resources of exactly this size are partials
    #[serde(default = "default_partial_size")]
    pub partial_size: u64,
}

fn default_partial_size() -> u64 {
    262144
}

/// ipfs-tika extractor settings
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TikaConfig {
    pub url: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,

    #[serde(default = "default_tika_max_file_size")]
    pub max_file_size: u64,
}

impl TikaConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }
}

fn default_request_timeout() -> u64 {
    300
}

fn default_tika_max_file_size() -> u64 {
    4 * 1024 * 1024 * 1024
}

/// nsfw-server extractor settings
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NsfwConfig {
    pub url: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,

    #[serde(default = "default_nsfw_max_file_size")]
    pub max_file_size: u64,
}

impl NsfwConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }
}

fn default_nsfw_max_file_size() -> u64 {
    1024 * 1024 * 1024
}

/// Index storage
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct IndexConfig {
    /// Path to the SQLite database file
    pub database_path: String,

    #[serde(default = "default_files_index")]
    pub files: String,

    #[serde(default = "default_directories_index")]
    pub directories: String,

    #[serde(default = "default_invalids_index")]
    pub invalids: String,

    #[serde(default = "default_partials_index")]
    pub partials: String,
}

fn default_files_index() -> String {
    "ipfs_files".to_string()
}

fn default_directories_index() -> String {
    "ipfs_directories".to_string()
}

fn default_invalids_index() -> String {
    "ipfs_invalids".to_string()
}

fn default_partials_index() -> String {
    "ipfs_partials".to_string()
}

/// Worker pool sizes and retry policy
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct WorkersConfig {
    pub file_workers: usize,
    pub directory_workers: usize,
    pub hash_workers: usize,

    /// Requeue deliveries whose crawl failed with a transient error
    pub requeue_on_error: bool,
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self {
            file_workers: 4,
            directory_workers: 2,
            hash_workers: 8,
            requeue_on_error: true,
        }
    }
}
