use crate::config::types::{
    Config, CrawlerConfig, IndexConfig, IpfsConfig, NsfwConfig, TikaConfig, WorkersConfig,
};
use crate::ConfigError;
use url::Url;

/// Largest pool a single queue may be served by
const MAX_WORKERS: usize = 256;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_ipfs_config(&config.ipfs)?;
    validate_tika_config(&config.tika)?;
    if let Some(nsfw) = &config.nsfw {
        validate_nsfw_config(nsfw)?;
    }
    validate_index_config(&config.index)?;
    validate_workers_config(&config.workers)?;
    validate_seeds(&config.seeds)?;
    Ok(())
}

fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.dir_entry_buffer_size < 1 {
        return Err(ConfigError::Validation(
            "dir-entry-buffer-size must be >= 1".to_string(),
        ));
    }

    for (name, secs) in [
        ("min-update-age", config.min_update_age),
        ("stat-timeout", config.stat_timeout),
        ("dir-entry-timeout", config.dir_entry_timeout),
    ] {
        if secs == 0 {
            return Err(ConfigError::Validation(format!("{} must be > 0", name)));
        }
    }

    if config.max_dir_size < 1 {
        return Err(ConfigError::Validation(
            "max-dir-size must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_ipfs_config(config: &IpfsConfig) -> Result<(), ConfigError> {
    validate_http_url("ipfs.api-url", &config.api_url)?;
    validate_http_url("ipfs.gateway-url", &config.gateway_url)?;
    Ok(())
}

fn validate_tika_config(config: &TikaConfig) -> Result<(), ConfigError> {
    validate_http_url("tika.url", &config.url)?;
    if config.request_timeout == 0 {
        return Err(ConfigError::Validation(
            "tika.request-timeout must be > 0".to_string(),
        ));
    }
    Ok(())
}

fn validate_nsfw_config(config: &NsfwConfig) -> Result<(), ConfigError> {
    validate_http_url("nsfw.url", &config.url)?;
    if config.request_timeout == 0 {
        return Err(ConfigError::Validation(
            "nsfw.request-timeout must be > 0".to_string(),
        ));
    }
    Ok(())
}

fn validate_index_config(config: &IndexConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "index.database-path cannot be empty".to_string(),
        ));
    }

    let names = [
        &config.files,
        &config.directories,
        &config.invalids,
        &config.partials,
    ];

    for (i, name) in names.iter().enumerate() {
        if name.is_empty() {
            return Err(ConfigError::Validation(
                "index names cannot be empty".to_string(),
            ));
        }
        if names[..i].contains(name) {
            return Err(ConfigError::Validation(format!(
                "index name '{}' is used more than once",
                name
            )));
        }
    }

    Ok(())
}

fn validate_workers_config(config: &WorkersConfig) -> Result<(), ConfigError> {
    for (name, count) in [
        ("file-workers", config.file_workers),
        ("directory-workers", config.directory_workers),
        ("hash-workers", config.hash_workers),
    ] {
        if count < 1 || count > MAX_WORKERS {
            return Err(ConfigError::Validation(format!(
                "{} must be between 1 and {}, got {}",
                name, MAX_WORKERS, count
            )));
        }
    }
    Ok(())
}

fn validate_seeds(seeds: &[String]) -> Result<(), ConfigError> {
    if seeds.iter().any(|s| s.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "seeds cannot contain empty identifiers".to_string(),
        ));
    }
    Ok(())
}

/// Checks that `value` is an absolute http(s) URL
fn validate_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {}: {}", field, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} must use http or https, got '{}'",
            field, value
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_http_url() {
        assert!(validate_http_url("x", "http://localhost:5001").is_ok());
        assert!(validate_http_url("x", "https://gateway.example.com").is_ok());

        assert!(validate_http_url("x", "").is_err());
        assert!(validate_http_url("x", "localhost:5001/api").is_err());
        assert!(validate_http_url("x", "ftp://example.com").is_err());
    }

    #[test]
    fn test_zero_timeouts_rejected() {
        let config = CrawlerConfig {
            dir_entry_timeout: 0,
            ..Default::default()
        };
        assert!(validate_crawler_config(&config).is_err());

        let config = CrawlerConfig {
            max_dir_size: 0,
            ..Default::default()
        };
        assert!(validate_crawler_config(&config).is_err());

        assert!(validate_crawler_config(&CrawlerConfig::default()).is_ok());
    }

    #[test]
    fn test_index_names_must_be_distinct() {
        let config = IndexConfig {
            database_path: "./index.db".to_string(),
            files: "same".to_string(),
            directories: "directories".to_string(),
            invalids: "same".to_string(),
            partials: "partials".to_string(),
        };
        assert!(validate_index_config(&config).is_err());
    }

    #[test]
    fn test_worker_bounds() {
        let config = WorkersConfig {
            hash_workers: 257,
            ..Default::default()
        };
        assert!(validate_workers_config(&config).is_err());
        assert!(validate_workers_config(&WorkersConfig::default()).is_ok());
    }

    #[test]
    fn test_empty_seed_rejected() {
        assert!(validate_seeds(&["Qm123".to_string()]).is_ok());
        assert!(validate_seeds(&[" ".to_string()]).is_err());
    }
}
