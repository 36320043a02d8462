use std::{collections::HashSet, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Authorization policy for one publishing application.
///
/// `allowed_regions` is only consulted when `allow_all_regions` is false.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessConfig {
    pub app_package_name: String,
    pub apk_digest_sha256: Option<String>,
    pub enforce_apk_digest: bool,
    pub cts_profile_match: bool,
    pub basic_integrity: bool,
    pub max_age: Duration,
    pub clock_skew: Duration,
    pub allowed_regions: HashSet<String>,
    pub allow_all_regions: bool,
    pub bypass_safetynet: bool,
}

impl AccessConfig {
    /// Config with integrity checks enabled and no regions allowed.
    pub fn new(app_package_name: impl Into<String>) -> Self {
        Self {
            app_package_name: app_package_name.into(),
            apk_digest_sha256: None,
            enforce_apk_digest: false,
            cts_profile_match: true,
            basic_integrity: true,
            max_age: Duration::from_secs(60 * 60),
            clock_skew: Duration::from_secs(2 * 60),
            allowed_regions: HashSet::new(),
            allow_all_regions: false,
            bypass_safetynet: false,
        }
    }

    pub fn with_allowed_regions<I, S>(mut self, regions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_regions = regions.into_iter().map(Into::into).collect();
        self
    }

    pub fn allowing_all_regions(mut self) -> Self {
        self.allow_all_regions = true;
        self
    }

    pub fn is_region_allowed(&self, region: &str) -> bool {
        self.allow_all_regions || self.allowed_regions.contains(region)
    }
}

/// The subset of a publish request that authorization looks at.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Publish {
    pub app_package_name: String,
    pub regions: Vec<String>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegionAuthorizationError {
    #[error("no allowed regions configured")]
    NoConfig,

    #[error("application '{app_package_name}' tried to write unauthorized region: '{region}'")]
    UnauthorizedRegion {
        app_package_name: String,
        region: String,
    },
}

/// Checks that every region in `data` is permitted by `config`.
///
/// A missing config rejects every request.
pub fn verify_regions(
    config: Option<&AccessConfig>,
    data: &Publish,
) -> Result<(), RegionAuthorizationError> {
    let config = config.ok_or(RegionAuthorizationError::NoConfig)?;

    if config.allow_all_regions {
        return Ok(());
    }

    match data
        .regions
        .iter()
        .find(|region| !config.allowed_regions.contains(region.as_str()))
    {
        Some(region) => Err(RegionAuthorizationError::UnauthorizedRegion {
            app_package_name: config.app_package_name.clone(),
            region: region.clone(),
        }),
        None => Ok(()),
    }
}
