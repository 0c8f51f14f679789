use std::{
    fs,
    path::{Path, PathBuf},
};

use factkit::{ClientConfig, EdgarClient};

pub fn fixture_path(relative: impl AsRef<Path>) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(relative)
}

pub fn read_fixture(relative: impl AsRef<Path>) -> String {
    fs::read_to_string(fixture_path(relative)).expect("fixture file should be readable")
}

/// A client whose cache lives in the given directory. Tests that
/// pre-populate the cache never touch the network.
#[allow(dead_code)]
pub fn cached_client(cache_dir: impl Into<PathBuf>) -> EdgarClient {
    let config = ClientConfig::new("test_agent example@example.com").with_cache_dir(cache_dir);
    EdgarClient::with_config(config).unwrap()
}
