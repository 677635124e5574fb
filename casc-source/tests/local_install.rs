//! Build enumeration against a synthetic installation directory.

use casc_cache::CascDirs;
use casc_source::{Error, LocalSource, StorageSource};
use tempfile::TempDir;

const BUILD_INFO: &str = "\
Branch!STRING:0|Build Key!HEX:16|CDN Key!HEX:16|Version!STRING:0|Product!STRING:0\n\
us|0017a402a71aeb2e0e0247684c38a487|ad75e738f368a40f19df2f5f84ab87dc|11.0.2.56313|wow\n\
us|90a2fdbdb2a41a37239eece4b32d2410|2a906c1d7ae2cb95944si64d0b7bcf90|1.15.3.56325|wow_classic_era\n\
us|ffffffffffffffffffffffffffffffff|eeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee|9.9.9.99999|bts\n";

fn fake_install(build_info: &str) -> TempDir {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join(".build.info"), build_info).unwrap();
    std::fs::create_dir_all(tmp.path().join("Data").join("data")).unwrap();
    tmp
}

#[tokio::test]
async fn init_enumerates_wow_builds() {
    let install = fake_install(BUILD_INFO);
    let cache = TempDir::new().unwrap();

    let mut source = StorageSource::Local(
        LocalSource::new(install.path(), CascDirs::new(cache.path())).unwrap(),
    );
    source.init().await.unwrap();

    let builds = source.list_builds();
    assert_eq!(builds.len(), 2);
    assert_eq!(builds[0].product, "wow");
    assert_eq!(builds[0].version, "11.0.2.56313");
    assert_eq!(builds[0].build_key, "0017a402a71aeb2e0e0247684c38a487");
    assert_eq!(builds[1].product, "wow_classic_era");

    assert!(!source.is_loaded());
    assert!(source.selected_build().is_none());
    assert!(source.build_key().is_none());
}

#[tokio::test]
async fn missing_build_info_is_invalid_install() {
    let tmp = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();

    let mut source =
        StorageSource::Local(LocalSource::new(tmp.path(), CascDirs::new(cache.path())).unwrap());
    let err = source.init().await.unwrap_err();
    assert!(matches!(err, Error::InvalidInstall(_)));
    assert_eq!(err.response_code(), "ERR_INVALID_INSTALL");
}

#[tokio::test]
async fn load_build_rejects_bad_index() {
    let install = fake_install(BUILD_INFO);
    let cache = TempDir::new().unwrap();

    let mut source = StorageSource::Local(
        LocalSource::new(install.path(), CascDirs::new(cache.path())).unwrap(),
    );
    source.init().await.unwrap();

    let err = source.load_build(99).await.unwrap_err();
    assert!(matches!(err, Error::InvalidBuildIndex(99)));
    assert_eq!(err.response_code(), "ERR_INVALID_CASC_BUILD");
}

#[tokio::test]
async fn reads_before_load_report_no_casc() {
    let install = fake_install(BUILD_INFO);
    let cache = TempDir::new().unwrap();

    let source = StorageSource::Local(
        LocalSource::new(install.path(), CascDirs::new(cache.path())).unwrap(),
    );
    let err = source.resolve_encoding_key(1234).unwrap_err();
    assert!(matches!(err, Error::NotLoaded));
    assert_eq!(err.response_code(), "ERR_NO_CASC");
    assert!(source.valid_root_entries().is_err());
}
