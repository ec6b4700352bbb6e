//! Compiled-artifact caching on disk and in memory

use std::fs;
use std::path::Path;
use std::rc::Rc;
use std::time::{Duration, SystemTime};

use pretty_assertions::assert_eq;
use quire::cache::path_hash;
use quire::{Data, Environment, MemoryFilesystem, Value, ViewConfig};

fn name(value: &str) -> Data {
    let mut data = Data::new();
    data.insert("name".to_string(), Value::from(value));
    data
}

fn set_modified(path: &Path, time: SystemTime) {
    fs::File::options()
        .write(true)
        .open(path)
        .expect("Should open file")
        .set_modified(time)
        .expect("Should set modification time");
}

#[test]
fn test_disk_cache_writes_reuses_and_rebuilds() {
    let dir = tempfile::tempdir().expect("Failed to create temp directory");
    let views = dir.path().join("views");
    let cache = dir.path().join("cache");
    fs::create_dir_all(&views).unwrap();
    let source = views.join("home.quire");
    fs::write(&source, "Hello {{ $name }}").unwrap();

    let config = ViewConfig::new().with_path(&views).with_cache_path(&cache);
    let env = Environment::from_config(&config);
    assert_eq!(env.render("home", name("Ada")).unwrap(), "Hello Ada");

    let artifact = cache.join(path_hash(&source));
    assert_eq!(
        fs::read_to_string(&artifact).unwrap(),
        "Hello <% echo $name; %>"
    );

    // A fresh artifact is served without recompiling
    fs::write(&artifact, "Cached <% echo $name; %>").unwrap();
    set_modified(&source, SystemTime::UNIX_EPOCH + Duration::from_secs(1_000));
    assert_eq!(env.render("home", name("Ada")).unwrap(), "Cached Ada");

    // Touching the source makes the artifact stale
    fs::write(&source, "Bye {{ $name }}").unwrap();
    set_modified(&source, SystemTime::now() + Duration::from_secs(3_600));
    assert_eq!(env.render("home", name("Ada")).unwrap(), "Bye Ada");
    assert_eq!(fs::read_to_string(&artifact).unwrap(), "Bye <% echo $name; %>");
}

#[test]
fn test_without_cache_path_nothing_is_written() {
    let dir = tempfile::tempdir().expect("Failed to create temp directory");
    fs::write(dir.path().join("plain.quire"), "{{ $name }}").unwrap();

    let env = Environment::from_config(&ViewConfig::new().with_path(dir.path()));
    assert_eq!(env.render("plain", name("Grace")).unwrap(), "Grace");
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[test]
fn test_memory_cache_rebuilds_after_source_changes() {
    let files = Rc::new(MemoryFilesystem::new().with_file("views/home.quire", "v1 {{ $name }}"));
    let config = ViewConfig::new().with_path("views").with_cache_path("cache");
    let env = Environment::with_filesystem(&config, files.clone());

    assert_eq!(env.render("home", name("Ada")).unwrap(), "v1 Ada");

    let artifact = Path::new("cache").join(path_hash(Path::new("views/home.quire")));
    files.insert(&artifact, "stale <% echo $name; %>");
    assert_eq!(env.render("home", name("Ada")).unwrap(), "stale Ada");

    files.insert("views/home.quire", "v2 {{ $name }}");
    assert_eq!(env.render("home", name("Ada")).unwrap(), "v2 Ada");
}
