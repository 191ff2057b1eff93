use async_trait::async_trait;
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs::File;
use std::fs::FileTimes;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;
use std::time::SystemTime;
use tokio_util::sync::CancellationToken;
use vanilla_meta::ContainerError;
use vanilla_meta::ContainerRuntime;
use vanilla_meta::FetchError;
use vanilla_meta::FetchProgress;
use vanilla_meta::Fetcher;
use vanilla_meta::VanillaMetaConfig;
use vanilla_meta::VanillaMetaPlugin;

pub const FEED_URL: &str = "https://feed.test/metadata.xml.gz";

pub const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<components version="0.14">
  <component type="desktop-application">
    <id>org.example.App</id>
    <name>Example</name>
    <name xml:lang="de">Beispiel</name>
    <summary>An example application</summary>
    <description><p>Shows how things are done.</p></description>
    <icon type="stock">org.example.App</icon>
    <launchable type="desktop-id">example.desktop</launchable>
    <bundle type="apx" container="apx_managed_debian">example-pkg</bundle>
  </component>
  <component type="desktop-application">
    <id>org.gimp.GIMP</id>
    <name>GNU Image Manipulation Program</name>
    <summary>Create images and edit photographs</summary>
    <keywords><keyword>photo</keyword></keywords>
    <launchable type="desktop-id">gimp.desktop</launchable>
    <bundle type="apx" container="apx_managed_arch">gimp</bundle>
  </component>
  <component type="desktop-application">
    <id>org.gimp.GIMP</id>
    <name>GIMP</name>
    <bundle type="apx" container="apx_managed_debian">gimp-debian</bundle>
  </component>
  <component type="desktop-application">
    <id>org.kde.krita</id>
    <name>Krita</name>
    <provides><id>org.gimp.GIMP</id></provides>
    <bundle type="apx" container="apx_managed_fedora">krita</bundle>
  </component>
</components>"#;

pub const UPDATED_FEED: &str = r#"<components>
  <component type="desktop-application">
    <id>org.example.Other</id>
    <name>Other</name>
    <bundle type="apx" container="apx_managed_alpine">other-pkg</bundle>
  </component>
</components>"#;

pub fn gzip(xml: &str) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(xml.as_bytes()).unwrap();
    encoder.finish().unwrap()
}

pub fn backdate(path: &Path, by: Duration) {
    let file = File::options().write(true).open(path).unwrap();
    file.set_times(FileTimes::new().set_modified(SystemTime::now() - by))
        .unwrap();
}

/// Serves a fixed body and counts how often it was asked to.
pub struct FakeFetcher {
    body: Mutex<Vec<u8>>,
    calls: AtomicUsize,
    fail: AtomicBool,
}

impl FakeFetcher {
    pub fn new(xml: &str) -> Arc<Self> {
        Arc::new(Self {
            body: Mutex::new(gzip(xml)),
            calls: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_body(&self, xml: &str) {
        *self.body.lock().unwrap() = gzip(xml);
    }

    pub fn fail_with_transport_error(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Fetcher for FakeFetcher {
    async fn fetch(
        &self,
        url: &str,
        destination: &Path,
        on_progress: &(dyn Fn(FetchProgress) + Send + Sync),
        cancel: &CancellationToken,
    ) -> Result<(), FetchError> {
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(FetchError::Transport {
                url: url.to_string(),
                message: "connection reset".to_string(),
            });
        }
        let body = self.body.lock().unwrap().clone();
        let total = body.len() as u64;
        std::fs::write(destination, &body)?;
        on_progress(FetchProgress {
            bytes_so_far: total,
            total: Some(total),
        });
        Ok(())
    }
}

/// Records the container commands it was asked to run.
#[derive(Default)]
pub struct FakeRuntime {
    containers: Mutex<Vec<String>>,
    commands: Mutex<Vec<String>>,
    fail_install: AtomicBool,
}

impl FakeRuntime {
    pub fn with_containers(names: &[&str]) -> Arc<Self> {
        let runtime = Self::default();
        *runtime.containers.lock().unwrap() = names.iter().map(ToString::to_string).collect();
        Arc::new(runtime)
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    pub fn fail_installs(&self) {
        self.fail_install.store(true, Ordering::SeqCst);
    }

    fn record(&self, command: String) {
        self.commands.lock().unwrap().push(command);
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn list_containers(
        &self,
        _cancel: &CancellationToken,
    ) -> Result<Vec<String>, ContainerError> {
        self.record("list".to_string());
        Ok(self.containers.lock().unwrap().clone())
    }

    async fn init_container(
        &self,
        flag: &str,
        _cancel: &CancellationToken,
    ) -> Result<(), ContainerError> {
        self.record(format!("init {flag}"));
        Ok(())
    }

    async fn install_package(
        &self,
        flag: &str,
        package: &str,
        _cancel: &CancellationToken,
    ) -> Result<(), ContainerError> {
        let command = format!("install {flag} {package}");
        self.record(command.clone());
        if self.fail_install.load(Ordering::SeqCst) {
            return Err(ContainerError::Spawn {
                command,
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "apx not found"),
            });
        }
        Ok(())
    }

    async fn launch(&self, flag: &str, command: &str) -> Result<(), ContainerError> {
        self.record(format!("run {flag} {command}"));
        Ok(())
    }
}

pub fn plugin(cache_dir: &Path, fetcher: Arc<FakeFetcher>) -> VanillaMetaPlugin {
    plugin_with_runtime(cache_dir, fetcher, Arc::new(FakeRuntime::default()))
}

pub fn plugin_with_runtime(
    cache_dir: &Path,
    fetcher: Arc<FakeFetcher>,
    runtime: Arc<FakeRuntime>,
) -> VanillaMetaPlugin {
    let config = VanillaMetaConfig::new(cache_dir, FEED_URL);
    VanillaMetaPlugin::with_collaborators(config, fetcher, runtime).unwrap()
}

/// Any cache age is stale against this.
pub fn always() -> Duration {
    Duration::ZERO
}

/// No existing cache is stale against this.
pub fn never() -> Duration {
    Duration::from_secs(u64::MAX)
}
