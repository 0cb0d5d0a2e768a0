//! Shared test fixtures: mock collaborators and context wiring

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use secrecy::SecretString;

use blacktree_worker::app::state::WorkerContext;
use blacktree_worker::deploy::docker::{DockerClient, PortMapping};
use blacktree_worker::deploy::git::GitClient;
use blacktree_worker::errors::WorkerError;
use blacktree_worker::filesys::file::JsonFile;
use blacktree_worker::models::message::{JobKind, JobMessage, ResultEvent};
use blacktree_worker::ports::PortAllocator;
use blacktree_worker::queue::ResultSink;
use blacktree_worker::store::StatusStore;
use blacktree_worker::tracker::Tracker;

/// Mock git collaborator; creates the destination directory on success
pub struct MockGit {
    pub fail: AtomicBool,
    pub calls: AtomicUsize,
}

impl MockGit {
    pub fn new() -> Self {
        Self {
            fail: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl GitClient for MockGit {
    async fn clone_repo(
        &self,
        repo_url: &str,
        _branch: &str,
        _token: Option<&SecretString>,
        dest: &Path,
    ) -> Result<(), WorkerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(WorkerError::CloneError(format!(
                "git clone failed for {}",
                repo_url
            )));
        }
        tokio::fs::create_dir_all(dest).await?;
        Ok(())
    }
}

/// Mock container engine with observable build concurrency
pub struct MockDocker {
    pub fail_builds: AtomicBool,
    pub build_delay: Duration,
    pub build_calls: AtomicUsize,
    pub current_builds: AtomicUsize,
    pub max_observed_builds: AtomicUsize,
    pub running: AtomicBool,
    pub run_calls: AtomicUsize,
    pub last_port_mapping: Mutex<Option<PortMapping>>,
    pub containers: Mutex<Vec<String>>,
    pub removed_images: Mutex<Vec<String>>,
}

impl MockDocker {
    pub fn new() -> Self {
        Self {
            fail_builds: AtomicBool::new(false),
            build_delay: Duration::from_millis(20),
            build_calls: AtomicUsize::new(0),
            current_builds: AtomicUsize::new(0),
            max_observed_builds: AtomicUsize::new(0),
            running: AtomicBool::new(false),
            run_calls: AtomicUsize::new(0),
            last_port_mapping: Mutex::new(None),
            containers: Mutex::new(Vec::new()),
            removed_images: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl DockerClient for MockDocker {
    async fn build(
        &self,
        image_name: &str,
        _context_dir: &Path,
        _dockerfile_path: &Path,
    ) -> Result<(), WorkerError> {
        let current = self.current_builds.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_observed_builds.fetch_max(current, Ordering::SeqCst);

        tokio::time::sleep(self.build_delay).await;

        self.current_builds.fetch_sub(1, Ordering::SeqCst);
        self.build_calls.fetch_add(1, Ordering::SeqCst);

        if self.fail_builds.load(Ordering::SeqCst) {
            return Err(WorkerError::BuildError(format!(
                "docker build failed for {}",
                image_name
            )));
        }
        Ok(())
    }

    async fn run(
        &self,
        _image_name: &str,
        container_name: &str,
        port: Option<PortMapping>,
    ) -> Result<(), WorkerError> {
        self.run_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_port_mapping.lock().unwrap() = port;
        self.containers.lock().unwrap().push(container_name.to_string());
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn is_running(&self, _image_name: &str) -> Result<bool, WorkerError> {
        Ok(self.running.load(Ordering::SeqCst))
    }

    async fn list_containers(&self, _image_name: &str) -> Result<Vec<String>, WorkerError> {
        Ok(self.containers.lock().unwrap().clone())
    }

    async fn stop_container(&self, _container_id: &str) -> Result<(), WorkerError> {
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn remove_container(&self, container_id: &str) -> Result<(), WorkerError> {
        self.containers
            .lock()
            .unwrap()
            .retain(|c| c != container_id);
        Ok(())
    }

    async fn remove_image(&self, image_name: &str) -> Result<(), WorkerError> {
        self.removed_images.lock().unwrap().push(image_name.to_string());
        Ok(())
    }
}

/// Collects published result events
pub struct EventCollector {
    pub events: Mutex<Vec<ResultEvent>>,
}

impl EventCollector {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ResultSink for EventCollector {
    async fn publish(&self, event: ResultEvent) -> Result<(), WorkerError> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

/// Everything a pipeline test needs, rooted in a temp data dir
pub struct TestHarness {
    pub ctx: Arc<WorkerContext>,
    pub git: Arc<MockGit>,
    pub docker: Arc<MockDocker>,
    pub events: Arc<EventCollector>,
}

pub fn harness(data_dir: &Path) -> TestHarness {
    let git = Arc::new(MockGit::new());
    let docker = Arc::new(MockDocker::new());
    let events = Arc::new(EventCollector::new());

    let ctx = Arc::new(WorkerContext {
        image_namespace: "blacktree".to_string(),
        repos_dir: data_dir.join("repos"),
        store: Arc::new(StatusStore::new(JsonFile::new(data_dir.join("deployments.json")))),
        tracker: Arc::new(Tracker::new(
            JsonFile::new(data_dir.join("repos.json")),
            data_dir.join("repos"),
        )),
        ports: Arc::new(PortAllocator::new(3000, 3010)),
        git: git.clone(),
        docker: docker.clone(),
        results: events.clone(),
    });

    TestHarness {
        ctx,
        git,
        docker,
        events,
    }
}

/// A build job message for tests
pub fn build_message(deployment_id: &str, repo: &str, port: &str) -> JobMessage {
    JobMessage {
        kind: JobKind::Build,
        deployment_id: deployment_id.to_string(),
        repository: repo.to_string(),
        branch: "main".to_string(),
        token: None,
        dockerfile_path: "./Dockerfile".to_string(),
        compose_file_path: String::new(),
        context_dir: ".".to_string(),
        port_number: port.to_string(),
    }
}

/// Wait until `check` passes or the deadline runs out
pub async fn wait_for<F>(what: &str, mut check: F)
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !check() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {}",
            what
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
