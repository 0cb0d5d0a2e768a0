//! External collaborators: source control and container engine

pub mod docker;
pub mod git;

pub use docker::{CliDockerClient, DockerClient};
pub use git::{CliGitClient, GitClient};
