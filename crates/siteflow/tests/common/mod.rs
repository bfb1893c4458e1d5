use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

pub const SITE_KDL: &str = r#"
application "ExampleSite"
domain "example.com"
account "123456789012"

source {
    owner "example-org"
    repo "example-site-infra"
    frontend-repo "example-portal"
}

stage "dev" {
    bucket "dev-example-static-assets"
    compute #true
}

stage "prod" {
    bucket "prod-example-static-assets"
}
"#;

pub struct TestProject {
    pub root: TempDir,
}

impl TestProject {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        Self { root }
    }

    /// A project holding the default two-stage site
    pub fn with_site() -> Self {
        let project = Self::new();
        project.write_site_kdl(SITE_KDL);
        project
    }

    pub fn write_site_kdl(&self, content: &str) {
        fs::write(self.site_file(), content).unwrap();
    }

    pub fn site_file(&self) -> PathBuf {
        self.root.path().join("site.kdl")
    }

    pub fn path(&self) -> PathBuf {
        self.root.path().to_path_buf()
    }
}
