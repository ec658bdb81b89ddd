// ABOUTME: Deterministic local build-output paths derived from a project path.
// ABOUTME: Seeds a PRNG from the path and feeds its bytes into a v4-layout UUID.

use rand_chacha::ChaCha8Rng;
use rand_chacha::rand_core::{RngCore, SeedableRng};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use uuid::{Builder, Uuid};

/// Directory name prefix under the system temp dir.
pub const BUILD_DIR_PREFIX: &str = "rollout-bundle-";

/// File name of the archive produced by the build inside the artifact dir.
pub const BUNDLE_FILENAME: &str = "bundle.tar.gz";

/// Local directory that receives one build's bundle.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactPath(PathBuf);

impl ArtifactPath {
    /// Use an explicit directory instead of a derived one.
    pub fn explicit(dir: impl Into<PathBuf>) -> Self {
        Self(dir.into())
    }

    pub fn dir(&self) -> &Path {
        &self.0
    }

    /// Path of the bundle archive inside this directory.
    pub fn bundle(&self) -> PathBuf {
        self.0.join(BUNDLE_FILENAME)
    }
}

impl fmt::Display for ArtifactPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Derive the build directory for a project.
///
/// The same project path always maps to the same directory within one
/// environment, so repeated builds of one project reuse it while distinct
/// projects never share one.
pub fn derive_build_path(project_path: &Path) -> ArtifactPath {
    let id = seeded_uuid(&seed_bytes(project_path));
    ArtifactPath(std::env::temp_dir().join(format!("{BUILD_DIR_PREFIX}{}", id.hyphenated())))
}

/// Draw the 16 identifier bytes from a generator seeded by the project path.
pub fn seed_bytes(project_path: &Path) -> [u8; 16] {
    let mut hasher = Sha256::new();
    hasher.update(project_path.as_os_str().as_encoded_bytes());
    let seed: [u8; 32] = hasher.finalize().into();
    let mut rng = ChaCha8Rng::from_seed(seed);
    let mut bytes = [0u8; 16];
    rng.fill_bytes(&mut bytes);
    bytes
}

/// Fold `.` and `..` out of a path without touching the filesystem, so
/// spellings of one project directory derive the same build path.
///
/// `..` at the root stays at the root. Symlinks are not resolved.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other),
        }
    }
    out
}

/// Build a version-4 UUID from caller-supplied entropy.
pub fn seeded_uuid(bytes: &[u8; 16]) -> Uuid {
    Builder::from_random_bytes(*bytes).into_uuid()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_project_same_path() {
        let a = derive_build_path(Path::new("/home/me/apps/demo"));
        let b = derive_build_path(Path::new("/home/me/apps/demo"));
        assert_eq!(a, b);
    }

    #[test]
    fn path_lives_under_temp_dir_with_prefix() {
        let path = derive_build_path(Path::new("/srv/demo"));
        assert!(path.dir().starts_with(std::env::temp_dir()));
        let name = path.dir().file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(BUILD_DIR_PREFIX));
    }

    #[test]
    fn generated_id_is_version_four() {
        let id = seeded_uuid(&seed_bytes(Path::new("/srv/demo")));
        assert_eq!(id.get_version_num(), 4);
        assert_eq!(id.get_variant(), uuid::Variant::RFC4122);
    }

    #[test]
    fn parent_and_current_components_are_folded() {
        assert_eq!(
            normalize_path(Path::new("/work/tools/../demo/./app")),
            PathBuf::from("/work/demo/app")
        );
        assert_eq!(normalize_path(Path::new("/../srv")), PathBuf::from("/srv"));
        assert_eq!(normalize_path(Path::new("../a/../b")), PathBuf::from("../b"));
    }

    #[test]
    fn spellings_of_one_project_share_a_build_path() {
        let plain = derive_build_path(&normalize_path(Path::new("/work/demo")));
        let dotted = derive_build_path(&normalize_path(Path::new("/work/other/../demo/.")));
        assert_eq!(plain, dotted);
    }

    #[test]
    fn bundle_is_inside_dir() {
        let path = ArtifactPath::explicit("/tmp/out");
        assert_eq!(path.bundle(), PathBuf::from("/tmp/out/bundle.tar.gz"));
    }
}
