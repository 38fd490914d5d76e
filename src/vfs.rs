//! Virtual filesystem and image cache seams.
//!
//! Companion-map discovery probes the virtual filesystem for filename
//! variants of a bound diffuse map ("rock.dds" → "rock_n.dds") and loads the
//! winning variant through the image cache. Both collaborators are thin
//! traits so a host engine can plug in its own archive-backed filesystem;
//! this module ships an in-memory implementation for tests and small hosts,
//! and a disk-backed cache built on the `image` crate.
//!
//! The caches are the canonical owners of pixel data. Scene textures hold
//! `Rc<Image>` references; dropping a scene never evicts the cache.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::PathBuf;
use std::rc::Rc;

/// Read-only lookup into the host's virtual filesystem.
pub trait Vfs {
    /// Returns whether a file exists at `path`.
    fn exists(&self, path: &str) -> bool;
}

/// A decoded image: RGBA8 pixels plus dimensions.
#[derive(Clone, Debug)]
pub struct Image {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Tightly packed RGBA8 pixel data (`width * height * 4` bytes).
    pub data: Vec<u8>,
}

/// Loads and caches decoded images by path.
pub trait ImageCache {
    /// Returns the image at `path`, loading it on first request.
    ///
    /// Returns `None` when the file is missing or fails to decode; failures
    /// are logged, never fatal.
    fn image(&self, path: &str) -> Option<Rc<Image>>;
}

/// Builds a companion-map filename by inserting `pattern` before the
/// extension.
///
/// `companion_path("textures/rock.dds", "_n")` yields
/// `"textures/rock_n.dds"`. Returns `None` when the path has no extension
/// separator, since probing the unmodified name would just rediscover the
/// diffuse map itself.
pub fn companion_path(path: &str, pattern: &str) -> Option<String> {
    let dot = path.rfind('.')?;
    let mut name = String::with_capacity(path.len() + pattern.len());
    name.push_str(&path[..dot]);
    name.push_str(pattern);
    name.push_str(&path[dot..]);
    Some(name)
}

/// In-memory asset store implementing both [`Vfs`] and [`ImageCache`].
///
/// Used by the test suite and by hosts that decode their own archives up
/// front. A path exists exactly when an image has been inserted for it.
#[derive(Default)]
pub struct MemoryAssets {
    images: RefCell<HashMap<String, Rc<Image>>>,
}

impl MemoryAssets {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an image under `path`, replacing any previous entry.
    pub fn insert(&self, path: impl Into<String>, image: Image) {
        self.images
            .borrow_mut()
            .insert(path.into(), Rc::new(image));
    }

    /// Inserts a 1x1 placeholder image under `path`.
    ///
    /// Enough for tests that only care about file presence and dimensions.
    pub fn insert_stub(&self, path: impl Into<String>) {
        self.insert(
            path,
            Image {
                width: 1,
                height: 1,
                data: vec![255, 255, 255, 255],
            },
        );
    }
}

impl Vfs for MemoryAssets {
    fn exists(&self, path: &str) -> bool {
        self.images.borrow().contains_key(path)
    }
}

impl ImageCache for MemoryAssets {
    fn image(&self, path: &str) -> Option<Rc<Image>> {
        self.images.borrow().get(path).cloned()
    }
}

/// Disk-backed asset store rooted at a directory.
///
/// Decodes through the `image` crate on first request and memoizes the
/// result. Paths are interpreted relative to the root.
pub struct DiskAssets {
    root: PathBuf,
    cache: RefCell<HashMap<String, Rc<Image>>>,
}

impl DiskAssets {
    /// Creates a store rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cache: RefCell::new(HashMap::new()),
        }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }
}

impl Vfs for DiskAssets {
    fn exists(&self, path: &str) -> bool {
        self.resolve(path).is_file()
    }
}

impl ImageCache for DiskAssets {
    fn image(&self, path: &str) -> Option<Rc<Image>> {
        if let Some(cached) = self.cache.borrow().get(path) {
            return Some(cached.clone());
        }
        let decoded = match image::open(self.resolve(path)) {
            Ok(img) => img.to_rgba8(),
            Err(err) => {
                log::error!("failed to load image {path}: {err}");
                return None;
            }
        };
        let (width, height) = decoded.dimensions();
        let image = Rc::new(Image {
            width,
            height,
            data: decoded.into_raw(),
        });
        self.cache
            .borrow_mut()
            .insert(path.to_string(), image.clone());
        Some(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn companion_path_inserts_pattern_before_extension() {
        assert_eq!(
            companion_path("textures/rock.dds", "_n").as_deref(),
            Some("textures/rock_n.dds")
        );
        assert_eq!(
            companion_path("a.b.dds", "_spec").as_deref(),
            Some("a.b_spec.dds")
        );
    }

    #[test]
    fn companion_path_rejects_extensionless_names() {
        assert_eq!(companion_path("rock", "_n"), None);
    }

    #[test]
    fn memory_assets_report_existence_and_serve_images() {
        let assets = MemoryAssets::new();
        assert!(!assets.exists("rock.dds"));
        assets.insert_stub("rock.dds");
        assert!(assets.exists("rock.dds"));
        let image = assets.image("rock.dds").unwrap();
        assert_eq!((image.width, image.height), (1, 1));
        assert!(assets.image("missing.dds").is_none());
    }
}
