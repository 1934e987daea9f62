use poolfs::cache::CachedStore;
use poolfs::store::ObjectStore;
use poolfs::{LowFacade as _, ROOT_OBJECT};
use tempfile::TempDir;

pub struct Fixture {
    pub tempdir: TempDir,
    pub fs: CachedStore,
}

impl Fixture {
    pub fn new() -> Self {
        let tempdir = TempDir::new().expect("create temp dir");
        let fs = CachedStore::new(ObjectStore::new(tempdir.path()), 128);
        fs.mkdir(&ROOT_OBJECT).expect("create root");
        Self { tempdir, fs }
    }
}
