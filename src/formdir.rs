//! A hot-loadable directory of form schemas, one `<name>.json` file
//! per form. An updater thread picks up edits without a restart.

use std::{collections::HashMap,
          fs::{read_dir, Metadata},
          os::unix::prelude::MetadataExt,
          panic::catch_unwind,
          path::{Path, PathBuf},
          sync::Arc,
          thread,
          time::{Duration, SystemTime}};

use anyhow::{anyhow, Context, Result};
use kstring::KString;

use crate::formschema::FormSchema;
use crate::miniarcswap::MiniArcSwap;
use crate::path::{base, extension_eq, IntoBoxPath};
use crate::util::my_read_to_string;
use crate::{loop_try, try_result, warn};

/// Enough file metadata to decide, with good chance given good faith
/// actors, whether a schema file changed on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
struct FileFingerprint {
    modified_time: SystemTime,
    ino: u64,
    len: u64,
}

impl FileFingerprint {
    fn of_metadata(md: &Metadata) -> Result<FileFingerprint> {
        Ok(FileFingerprint {
            modified_time: md.modified()?,
            ino: md.ino(),
            len: md.len(),
        })
    }
}

#[derive(Debug, Clone)]
struct FormEntry {
    fingerprint: FileFingerprint,
    schema: Arc<FormSchema>,
}

/// The result of one directory scan. Requests work on an `Arc` of
/// this, keeping a consistent view while the updater publishes new
/// ones.
#[derive(Debug)]
pub struct FormDirCache {
    forms: HashMap<KString, FormEntry>,
}

impl FormDirCache {
    /// Scan `basepath`, reusing entries from `old` whose files are
    /// unchanged. A file that cannot be processed only loses its own
    /// entry, the rest of the directory stays live.
    fn from_dir(basepath: &Path, old: Option<&FormDirCache>)
                -> Result<FormDirCache> {
        let mut forms = HashMap::new();
        for direntry in read_dir(basepath).with_context(
            || anyhow!("read_dir on {basepath:?}"))?
        {
            let scanned: Result<()> = try_result!{
                let direntry = direntry?;
                // Names end up in URLs, make sure they are UTF-8.
                let filename = direntry.file_name().into_string().ok().ok_or_else(
                    || anyhow!("file name can't be converted to string: {:?}",
                               direntry.file_name().to_string_lossy()))?;
                let mut fspath: PathBuf = basepath.into();
                fspath.push(&filename);
                if !extension_eq(&fspath, "json") {
                    return Ok(());
                }
                let md = fspath.symlink_metadata()?;
                if !md.is_file() {
                    // Also skips symlinks, symlink_metadata does not
                    // follow them.
                    return Ok(());
                }
                let fingerprint = FileFingerprint::of_metadata(&md)?;
                let name = KString::from_ref(base(&filename).expect(
                    "shown above to have suffix"));
                if let Some(old_entry) = old.and_then(|o| o.forms.get(&name)) {
                    if old_entry.fingerprint == fingerprint {
                        forms.insert(name, old_entry.clone());
                        return Ok(());
                    }
                }
                match FormSchema::from_json_str(&my_read_to_string(&fspath)?) {
                    Ok(schema) => {
                        forms.insert(name, FormEntry {
                            fingerprint,
                            schema: Arc::new(schema),
                        });
                    }
                    Err(e) => warn!("skipping form schema {fspath:?}: {e}"),
                }
                Ok(())
            };
            if let Err(e) = scanned {
                warn!("skipping entry in form dir {basepath:?}: {e:#}");
            }
        }
        Ok(FormDirCache { forms })
    }

    /// The schema for `name`, if the directory has it.
    pub fn get(&self, name: &str) -> Option<&Arc<FormSchema>> {
        self.forms.get(name).map(|entry| &entry.schema)
    }

    /// All form names, sorted, for index listings.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> =
            self.forms.keys().map(|k| k.as_str()).collect();
        names.sort();
        names
    }
}

pub struct FormDir {
    basepath: Box<Path>,
    cache: MiniArcSwap<FormDirCache>,
}

impl FormDir {
    /// Scan `basepath` once, then keep a thread re-scanning it and
    /// publishing a fresh cache whenever file metadata changed.
    pub fn open<P: IntoBoxPath>(basepath: P) -> Result<Arc<FormDir>> {
        let basepath = basepath.into_box_path();
        let cache = Arc::new(FormDirCache::from_dir(&basepath, None)?);
        let formdir = Arc::new(FormDir {
            basepath,
            cache: MiniArcSwap::new(cache),
        });
        let _updater_thread =
            thread::Builder::new().name("form_updater".into()).spawn({
                let formdir = Arc::clone(&formdir);
                move || -> ! {
                    loop_try! {
                        thread::sleep(Duration::from_millis(400));
                        match catch_unwind(|| -> Result<()> {
                            let old = formdir.cache.get();
                            let new = FormDirCache::from_dir(
                                &formdir.basepath, Some(&old))?;
                            formdir.cache.set(Arc::new(new));
                            Ok(())
                        }) {
                            Ok(Ok(())) => Ok(()),
                            Ok(Err(e)) => Err(e),
                            Err(e) =>
                                Err(anyhow!("updater thread: caught panic: {e:?}")),
                        }
                    }
                }
            })?;
        Ok(formdir)
    }

    pub fn cache(&self) -> Arc<FormDirCache> {
        self.cache.get()
    }
}
