use std::fmt::Debug;

use kstring::KString;

use crate::{path::path_segments, ppath::PPath};


/// Maps path prefixes to values; allows multiple entries per prefix,
/// which are to be tried in sequence. Lookup picks the entry with the
/// longest matching prefix and returns the path rest along with it.
#[derive(Debug)]
pub struct MultiRouter<T> {
    entries: Vec<(Vec<KString>, Vec<T>)>,
}

impl<T> MultiRouter<T> {
    pub fn new() -> MultiRouter<T> {
        MultiRouter { entries: Vec::new() }
    }

    /// Using path *strings*, and chaining.
    pub fn add(&mut self, path: &str, val: T) -> &mut Self
    where T: Debug
    {
        let pathv: Vec<KString> = path_segments(path)
            .map(KString::from_ref).collect();
        if let Some((_, vals)) = self.entries.iter_mut().find(
            |(segments, _)| *segments == pathv)
        {
            vals.push(val);
        } else {
            self.entries.push((pathv, vec![val]));
        }
        self
    }

    pub fn get<P>(&self, path: &PPath<P>) -> Option<(&Vec<T>, PPath<P>)>
    where P: AsRef<str> + Clone + Debug
    {
        let path_segments = path.segments();
        let mut found: Option<&(Vec<KString>, Vec<T>)> = None;
        for entry in &self.entries {
            let (prefix, _) = entry;
            if prefix.len() > path_segments.len() {
                continue;
            }
            if ! itertools::equal(
                prefix.iter().map(|s| s.as_str()),
                path_segments[..prefix.len()].iter().map(|s| s.as_ref()))
            {
                continue;
            }
            match found {
                Some((foundprefix, _)) if foundprefix.len() >= prefix.len() => (),
                _ => found = Some(entry)
            }
        }
        let (prefix, vals) = found?;
        Some((vals,
              PPath::new(false, path.ends_with_slash(),
                         path_segments[prefix.len()..].to_vec())))
    }
}
